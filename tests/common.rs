#![allow(dead_code)]
use async_trait::async_trait;
use clap::Parser;
use courier_server::adapters::memory::InMemoryEmailStore;
use courier_server::api::{self, MgmtState};
use courier_server::config::Config;
use courier_server::domain::relay::Relay;
use courier_server::services::dispatcher::EmailDispatcher;
use courier_server::services::mailer::{DeliveryError, MailTransport, OutboundMessage};
use courier_server::services::store::EmailStore;
use courier_server::{AppBuilder, telemetry};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

/// Mail transport that records every send and optionally fails or stalls.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    pub fail_with: Option<String>,
    pub delay: Option<Duration>,
    pub sent: Mutex<Vec<(String, OutboundMessage)>>,
}

impl ScriptedTransport {
    pub fn failing(reason: &str) -> Self {
        Self { fail_with: Some(reason.to_string()), ..Default::default() }
    }

    pub fn slow(delay: Duration) -> Self {
        Self { delay: Some(delay), ..Default::default() }
    }

    pub fn relays_used(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|(relay, _)| relay.clone()).collect()
    }
}

#[async_trait]
impl MailTransport for ScriptedTransport {
    async fn send(&self, relay: &Relay, message: OutboundMessage) -> Result<(), DeliveryError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.sent.lock().unwrap().push((relay.label().to_string(), message));
        match &self.fail_with {
            Some(reason) => Err(DeliveryError::Relay(anyhow::anyhow!("{reason}"))),
            None => Ok(()),
        }
    }
}

pub fn test_relays(n: usize) -> Vec<Relay> {
    (0..n)
        .map(|i| Relay {
            name: Some(format!("R{i}")),
            host: format!("smtp{i}.example.com"),
            port: 587,
            username: Some(format!("user{i}")),
            password: Some("secret".to_string()),
            from_email: format!("noreply{i}@example.com"),
            tls: None,
        })
        .collect()
}

pub fn get_test_config() -> Config {
    let mut config = Config::parse_from(["courier-server"]);
    config.server.host = "127.0.0.1".to_string();
    config.server.port = 0;
    config.server.mgmt_port = 0;
    config.dispatch.reconcile_backoff_ms = 1;
    config
}

pub struct TestApp {
    pub api_url: String,
    pub mgmt_url: String,
    pub client: reqwest::Client,
    pub store: Arc<InMemoryEmailStore>,
    pub transport: Arc<ScriptedTransport>,
    pub dispatcher: EmailDispatcher,
    pub config: Config,
    pub shutdown_tx: tokio::sync::watch::Sender<bool>,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(2, ScriptedTransport::default()).await
    }

    pub async fn spawn_with(relay_count: usize, transport: ScriptedTransport) -> Self {
        Self::spawn_with_config(get_test_config(), relay_count, transport).await
    }

    pub async fn spawn_with_config(config: Config, relay_count: usize, transport: ScriptedTransport) -> Self {
        telemetry::init_test_telemetry();

        let store = Arc::new(InMemoryEmailStore::new());
        let transport = Arc::new(transport);
        let app = AppBuilder::new(config.clone())
            .with_store(Arc::clone(&store) as Arc<dyn EmailStore>)
            .with_transport(Arc::clone(&transport) as Arc<dyn MailTransport>)
            .with_relays(test_relays(relay_count))
            .build()
            .unwrap();

        let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

        let api_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mgmt_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let api_url = format!("http://{}", api_listener.local_addr().unwrap());
        let mgmt_url = format!("http://{}", mgmt_listener.local_addr().unwrap());

        let app_router = api::app_router(&config.server, app.dispatcher.clone());
        let mgmt_router = api::mgmt_router(MgmtState { health_service: app.health_service });

        let mut api_rx = shutdown_rx.clone();
        tokio::spawn(async move {
            axum::serve(api_listener, app_router.into_make_service_with_connect_info::<SocketAddr>())
                .with_graceful_shutdown(async move {
                    let _ = api_rx.wait_for(|&s| s).await;
                })
                .await
                .unwrap();
        });

        let mut mgmt_rx = shutdown_rx.clone();
        tokio::spawn(async move {
            axum::serve(mgmt_listener, mgmt_router.into_make_service_with_connect_info::<SocketAddr>())
                .with_graceful_shutdown(async move {
                    let _ = mgmt_rx.wait_for(|&s| s).await;
                })
                .await
                .unwrap();
        });

        Self {
            api_url,
            mgmt_url,
            client: reqwest::Client::new(),
            store,
            transport,
            dispatcher: app.dispatcher,
            config,
            shutdown_tx,
        }
    }

    /// Polls the record until it leaves `pending`, returning the final JSON body.
    pub async fn wait_for_outcome(&self, id: &str) -> serde_json::Value {
        for _ in 0..200 {
            let body: serde_json::Value =
                self.client.get(format!("{}/v1/emails/{id}", self.api_url)).send().await.unwrap().json().await.unwrap();
            if body["status"] != "pending" {
                return body;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("email {id} never left pending");
    }

    /// Waits for every scheduled delivery to finish.
    pub async fn settle(&self) {
        for _ in 0..500 {
            if self.dispatcher.in_flight() == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("deliveries still in flight");
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
    }
}

pub fn email_body(to: &[&str]) -> serde_json::Value {
    serde_json::json!({
        "to": to,
        "subject": "Weekly digest",
        "body": "Here is what happened this week.",
    })
}
