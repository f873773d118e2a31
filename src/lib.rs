#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::todo)]
#![warn(clippy::panic)]
#![warn(clippy::dbg_macro)]
#![warn(clippy::print_stdout)]
#![warn(clippy::print_stderr)]
#![warn(clippy::clone_on_ref_ptr)]
#![warn(unreachable_pub)]
#![warn(missing_debug_implementations)]
#![warn(unused_qualifications)]
#![deny(unused_must_use)]

pub mod adapters;
pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod proto;
pub mod services;
pub mod telemetry;
pub mod workers;

use crate::adapters::memory::InMemoryEmailStore;
use crate::adapters::smtp::SmtpMailTransport;
use crate::config::Config;
use crate::domain::relay::Relay;
use crate::services::dispatcher::EmailDispatcher;
use crate::services::health_service::HealthService;
use crate::services::mailer::MailTransport;
use crate::services::relay_pool::RelayPool;
use crate::services::store::EmailStore;
use crate::workers::EmailCleanupWorker;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Background loops owned by the process, started once the listeners are bound.
#[derive(Debug)]
pub struct Workers {
    email_cleanup: EmailCleanupWorker,
}

impl Workers {
    #[must_use]
    pub fn spawn_all(self, shutdown_rx: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        vec![tokio::spawn(self.email_cleanup.run(shutdown_rx))]
    }
}

#[derive(Debug)]
pub struct App {
    pub dispatcher: EmailDispatcher,
    pub health_service: HealthService,
    pub workers: Workers,
}

/// Wires services together. Anything not supplied falls back to what the configuration describes.
#[derive(Debug)]
pub struct AppBuilder {
    config: Config,
    store: Option<Arc<dyn EmailStore>>,
    transport: Option<Arc<dyn MailTransport>>,
    relays: Option<Vec<Relay>>,
}

impl AppBuilder {
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config, store: None, transport: None, relays: None }
    }

    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn EmailStore>) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub fn with_transport(mut self, transport: Arc<dyn MailTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    #[must_use]
    pub fn with_relays(mut self, relays: Vec<Relay>) -> Self {
        self.relays = Some(relays);
        self
    }

    /// # Errors
    /// Returns an error if the relay list cannot be loaded from the configuration.
    pub fn build(self) -> anyhow::Result<App> {
        let relays = match self.relays {
            Some(relays) => relays,
            None => self.config.relays.load_relays()?,
        };
        if relays.is_empty() {
            tracing::warn!("No outbound relay configured; send requests will be rejected");
        } else {
            let labels: Vec<&str> = relays.iter().map(Relay::label).collect();
            tracing::info!(relays = ?labels, "Relay pool configured");
        }

        let store = self.store.unwrap_or_else(|| Arc::new(InMemoryEmailStore::new()) as Arc<dyn EmailStore>);
        let transport = self.transport.unwrap_or_else(|| {
            Arc::new(SmtpMailTransport::new(Duration::from_secs(self.config.relays.smtp_timeout_secs)))
                as Arc<dyn MailTransport>
        });

        let dispatcher = EmailDispatcher::new(
            Arc::clone(&store),
            Arc::new(RelayPool::new(relays)),
            transport,
            self.config.dispatch.clone(),
        );
        let health_service = HealthService::new(Arc::clone(&store), self.config.health.clone());
        let workers = Workers { email_cleanup: EmailCleanupWorker::new(store, self.config.retention.clone()) };

        Ok(App { dispatcher, health_service, workers })
    }
}

/// Flips the shutdown channel on SIGINT or SIGTERM.
pub fn spawn_signal_handler(shutdown_tx: watch::Sender<bool>) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to listen for SIGTERM");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            () = ctrl_c => tracing::info!("Received Ctrl+C, shutting down..."),
            () = terminate => tracing::info!("Received SIGTERM, shutting down..."),
        }
        let _ = shutdown_tx.send(true);
    });
}

/// Routes panics through tracing so they reach the configured log output.
pub fn setup_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        let location = info.location().map(|l| format!("{}:{}", l.file(), l.line())).unwrap_or_default();
        let payload = info
            .payload()
            .downcast_ref::<&str>()
            .map(ToString::to_string)
            .or_else(|| info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic payload".to_string());
        tracing::error!(location = %location, panic = %payload, "Panic occurred");
    }));
}
