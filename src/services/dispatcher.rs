use crate::config::DispatchConfig;
use crate::domain::email::{Email, EmailRequest, truncate_error_message};
use crate::error::{AppError, Result};
use crate::services::mailer::{MailTransport, OutboundMessage};
use crate::services::relay_pool::RelayPool;
use crate::services::store::EmailStore;
use backon::{ExponentialBuilder, Retryable};
use opentelemetry::{
    KeyValue, global,
    metrics::{Counter, Histogram},
};
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tokio_util::task::TaskTracker;
use tracing::Instrument;
use uuid::Uuid;

#[derive(Clone, Debug)]
struct Metrics {
    submitted_total: Counter<u64>,
    deliveries_total: Counter<u64>,
    delivery_duration: Histogram<f64>,
    reconcile_failures: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("courier-server");
        Self {
            submitted_total: meter
                .u64_counter("courier_emails_submitted_total")
                .with_description("Send requests handled, by outcome")
                .build(),
            deliveries_total: meter
                .u64_counter("courier_deliveries_total")
                .with_description("Delivery attempts, by outcome and relay")
                .build(),
            delivery_duration: meter
                .f64_histogram("courier_delivery_duration_seconds")
                .with_description("Time spent talking to the relay")
                .build(),
            reconcile_failures: meter
                .u64_counter("courier_reconcile_failures_total")
                .with_description("Deliveries whose outcome could not be written back")
                .build(),
        }
    }
}

/// Accepts send requests and delivers them in the background.
///
/// `submit` persists a pending record and returns that snapshot before any relay is contacted.
/// The delivery outcome is written back later; use `fetch` to observe it.
#[derive(Clone, Debug)]
pub struct EmailDispatcher {
    store: Arc<dyn EmailStore>,
    relays: Arc<RelayPool>,
    transport: Arc<dyn MailTransport>,
    tracker: TaskTracker,
    config: DispatchConfig,
    metrics: Metrics,
}

impl EmailDispatcher {
    #[must_use]
    pub fn new(
        store: Arc<dyn EmailStore>,
        relays: Arc<RelayPool>,
        transport: Arc<dyn MailTransport>,
        config: DispatchConfig,
    ) -> Self {
        Self { store, relays, transport, tracker: TaskTracker::new(), config, metrics: Metrics::new() }
    }

    /// Records the request as pending and schedules its delivery.
    ///
    /// # Errors
    /// Returns `AppError::NoRelayConfigured` if there is no relay to deliver through.
    /// Returns `AppError::BadRequest` if the request fails validation.
    /// Returns `AppError::Database` if the record cannot be stored.
    #[tracing::instrument(
        err(level = "warn"),
        skip(self, request),
        fields(recipients = request.to.len(), email.id = tracing::field::Empty)
    )]
    pub async fn submit(&self, request: EmailRequest) -> Result<Email> {
        if self.relays.is_empty() {
            self.metrics.submitted_total.add(1, &[KeyValue::new("status", "no_relay")]);
            return Err(AppError::NoRelayConfigured);
        }

        if let Err(e) = request.validate() {
            self.metrics.submitted_total.add(1, &[KeyValue::new("status", "invalid")]);
            return Err(e.into());
        }

        let email = match self.store.create(&request, OffsetDateTime::now_utc()).await {
            Ok(email) => email,
            Err(e) => {
                self.metrics.submitted_total.add(1, &[KeyValue::new("status", "store_error")]);
                return Err(e);
            }
        };

        tracing::Span::current().record("email.id", tracing::field::display(email.id));
        tracing::debug!("Email recorded, scheduling delivery");
        self.metrics.submitted_total.add(1, &[KeyValue::new("status", "accepted")]);

        let dispatcher = self.clone();
        let id = email.id;
        self.tracker.spawn(
            async move { dispatcher.deliver(id, request).await }
                .instrument(tracing::info_span!("deliver_email", email.id = %id, relay = tracing::field::Empty)),
        );

        Ok(email)
    }

    /// Reads the current state of a record.
    ///
    /// # Errors
    /// Returns `AppError::NotFound` if no record has this id.
    #[tracing::instrument(err(level = "debug"), skip(self))]
    pub async fn fetch(&self, id: Uuid) -> Result<Email> {
        self.store.fetch(id).await
    }

    /// Makes the single delivery attempt for a record and writes the outcome back.
    async fn deliver(&self, id: Uuid, request: EmailRequest) {
        let relay = match self.relays.next() {
            Ok(relay) => relay,
            Err(e) => {
                self.reconcile_failed(id, &e.to_string()).await;
                return;
            }
        };
        let relay_label = relay.label().to_string();
        tracing::Span::current().record("relay", relay_label.as_str());

        let message = OutboundMessage::new(relay, request);
        let started = std::time::Instant::now();
        let result = self.transport.send(relay, message).await;
        self.metrics.delivery_duration.record(started.elapsed().as_secs_f64(), &[]);

        match result {
            Ok(()) => {
                tracing::info!(relay = %relay_label, "Email delivered to relay");
                self.metrics
                    .deliveries_total
                    .add(1, &[KeyValue::new("status", "sent"), KeyValue::new("relay", relay_label)]);
                self.reconcile_sent(id).await;
            }
            Err(e) => {
                tracing::warn!(relay = %relay_label, error = %e, "Email delivery failed");
                self.metrics
                    .deliveries_total
                    .add(1, &[KeyValue::new("status", "failed"), KeyValue::new("relay", relay_label)]);
                self.reconcile_failed(id, &e.to_string()).await;
            }
        }
    }

    async fn reconcile_sent(&self, id: Uuid) {
        let sent_at = OffsetDateTime::now_utc();
        let result = (|| async { self.store.mark_sent(id, sent_at).await })
            .retry(self.reconcile_backoff())
            .when(is_transient)
            .notify(|e, delay| tracing::debug!(error = %e, ?delay, "Retrying mark_sent"))
            .await;

        if let Err(e) = result {
            tracing::error!(error = %e, "Failed to record sent status; record stays pending");
            self.metrics.reconcile_failures.add(1, &[KeyValue::new("status", "sent")]);
        }
    }

    async fn reconcile_failed(&self, id: Uuid, reason: &str) {
        let message = truncate_error_message(reason);
        let result = (|| async { self.store.mark_failed(id, &message).await })
            .retry(self.reconcile_backoff())
            .when(is_transient)
            .notify(|e, delay| tracing::debug!(error = %e, ?delay, "Retrying mark_failed"))
            .await;

        if let Err(e) = result {
            tracing::error!(error = %e, "Failed to record failed status; record stays pending");
            self.metrics.reconcile_failures.add(1, &[KeyValue::new("status", "failed")]);
        }
    }

    fn reconcile_backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(self.config.reconcile_backoff_ms))
            .with_max_times(self.config.reconcile_retries)
    }

    /// Number of deliveries still running.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Stops accepting the tracked set as open and waits up to `timeout` for running deliveries.
    ///
    /// Returns `true` if every delivery finished in time.
    pub async fn drain(&self, timeout: Duration) -> bool {
        self.tracker.close();
        let pending = self.tracker.len();
        if pending > 0 {
            tracing::info!(pending, "Waiting for in-flight deliveries");
        }
        if tokio::time::timeout(timeout, self.tracker.wait()).await.is_ok() {
            true
        } else {
            tracing::warn!(remaining = self.tracker.len(), "Timed out waiting for in-flight deliveries");
            false
        }
    }
}

/// A conflict means the record already left `pending`; writing again would break the state machine.
const fn is_transient(e: &AppError) -> bool {
    !matches!(e, AppError::Conflict(_) | AppError::NotFound | AppError::BadRequest(_))
}
