use crate::config::RetentionConfig;
use crate::error::AppError;
use crate::services::store::EmailStore;
use opentelemetry::{global, metrics::Counter};
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tracing::Instrument;

#[derive(Clone, Debug)]
struct Metrics {
    expired: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("courier-server");
        Self {
            expired: meter
                .u64_counter("courier_emails_expired_total")
                .with_description("Total email records deleted by the retention policy")
                .build(),
        }
    }
}

/// Deletes email records older than the retention period.
#[derive(Debug)]
pub struct EmailCleanupWorker {
    store: Arc<dyn EmailStore>,
    config: RetentionConfig,
    metrics: Metrics,
}

impl EmailCleanupWorker {
    #[must_use]
    pub fn new(store: Arc<dyn EmailStore>, config: RetentionConfig) -> Self {
        Self { store, config, metrics: Metrics::new() }
    }

    pub async fn run(self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.config.cleanup_interval_secs.max(1)));

        while !*shutdown.borrow() {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.perform_cleanup()
                        .instrument(tracing::info_span!("email_cleanup_iteration"))
                        .await
                    {
                        tracing::error!(error = ?e, "Email cleanup iteration failed");
                    }
                }
                _ = shutdown.changed() => {}
            }
        }
        tracing::info!("Email cleanup loop shutting down...");
    }

    /// Deletes records created before `now - retention_days`.
    ///
    /// # Errors
    /// Returns an error if the store rejects the deletion.
    #[tracing::instrument(skip(self), err, fields(deleted = tracing::field::Empty))]
    pub async fn perform_cleanup(&self) -> Result<u64, AppError> {
        let cutoff = OffsetDateTime::now_utc() - time::Duration::days(i64::from(self.config.retention_days));
        tracing::debug!(cutoff = %cutoff, "Running email retention cleanup...");

        let count = self.store.delete_created_before(cutoff).await?;
        if count > 0 {
            tracing::info!(count = %count, "Deleted expired email records");
            self.metrics.expired.add(count, &[]);
            tracing::Span::current().record("deleted", count);
        }
        Ok(count)
    }
}
