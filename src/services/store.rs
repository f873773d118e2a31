use crate::domain::email::{Email, EmailRequest};
use crate::error::Result;
use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

/// Durable storage for email records.
///
/// Implementations must reject requests that break the structural limits of `EmailRequest`,
/// and must only apply `mark_sent`/`mark_failed` to records that are still pending.
#[async_trait]
pub trait EmailStore: Send + Sync + std::fmt::Debug {
    /// Persists a new pending record and returns it with its assigned id.
    ///
    /// # Errors
    /// Returns `AppError::BadRequest` if the record violates a storage constraint.
    /// Returns `AppError::Database` if the write fails.
    async fn create(&self, request: &EmailRequest, created_at: OffsetDateTime) -> Result<Email>;

    /// # Errors
    /// Returns `AppError::NotFound` if no record has this id.
    async fn fetch(&self, id: Uuid) -> Result<Email>;

    /// # Errors
    /// Returns `AppError::Conflict` if the record is missing or no longer pending.
    async fn mark_sent(&self, id: Uuid, sent_at: OffsetDateTime) -> Result<()>;

    /// # Errors
    /// Returns `AppError::Conflict` if the record is missing or no longer pending.
    async fn mark_failed(&self, id: Uuid, error_message: &str) -> Result<()>;

    /// Deletes every record created before `cutoff`, returning how many were removed.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the deletion fails.
    async fn delete_created_before(&self, cutoff: OffsetDateTime) -> Result<u64>;

    /// Cheap round trip used by readiness probes.
    ///
    /// # Errors
    /// Returns an error if the backing storage is unreachable.
    async fn ping(&self) -> Result<()>;
}
