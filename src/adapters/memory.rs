use crate::domain::email::{Email, EmailRequest, EmailStatus};
use crate::error::{AppError, Result};
use crate::services::store::EmailStore;
use async_trait::async_trait;
use dashmap::DashMap;
use time::OffsetDateTime;
use uuid::Uuid;

/// Process-local record store. Records are lost on restart.
#[derive(Debug, Default)]
pub struct InMemoryEmailStore {
    emails: DashMap<Uuid, Email>,
}

impl InMemoryEmailStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.emails.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.emails.is_empty()
    }

    #[must_use]
    pub fn contains(&self, id: Uuid) -> bool {
        self.emails.contains_key(&id)
    }

    fn transition(&self, id: Uuid, apply: impl FnOnce(&mut Email)) -> Result<()> {
        let mut entry = self.emails.get_mut(&id).ok_or_else(|| AppError::Conflict(format!("email {id} not found")))?;
        if entry.status.is_terminal() {
            return Err(AppError::Conflict(format!("email {id} is already {}", entry.status)));
        }
        apply(entry.value_mut());
        Ok(())
    }
}

#[async_trait]
impl EmailStore for InMemoryEmailStore {
    async fn create(&self, request: &EmailRequest, created_at: OffsetDateTime) -> Result<Email> {
        request.validate()?;

        let email = Email::pending(Uuid::now_v7(), request, created_at);
        self.emails.insert(email.id, email.clone());
        Ok(email)
    }

    async fn fetch(&self, id: Uuid) -> Result<Email> {
        self.emails.get(&id).map(|e| e.clone()).ok_or(AppError::NotFound)
    }

    async fn mark_sent(&self, id: Uuid, sent_at: OffsetDateTime) -> Result<()> {
        self.transition(id, |email| {
            email.status = EmailStatus::Sent;
            email.sent_at = Some(sent_at);
            email.error_message = None;
        })
    }

    async fn mark_failed(&self, id: Uuid, error_message: &str) -> Result<()> {
        self.transition(id, |email| {
            email.status = EmailStatus::Failed;
            email.error_message = Some(error_message.to_string());
        })
    }

    async fn delete_created_before(&self, cutoff: OffsetDateTime) -> Result<u64> {
        let mut removed = 0u64;
        self.emails.retain(|_, email| {
            let keep = email.created_at >= cutoff;
            if !keep {
                removed += 1;
            }
            keep
        });
        Ok(removed)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
