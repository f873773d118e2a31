use crate::adapters::database::DbPool;
use crate::adapters::database::email_repo::EmailRepository;
use crate::domain::email::{Email, EmailRequest};
use crate::error::{AppError, Result};
use crate::services::store::EmailStore;
use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

/// `EmailStore` backed by the `emails` and `email_attachments` tables.
#[derive(Clone, Debug)]
pub struct PgEmailStore {
    pool: DbPool,
    repo: EmailRepository,
}

impl PgEmailStore {
    #[must_use]
    pub const fn new(pool: DbPool, repo: EmailRepository) -> Self {
        Self { pool, repo }
    }
}

#[async_trait]
impl EmailStore for PgEmailStore {
    #[tracing::instrument(err(level = "warn"), skip(self, request), fields(attachments = request.attachments.len()))]
    async fn create(&self, request: &EmailRequest, created_at: OffsetDateTime) -> Result<Email> {
        request.validate()?;

        let id = Uuid::now_v7();
        let mut tx = self.pool.begin().await?;
        let record = self.repo.insert(&mut tx, id, request, created_at).await?;
        self.repo.insert_attachments(&mut tx, id, request).await?;
        tx.commit().await?;

        let mut email = record.into_email(Vec::new()).map_err(AppError::InternalMsg)?;
        email.attachments.clone_from(&request.attachments);
        Ok(email)
    }

    async fn fetch(&self, id: Uuid) -> Result<Email> {
        let mut conn = self.pool.acquire().await?;
        self.repo.load(&mut conn, id).await
    }

    async fn mark_sent(&self, id: Uuid, sent_at: OffsetDateTime) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        if self.repo.mark_sent(&mut conn, id, sent_at).await? {
            Ok(())
        } else {
            Err(AppError::Conflict(format!("email {id} is missing or no longer pending")))
        }
    }

    async fn mark_failed(&self, id: Uuid, error_message: &str) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        if self.repo.mark_failed(&mut conn, id, error_message).await? {
            Ok(())
        } else {
            Err(AppError::Conflict(format!("email {id} is missing or no longer pending")))
        }
    }

    async fn delete_created_before(&self, cutoff: OffsetDateTime) -> Result<u64> {
        let mut conn = self.pool.acquire().await?;
        self.repo.delete_created_before(&mut conn, cutoff).await
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
