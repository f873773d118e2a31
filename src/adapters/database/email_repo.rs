use crate::adapters::database::records::{AttachmentRecord, EmailRecord};
use crate::domain::email::{Email, EmailRequest, EmailStatus};
use crate::error::{AppError, Result};
use sqlx::PgConnection;
use time::OffsetDateTime;
use uuid::Uuid;

const CHECK_VIOLATION: &str = "23514";

#[derive(Clone, Debug, Default)]
pub struct EmailRepository {}

impl EmailRepository {
    #[must_use]
    pub const fn new() -> Self {
        Self {}
    }

    /// Inserts a pending email row.
    ///
    /// # Errors
    /// Returns `AppError::BadRequest` if a table constraint rejects the row.
    /// Returns `AppError::Database` if the insert fails.
    #[tracing::instrument(level = "debug", skip(self, conn, request), err)]
    pub(crate) async fn insert(
        &self,
        conn: &mut PgConnection,
        id: Uuid,
        request: &EmailRequest,
        created_at: OffsetDateTime,
    ) -> Result<EmailRecord> {
        let result = sqlx::query_as::<_, EmailRecord>(
            r#"
            INSERT INTO emails (id, to_addresses, cc_addresses, bcc_addresses, subject, body, is_html, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id, to_addresses, cc_addresses, bcc_addresses, subject, body, is_html,
                      status, error_message, created_at, sent_at
            "#,
        )
        .bind(id)
        .bind(&request.to)
        .bind(&request.cc)
        .bind(&request.bcc)
        .bind(&request.subject)
        .bind(&request.body)
        .bind(request.is_html)
        .bind(EmailStatus::Pending.as_str())
        .bind(created_at)
        .fetch_one(conn)
        .await;

        map_constraint_violation(result)
    }

    /// Inserts the attachments of an email, preserving their order.
    ///
    /// # Errors
    /// Returns `AppError::BadRequest` if a table constraint rejects a row.
    /// Returns `AppError::Database` if the insert fails.
    #[tracing::instrument(level = "debug", skip(self, conn, request), fields(count = request.attachments.len()), err)]
    pub(crate) async fn insert_attachments(
        &self,
        conn: &mut PgConnection,
        email_id: Uuid,
        request: &EmailRequest,
    ) -> Result<()> {
        for (position, attachment) in request.attachments.iter().enumerate() {
            let position = i32::try_from(position).map_err(|_| AppError::BadRequest("too many attachments".into()))?;
            let result = sqlx::query(
                r#"
                INSERT INTO email_attachments (email_id, position, filename, content, content_type)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(email_id)
            .bind(position)
            .bind(&attachment.filename)
            .bind(&attachment.content)
            .bind(&attachment.content_type)
            .execute(&mut *conn)
            .await;

            map_constraint_violation(result)?;
        }
        Ok(())
    }

    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn find_by_id(&self, conn: &mut PgConnection, id: Uuid) -> Result<Option<EmailRecord>> {
        let record = sqlx::query_as::<_, EmailRecord>(
            r#"
            SELECT id, to_addresses, cc_addresses, bcc_addresses, subject, body, is_html,
                   status, error_message, created_at, sent_at
            FROM emails
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(conn)
        .await?;
        Ok(record)
    }

    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn find_attachments(&self, conn: &mut PgConnection, email_id: Uuid) -> Result<Vec<AttachmentRecord>> {
        let records = sqlx::query_as::<_, AttachmentRecord>(
            r#"
            SELECT filename, content, content_type
            FROM email_attachments
            WHERE email_id = $1
            ORDER BY position ASC
            "#,
        )
        .bind(email_id)
        .fetch_all(conn)
        .await?;
        Ok(records)
    }

    /// Moves a pending email to `sent`. Returns `false` if no pending row matched.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the update fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn mark_sent(&self, conn: &mut PgConnection, id: Uuid, sent_at: OffsetDateTime) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE emails
            SET status = 'sent', sent_at = $2, error_message = NULL
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(sent_at)
        .execute(conn)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Moves a pending email to `failed`. Returns `false` if no pending row matched.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the update fails.
    #[tracing::instrument(level = "debug", skip(self, conn, error_message))]
    pub(crate) async fn mark_failed(&self, conn: &mut PgConnection, id: Uuid, error_message: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE emails
            SET status = 'failed', error_message = $2, sent_at = NULL
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(error_message)
        .execute(conn)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Deletes emails created before the cutoff. Attachments go with them via `ON DELETE CASCADE`.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the deletion fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn delete_created_before(&self, conn: &mut PgConnection, cutoff: OffsetDateTime) -> Result<u64> {
        let result = sqlx::query("DELETE FROM emails WHERE created_at < $1").bind(cutoff).execute(conn).await?;
        Ok(result.rows_affected())
    }
}

fn map_constraint_violation<T>(result: std::result::Result<T, sqlx::Error>) -> Result<T> {
    match result {
        Ok(value) => Ok(value),
        Err(sqlx::Error::Database(e)) if e.code().as_deref() == Some(CHECK_VIOLATION) => {
            Err(AppError::BadRequest(format!("Email rejected by storage constraint {}", e.constraint().unwrap_or("unknown"))))
        }
        Err(e) => Err(AppError::Database(e)),
    }
}

impl EmailRepository {
    /// Loads an email and its attachments.
    ///
    /// # Errors
    /// Returns `AppError::NotFound` if no row has this id.
    /// Returns `AppError::Database` if a query fails.
    pub(crate) async fn load(&self, conn: &mut PgConnection, id: Uuid) -> Result<Email> {
        let record = self.find_by_id(conn, id).await?.ok_or(AppError::NotFound)?;
        let attachments = self.find_attachments(conn, id).await?;
        record.into_email(attachments).map_err(AppError::InternalMsg)
    }
}
