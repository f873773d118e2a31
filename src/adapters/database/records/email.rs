use crate::domain::email::{Attachment, Email, EmailStatus};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, sqlx::FromRow)]
pub struct EmailRecord {
    pub(crate) id: Uuid,
    pub(crate) to_addresses: Vec<String>,
    pub(crate) cc_addresses: Vec<String>,
    pub(crate) bcc_addresses: Vec<String>,
    pub(crate) subject: String,
    pub(crate) body: String,
    pub(crate) is_html: bool,
    pub(crate) status: String,
    pub(crate) error_message: Option<String>,
    pub(crate) created_at: OffsetDateTime,
    pub(crate) sent_at: Option<OffsetDateTime>,
}

#[derive(Debug, sqlx::FromRow)]
pub struct AttachmentRecord {
    pub(crate) filename: String,
    pub(crate) content: Vec<u8>,
    pub(crate) content_type: String,
}

impl From<AttachmentRecord> for Attachment {
    fn from(record: AttachmentRecord) -> Self {
        Self { filename: record.filename, content: record.content, content_type: record.content_type }
    }
}

impl EmailRecord {
    /// Joins the row with its attachments, already ordered by position.
    ///
    /// # Errors
    /// Returns a description of the problem if the stored status is unknown.
    pub(crate) fn into_email(self, attachments: Vec<AttachmentRecord>) -> Result<Email, String> {
        let status: EmailStatus = self.status.parse()?;
        Ok(Email {
            id: self.id,
            to: self.to_addresses,
            cc: self.cc_addresses,
            bcc: self.bcc_addresses,
            subject: self.subject,
            body: self.body,
            is_html: self.is_html,
            status,
            error_message: self.error_message,
            created_at: self.created_at,
            sent_at: self.sent_at,
            attachments: attachments.into_iter().map(Into::into).collect(),
        })
    }
}
