use crate::domain::email::{Attachment, Email, EmailRequest};
use crate::error::AppError;
use crate::proto::courier::v1 as proto;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::{Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

pub const QUEUED_MESSAGE: &str = "Email queued for sending";

/// Reads an optional list where an explicit `null` means empty.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<Vec<T>>::deserialize(deserializer).map(Option::unwrap_or_default)
}

#[derive(Debug, Deserialize)]
pub struct AttachmentBody {
    pub filename: String,
    /// Base64 encoded bytes.
    pub content: String,
    pub content_type: String,
}

#[derive(Debug, Deserialize)]
pub struct SendEmailBody {
    pub to: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub cc: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub bcc: Vec<String>,
    pub subject: String,
    pub body: String,
    #[serde(default)]
    pub is_html: bool,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub attachments: Vec<AttachmentBody>,
}

impl TryFrom<SendEmailBody> for EmailRequest {
    type Error = AppError;

    fn try_from(body: SendEmailBody) -> Result<Self, Self::Error> {
        let attachments = body
            .attachments
            .into_iter()
            .map(|a| {
                let content = STANDARD
                    .decode(a.content.as_bytes())
                    .map_err(|e| AppError::BadRequest(format!("attachment {} is not valid base64: {e}", a.filename)))?;
                Ok(Attachment { filename: a.filename, content, content_type: a.content_type })
            })
            .collect::<Result<Vec<_>, AppError>>()?;

        Ok(Self {
            to: body.to,
            cc: body.cc,
            bcc: body.bcc,
            subject: body.subject,
            body: body.body,
            is_html: body.is_html,
            attachments,
        })
    }
}

impl From<proto::SendEmailRequest> for EmailRequest {
    fn from(msg: proto::SendEmailRequest) -> Self {
        Self {
            to: msg.to,
            cc: msg.cc,
            bcc: msg.bcc,
            subject: msg.subject,
            body: msg.body,
            is_html: msg.is_html,
            attachments: msg
                .attachments
                .into_iter()
                .map(|a| Attachment { filename: a.filename, content: a.content, content_type: a.content_type })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SendEmailResponse {
    pub id: Uuid,
    pub status: String,
    pub message: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<&Email> for SendEmailResponse {
    fn from(email: &Email) -> Self {
        Self {
            id: email.id,
            status: email.status.to_string(),
            message: QUEUED_MESSAGE.to_string(),
            created_at: email.created_at,
        }
    }
}

impl From<&Email> for proto::SendEmailResponse {
    fn from(email: &Email) -> Self {
        Self {
            id: email.id.to_string(),
            status: email.status.to_string(),
            message: QUEUED_MESSAGE.to_string(),
            created_at: email.created_at.format(&Rfc3339).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AttachmentSummary {
    pub filename: String,
    pub content_type: String,
    pub size: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EmailResponse {
    pub id: Uuid,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub subject: String,
    pub body: String,
    pub is_html: bool,
    pub status: String,
    pub error_message: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub sent_at: Option<OffsetDateTime>,
    pub attachments: Vec<AttachmentSummary>,
}

impl From<Email> for EmailResponse {
    fn from(email: Email) -> Self {
        Self {
            id: email.id,
            to: email.to,
            cc: email.cc,
            bcc: email.bcc,
            subject: email.subject,
            body: email.body,
            is_html: email.is_html,
            status: email.status.to_string(),
            error_message: email.error_message,
            created_at: email.created_at,
            sent_at: email.sent_at,
            attachments: email
                .attachments
                .into_iter()
                .map(|a| AttachmentSummary { size: a.content.len(), filename: a.filename, content_type: a.content_type })
                .collect(),
        }
    }
}
