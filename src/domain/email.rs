use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

pub const MAX_TO_RECIPIENTS: usize = 100;
pub const MAX_COPY_RECIPIENTS: usize = 50;
pub const MAX_SUBJECT_CHARS: usize = 255;
pub const MAX_BODY_BYTES: usize = 1_048_576;
pub const MAX_ATTACHMENTS: usize = 10;
pub const MAX_FILENAME_CHARS: usize = 255;
pub const MAX_CONTENT_TYPE_CHARS: usize = 100;
pub const MAX_ERROR_MESSAGE_CHARS: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must contain between {min} and {max} addresses")]
    RecipientCount { field: &'static str, min: usize, max: usize },
    #[error("{field} contains an invalid email address: {address}")]
    InvalidAddress { field: &'static str, address: String },
    #[error("{field} must be between {min} and {max} {unit} long")]
    Length { field: &'static str, min: usize, max: usize, unit: &'static str },
    #[error("at most 10 attachments are allowed")]
    TooManyAttachments,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmailStatus {
    Pending,
    Sent,
    Failed,
}

impl EmailStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for EmailStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmailStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "sent" => Ok(Self::Sent),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown email status: {other}")),
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub content: Vec<u8>,
    pub content_type: String,
}

impl fmt::Debug for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attachment")
            .field("filename", &self.filename)
            .field("content_len", &self.content.len())
            .field("content_type", &self.content_type)
            .finish()
    }
}

/// A caller-supplied request to send one email.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmailRequest {
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub subject: String,
    pub body: String,
    pub is_html: bool,
    pub attachments: Vec<Attachment>,
}

impl EmailRequest {
    /// Checks the structural limits of the request.
    ///
    /// # Errors
    /// Returns the first `ValidationError` found, checking recipients first.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_addresses("to", &self.to, 1, MAX_TO_RECIPIENTS)?;
        validate_addresses("cc", &self.cc, 0, MAX_COPY_RECIPIENTS)?;
        validate_addresses("bcc", &self.bcc, 0, MAX_COPY_RECIPIENTS)?;

        check_length("subject", self.subject.chars().count(), MAX_SUBJECT_CHARS, "characters")?;
        check_length("body", self.body.len(), MAX_BODY_BYTES, "bytes")?;

        if self.attachments.len() > MAX_ATTACHMENTS {
            return Err(ValidationError::TooManyAttachments);
        }
        for attachment in &self.attachments {
            check_length("attachment filename", attachment.filename.chars().count(), MAX_FILENAME_CHARS, "characters")?;
            check_length(
                "attachment content_type",
                attachment.content_type.chars().count(),
                MAX_CONTENT_TYPE_CHARS,
                "characters",
            )?;
        }

        Ok(())
    }
}

fn validate_addresses(field: &'static str, addresses: &[String], min: usize, max: usize) -> Result<(), ValidationError> {
    if addresses.len() < min || addresses.len() > max {
        return Err(ValidationError::RecipientCount { field, min, max });
    }
    if let Some(bad) = addresses.iter().find(|a| !is_valid_address(a)) {
        return Err(ValidationError::InvalidAddress { field, address: bad.clone() });
    }
    Ok(())
}

const fn check_length(field: &'static str, len: usize, max: usize, unit: &'static str) -> Result<(), ValidationError> {
    if len == 0 || len > max {
        return Err(ValidationError::Length { field, min: 1, max, unit });
    }
    Ok(())
}

/// Accepts `local@domain.tld` with a restricted character set and an alphabetic TLD of two or more letters.
#[must_use]
pub fn is_valid_address(address: &str) -> bool {
    let Some((local, domain)) = address.rsplit_once('@') else {
        return false;
    };
    if local.is_empty() || !local.chars().all(|c| c.is_ascii_alphanumeric() || "._%+-".contains(c)) {
        return false;
    }

    let Some((host, tld)) = domain.rsplit_once('.') else {
        return false;
    };
    if host.is_empty() || !host.chars().all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-') {
        return false;
    }
    if tld.len() < 2 || !tld.chars().all(|c| c.is_ascii_alphabetic()) {
        return false;
    }

    address.parse::<lettre::Address>().is_ok()
}

/// Cuts a delivery failure reason down to what the record is allowed to hold.
#[must_use]
pub fn truncate_error_message(message: &str) -> String {
    message.chars().take(MAX_ERROR_MESSAGE_CHARS).collect()
}

/// The durable record of one send request and its outcome.
///
/// A record returned from a submit is a `Pending` snapshot; only a fresh fetch reflects the delivery outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub id: Uuid,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub subject: String,
    pub body: String,
    pub is_html: bool,
    pub status: EmailStatus,
    pub error_message: Option<String>,
    pub created_at: OffsetDateTime,
    pub sent_at: Option<OffsetDateTime>,
    pub attachments: Vec<Attachment>,
}

impl Email {
    #[must_use]
    pub fn pending(id: Uuid, request: &EmailRequest, created_at: OffsetDateTime) -> Self {
        Self {
            id,
            to: request.to.clone(),
            cc: request.cc.clone(),
            bcc: request.bcc.clone(),
            subject: request.subject.clone(),
            body: request.body.clone(),
            is_html: request.is_html,
            status: EmailStatus::Pending,
            error_message: None,
            created_at,
            sent_at: None,
            attachments: request.attachments.clone(),
        }
    }
}
