use crate::domain::email::{Attachment, EmailRequest};
use crate::domain::relay::Relay;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("Message could not be built: {0}")]
    InvalidMessage(String),
    #[error("Relay error: {0}")]
    Relay(#[from] anyhow::Error),
}

/// A fully addressed message ready to hand to a relay.
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    pub from: String,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub subject: String,
    pub body: String,
    pub is_html: bool,
    pub attachments: Vec<Attachment>,
}

impl OutboundMessage {
    /// Addresses the request as sent from the relay's from address.
    #[must_use]
    pub fn new(relay: &Relay, request: EmailRequest) -> Self {
        Self {
            from: relay.from_email.clone(),
            to: request.to,
            cc: request.cc,
            bcc: request.bcc,
            subject: request.subject,
            body: request.body,
            is_html: request.is_html,
            attachments: request.attachments,
        }
    }
}

#[async_trait]
pub trait MailTransport: Send + Sync + std::fmt::Debug {
    /// Makes a single delivery attempt through `relay`: connect, authenticate, send, close.
    ///
    /// # Errors
    /// Any error means the message was not accepted by the relay.
    async fn send(&self, relay: &Relay, message: OutboundMessage) -> Result<(), DeliveryError>;
}
