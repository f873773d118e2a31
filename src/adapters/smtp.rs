use crate::domain::relay::{Relay, RelayTls};
use crate::services::mailer::{DeliveryError, MailTransport, OutboundMessage};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;

/// Delivers mail over SMTP. Every send opens a fresh connection to the chosen relay.
#[derive(Clone, Debug)]
pub struct SmtpMailTransport {
    timeout: Duration,
}

impl SmtpMailTransport {
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn connect(&self, relay: &Relay) -> Result<AsyncSmtpTransport<Tokio1Executor>, DeliveryError> {
        let tls = match relay.tls_mode() {
            RelayTls::Tls => Tls::Wrapper(tls_parameters(relay)?),
            RelayTls::Starttls => Tls::Required(tls_parameters(relay)?),
            RelayTls::None => Tls::None,
        };

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&relay.host)
            .port(relay.port)
            .tls(tls)
            .timeout(Some(self.timeout));

        if let Some((username, password)) = relay.credentials() {
            builder = builder.credentials(Credentials::new(username.to_string(), password.to_string()));
        }

        Ok(builder.build())
    }
}

fn tls_parameters(relay: &Relay) -> Result<TlsParameters, DeliveryError> {
    TlsParameters::new(relay.host.clone()).map_err(|e| DeliveryError::Relay(e.into()))
}

fn mailbox(address: &str) -> Result<Mailbox, DeliveryError> {
    address.parse().map_err(|e| DeliveryError::InvalidMessage(format!("{address}: {e}")))
}

/// Builds the MIME message: a `multipart/mixed` with the text part first and one part per attachment.
pub(crate) fn build_message(message: OutboundMessage) -> Result<Message, DeliveryError> {
    let mut builder = Message::builder().from(mailbox(&message.from)?).subject(message.subject);
    for address in &message.to {
        builder = builder.to(mailbox(address)?);
    }
    for address in &message.cc {
        builder = builder.cc(mailbox(address)?);
    }
    for address in &message.bcc {
        builder = builder.bcc(mailbox(address)?);
    }

    let text = if message.is_html { SinglePart::html(message.body) } else { SinglePart::plain(message.body) };
    let mut multipart = MultiPart::mixed().singlepart(text);

    for attachment in message.attachments {
        let content_type = ContentType::parse(&attachment.content_type).map_err(|e| {
            DeliveryError::InvalidMessage(format!("attachment {} has content type {}: {e}", attachment.filename, attachment.content_type))
        })?;
        multipart = multipart.singlepart(Attachment::new(attachment.filename).body(attachment.content, content_type));
    }

    builder.multipart(multipart).map_err(|e| DeliveryError::InvalidMessage(e.to_string()))
}

#[async_trait]
impl MailTransport for SmtpMailTransport {
    #[tracing::instrument(
        err(level = "warn"),
        skip(self, relay, message),
        fields(relay.host = %relay.host, relay.port = relay.port, recipients = message.to.len() + message.cc.len() + message.bcc.len())
    )]
    async fn send(&self, relay: &Relay, message: OutboundMessage) -> Result<(), DeliveryError> {
        let email = build_message(message)?;
        let mailer = self.connect(relay)?;

        let response = mailer.send(email).await.map_err(|e| DeliveryError::Relay(e.into()))?;
        tracing::debug!(code = %response.code(), "Relay accepted message");
        Ok(())
    }
}
