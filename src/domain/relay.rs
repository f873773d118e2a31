use serde::Deserialize;
use std::fmt;

const DEFAULT_SMTP_PORT: u16 = 587;
const IMPLICIT_TLS_PORT: u16 = 465;

/// How the connection to a relay is secured.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RelayTls {
    /// Plain connection upgraded with STARTTLS, which the relay must offer
    Starttls,
    /// TLS from the first byte (SMTPS)
    Tls,
    /// No encryption, for local development relays only
    None,
}

/// One outbound SMTP relay and the identity used when sending through it.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Relay {
    #[serde(default)]
    pub name: Option<String>,
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    pub from_email: String,
    #[serde(default)]
    pub tls: Option<RelayTls>,
}

const fn default_port() -> u16 {
    DEFAULT_SMTP_PORT
}

impl Relay {
    /// Explicit TLS mode, or implicit TLS on port 465 and STARTTLS elsewhere.
    #[must_use]
    pub fn tls_mode(&self) -> RelayTls {
        self.tls.unwrap_or(if self.port == IMPLICIT_TLS_PORT { RelayTls::Tls } else { RelayTls::Starttls })
    }

    /// Name used in logs and metric labels.
    #[must_use]
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.host)
    }

    #[must_use]
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => Some((user, pass)),
            _ => None,
        }
    }
}

impl fmt::Debug for Relay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Relay")
            .field("name", &self.name)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("from_email", &self.from_email)
            .field("tls", &self.tls_mode())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn relay(port: u16) -> Relay {
        Relay {
            name: None,
            host: "smtp.example.com".to_string(),
            port,
            username: Some("mailer".to_string()),
            password: Some("hunter2".to_string()),
            from_email: "noreply@example.com".to_string(),
            tls: None,
        }
    }

    #[test]
    fn test_tls_mode_follows_port() {
        assert_eq!(relay(465).tls_mode(), RelayTls::Tls);
        assert_eq!(relay(587).tls_mode(), RelayTls::Starttls);

        let explicit = Relay { tls: Some(RelayTls::None), ..relay(1025) };
        assert_eq!(explicit.tls_mode(), RelayTls::None);
    }

    #[test]
    fn test_debug_redacts_password() {
        let rendered = format!("{:?}", relay(587));
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_deserialize_defaults() {
        let relay: Relay =
            serde_json::from_str(r#"{"host": "mail.example.org", "from_email": "ops@example.org"}"#).unwrap();
        assert_eq!(relay.port, 587);
        assert_eq!(relay.label(), "mail.example.org");
        assert!(relay.credentials().is_none());
    }
}
