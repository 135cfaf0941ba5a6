//! Outgoing campaign email and the SMTP transport (lettre).

use std::sync::Mutex;

use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, Message, SmtpTransport, Transport as _};
use secrecy::ExposeSecret;

use super::{Delivery, Transport};
use crate::config::{MailConfig, Sender};
use crate::error::DispatchError;

/// A fully rendered message for one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub sender: Sender,
    pub to: String,
    pub subject: String,
    /// Plain-text body.
    pub text: String,
    /// HTML alternative of `text`.
    pub html: String,
}

impl OutgoingEmail {
    /// Build a `multipart/alternative` message (plain + HTML).
    pub fn to_message(&self) -> Result<Message, DispatchError> {
        let from = Mailbox::new(self.sender.name.clone(), parse_address(&self.sender.address)?);
        let to = Mailbox::new(None, parse_address(&self.to)?);

        Message::builder()
            .from(from)
            .to(to)
            .subject(self.subject.clone())
            .multipart(MultiPart::alternative_plain_html(
                self.text.clone(),
                self.html.clone(),
            ))
            .map_err(|e| DispatchError::Build(e.to_string()))
    }

    /// RFC 5322 bytes, as stored by IMAP `APPEND`.
    pub fn to_bytes(&self) -> Result<Vec<u8>, DispatchError> {
        Ok(self.to_message()?.formatted())
    }
}

fn parse_address(raw: &str) -> Result<Address, DispatchError> {
    raw.trim()
        .parse::<Address>()
        .map_err(|e| DispatchError::InvalidAddress {
            address: raw.to_string(),
            reason: e.to_string(),
        })
}

// ── SMTP ────────────────────────────────────────────────────────────

/// Live delivery over SMTP with a pooled, authenticated connection.
pub struct SmtpSender {
    host: String,
    transport: Mutex<Option<SmtpTransport>>,
}

impl SmtpSender {
    /// Build the relay and verify the server accepts a connection.
    ///
    /// Port 465 uses implicit TLS; anything else negotiates STARTTLS.
    pub async fn connect(config: &MailConfig) -> Result<Self, DispatchError> {
        let creds = Credentials::new(
            config.sender_email.clone(),
            config.password.expose_secret().to_string(),
        );

        let builder = if config.smtp_port == 465 {
            SmtpTransport::relay(&config.smtp_host)
        } else {
            SmtpTransport::starttls_relay(&config.smtp_host)
        }
        .map_err(|e| connect_error(format!("SMTP relay error: {e}")))?;

        let transport = builder.port(config.smtp_port).credentials(creds).build();

        tracing::info!("Connecting to SMTP {}:{}...", config.smtp_host, config.smtp_port);
        let probe = transport.clone();
        let reachable = tokio::task::spawn_blocking(move || probe.test_connection())
            .await
            .map_err(|e| connect_error(format!("SMTP connect task panicked: {e}")))?
            .map_err(|e| connect_error(e.to_string()))?;
        if !reachable {
            return Err(connect_error("server did not answer NOOP".into()));
        }
        tracing::info!("SMTP connected");

        Ok(Self {
            host: config.smtp_host.clone(),
            transport: Mutex::new(Some(transport)),
        })
    }

    fn handle(&self) -> Result<SmtpTransport, DispatchError> {
        self.transport
            .lock()
            .ok()
            .and_then(|guard| guard.clone())
            .ok_or_else(|| DispatchError::Closed {
                transport: "smtp".into(),
            })
    }
}

fn connect_error(reason: String) -> DispatchError {
    DispatchError::Connect {
        transport: "smtp".into(),
        reason,
    }
}

#[async_trait]
impl Transport for SmtpSender {
    fn name(&self) -> &str {
        "smtp"
    }

    async fn deliver(&self, email: &OutgoingEmail) -> Result<Delivery, DispatchError> {
        let message = email.to_message()?;
        let transport = self.handle()?;
        let recipient = email.to.clone();

        tokio::task::spawn_blocking(move || transport.send(&message))
            .await
            .map_err(|e| DispatchError::SendFailed {
                recipient: recipient.clone(),
                reason: format!("send task panicked: {e}"),
            })?
            .map_err(|e| DispatchError::SendFailed {
                recipient: recipient.clone(),
                reason: format!("SMTP send failed: {e}"),
            })?;

        tracing::debug!("Email sent to {recipient}");
        Ok(Delivery::new(self.host.clone()))
    }

    async fn close(&self) -> Result<(), DispatchError> {
        // Dropping the last handle shuts the pool down (QUIT).
        let taken = self.transport.lock().ok().and_then(|mut guard| guard.take());
        if taken.is_some() {
            tracing::info!("SMTP connection closed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use mail_parser::MessageParser;

    use super::*;

    fn sample() -> OutgoingEmail {
        OutgoingEmail {
            sender: Sender {
                name: Some("Libin at Brand".into()),
                address: "libin@brand.example".into(),
            },
            to: "jane@example.com".into(),
            subject: "Collab Invite: @jane".into(),
            text: "Hi Jane,\n\nLet's talk.".into(),
            html: "<p>Hi Jane,</p><p>Let's talk.</p>".into(),
        }
    }

    #[test]
    fn builds_multipart_alternative() {
        let bytes = sample().to_bytes().unwrap();
        let parsed = MessageParser::default().parse(bytes.as_slice()).unwrap();

        assert_eq!(parsed.subject(), Some("Collab Invite: @jane"));
        let from = parsed.from().and_then(|a| a.first()).unwrap();
        assert_eq!(from.address(), Some("libin@brand.example"));
        assert_eq!(from.name(), Some("Libin at Brand"));
        assert!(parsed.body_text(0).unwrap().contains("Let's talk."));
        assert!(parsed.body_html(0).unwrap().contains("<p>Hi Jane,</p>"));
    }

    #[test]
    fn rejects_bad_recipient() {
        let mut email = sample();
        email.to = "not an address".into();
        assert!(matches!(
            email.to_message(),
            Err(DispatchError::InvalidAddress { .. })
        ));
    }

    #[test]
    fn rejects_bad_sender() {
        let mut email = sample();
        email.sender.address = "nobody".into();
        assert!(matches!(
            email.to_message(),
            Err(DispatchError::InvalidAddress { .. })
        ));
    }
}
