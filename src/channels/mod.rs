//! Outbound mail transports.
//!
//! A [`Transport`] is opened once per run, handed to the campaign runner,
//! and closed when the run ends (including on Ctrl+C).

pub mod email;
pub mod imap;

use async_trait::async_trait;

use crate::error::DispatchError;

pub use email::{OutgoingEmail, SmtpSender};
pub use imap::ImapDrafts;

/// Where a delivered message ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// SMTP relay host, or the drafts folder that accepted the message.
    pub destination: String,
}

impl Delivery {
    pub fn new(destination: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
        }
    }
}

/// A sink for rendered campaign messages.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Short transport name for logs.
    fn name(&self) -> &str;

    /// Deliver one message. Errors are per message and never fatal.
    async fn deliver(&self, email: &OutgoingEmail) -> Result<Delivery, DispatchError>;

    /// Release the connection. Further deliveries fail with
    /// [`DispatchError::Closed`].
    async fn close(&self) -> Result<(), DispatchError>;
}
