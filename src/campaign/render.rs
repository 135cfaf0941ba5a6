//! Message templates and per-recipient rendering.

use std::path::Path;

use super::html;
use crate::channels::OutgoingEmail;
use crate::config::{CampaignConfig, Sender};
use crate::error::ConfigError;
use crate::normalize::normalize;
use crate::store::Record;

/// Placeholder replaced by the recipient's first name.
pub const NAME_PLACEHOLDER: &str = "{name}";
/// Placeholder replaced by the recipient's handle (subject only).
pub const HANDLE_PLACEHOLDER: &str = "{handle}";

/// Subject and body templates for one campaign.
#[derive(Debug, Clone)]
pub struct MessageTemplate {
    pub subject: String,
    pub body: String,
    pub signature_html: Option<String>,
}

impl MessageTemplate {
    pub fn new(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
            signature_html: None,
        }
    }

    pub fn with_signature(mut self, html: impl Into<String>) -> Self {
        self.signature_html = Some(html.into());
        self
    }

    /// Read the body (and signature, if configured) from disk.
    pub fn load(config: &CampaignConfig) -> Result<Self, ConfigError> {
        let body = read(&config.template_path)?;
        let signature_html = config.signature_path.as_deref().map(read).transpose()?;
        Ok(Self {
            subject: config.subject_template.clone(),
            body,
            signature_html,
        })
    }

    /// Render the message for `record`, addressed from `sender`.
    pub fn render(&self, record: &Record, sender: &Sender) -> OutgoingEmail {
        let handle = record.display_handle();
        let name = greeting_name(record);

        let subject = self
            .subject
            .replace(HANDLE_PLACEHOLDER, handle)
            .replace(NAME_PLACEHOLDER, &name);
        let text = personalize(&self.body, &name);
        let html = html::to_html(&text, self.signature_html.as_deref());

        OutgoingEmail {
            sender: sender.clone(),
            to: record.email.trim().to_string(),
            subject,
            text,
            html,
        }
    }
}

fn read(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Substitute every `{name}` in `template`. No placeholder, no change.
pub fn personalize(template: &str, name: &str) -> String {
    template.replace(NAME_PLACEHOLDER, name)
}

/// First name to greet the recipient with; the handle when none is known.
pub fn greeting_name(record: &Record) -> String {
    normalize(&record.name, record.display_handle())
}
