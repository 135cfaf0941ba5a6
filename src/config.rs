//! Configuration types, built from environment variables.
//!
//! Every constructor has a `from_lookup` twin taking a variable lookup so
//! tests never touch the process environment.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default drafts folders, tried in order.
pub const DEFAULT_DRAFT_FOLDERS: &[&str] = &["Drafts", "Draft", "INBOX.Drafts"];

/// Variable lookup used by the `from_lookup` constructors.
pub trait Lookup: Fn(&str) -> Option<String> {}
impl<F: Fn(&str) -> Option<String>> Lookup for F {}

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_or<T: FromStr>(lookup: &impl Lookup, key: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
        None => Ok(default),
    }
}

// ── Mail ────────────────────────────────────────────────────────────

/// Sender identity shown in the `From` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    pub name: Option<String>,
    pub address: String,
}

/// SMTP/IMAP account configuration.
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub sender_email: String,
    pub sender_name: Option<String>,
    pub password: SecretString,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub imap_host: String,
    pub imap_port: u16,
    pub draft_folders: Vec<String>,
}

impl MailConfig {
    /// Build from the process environment. Fails listing every missing
    /// required variable.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup(lookup: impl Lookup) -> Result<Self, ConfigError> {
        let sender_email = lookup("SENDER_EMAIL");
        let password = lookup("SENDER_PASSWORD");

        let (sender_email, password) = match (sender_email, password) {
            (Some(email), Some(password)) => (email, password),
            (email, password) => {
                let mut missing = Vec::new();
                if email.is_none() {
                    missing.push("SENDER_EMAIL".to_string());
                }
                if password.is_none() {
                    missing.push("SENDER_PASSWORD".to_string());
                }
                return Err(ConfigError::MissingEnvVar(missing));
            }
        };

        let draft_folders = lookup("DRAFT_FOLDERS")
            .map(|raw| {
                raw.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|folders| !folders.is_empty())
            .unwrap_or_else(|| DEFAULT_DRAFT_FOLDERS.iter().map(|s| s.to_string()).collect());

        Ok(Self {
            sender_email,
            sender_name: lookup("SENDER_NAME"),
            password: SecretString::from(password),
            smtp_host: lookup("SMTP_HOST").unwrap_or_else(|| "smtpout.secureserver.net".into()),
            smtp_port: parse_or(&lookup, "SMTP_PORT", 587)?,
            imap_host: lookup("IMAP_HOST").unwrap_or_else(|| "imap.secureserver.net".into()),
            imap_port: parse_or(&lookup, "IMAP_PORT", 993)?,
            draft_folders,
        })
    }

    pub fn sender(&self) -> Sender {
        Sender {
            name: self.sender_name.clone(),
            address: self.sender_email.clone(),
        }
    }
}

// ── Campaign ────────────────────────────────────────────────────────

/// Campaign run configuration.
#[derive(Debug, Clone)]
pub struct CampaignConfig {
    /// Record store file.
    pub store_path: PathBuf,
    /// Plain-text body template containing `{name}`.
    pub template_path: PathBuf,
    /// Subject line; `{handle}` and `{name}` are substituted.
    pub subject_template: String,
    /// Optional HTML snippet appended under the body.
    pub signature_path: Option<PathBuf>,
    /// Pause between live sends.
    pub cooldown: Duration,
}

impl Default for CampaignConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from("influencers.csv"),
            template_path: PathBuf::from("email_body.txt"),
            subject_template: "Collab Invite: @{handle}".to_string(),
            signature_path: None,
            cooldown: Duration::from_secs(180), // 3 minutes
        }
    }
}

impl CampaignConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup(lookup: impl Lookup) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            store_path: lookup("OUTREACH_STORE").map_or(defaults.store_path, PathBuf::from),
            template_path: lookup("OUTREACH_TEMPLATE").map_or(defaults.template_path, PathBuf::from),
            subject_template: lookup("OUTREACH_SUBJECT").unwrap_or(defaults.subject_template),
            signature_path: lookup("OUTREACH_SIGNATURE").map(PathBuf::from),
            cooldown: Duration::from_secs(parse_or(
                &lookup,
                "OUTREACH_COOLDOWN_SECS",
                defaults.cooldown.as_secs(),
            )?),
        })
    }
}

// ── Collector ───────────────────────────────────────────────────────

/// Profile name collection configuration.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub store_path: PathBuf,
    /// Profile site root; the handle is appended as a path segment.
    pub profile_base_url: String,
    /// Session cookie for an authenticated profile fetch.
    pub session_id: Option<SecretString>,
    pub user_agent: String,
    pub request_timeout: Duration,
    /// Pause between profile fetches.
    pub delay: Duration,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from("influencers.csv"),
            profile_base_url: "https://www.instagram.com".to_string(),
            session_id: None,
            user_agent: concat!("outreach/", env!("CARGO_PKG_VERSION")).to_string(),
            request_timeout: Duration::from_secs(20),
            delay: Duration::from_secs(2),
        }
    }
}

impl CollectorConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup(lookup: impl Lookup) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            store_path: lookup("OUTREACH_STORE").map_or(defaults.store_path, PathBuf::from),
            profile_base_url: lookup("PROFILE_BASE_URL").unwrap_or(defaults.profile_base_url),
            session_id: lookup("IG_SESSION_ID").map(SecretString::from),
            user_agent: lookup("COLLECT_USER_AGENT").unwrap_or(defaults.user_agent),
            request_timeout: defaults.request_timeout,
            delay: Duration::from_secs(parse_or(
                &lookup,
                "COLLECT_DELAY_SECS",
                defaults.delay.as_secs(),
            )?),
        })
    }
}
