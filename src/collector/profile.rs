//! Profile page name source (reqwest).
//!
//! The public profile page carries the display name in its `og:title`
//! meta tag as `Display Name (@handle) • ...`; `<title>` has the same
//! shape and is used when the meta tag is missing.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::{Captures, Regex};
use reqwest::header::COOKIE;
use secrecy::{ExposeSecret, SecretString};

use super::NameSource;
use crate::config::CollectorConfig;
use crate::error::{CollectError, ConfigError};

static OG_TITLE_PROPERTY_FIRST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta[^>]*property\s*=\s*"og:title"[^>]*content\s*=\s*"([^"]*)""#).unwrap()
});
static OG_TITLE_CONTENT_FIRST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta[^>]*content\s*=\s*"([^"]*)"[^>]*property\s*=\s*"og:title""#).unwrap()
});
static TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").unwrap());
static NAME_BEFORE_HANDLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^(.+?)\s*\(@").unwrap());
static ENTITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&(#[xX][0-9a-fA-F]+|#[0-9]+|[a-zA-Z]+);").unwrap());

/// Fetches display names from public profile pages.
pub struct ProfilePageSource {
    client: reqwest::Client,
    base_url: String,
    session_id: Option<SecretString>,
}

impl ProfilePageSource {
    pub fn new(config: &CollectorConfig) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ConfigError::InvalidValue {
                key: "http client".into(),
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            base_url: config.profile_base_url.trim_end_matches('/').to_string(),
            session_id: config.session_id.clone(),
        })
    }

    fn profile_url(&self, handle: &str) -> String {
        format!("{}/{}/", self.base_url, handle)
    }
}

#[async_trait]
impl NameSource for ProfilePageSource {
    async fn fetch_display_name(&self, handle: &str) -> Result<String, CollectError> {
        let mut request = self.client.get(self.profile_url(handle));
        if let Some(session) = &self.session_id {
            request = request.header(COOKIE, format!("sessionid={}", session.expose_secret()));
        }

        let response = request.send().await.map_err(|e| CollectError::RequestFailed {
            handle: handle.to_string(),
            reason: e.to_string(),
        })?;

        if response.url().path().starts_with("/accounts/login") {
            return Err(CollectError::RequestFailed {
                handle: handle.to_string(),
                reason: "redirected to login; set IG_SESSION_ID".into(),
            });
        }
        let status = response.status();
        if !status.is_success() {
            return Err(CollectError::BadStatus {
                handle: handle.to_string(),
                status: status.as_u16(),
            });
        }

        let page = response.text().await.map_err(|e| CollectError::RequestFailed {
            handle: handle.to_string(),
            reason: e.to_string(),
        })?;

        extract_display_name(&page).ok_or_else(|| CollectError::NotFound {
            handle: handle.to_string(),
        })
    }
}

/// Pull the display name out of a profile page.
pub fn extract_display_name(page: &str) -> Option<String> {
    let og_title = OG_TITLE_PROPERTY_FIRST
        .captures(page)
        .or_else(|| OG_TITLE_CONTENT_FIRST.captures(page))
        .map(|c| c[1].to_string());
    let title = TITLE.captures(page).map(|c| c[1].to_string());

    [og_title, title]
        .into_iter()
        .flatten()
        .find_map(|raw| name_before_handle(&decode_entities(&raw)))
}

fn name_before_handle(title: &str) -> Option<String> {
    NAME_BEFORE_HANDLE
        .captures(title.trim())
        .map(|c| c[1].trim().to_string())
        .filter(|name| !name.is_empty())
}

/// Decode named and numeric HTML character references.
pub fn decode_entities(text: &str) -> String {
    ENTITY
        .replace_all(text, |caps: &Captures| {
            let entity = &caps[1];
            let decoded = if let Some(hex) = entity
                .strip_prefix("#x")
                .or_else(|| entity.strip_prefix("#X"))
            {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = entity.strip_prefix('#') {
                dec.parse().ok().and_then(char::from_u32)
            } else {
                match entity {
                    "amp" => Some('&'),
                    "lt" => Some('<'),
                    "gt" => Some('>'),
                    "quot" => Some('"'),
                    "apos" => Some('\''),
                    "nbsp" => Some(' '),
                    _ => None,
                }
            };
            decoded.map_or_else(|| caps[0].to_string(), String::from)
        })
        .into_owned()
}
