//! Error types for outreach.

use std::path::PathBuf;

/// Top-level error type for a batch run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Collect error: {0}")]
    Collect(#[from] CollectError),
}

/// Configuration-related errors. Always fatal.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable(s): {}", .0.join(", "))]
    MissingEnvVar(Vec<String>),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Record store errors. Always fatal for the batch.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Record store {path} unavailable: {reason}")]
    Unavailable { path: PathBuf, reason: String },

    #[error("Failed to write record store {path}: {reason}")]
    WriteFailed { path: PathBuf, reason: String },
}

/// Per-recipient dispatch errors. Isolated to one record.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("{transport} connection failed: {reason}")]
    Connect { transport: String, reason: String },

    #[error("Invalid address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Failed to build message: {0}")]
    Build(String),

    #[error("Failed to send to {recipient}: {reason}")]
    SendFailed { recipient: String, reason: String },

    #[error("Could not find a drafts folder. Tried: {}", .tried.join(", "))]
    DestinationNotFound { tried: Vec<String> },

    #[error("{transport} is closed")]
    Closed { transport: String },
}

/// Per-record enrichment errors. The name stays empty.
#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    #[error("Request for @{handle} failed: {reason}")]
    RequestFailed { handle: String, reason: String },

    #[error("Profile @{handle} returned status {status}")]
    BadStatus { handle: String, status: u16 },

    #[error("No display name found for @{handle}")]
    NotFound { handle: String },
}

/// Result type alias for outreach.
pub type Result<T> = std::result::Result<T, Error>;
