use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while scanning property sites.
///
/// Only `ConfigLoad` is meant to stop a run. Everything else is caught by the
/// scanner, logged against the site it came from, and the run carries on.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Failed to load config from {path}: {reason}")]
    ConfigLoad { path: PathBuf, reason: String },

    #[error("Request to {site} failed: {source}")]
    Network {
        site: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{site} returned HTTP {status}")]
    HttpStatus { site: String, status: u16 },

    #[error("Invalid search URL for {site}: {reason}")]
    InvalidUrl { site: String, reason: String },

    #[error("Invalid selector `{selector}`: {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("No adapter available for {0}")]
    UnknownSite(String),

    #[error("Failed to send notification: {0}")]
    Notification(String),

    #[error("Failed to persist seen listings to {path}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, ScanError>;
