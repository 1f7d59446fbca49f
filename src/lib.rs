//! Dredge: a toolkit for writing web scrapers
//!
//! This crate wraps an HTTP client in a supervised retry engine with
//! per-client error recovery, cooperative cancellation and on-disk
//! transaction dumps, and layers typed GET/POST helpers on top of it.

pub mod client;
pub mod config;
pub mod mail;
pub mod url;
pub mod util;

use reqwest::StatusCode;
use thiserror::Error;

/// Boxed error returned by caller-supplied error handlers
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type for Dredge operations
#[derive(Debug, Error)]
pub enum DredgeError {
    #[error("HTTP transport error for {url}: {source}")]
    Transport { url: String, source: reqwest::Error },

    #[error("HTTP response status {status} for {url}")]
    HttpStatus {
        url: String,
        status: StatusCode,
        body: Vec<u8>,
    },

    #[error("Request canceled")]
    Canceled,

    #[error("Request deadline exceeded")]
    DeadlineExceeded,

    #[error("Error is already being handled by another request")]
    HandlerConflict,

    #[error("{error}, {source}")]
    Handler {
        error: Box<DredgeError>,
        source: BoxError,
    },

    #[error("Failed to decode response: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("Failed to encode request payload: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("HTML parse error for {url}: {message}")]
    Parse { url: String, message: String },

    #[error("Unable to determine file extension for content type {content_type:?}")]
    UnknownExtension { content_type: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    #[error("Mail error: {0}")]
    Mail(#[from] MailError),
}

impl DredgeError {
    /// Returns true if another attempt could plausibly succeed
    ///
    /// Only transport failures and error statuses are retried; cancellation,
    /// handler outcomes and body interpretation errors are terminal.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::HttpStatus { .. })
    }

    /// Returns true for cancellation and deadline errors
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Canceled | Self::DeadlineExceeded)
    }

    /// Returns the HTTP status carried by this error, if any
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            Self::Transport { source, .. } => source.status(),
            Self::Handler { error, .. } => error.status(),
            _ => None,
        }
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid proxy URL in config: {0}")]
    InvalidProxy(String),
}

/// Errors from composing or sending mail
#[derive(Debug, Error)]
pub enum MailError {
    #[error("Invalid mail address {address:?}: {source}")]
    Address {
        address: String,
        source: lettre::address::AddressError,
    },

    #[error("Failed to read attachment {path}: {source}")]
    Attachment {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid attachment content type {0:?}")]
    ContentType(String),

    #[error("Failed to build message: {0}")]
    Build(#[from] lettre::error::Error),

    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

/// Result type alias for Dredge operations
pub type Result<T> = std::result::Result<T, DredgeError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use crate::client::{Client, ErrorContext, ErrorHandler, Exchange, RequestContext};
pub use crate::config::ClientConfig;
pub use crate::url::combine_url;
