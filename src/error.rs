//! Error taxonomy for every request issued through the crate.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while building, sending or classifying a request.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Content looked like a JSON object but failed to parse, or a body
    /// failed to serialize.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Non-2xx status without a recognizable error body.
    #[error("Bad request ({status}): {message}")]
    BadRequest { status: u16, message: String },

    /// Non-2xx status with an `error.message` field in the body.
    #[error("API error ({status}): {message}")]
    Api {
        status: u16,
        message: String,
        error_type: Option<String>,
        code: Option<String>,
    },

    /// The server answered 429.
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// No response was received at all.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A local file handed to a request was missing, not a file, or empty.
    #[error("File error ({}): {reason}", .path.display())]
    File { path: PathBuf, reason: String },

    /// The transport failed to configure or execute the request.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The caller misused the API (conflicting options, reused session, ...).
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ClientError {
    pub(crate) fn file(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::File {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Whether the caller should back off before trying again.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited(_))
    }

    /// HTTP status attached to the error, when a response was received.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::BadRequest { status, .. } | Self::Api { status, .. } => Some(*status),
            Self::RateLimited(_) => Some(429),
            Self::Connection(_) => Some(0),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            Self::Connection(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, ClientError>;
