//! Error types for the YellowDog client.

use thiserror::Error;

use crate::config::ConfigError;
use crate::files::FileError;

/// Errors raised by the YellowDog platform client.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum YellowDogError {
    /// Raised when the high-level configuration is incomplete.
    #[error("configuration error: {0}")]
    Config(String),
    /// Raised when the platform URL cannot be used to build endpoints.
    #[error("invalid platform URL {url}: {message}")]
    InvalidUrl {
        /// URL as configured.
        url: String,
        /// Parser message.
        message: String,
    },
    /// Raised when the platform answers with a non-success status.
    #[error("{method} {path} returned {status}: {body}")]
    Status {
        /// HTTP method.
        method: String,
        /// Request path relative to the base URL.
        path: String,
        /// HTTP status code.
        status: u16,
        /// Response body, for diagnostics.
        body: String,
    },
    /// Raised when a request cannot be sent or a response cannot be read.
    #[error("transport error: {message}")]
    Transport {
        /// Message returned by the HTTP client.
        message: String,
    },
    /// Raised when a response body does not match the expected shape.
    #[error("failed to decode {what}: {message}")]
    Decode {
        /// What was being decoded.
        what: String,
        /// Decoder message.
        message: String,
    },
    /// Raised when a local file cannot be read or written.
    #[error(transparent)]
    LocalFile(#[from] FileError),
    /// Raised when a blocking file task panicked or was cancelled.
    #[error("file task failed: {message}")]
    FileTask {
        /// Join error message.
        message: String,
    },
    /// Raised when removing a listener that is not registered.
    #[error("listener {0} is not registered")]
    UnknownListener(u64),
}

impl From<reqwest::Error> for YellowDogError {
    fn from(value: reqwest::Error) -> Self {
        Self::Transport {
            message: value.to_string(),
        }
    }
}

impl From<tokio::task::JoinError> for YellowDogError {
    fn from(value: tokio::task::JoinError) -> Self {
        Self::FileTask {
            message: value.to_string(),
        }
    }
}

impl From<ConfigError> for YellowDogError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value.to_string())
    }
}
