use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

/// Errors produced by the media client.
///
/// Every failure of a generation flow is returned as one of these; nothing in
/// the client panics on bad input or a misbehaving service.
#[derive(Debug, Error)]
pub enum MediaError {
    /// The HTTP exchange itself failed (connect, DNS, timeout, body read)
    #[error("Request failed: {0}")]
    Transport(String),

    /// The service answered with a non-success HTTP status
    #[error("HTTP {status}: {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Message extracted from the response, or its raw text
        message: String,
    },

    /// The service reported a business-level failure code
    #[error("Service returned an error (code={code}): {message}")]
    Service {
        /// The `code` value as sent by the service
        code: String,
        /// Message extracted from the response
        message: String,
    },

    /// The response body was not valid JSON
    #[error("Response is not JSON: {0}")]
    Malformed(String),

    /// The response was JSON but no known payload shape matched
    #[error("No media found in response: {summary}")]
    Schema {
        /// Sanitized, truncated dump of the response
        summary: String,
    },

    /// A base64 payload was present but could not be decoded
    #[error("Could not decode base64 payload: {0}")]
    Decode(String),

    /// A local file could not be read or written
    #[error("{}: {reason}", path.display())]
    File {
        /// The offending path
        path: PathBuf,
        /// What went wrong
        reason: String,
    },

    /// A job did not reach `done` within the polling budget
    #[error("Job {job_id} did not finish after {attempts} polls ({elapsed:?})")]
    Timeout {
        /// Service-side task id
        job_id: String,
        /// Number of result queries made
        attempts: u32,
        /// Time spent waiting
        elapsed: Duration,
    },

    /// The owner of a generation aborted it
    #[error("{operation} was cancelled")]
    Cancelled {
        /// What was running when the cancellation arrived
        operation: String,
    },

    /// The requested capability is not configured
    #[error("Capability unavailable: {0}")]
    Unavailable(String),

    /// Converting a video to GIF failed
    #[error("GIF conversion failed: {0}")]
    Conversion(String),

    /// The configuration cannot be used to build a client
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// A background task ended without producing a result
    #[error("Background task failed: {0}")]
    Worker(String),
}

/// Coarse classification of [`MediaError`], for callers that only need to
/// decide how to present a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network-level failure
    Transport,
    /// The service rejected the request or answered with a failure
    Protocol,
    /// The response did not have a recognizable shape
    Schema,
    /// Payload decoding failed
    Decode,
    /// Local file problem
    File,
    /// Polling budget exhausted
    Timeout,
    /// Aborted by the caller
    Cancelled,
    /// Feature not configured
    Unavailable,
    /// Local processing failure (GIF conversion, worker, configuration)
    Local,
}

impl MediaError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            MediaError::Transport(_) => ErrorKind::Transport,
            MediaError::Status { .. } | MediaError::Service { .. } | MediaError::Malformed(_) => {
                ErrorKind::Protocol
            }
            MediaError::Schema { .. } => ErrorKind::Schema,
            MediaError::Decode(_) => ErrorKind::Decode,
            MediaError::File { .. } => ErrorKind::File,
            MediaError::Timeout { .. } => ErrorKind::Timeout,
            MediaError::Cancelled { .. } => ErrorKind::Cancelled,
            MediaError::Unavailable(_) => ErrorKind::Unavailable,
            MediaError::Conversion(_) | MediaError::Configuration(_) | MediaError::Worker(_) => {
                ErrorKind::Local
            }
        }
    }

    /// Build a [`MediaError::File`] from a path and any displayable cause.
    pub fn file(path: impl AsRef<Path>, reason: impl std::fmt::Display) -> Self {
        MediaError::File {
            path: path.as_ref().to_path_buf(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn cancelled(operation: impl Into<String>) -> Self {
        MediaError::Cancelled {
            operation: operation.into(),
        }
    }
}

impl From<reqwest::Error> for MediaError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            MediaError::Transport(format!("timed out: {}", error))
        } else if error.is_connect() {
            MediaError::Transport(format!("connection failed: {}", error))
        } else {
            MediaError::Transport(error.to_string())
        }
    }
}
