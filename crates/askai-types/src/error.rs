use std::fmt;

use thiserror::Error;

/// Errors from a single endpoint call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// The request was superseded or explicitly aborted.
    #[error("request cancelled")]
    Cancelled,

    /// No chunk arrived within the rolling inactivity window.
    #[error("no data received for {after_ms}ms")]
    Timeout { after_ms: u64 },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("endpoint returned HTTP {status}")]
    Status { status: u16 },

    #[error("malformed request or response: {0}")]
    Malformed(String),
}

impl QueryError {
    /// Classify whether an error should send the query on to the next endpoint.
    ///
    /// Everything except cancellation falls back: a cancelled call must
    /// never trigger another attempt.
    pub fn is_fallback_error(&self) -> bool {
        !matches!(self, QueryError::Cancelled)
    }
}

/// The fixed set of messages that may reach the person asking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserNotice {
    Failure,
    Cancelled,
    Network,
}

impl UserNotice {
    pub fn message(&self) -> &'static str {
        match self {
            UserNotice::Failure => "Something went wrong. Please try again later.",
            UserNotice::Cancelled => "Request was cancelled.",
            UserNotice::Network => "Network error. Please check your connection.",
        }
    }
}

impl From<&QueryError> for UserNotice {
    fn from(err: &QueryError) -> Self {
        match err {
            QueryError::Cancelled => UserNotice::Cancelled,
            QueryError::Transport(_) => UserNotice::Network,
            _ => UserNotice::Failure,
        }
    }
}

impl fmt::Display for UserNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for UserNotice {}

/// Errors related to client configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("failed to read config file: {0}")]
    Io(String),

    #[error("failed to parse config file: {0}")]
    Parse(String),
}
