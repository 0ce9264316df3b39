//! Dispatcher error types

use std::time::Duration;

use thiserror::Error;

/// Dispatcher-specific errors
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// Invalid hosts, path, method, headers or pool settings
    #[error("invalid dispatcher configuration: {message}")]
    Config { message: String },

    /// Payload is not a gzip stream
    #[error("malformed payload: {message}")]
    MalformedPayload { message: String },

    /// A retry ceiling was reached before any host accepted the payload
    #[error("gave up after {attempts} attempts in {elapsed:?}: {last_error}")]
    GaveUp {
        attempts: u32,
        elapsed: Duration,
        #[source]
        last_error: AttemptError,
    },

    /// Reading the payload source failed
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl DispatcherError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a malformed payload error
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedPayload {
            message: message.into(),
        }
    }

    /// Whether retrying the same input can never succeed
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config { .. } | Self::MalformedPayload { .. })
    }
}

/// Failure of a single delivery attempt. Always recoverable by the retry loop.
#[derive(Debug, Error)]
pub enum AttemptError {
    /// The request never produced a response
    #[error("transport error for host '{host}': {source}")]
    Transport {
        host: String,
        #[source]
        source: TransportError,
    },

    /// The host answered with a status outside the success set
    #[error("unexpected status {status} from host '{host}'")]
    UnexpectedStatus { host: String, status: u16 },

    /// Host index outside the host list
    #[error("no host at index {index} (have {hosts})")]
    NoSuchHost { index: usize, hosts: usize },
}

impl AttemptError {
    /// Label used for the attempt outcome metric
    pub fn outcome(&self) -> &'static str {
        match self {
            Self::UnexpectedStatus { .. } => observability::metrics::OUTCOME_UNEXPECTED_STATUS,
            Self::Transport { .. } | Self::NoSuchHost { .. } => {
                observability::metrics::OUTCOME_TRANSPORT_ERROR
            }
        }
    }
}

/// Broad class of a transport failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    Connect,
    Timeout,
    Request,
    Body,
}

impl std::fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Connect => "connect",
            Self::Timeout => "timeout",
            Self::Request => "request",
            Self::Body => "body",
        };
        f.write_str(s)
    }
}

/// Error raised by an [`HttpTransport`](crate::HttpTransport)
#[derive(Debug, Clone, Error)]
#[error("{kind} error: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn connect(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Connect, message)
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            TransportErrorKind::Timeout
        } else if err.is_connect() {
            TransportErrorKind::Connect
        } else if err.is_body() || err.is_decode() {
            TransportErrorKind::Body
        } else {
            TransportErrorKind::Request
        };

        // reqwest's Display omits the underlying cause
        let mut message = err.to_string();
        let mut source = std::error::Error::source(&err);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }

        Self { kind, message }
    }
}
