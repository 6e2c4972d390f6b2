//! Error types for client operations.
//!
//! Every failure of a dispatch call is a [`ClientError`]. Failures that happen
//! before the network is touched (encoding, request construction) are fatal
//! for that call. Transport and remote failures are returned as-is; the client
//! never retries, so [`ClientError::is_transient`] exists to help callers
//! decide.

use std::collections::HashMap;

use thiserror::Error;

use crate::routes::Operation;
use crate::wire::Reply;

/// Returned by lease when no item became available before the request timeout.
pub const MSG_REQUEST_TIMEOUT: &str = "request timeout; no items are in the queue, try again";
/// Returned when a client issues a second concurrent lease on the same queue.
pub const MSG_DUPLICATE_CLIENT_ID: &str =
    "duplicate client id; a client cannot make multiple lease requests to the same queue";
/// Returned while the service process is shutting down.
pub const MSG_SERVICE_IN_SHUTDOWN: &str = "service is shutting down";
/// Returned while the addressed queue is shutting down.
pub const MSG_QUEUE_IN_SHUTDOWN: &str = "queue is shutting down";
/// Returned when the queue cannot accept more in-flight requests.
pub const MSG_QUEUE_OVERLOADED: &str = "queue is overloaded; try again later";

/// Category of a remote failure, derived from the reply the server sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    DuplicateClientId,
    ServiceShuttingDown,
    QueueShuttingDown,
    QueueOverloaded,
    RequestTimeout,
    /// A structured reply with a message not listed above.
    Other,
    /// The error body was not a reply envelope (proxy page, truncated body).
    Infrastructure,
}

impl ErrorCategory {
    /// Classify a structured reply by its message.
    pub fn from_message(message: &str) -> Self {
        match message {
            MSG_DUPLICATE_CLIENT_ID => Self::DuplicateClientId,
            MSG_SERVICE_IN_SHUTDOWN => Self::ServiceShuttingDown,
            MSG_QUEUE_IN_SHUTDOWN => Self::QueueShuttingDown,
            MSG_QUEUE_OVERLOADED => Self::QueueOverloaded,
            MSG_REQUEST_TIMEOUT => Self::RequestTimeout,
            _ => Self::Other,
        }
    }
}

/// What went wrong at the transport layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Could not establish a connection.
    Connect,
    /// The HTTP client's own timeout elapsed.
    Timeout,
    /// The caller's cancellation token fired.
    Cancelled,
    /// The caller's deadline passed.
    DeadlineExceeded,
    /// Reading the response body failed.
    Body,
    Other,
}

/// Errors returned by dispatch calls.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{operation}: while marshaling request payload: {source}")]
    Serialization {
        operation: Operation,
        #[source]
        source: prost::EncodeError,
    },

    #[error("{operation}: invalid request: {message}")]
    RequestConstruction { operation: Operation, message: String },

    #[error("{operation}: transport error ({kind:?}): {message}")]
    Transport {
        operation: Operation,
        kind: TransportErrorKind,
        message: String,
    },

    #[error("{operation}: server returned {status} (code {code}): {message}")]
    Remote {
        operation: Operation,
        status: u16,
        code: i32,
        category: ErrorCategory,
        message: String,
        details: HashMap<String, String>,
    },

    #[error("{operation}: while unmarshaling response payload: {source}")]
    Decode {
        operation: Operation,
        #[source]
        source: prost::DecodeError,
    },

    #[error("Invalid client configuration: {message}")]
    Configuration { message: String },
}

impl ClientError {
    pub(crate) fn remote(operation: Operation, status: u16, reply: Reply) -> Self {
        Self::Remote {
            operation,
            status,
            code: reply.code,
            category: ErrorCategory::from_message(&reply.message),
            message: reply.message,
            details: reply.details,
        }
    }

    pub(crate) fn infrastructure(operation: Operation, status: u16, body: &[u8]) -> Self {
        const MAX_BODY_IN_MESSAGE: usize = 512;
        let body = &body[..body.len().min(MAX_BODY_IN_MESSAGE)];
        Self::Remote {
            operation,
            status,
            code: i32::from(status),
            category: ErrorCategory::Infrastructure,
            message: String::from_utf8_lossy(body).into_owned(),
            details: HashMap::new(),
        }
    }

    pub(crate) fn transport(
        operation: Operation,
        kind: TransportErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self::Transport {
            operation,
            kind,
            message: message.into(),
        }
    }

    /// Map a reqwest error from the send or body phase.
    pub(crate) fn from_reqwest(operation: Operation, err: reqwest::Error) -> Self {
        let kind = if err.is_connect() {
            TransportErrorKind::Connect
        } else if err.is_timeout() {
            TransportErrorKind::Timeout
        } else if err.is_body() || err.is_decode() {
            TransportErrorKind::Body
        } else {
            TransportErrorKind::Other
        };
        Self::transport(operation, kind, err.to_string())
    }

    /// Operation the failing call targeted, if any.
    pub fn operation(&self) -> Option<Operation> {
        match self {
            Self::Serialization { operation, .. }
            | Self::RequestConstruction { operation, .. }
            | Self::Transport { operation, .. }
            | Self::Remote { operation, .. }
            | Self::Decode { operation, .. } => Some(*operation),
            Self::Configuration { .. } => None,
        }
    }

    /// Category of a remote failure; `None` for every other variant.
    pub fn category(&self) -> Option<ErrorCategory> {
        match self {
            Self::Remote { category, .. } => Some(*category),
            _ => None,
        }
    }

    /// Check if the same call may succeed when issued again.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Serialization { .. } => false,
            Self::RequestConstruction { .. } => false,
            Self::Transport { kind, .. } => !matches!(kind, TransportErrorKind::Cancelled),
            Self::Remote { category, status, .. } => match category {
                ErrorCategory::RequestTimeout
                | ErrorCategory::QueueOverloaded
                | ErrorCategory::ServiceShuttingDown
                | ErrorCategory::QueueShuttingDown => true,
                ErrorCategory::DuplicateClientId => false,
                ErrorCategory::Other | ErrorCategory::Infrastructure => *status >= 500,
            },
            Self::Decode { .. } => false,
            Self::Configuration { .. } => false,
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
