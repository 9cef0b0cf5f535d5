//! Error types for the PocketBase client.
//!
//! # Design
//! Every variant carries the name of the operation that produced it so the
//! rendered message reads `[op] ...` no matter how deep the failure started.
//! `Server` keeps the raw response body verbatim: it is the only place the
//! backend explains validation failures. `Decode` is separate from `Server`
//! so callers can tell "rejected" apart from "unreadable".

use std::fmt;

use thiserror::Error;

use crate::types::ListResponse;

/// Errors returned by `Client` and `Collection` operations.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Credentials were rejected, or an operation needed a session token
    /// that is not set.
    #[error("[{op}] authorization failed: {reason}")]
    Auth {
        op: &'static str,
        reason: String,
        #[source]
        source: Option<Box<ApiError>>,
    },

    /// The request never produced an HTTP response, even after retries.
    #[error("[{op}] can't reach pocketbase: {source}")]
    Transport {
        op: &'static str,
        #[source]
        source: TransportError,
    },

    /// The server answered with a non-2xx status.
    #[error("[{op}] pocketbase returned status: {status}, msg: {body}")]
    Server {
        op: &'static str,
        status: u16,
        body: String,
    },

    /// The response body could not be deserialized into the expected type.
    #[error("[{op}] can't unmarshal response: {source}")]
    Decode {
        op: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// The request payload could not be serialized to JSON.
    #[error("[{op}] can't marshal request body: {source}")]
    Encode {
        op: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl ApiError {
    pub(crate) fn auth(op: &'static str, reason: impl Into<String>) -> Self {
        ApiError::Auth {
            op,
            reason: reason.into(),
            source: None,
        }
    }

    /// Wrap `self` as the cause of an authorization failure. Errors that are
    /// already `Auth` pass through untouched.
    pub(crate) fn into_auth(self, op: &'static str, reason: impl Into<String>) -> Self {
        match self {
            auth @ ApiError::Auth { .. } => auth,
            other => ApiError::Auth {
                op,
                reason: reason.into(),
                source: Some(Box::new(other)),
            },
        }
    }

    /// Like [`ApiError::into_auth`], but only for a 4xx rejection. Transport,
    /// decode and 5xx failures keep their own kind.
    pub(crate) fn into_auth_if_rejected(self, op: &'static str, reason: impl Into<String>) -> Self {
        if matches!(&self, ApiError::Server { status, .. } if (400..500).contains(status)) {
            self.into_auth(op, reason)
        } else {
            self
        }
    }

    /// Name of the operation that failed.
    pub fn op(&self) -> &'static str {
        match self {
            ApiError::Auth { op, .. }
            | ApiError::Transport { op, .. }
            | ApiError::Server { op, .. }
            | ApiError::Decode { op, .. }
            | ApiError::Encode { op, .. } => op,
        }
    }

    /// HTTP status of the underlying server error, looking through an `Auth`
    /// wrapper.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Server { status, .. } => Some(*status),
            ApiError::Auth {
                source: Some(inner),
                ..
            } => inner.status(),
            _ => None,
        }
    }

    /// Raw response body of the underlying server error, if any.
    pub fn body(&self) -> Option<&str> {
        match self {
            ApiError::Server { body, .. } => Some(body),
            ApiError::Auth {
                source: Some(inner),
                ..
            } => inner.body(),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, ApiError::Auth { .. })
    }
}

/// Failures raised by a `Transport` before any HTTP status was received.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransportError::Timeout | TransportError::Connection(_))
    }
}

/// A full-list sweep that stopped part-way.
///
/// `partial` holds every item collected before `source` occurred, in page
/// order.
#[derive(Debug)]
pub struct FullListError<T> {
    pub partial: ListResponse<T>,
    pub source: ApiError,
}

impl<T> fmt::Display for FullListError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "full list stopped after {} items: {}",
            self.partial.items.len(),
            self.source
        )
    }
}

impl<T: fmt::Debug> std::error::Error for FullListError<T> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

impl<T> From<FullListError<T>> for ApiError {
    fn from(err: FullListError<T>) -> Self {
        err.source
    }
}
