//! Client error types.

use reqwest::{Method, StatusCode};
use serde::Deserialize;
use thiserror::Error;

/// Error body returned by the control plane on non-2xx responses.
///
/// Older control plane versions populate `err`, newer ones `error`; either
/// (or both, or neither) may be present.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorPayload {
    /// Remote error code.
    #[serde(default)]
    pub code: Option<u32>,
    /// Error message (older deployments).
    #[serde(default)]
    pub err: Option<String>,
    /// Error message (newer deployments).
    #[serde(default)]
    pub error: Option<String>,
}

impl ErrorPayload {
    /// Best available human-readable message, `err` preferred.
    pub fn message(&self) -> Option<&str> {
        self.err.as_deref().or(self.error.as_deref())
    }
}

/// Errors that can occur talking to the control plane.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The configured base URL does not parse.
    #[error("invalid base URL {url:?}: {source}")]
    BaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// The underlying HTTP client could not be constructed.
    #[error("building http client: {0}")]
    Build(#[source] reqwest::Error),

    /// The request produced no response (connect, TLS, timeout, ...).
    #[error("{method} {path}: {source}")]
    Request {
        method: Method,
        path: String,
        #[source]
        source: reqwest::Error,
    },

    /// The control plane rejected the request with a non-2xx status.
    #[error("{method} {path}: {status}: {message}")]
    Status {
        method: Method,
        path: String,
        status: StatusCode,
        message: String,
    },

    /// A successful response carried a body that failed to deserialize.
    #[error("decoding response from {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: reqwest::Error,
    },
}

impl ApiError {
    /// HTTP status of the remote rejection, if this error is one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True when the remote answered 404 Not Found.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND)
    }
}

/// Result type for client operations.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
