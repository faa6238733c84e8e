//! Error types returned by both clients.

use serde_json::Value;
use std::fmt;

/// Crate-wide result alias.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Kind of a failed HTTP response, derived purely from its status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiErrorKind {
    /// HTTP 401
    Authentication,
    /// HTTP 403
    Authorization,
    /// HTTP 404
    NotFound,
    /// HTTP 422
    Validation,
    /// HTTP 429
    RateLimit,
    /// HTTP 5xx
    Server,
    /// Any other error status
    Generic,
}

impl ApiErrorKind {
    /// Maps a status code to its kind. Total over all codes.
    pub fn from_status(status: u16) -> Self {
        match status {
            401 => ApiErrorKind::Authentication,
            403 => ApiErrorKind::Authorization,
            404 => ApiErrorKind::NotFound,
            422 => ApiErrorKind::Validation,
            429 => ApiErrorKind::RateLimit,
            s if s >= 500 => ApiErrorKind::Server,
            _ => ApiErrorKind::Generic,
        }
    }

    fn label(self) -> &'static str {
        match self {
            ApiErrorKind::Authentication => "Authentication failed",
            ApiErrorKind::Authorization => "Access forbidden",
            ApiErrorKind::NotFound => "Not found",
            ApiErrorKind::Validation => "Validation failed",
            ApiErrorKind::RateLimit => "Rate limit exceeded",
            ApiErrorKind::Server => "Server error",
            ApiErrorKind::Generic => "Request error",
        }
    }
}

/// A terminal error response from the service.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub status: u16,
    pub message: String,
    /// Parsed JSON body, absent when the body was empty or not JSON.
    pub body: Option<Value>,
    pub request_id: Option<String>,
    /// Seconds from `Retry-After`, only set for rate-limit errors.
    pub retry_after: Option<f64>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (HTTP {}): {}", self.kind.label(), self.status, self.message)?;
        if let Some(retry_after) = self.retry_after {
            write!(f, ". Retry after {}s", retry_after)?;
        }
        if let Some(request_id) = &self.request_id {
            write!(f, " [request id: {}]", request_id)?;
        }
        Ok(())
    }
}

impl std::error::Error for ApiError {}

/// Flat view over every failure a caller can see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Authentication,
    Authorization,
    NotFound,
    Validation,
    RateLimit,
    Server,
    GenericApi,
    Connection,
    Timeout,
    Request,
    Decode,
    Config,
    Io,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Could not reach the server.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// The server did not answer within the configured timeout.
    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error(transparent)]
    Api(#[from] ApiError),

    /// The request could not be sent for a reason retrying will not fix.
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Failed to parse response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Connection(_) => ErrorKind::Connection,
            Error::Timeout(_) => ErrorKind::Timeout,
            Error::Api(api) => match api.kind {
                ApiErrorKind::Authentication => ErrorKind::Authentication,
                ApiErrorKind::Authorization => ErrorKind::Authorization,
                ApiErrorKind::NotFound => ErrorKind::NotFound,
                ApiErrorKind::Validation => ErrorKind::Validation,
                ApiErrorKind::RateLimit => ErrorKind::RateLimit,
                ApiErrorKind::Server => ErrorKind::Server,
                ApiErrorKind::Generic => ErrorKind::GenericApi,
            },
            Error::Request(_) => ErrorKind::Request,
            Error::Decode(_) => ErrorKind::Decode,
            Error::Config(_) => ErrorKind::Config,
            Error::Io(_) => ErrorKind::Io,
        }
    }

    /// HTTP status of the terminal response, if one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api(api) => Some(api.status),
            _ => None,
        }
    }

    pub fn request_id(&self) -> Option<&str> {
        match self {
            Error::Api(api) => api.request_id.as_deref(),
            _ => None,
        }
    }

    pub fn retry_after(&self) -> Option<f64> {
        match self {
            Error::Api(api) => api.retry_after,
            _ => None,
        }
    }

    /// Whether the same call could succeed if issued again later.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Connection(_) | Error::Timeout(_) => true,
            Error::Api(api) => matches!(api.kind, ApiErrorKind::RateLimit | ApiErrorKind::Server),
            _ => false,
        }
    }
}
