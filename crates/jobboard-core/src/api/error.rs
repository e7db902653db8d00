use reqwest::StatusCode;
use thiserror::Error;

use crate::auth::StoreError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Unauthorized - session may be expired: {0}")]
    Unauthorized(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limited - please wait before retrying: {0}")]
    RateLimited(String),

    #[error("Request rejected ({status}): {body}")]
    Rejected { status: StatusCode, body: String },

    #[error("Server error ({status}): {body}")]
    ServerError { status: StatusCode, body: String },

    #[error("Request timed out: {0}")]
    Timeout(#[source] reqwest::Error),

    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    #[error("Could not read session: {0}")]
    Session(#[from] StoreError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Coarse classification used to decide on messaging and retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// 4xx other than 401/404: show to the user, do not retry
    Validation,
    /// 401: the session is no longer accepted
    Expired,
    NotFound,
    /// 5xx: safe to retry idempotent reads
    Server,
    /// No response at all (connect failure, timeout)
    Network,
    /// Failed before reaching the server or after receiving its answer
    Local,
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            401 => ApiError::Unauthorized(truncated),
            403 => ApiError::AccessDenied(truncated),
            404 => ApiError::NotFound(truncated),
            429 => ApiError::RateLimited(truncated),
            500..=599 => ApiError::ServerError {
                status,
                body: truncated,
            },
            _ => ApiError::Rejected {
                status,
                body: truncated,
            },
        }
    }

    /// Classify a transport-level failure (no usable response).
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout(err)
        } else if err.is_builder() {
            ApiError::InvalidRequest(err.to_string())
        } else if err.is_decode() {
            ApiError::InvalidResponse(err.to_string())
        } else {
            ApiError::Network(err)
        }
    }

    /// HTTP status the server answered with, if it answered
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Unauthorized(_) => Some(StatusCode::UNAUTHORIZED),
            ApiError::AccessDenied(_) => Some(StatusCode::FORBIDDEN),
            ApiError::NotFound(_) => Some(StatusCode::NOT_FOUND),
            ApiError::RateLimited(_) => Some(StatusCode::TOO_MANY_REQUESTS),
            ApiError::Rejected { status, .. } | ApiError::ServerError { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            ApiError::Unauthorized(_) => ErrorCategory::Expired,
            ApiError::NotFound(_) => ErrorCategory::NotFound,
            ApiError::AccessDenied(_) | ApiError::RateLimited(_) | ApiError::Rejected { .. } => {
                ErrorCategory::Validation
            }
            ApiError::ServerError { .. } => ErrorCategory::Server,
            ApiError::Timeout(_) | ApiError::Network(_) => ErrorCategory::Network,
            ApiError::Session(_) | ApiError::InvalidRequest(_) | ApiError::InvalidResponse(_) => {
                ErrorCategory::Local
            }
        }
    }

    /// Whether repeating the request may succeed. Callers should still only
    /// repeat non-idempotent requests on `RateLimited`.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::RateLimited(_))
            || matches!(
                self.category(),
                ErrorCategory::Server | ErrorCategory::Network
            )
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ApiError::Timeout(_))
    }
}
