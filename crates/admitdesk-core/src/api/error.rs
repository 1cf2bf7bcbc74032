use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Unauthorized - incorrect credentials or expired token")]
    Unauthorized,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let cut = (0..=MAX_ERROR_BODY_LENGTH)
                .rev()
                .find(|&i| body.is_char_boundary(i))
                .unwrap_or(0);
            format!("{}... (truncated, {} total bytes)", &body[..cut], body.len())
        }
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            401 => ApiError::Unauthorized,
            403 => ApiError::AccessDenied(truncated),
            404 => ApiError::NotFound(truncated),
            429 => ApiError::RateLimited,
            500..=599 => ApiError::ServerError(truncated),
            _ => ApiError::InvalidResponse(format!("Status {}: {}", status, truncated)),
        }
    }

    /// Classify this error into the reason consumers branch on.
    pub fn kind(&self) -> FailureKind {
        match self {
            ApiError::Unauthorized => FailureKind::Auth,
            ApiError::AccessDenied(_) => FailureKind::Forbidden,
            ApiError::NotFound(_) => FailureKind::NotFound,
            ApiError::RateLimited => FailureKind::RateLimited,
            ApiError::ServerError(_) => FailureKind::Server,
            // A body that fails to decode still came from a reachable host.
            ApiError::NetworkError(e) if e.is_decode() => FailureKind::InvalidResponse,
            ApiError::NetworkError(_) => FailureKind::Network,
            ApiError::InvalidResponse(_) | ApiError::InvalidRequest(_) => {
                FailureKind::InvalidResponse
            }
        }
    }

    /// Cloneable snapshot of this error, suitable for storing in cache entries.
    pub fn to_failure(&self) -> Failure {
        Failure {
            kind: self.kind(),
            message: self.to_string(),
        }
    }
}

/// Coarse failure classes surfaced to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    Auth,
    Forbidden,
    NotFound,
    RateLimited,
    Server,
    Network,
    InvalidResponse,
}

impl FailureKind {
    pub fn user_message(&self) -> &'static str {
        match self {
            FailureKind::Auth => "Incorrect credentials",
            FailureKind::Forbidden => "You do not have permission for this action",
            FailureKind::NotFound => "The requested record no longer exists",
            FailureKind::RateLimited => "Too many requests, try again shortly",
            FailureKind::Server => "Something went wrong on the server; nothing was saved",
            FailureKind::Network => "Server unreachable, check your connection",
            FailureKind::InvalidResponse => "Unexpected response from the server",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_from_status_classification() {
        assert_eq!(ApiError::from_status(StatusCode::UNAUTHORIZED, "").kind(), FailureKind::Auth);
        assert_eq!(ApiError::from_status(StatusCode::FORBIDDEN, "no").kind(), FailureKind::Forbidden);
        assert_eq!(ApiError::from_status(StatusCode::NOT_FOUND, "").kind(), FailureKind::NotFound);
        assert_eq!(
            ApiError::from_status(StatusCode::TOO_MANY_REQUESTS, "").kind(),
            FailureKind::RateLimited
        );
        assert_eq!(
            ApiError::from_status(StatusCode::BAD_GATEWAY, "upstream").kind(),
            FailureKind::Server
        );
        assert_eq!(
            ApiError::from_status(StatusCode::BAD_REQUEST, "{}").kind(),
            FailureKind::InvalidResponse
        );
    }

    #[test]
    fn test_truncate_body() {
        let long = "x".repeat(MAX_ERROR_BODY_LENGTH + 10);
        let err = ApiError::from_status(StatusCode::INTERNAL_SERVER_ERROR, &long);
        let msg = err.to_string();
        assert!(msg.contains("truncated"));
        assert!(msg.contains(&format!("{} total bytes", long.len())));
    }

    #[test]
    fn test_truncate_body_multibyte() {
        let long = "ё".repeat(MAX_ERROR_BODY_LENGTH);
        // Must not panic on a char boundary
        let err = ApiError::from_status(StatusCode::INTERNAL_SERVER_ERROR, &long);
        assert!(err.to_string().contains("truncated"));
    }

    #[test]
    fn test_failure_snapshot() {
        let failure = ApiError::Unauthorized.to_failure();
        assert_eq!(failure.kind, FailureKind::Auth);
        assert_eq!(failure.kind.user_message(), "Incorrect credentials");
    }
}
