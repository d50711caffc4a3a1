use thiserror::Error;

/// Failure reported by a speech or image backend.
///
/// The split decides the fallback behaviour: transient failures are retried
/// once after a backoff, permanent ones fall through to the next tier at once.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Network trouble, timeouts, rate limiting, server-side errors.
    #[error("transient: {0}")]
    Transient(String),

    /// Bad credentials, rejected content, malformed output, missing tools.
    #[error("permanent: {0}")]
    Permanent(String),

    /// The run was cancelled before the call finished.
    #[error("cancelled: {0}")]
    Cancelled(String),
}

impl BackendError {
    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into())
    }

    pub fn permanent(msg: impl Into<String>) -> Self {
        Self::Permanent(msg.into())
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Transient(m) | Self::Permanent(m) | Self::Cancelled(m) => m,
        }
    }

    /// Classify an HTTP error status. 408, 429 and 5xx are worth retrying.
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let msg = if body.trim().is_empty() {
            format!("HTTP {}", status)
        } else {
            format!("HTTP {}: {}", status, truncate(body.trim(), 200))
        };
        if status.is_server_error()
            || status == reqwest::StatusCode::TOO_MANY_REQUESTS
            || status == reqwest::StatusCode::REQUEST_TIMEOUT
        {
            Self::Transient(msg)
        } else {
            Self::Permanent(msg)
        }
    }

    /// A missing API key can't be fixed by retrying.
    pub fn missing_credentials(env_var: &str) -> Self {
        Self::Permanent(format!("{} is not set", env_var))
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        if let Some(status) = e.status() {
            return Self::from_status(status, "");
        }
        if e.is_timeout() || e.is_connect() || e.is_request() || e.is_body() {
            Self::Transient(e.to_string())
        } else {
            Self::Permanent(e.to_string())
        }
    }
}

impl From<std::io::Error> for BackendError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                Self::Permanent(e.to_string())
            }
            _ => Self::Transient(e.to_string()),
        }
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_status_classification() {
        assert!(BackendError::from_status(StatusCode::SERVICE_UNAVAILABLE, "").is_transient());
        assert!(BackendError::from_status(StatusCode::TOO_MANY_REQUESTS, "slow down").is_transient());
        assert!(!BackendError::from_status(StatusCode::UNAUTHORIZED, "bad key").is_transient());
        assert!(!BackendError::from_status(StatusCode::NOT_FOUND, "").is_transient());
    }

    #[test]
    fn test_missing_binary_is_permanent() {
        let err = BackendError::from(std::io::Error::from(std::io::ErrorKind::NotFound));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_body_is_truncated() {
        let body = "x".repeat(500);
        let err = BackendError::from_status(StatusCode::BAD_REQUEST, &body);
        assert!(err.message().len() < 250);
    }
}
