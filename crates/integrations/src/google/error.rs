use thiserror::Error;

/// Errors from the Google Calendar API, classified by how the sync path
/// should react to them.
#[derive(Debug, Error)]
pub enum GoogleError {
    /// Access token rejected; refresh and retry locally
    #[error("Access token expired")]
    TokenExpired,

    /// Refresh token revoked; the connection needs re-authorization
    #[error("Token revoked by provider")]
    TokenRevoked,

    /// Incremental sync token no longer valid; fall back to a full fetch
    #[error("Sync token invalidated")]
    SyncTokenInvalid,

    /// Back off and retry later
    #[error("Rate limited by provider")]
    RateLimited,

    /// Network or 5xx; safe to retry
    #[error("Transient provider error: {0}")]
    Transient(String),

    /// 4xx that retrying will not fix; fail the job
    #[error("Permanent provider error: {0}")]
    Permanent(String),

    #[error("Unexpected provider response: {0}")]
    Parse(String),
}

impl GoogleError {
    /// Classify an HTTP status from the events/calendar endpoints
    pub fn from_status(status: u16, body: &str) -> GoogleError {
        match status {
            401 => GoogleError::TokenExpired,
            403 if body.contains("rateLimitExceeded") || body.contains("userRateLimitExceeded") => {
                GoogleError::RateLimited
            }
            410 => GoogleError::SyncTokenInvalid,
            429 => GoogleError::RateLimited,
            500..=599 => GoogleError::Transient(format!("HTTP {}", status)),
            _ => GoogleError::Permanent(format!("HTTP {}: {}", status, truncate(body, 200))),
        }
    }

    pub fn retryable(&self) -> bool {
        matches!(self, GoogleError::Transient(_) | GoogleError::RateLimited)
    }
}

impl From<reqwest::Error> for GoogleError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            GoogleError::Transient(err.to_string())
        } else if err.is_decode() {
            GoogleError::Parse(err.to_string())
        } else {
            GoogleError::Transient(err.to_string())
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

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            GoogleError::from_status(401, ""),
            GoogleError::TokenExpired
        ));
        assert!(matches!(
            GoogleError::from_status(410, ""),
            GoogleError::SyncTokenInvalid
        ));
        assert!(matches!(
            GoogleError::from_status(429, ""),
            GoogleError::RateLimited
        ));
        assert!(matches!(
            GoogleError::from_status(403, r#"{"reason":"rateLimitExceeded"}"#),
            GoogleError::RateLimited
        ));
        assert!(matches!(
            GoogleError::from_status(503, ""),
            GoogleError::Transient(_)
        ));
        assert!(matches!(
            GoogleError::from_status(404, "not found"),
            GoogleError::Permanent(_)
        ));
    }

    #[test]
    fn test_retryable() {
        assert!(GoogleError::RateLimited.retryable());
        assert!(GoogleError::Transient("x".into()).retryable());
        assert!(!GoogleError::TokenRevoked.retryable());
        assert!(!GoogleError::SyncTokenInvalid.retryable());
    }
}
