//! Error classification and retry policy for LLM requests.

use std::fmt;
use std::time::Duration;

/// Kind of LLM request failure, used to decide whether a retry makes sense.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmErrorKind {
    /// 429 - back off and retry, honoring Retry-After when given.
    RateLimited,
    /// 5xx - transient upstream failure, retryable.
    ServerError,
    /// 4xx other than 429 - the request itself is wrong, never retried.
    ClientError,
    /// Connection/timeout failures before a status was received.
    NetworkError,
    /// The upstream answered but the body did not parse.
    ParseError,
}

impl fmt::Display for LlmErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LlmErrorKind::RateLimited => "rate limited",
            LlmErrorKind::ServerError => "server error",
            LlmErrorKind::ClientError => "client error",
            LlmErrorKind::NetworkError => "network error",
            LlmErrorKind::ParseError => "parse error",
        };
        f.write_str(s)
    }
}

/// An LLM request failure.
#[derive(Debug, Clone)]
pub struct LlmError {
    pub kind: LlmErrorKind,
    pub message: String,
    pub status: Option<u16>,
    /// Server-suggested delay from a Retry-After header, if any.
    pub retry_after: Option<Duration>,
}

impl LlmError {
    pub fn rate_limited(message: String, retry_after: Option<Duration>) -> Self {
        Self {
            kind: LlmErrorKind::RateLimited,
            message,
            status: Some(429),
            retry_after,
        }
    }

    pub fn server_error(status: u16, message: String) -> Self {
        Self {
            kind: LlmErrorKind::ServerError,
            message,
            status: Some(status),
            retry_after: None,
        }
    }

    pub fn client_error(status: u16, message: String) -> Self {
        Self {
            kind: LlmErrorKind::ClientError,
            message,
            status: Some(status),
            retry_after: None,
        }
    }

    pub fn network_error(message: String) -> Self {
        Self {
            kind: LlmErrorKind::NetworkError,
            message,
            status: None,
            retry_after: None,
        }
    }

    pub fn parse_error(message: String) -> Self {
        Self {
            kind: LlmErrorKind::ParseError,
            message,
            status: None,
            retry_after: None,
        }
    }

    /// Delay to wait before retry attempt `attempt` (0-based).
    ///
    /// A Retry-After value from the server wins; otherwise exponential
    /// backoff from 500ms, capped at 10s.
    pub fn suggested_delay(&self, attempt: u32) -> Duration {
        if let Some(retry_after) = self.retry_after {
            return retry_after;
        }
        let backoff = Duration::from_millis(500).saturating_mul(2u32.saturating_pow(attempt));
        backoff.min(Duration::from_secs(10))
    }
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} (HTTP {}): {}", self.kind, status, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for LlmError {}

/// Map an HTTP status code to an error kind.
pub fn classify_http_status(status: u16) -> LlmErrorKind {
    match status {
        429 => LlmErrorKind::RateLimited,
        500..=599 => LlmErrorKind::ServerError,
        400..=499 => LlmErrorKind::ClientError,
        _ => LlmErrorKind::ServerError,
    }
}

/// Retry policy for transient LLM failures.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retries after the initial attempt.
    pub max_retries: u32,
    /// Total wall-clock budget across all attempts.
    pub max_retry_duration: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            max_retry_duration: Duration::from_secs(60),
        }
    }
}

impl RetryConfig {
    /// Whether this error is worth retrying at all.
    pub fn should_retry(&self, error: &LlmError) -> bool {
        matches!(
            error.kind,
            LlmErrorKind::RateLimited | LlmErrorKind::ServerError | LlmErrorKind::NetworkError
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_http_statuses() {
        assert_eq!(classify_http_status(429), LlmErrorKind::RateLimited);
        assert_eq!(classify_http_status(500), LlmErrorKind::ServerError);
        assert_eq!(classify_http_status(503), LlmErrorKind::ServerError);
        assert_eq!(classify_http_status(400), LlmErrorKind::ClientError);
        assert_eq!(classify_http_status(404), LlmErrorKind::ClientError);
    }

    #[test]
    fn retries_only_transient_kinds() {
        let config = RetryConfig::default();
        assert!(config.should_retry(&LlmError::rate_limited("slow down".into(), None)));
        assert!(config.should_retry(&LlmError::server_error(502, "bad gateway".into())));
        assert!(config.should_retry(&LlmError::network_error("timeout".into())));
        assert!(!config.should_retry(&LlmError::client_error(400, "bad request".into())));
        assert!(!config.should_retry(&LlmError::parse_error("bad json".into())));
    }

    #[test]
    fn retry_after_overrides_backoff() {
        let err = LlmError::rate_limited("slow down".into(), Some(Duration::from_secs(7)));
        assert_eq!(err.suggested_delay(0), Duration::from_secs(7));
        assert_eq!(err.suggested_delay(5), Duration::from_secs(7));
    }

    #[test]
    fn backoff_grows_and_caps() {
        let err = LlmError::server_error(500, "oops".into());
        assert_eq!(err.suggested_delay(0), Duration::from_millis(500));
        assert_eq!(err.suggested_delay(1), Duration::from_secs(1));
        assert_eq!(err.suggested_delay(2), Duration::from_secs(2));
        assert_eq!(err.suggested_delay(10), Duration::from_secs(10));
    }
}
