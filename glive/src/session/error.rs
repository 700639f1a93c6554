//! Session error types.

use exchange_api::ExchangeError;
use thiserror::Error;

/// Errors raised while acquiring or using the upstream session.
///
/// `Clone` so a single in-flight acquisition can hand the same failure to
/// every caller waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Credential exchange failed.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// A dependent upstream call answered with a non-success status.
    #[error("Upstream {endpoint} unavailable (HTTP {status})")]
    UpstreamUnavailable { endpoint: String, status: u16 },

    /// The cookie exchange response carried no `JSESSIONID`.
    #[error("Session cookie header missing")]
    SessionHeaderMissing,

    /// `JSESSIONID` was present but empty or unparsable.
    #[error("Invalid session cookie value")]
    InvalidSessionValue,

    /// A session cookie was required but none is cached.
    #[error("Session cookie not ready")]
    SessionNotReady,

    /// The upstream rejected the session.
    #[error("Not authorized")]
    NotAuthorized,

    /// The upstream response did not have the expected shape.
    #[error("Malformed upstream response: {0}")]
    MalformedResponse(String),

    #[error("Network error: {0}")]
    Network(String),

    /// Credential store read or write failed.
    #[error("Credential store error: {0}")]
    Store(String),

    /// The acquisition was abandoned before completing.
    #[error("Session acquisition cancelled")]
    Cancelled,
}

impl SessionError {
    /// Whether re-authenticating could fix this error.
    pub fn is_auth_failure(&self) -> bool {
        match self {
            Self::NotAuthorized | Self::SessionNotReady => true,
            Self::UpstreamUnavailable { status, .. } => matches!(status, 401 | 403),
            _ => false,
        }
    }

    /// Check if this error is transient and may be retried later.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) | Self::Cancelled => true,
            Self::UpstreamUnavailable { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

impl From<ExchangeError> for SessionError {
    fn from(err: ExchangeError) -> Self {
        if err.is_unauthorized() {
            return Self::NotAuthorized;
        }
        if err.is_timeout() {
            return Self::Network(format!("request timed out: {err}"));
        }
        if let (ExchangeError::Network(_), Some(status)) = (&err, err.status()) {
            return Self::UpstreamUnavailable {
                endpoint: "upstream".to_string(),
                status,
            };
        }
        match err {
            ExchangeError::Status { endpoint, status } => Self::UpstreamUnavailable {
                endpoint: endpoint.to_string(),
                status,
            },
            ExchangeError::SessionHeaderMissing => Self::SessionHeaderMissing,
            ExchangeError::InvalidSessionValue => Self::InvalidSessionValue,
            ExchangeError::MissingField(field) => {
                Self::MalformedResponse(format!("missing field `{field}`"))
            }
            ExchangeError::Parse(msg) => Self::MalformedResponse(msg),
            ExchangeError::Network(e) => Self::Network(e.to_string()),
            ExchangeError::InvalidUrl(msg) => Self::Network(format!("invalid url: {msg}")),
        }
    }
}

impl From<crate::Error> for SessionError {
    fn from(err: crate::Error) -> Self {
        match err {
            crate::Error::Session(e) => e,
            other => Self::Store(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_failure_classification() {
        assert!(SessionError::NotAuthorized.is_auth_failure());
        assert!(SessionError::SessionNotReady.is_auth_failure());
        assert!(
            SessionError::UpstreamUnavailable {
                endpoint: "stream".to_string(),
                status: 403
            }
            .is_auth_failure()
        );
        assert!(
            !SessionError::UpstreamUnavailable {
                endpoint: "stream".to_string(),
                status: 502
            }
            .is_auth_failure()
        );
        assert!(!SessionError::Network("reset".to_string()).is_auth_failure());
        assert!(!SessionError::MalformedResponse("x".to_string()).is_auth_failure());
    }

    #[test]
    fn test_from_exchange_error() {
        let err: SessionError = ExchangeError::Status {
            endpoint: "game_locator",
            status: 500,
        }
        .into();
        assert_eq!(
            err,
            SessionError::UpstreamUnavailable {
                endpoint: "game_locator".to_string(),
                status: 500
            }
        );
        assert!(err.is_transient());

        let err: SessionError = ExchangeError::Status {
            endpoint: "stream",
            status: 401,
        }
        .into();
        assert_eq!(err, SessionError::NotAuthorized);
        assert!(err.is_auth_failure());

        let err: SessionError = ExchangeError::SessionHeaderMissing.into();
        assert_eq!(err, SessionError::SessionHeaderMissing);

        let err: SessionError = ExchangeError::MissingField("data.url").into();
        assert!(matches!(err, SessionError::MalformedResponse(msg) if msg.contains("data.url")));
    }

    #[test]
    fn test_from_app_error() {
        let err: SessionError = crate::Error::Other("disk full".to_string()).into();
        assert!(matches!(err, SessionError::Store(msg) if msg.contains("disk full")));

        let err: SessionError = crate::Error::Session(SessionError::NotAuthorized).into();
        assert_eq!(err, SessionError::NotAuthorized);
    }
}
