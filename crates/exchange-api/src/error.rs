use thiserror::Error;

/// Errors returned by the exchange protocol functions.
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("{endpoint} endpoint returned HTTP {status}")]
    Status { endpoint: &'static str, status: u16 },

    #[error("missing field in response: {0}")]
    MissingField(&'static str),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("no JSESSIONID in Set-Cookie headers")]
    SessionHeaderMissing,

    #[error("invalid JSESSIONID value")]
    InvalidSessionValue,

    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

impl ExchangeError {
    /// HTTP status carried by this error, if it came from a non-success response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Whether the request ran into its timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Network(e) if e.is_timeout())
    }

    /// Whether the upstream rejected the credentials (HTTP 401/403).
    pub fn is_unauthorized(&self) -> bool {
        matches!(self.status(), Some(401) | Some(403))
    }
}
