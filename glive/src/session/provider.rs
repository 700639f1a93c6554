//! Upstream credential exchanges.

use async_trait::async_trait;
use exchange_api::GameLocation;
use serde_json::Value;

use super::error::SessionError;
use super::types::{AuthToken, SessionCookie};

/// Result of a login exchange.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub token: AuthToken,
    /// Full login response, persisted under `AUTH_TOKEN`.
    pub raw: Value,
}

/// The three upstream calls that produce a session.
///
/// Implementations carry their own timeouts; a call never hangs unbounded.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Trade the configured account for a bearer token.
    ///
    /// Every failure, including timeouts and malformed bodies, is reported as
    /// [`SessionError::Auth`].
    async fn login(&self) -> Result<LoginOutcome, SessionError>;

    /// Ask the game locator where to open a session.
    async fn locate_game(&self, token: &AuthToken) -> Result<GameLocation, SessionError>;

    /// Open a session at `location` and return its cookie.
    async fn open_session(&self, location: &GameLocation) -> Result<SessionCookie, SessionError>;
}
