//! Session manager.
//!
//! Owns the in-memory session (token + cookie). Readers get a snapshot clone
//! and never block on upstream work; writers go through a [`SingleFlight`]
//! slot per credential so at most one acquisition of each runs at a time.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use super::error::SessionError;
use super::flight::SingleFlight;
use super::provider::SessionProvider;
use super::store::CredentialStore;
use super::tracker::{FailureInfo, SessionHealth};
use super::types::{AuthToken, CredentialKey, SessionCookie};

#[derive(Default)]
struct SessionState {
    token: Option<AuthToken>,
    cookie: Option<SessionCookie>,
}

/// How [`SessionManager::warm_up`] made the session ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarmStart {
    /// Both credentials were restored from the store.
    Restored,
    /// A fresh login and cookie exchange ran.
    Acquired,
}

/// Snapshot of the session for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub token_ready: bool,
    pub cookie_ready: bool,
    pub refreshing: bool,
    pub token_last_success: Option<DateTime<Utc>>,
    pub cookie_last_success: Option<DateTime<Utc>>,
    pub token_failures: Option<FailureInfo>,
    pub cookie_failures: Option<FailureInfo>,
    pub store_failures: u64,
}

/// Process-wide owner of the upstream session.
pub struct SessionManager {
    provider: Arc<dyn SessionProvider>,
    store: Arc<dyn CredentialStore>,
    state: RwLock<SessionState>,
    token_flight: SingleFlight<AuthToken>,
    cookie_flight: SingleFlight<SessionCookie>,
    health: SessionHealth,
}

impl SessionManager {
    pub fn new(provider: Arc<dyn SessionProvider>, store: Arc<dyn CredentialStore>) -> Self {
        Self {
            provider,
            store,
            state: RwLock::new(SessionState::default()),
            token_flight: SingleFlight::new(),
            cookie_flight: SingleFlight::new(),
            health: SessionHealth::new(),
        }
    }

    /// Current token, if any. Never blocks on upstream work.
    pub fn token(&self) -> Option<AuthToken> {
        self.state.read().token.clone()
    }

    /// Current cookie, if any. Never blocks on upstream work.
    pub fn cookie(&self) -> Option<SessionCookie> {
        self.state.read().cookie.clone()
    }

    /// Whether a cookie exchange is running.
    pub fn is_refreshing(&self) -> bool {
        self.cookie_flight.is_in_flight()
    }

    pub fn health(&self) -> &SessionHealth {
        &self.health
    }

    /// Run the login exchange and commit the new token.
    ///
    /// Concurrent callers share one exchange. On failure the previous token
    /// stays in place.
    pub async fn acquire_token(&self) -> Result<AuthToken, SessionError> {
        self.token_flight.run(|| self.login_and_commit()).await
    }

    #[instrument(skip(self))]
    async fn login_and_commit(&self) -> Result<AuthToken, SessionError> {
        let outcome = match self.provider.login().await {
            Ok(outcome) => outcome,
            Err(e) => {
                let failures = self.health.record_failure(CredentialKey::AuthToken, &e.to_string());
                warn!(error = %e, failures, "Token acquisition failed");
                return Err(e);
            }
        };

        self.state.write().token = Some(outcome.token.clone());
        self.health.record_success(CredentialKey::AuthToken);
        info!("Auth token acquired");

        self.persist(CredentialKey::AuthToken, &outcome.raw).await;
        Ok(outcome.token)
    }

    /// Run the two-step cookie exchange for `token` and commit the new cookie.
    ///
    /// Concurrent callers wait for the running exchange and receive its result.
    /// On failure the previous cookie stays in place.
    pub async fn refresh_cookie(&self, token: &AuthToken) -> Result<SessionCookie, SessionError> {
        self.cookie_flight
            .run(|| self.exchange_and_commit(token))
            .await
    }

    #[instrument(skip(self, token))]
    async fn exchange_and_commit(&self, token: &AuthToken) -> Result<SessionCookie, SessionError> {
        let result = async {
            let location = self.provider.locate_game(token).await?;
            debug!(target_url = %location.url, "Game server located");
            self.provider.open_session(&location).await
        }
        .await;

        let cookie = match result {
            Ok(cookie) => cookie,
            Err(e) => {
                let failures = self.health.record_failure(CredentialKey::Cookie, &e.to_string());
                warn!(error = %e, failures, "Session cookie refresh failed");
                return Err(e);
            }
        };

        self.state.write().cookie = Some(cookie.clone());
        self.health.record_success(CredentialKey::Cookie);
        info!("Session cookie refreshed");

        self.persist(CredentialKey::Cookie, &cookie.to_store_value())
            .await;
        Ok(cookie)
    }

    /// Full re-authentication: new token, then a cookie for it.
    pub async fn reauthenticate(&self) -> Result<SessionCookie, SessionError> {
        let token = self.acquire_token().await?;
        self.refresh_cookie(&token).await
    }

    /// Read both credentials from the store and install the ones found.
    ///
    /// Store errors are logged and counted, and read as absent.
    pub async fn load_from_store(&self) -> (Option<AuthToken>, Option<SessionCookie>) {
        let token = self
            .load_value(CredentialKey::AuthToken)
            .await
            .and_then(|v| AuthToken::from_store_value(&v));
        let cookie = self
            .load_value(CredentialKey::Cookie)
            .await
            .and_then(|v| SessionCookie::from_store_value(&v));

        {
            let mut state = self.state.write();
            if let Some(token) = &token {
                state.token = Some(token.clone());
            }
            if let Some(cookie) = &cookie {
                state.cookie = Some(cookie.clone());
            }
        }

        debug!(
            token_found = token.is_some(),
            cookie_found = cookie.is_some(),
            "Credentials loaded from store"
        );
        (token, cookie)
    }

    /// Startup: restore from the store, or acquire a fresh session when
    /// either credential is missing.
    pub async fn warm_up(&self) -> Result<WarmStart, SessionError> {
        if let (Some(_), Some(_)) = self.load_from_store().await {
            info!("Session restored from store");
            return Ok(WarmStart::Restored);
        }

        info!("No stored session, acquiring a fresh one");
        self.reauthenticate().await?;
        Ok(WarmStart::Acquired)
    }

    pub fn status(&self) -> SessionStatus {
        let (token_ready, cookie_ready) = {
            let state = self.state.read();
            (state.token.is_some(), state.cookie.is_some())
        };

        SessionStatus {
            token_ready,
            cookie_ready,
            refreshing: self.is_refreshing(),
            token_last_success: self.health.last_success(CredentialKey::AuthToken),
            cookie_last_success: self.health.last_success(CredentialKey::Cookie),
            token_failures: self.health.failure_info(CredentialKey::AuthToken),
            cookie_failures: self.health.failure_info(CredentialKey::Cookie),
            store_failures: self.health.store_failures(),
        }
    }

    async fn load_value(&self, key: CredentialKey) -> Option<Value> {
        match self.store.get(key).await {
            Ok(record) => record.map(|r| r.value),
            Err(e) => {
                let total = self.health.record_store_failure();
                warn!(key = %key, error = %e, store_failures = total, "Failed to load credential");
                None
            }
        }
    }

    async fn persist(&self, key: CredentialKey, value: &Value) {
        if let Err(e) = self.store.upsert(key, value).await {
            let total = self.health.record_store_failure();
            warn!(key = %key, error = %e, store_failures = total, "Failed to persist credential");
        }
    }
}
