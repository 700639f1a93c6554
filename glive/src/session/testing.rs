//! Test doubles for the session layer.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use exchange_api::GameLocation;
use serde_json::{Value, json};

use super::{
    AuthToken, CredentialKey, CredentialRecord, CredentialStore, LoginOutcome, SessionCookie,
    SessionError, SessionProvider,
};

/// Upstream fake: hands out numbered tokens and cookies.
#[derive(Default)]
pub(crate) struct FakeProvider {
    pub logins: AtomicUsize,
    pub locates: AtomicUsize,
    pub opens: AtomicUsize,
    pub fail_login: AtomicBool,
    pub fail_open: AtomicBool,
    pub delay: Duration,
    /// Appended to every issued session id.
    pub session_suffix: &'static str,
}

impl FakeProvider {
    pub(crate) fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }
}

#[async_trait]
impl SessionProvider for FakeProvider {
    async fn login(&self) -> Result<LoginOutcome, SessionError> {
        let n = self.logins.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(self.delay).await;
        if self.fail_login.load(Ordering::SeqCst) {
            return Err(SessionError::Auth("rejected".to_string()));
        }
        let token = format!("token-{n}");
        Ok(LoginOutcome {
            token: AuthToken::new(&token).unwrap(),
            raw: json!({ "token": token, "uid": 1 }),
        })
    }

    async fn locate_game(&self, token: &AuthToken) -> Result<GameLocation, SessionError> {
        self.locates.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(GameLocation {
            url: "https://games.example/login".to_string(),
            params: vec![("token".to_string(), token.as_str().to_string())],
        })
    }

    async fn open_session(
        &self,
        _location: &GameLocation,
    ) -> Result<SessionCookie, SessionError> {
        let n = self.opens.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(self.delay).await;
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(SessionError::SessionHeaderMissing);
        }
        Ok(SessionCookie::new(format!("session-{n}{}", self.session_suffix)).unwrap())
    }
}

/// In-memory credential store that can be switched to failing.
#[derive(Default)]
pub(crate) struct MemoryStore {
    pub records: parking_lot::Mutex<HashMap<CredentialKey, Value>>,
    pub broken: AtomicBool,
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn get(&self, key: CredentialKey) -> Result<Option<CredentialRecord>, SessionError> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(SessionError::Store("unavailable".to_string()));
        }
        Ok(self.records.lock().get(&key).map(|value| CredentialRecord {
            key,
            value: value.clone(),
            updated_at: Utc::now(),
        }))
    }

    async fn upsert(&self, key: CredentialKey, value: &Value) -> Result<(), SessionError> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(SessionError::Store("unavailable".to_string()));
        }
        self.records.lock().insert(key, value.clone());
        Ok(())
    }
}
