//! Stream resolution with one self-healing retry.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::session::{SessionCookie, SessionError, SessionManager};

/// Upstream stream-locator call.
#[async_trait]
pub trait StreamLocator: Send + Sync {
    /// Ask the locator for `id` using `cookie`.
    ///
    /// Returns the body as-is; a body-level authorization failure is not an
    /// error at this layer.
    async fn locate_stream(&self, cookie: &SessionCookie, id: &str) -> Result<Value, SessionError>;

    /// Whether `body` is the locator rejecting the session.
    fn is_rejection(&self, body: &Value) -> bool {
        exchange_api::is_not_authorized(body)
    }
}

/// Opaque locator response.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct StreamPayload(Value);

impl StreamPayload {
    pub fn new(body: Value) -> Self {
        Self(body)
    }

    /// Playable URL, when the payload carries one.
    pub fn streaming_url(&self) -> Option<&str> {
        ["streamingUrl", "url"]
            .iter()
            .filter_map(|key| self.0.get(*key).and_then(Value::as_str))
            .find(|url| !url.is_empty())
    }

    pub fn into_inner(self) -> Value {
        self.0
    }
}

/// Position of a call in the resolve sequence. There is no third state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    First,
    Retried,
}

pub struct StreamResolver {
    session: Arc<SessionManager>,
    locator: Arc<dyn StreamLocator>,
}

impl StreamResolver {
    pub fn new(session: Arc<SessionManager>, locator: Arc<dyn StreamLocator>) -> Self {
        Self { session, locator }
    }

    /// Resolve a stream for `id`.
    ///
    /// On an authorization failure with `allow_retry` set, the session is
    /// re-acquired and the call is made once more. The second result is
    /// returned as-is. If re-authentication itself fails, the first error is
    /// returned.
    #[instrument(skip(self))]
    pub async fn resolve_stream(
        &self,
        id: &str,
        allow_retry: bool,
    ) -> Result<StreamPayload, SessionError> {
        let first = match self.attempt(id, Attempt::First).await {
            Ok(payload) => return Ok(payload),
            Err(e) => e,
        };

        if !allow_retry || !first.is_auth_failure() {
            return Err(first);
        }

        info!(error = %first, "Stream request rejected, refreshing session");
        if let Err(heal) = self.session.reauthenticate().await {
            warn!(error = %heal, "Session self-heal failed");
            return Err(first);
        }

        self.attempt(id, Attempt::Retried).await
    }

    async fn attempt(&self, id: &str, attempt: Attempt) -> Result<StreamPayload, SessionError> {
        let cookie = self.session.cookie().ok_or(SessionError::SessionNotReady)?;

        let result = self.locator.locate_stream(&cookie, id).await.and_then(|body| {
            if self.locator.is_rejection(&body) {
                Err(SessionError::NotAuthorized)
            } else {
                Ok(StreamPayload::new(body))
            }
        });

        match &result {
            Ok(payload) => debug!(?attempt, has_url = payload.streaming_url().is_some(), "Stream resolved"),
            Err(e) => warn!(?attempt, error = %e, "Stream request failed"),
        }
        result
    }
}
