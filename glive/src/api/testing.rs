//! Shared state for route tests.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use super::server::AppState;
use crate::database::repositories::SqlxEventRepository;
use crate::database::test_pool;
use crate::session::testing::{FakeProvider, MemoryStore};
use crate::session::{SessionCookie, SessionError, SessionManager};
use crate::stream::{EventStreamService, StreamLocator, StreamResolver};

/// Locator that serves `https://cdn.example/{id}.m3u8`, except for the id
/// `rejected`, which it always turns away.
pub(crate) struct CdnLocator;

#[async_trait]
impl StreamLocator for CdnLocator {
    async fn locate_stream(&self, _cookie: &SessionCookie, id: &str) -> Result<Value, SessionError> {
        if id == "rejected" {
            return Ok(json!({"status": "1001", "status_msg": "Not Authorized"}));
        }
        Ok(json!({ "streamingUrl": format!("https://cdn.example/{id}.m3u8"), "status": "0" }))
    }
}

/// App state over an in-memory database and a logged-in fake session.
pub(crate) async fn test_state() -> (AppState, Arc<SqlxEventRepository>) {
    let session = Arc::new(SessionManager::new(
        Arc::new(FakeProvider::default()),
        Arc::new(MemoryStore::default()),
    ));
    session.reauthenticate().await.unwrap();

    let repo = Arc::new(SqlxEventRepository::new(test_pool().await));
    let resolver = Arc::new(StreamResolver::new(session.clone(), Arc::new(CdnLocator)));
    let streams = Arc::new(EventStreamService::new(repo.clone(), resolver.clone()));

    (AppState::new(session, repo.clone(), resolver, streams), repo)
}
