//! Live event source.

use async_trait::async_trait;
use serde_json::Value;

use crate::session::{SessionCookie, SessionError};

/// Upstream live-event query.
#[async_trait]
pub trait EventFeed: Send + Sync {
    /// Fetch the current live-event snapshot as returned by the upstream.
    async fn query_live_events(&self, cookie: &SessionCookie) -> Result<Value, SessionError>;
}
