//! Event reconciliation.
//!
//! One pass fetches the upstream live-event snapshot with the current session
//! and makes the local mirror match it exactly: every upstream record is
//! upserted and every other row is deleted.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use super::feed::EventFeed;
use super::mapping::{event_list, map_event};
use crate::database::repositories::EventRepository;
use crate::session::SessionManager;

/// Counters for one applied pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Records in the upstream list.
    pub fetched: usize,
    pub upserted: u64,
    pub removed: u64,
    /// Records dropped for lacking an id.
    pub skipped: usize,
}

/// What a reconcile pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// No session cookie yet; nothing was fetched.
    NoSession,
    /// The upstream returned no events; the mirror was left alone.
    EmptySnapshot,
    Applied(ReconcileReport),
}

pub struct EventReconciler {
    session: Arc<SessionManager>,
    feed: Arc<dyn EventFeed>,
    events: Arc<dyn EventRepository>,
}

impl EventReconciler {
    pub fn new(
        session: Arc<SessionManager>,
        feed: Arc<dyn EventFeed>,
        events: Arc<dyn EventRepository>,
    ) -> Self {
        Self {
            session,
            feed,
            events,
        }
    }

    /// Run one reconciliation pass.
    ///
    /// A fetch failure or a malformed body aborts the pass before any write.
    #[instrument(skip(self))]
    pub async fn reconcile(&self) -> crate::Result<ReconcileOutcome> {
        let Some(cookie) = self.session.cookie() else {
            info!("No session cookie, skipping event reconciliation");
            return Ok(ReconcileOutcome::NoSession);
        };

        let body = self.feed.query_live_events(&cookie).await?;
        let records = event_list(&body)?;

        if records.is_empty() {
            warn!("Upstream returned no live events, keeping the mirror as is");
            return Ok(ReconcileOutcome::EmptySnapshot);
        }

        let mut snapshot = Vec::with_capacity(records.len());
        let mut skipped = 0usize;
        for record in records {
            match map_event(record) {
                Some(event) => snapshot.push(event),
                None => {
                    skipped += 1;
                    warn!(record = %record, "Skipping upstream event without an id");
                }
            }
        }

        // Every record was unusable; pruning against an empty set would wipe the mirror.
        if snapshot.is_empty() {
            warn!(skipped, "No usable upstream events, keeping the mirror as is");
            return Ok(ReconcileOutcome::EmptySnapshot);
        }

        let changes = self.events.reconcile(&snapshot).await?;
        let report = ReconcileReport {
            fetched: records.len(),
            upserted: changes.upserted,
            removed: changes.removed,
            skipped,
        };

        debug!(?report, "Reconcile pass applied");
        info!(
            "Synced {} events, removed {} stale",
            report.upserted, report.removed
        );
        Ok(ReconcileOutcome::Applied(report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::repositories::SqlxEventRepository;
    use crate::database::test_pool;
    use crate::session::testing::{FakeProvider, MemoryStore};
    use crate::session::{SessionCookie, SessionError};
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use sqlx::SqlitePool;
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Feed that serves whatever body the test sets.
    struct ScriptedFeed {
        body: parking_lot::Mutex<Result<Value, SessionError>>,
        calls: AtomicUsize,
    }

    impl ScriptedFeed {
        fn new(body: Value) -> Self {
            Self {
                body: parking_lot::Mutex::new(Ok(body)),
                calls: AtomicUsize::new(0),
            }
        }

        fn set(&self, body: Result<Value, SessionError>) {
            *self.body.lock() = body;
        }
    }

    #[async_trait]
    impl EventFeed for ScriptedFeed {
        async fn query_live_events(&self, _cookie: &SessionCookie) -> Result<Value, SessionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.body.lock().clone()
        }
    }

    fn upstream(ids: &[&str]) -> Value {
        let events: Vec<Value> = ids
            .iter()
            .map(|id| {
                json!({
                    "id": id,
                    "eventName": format!("Match {id}"),
                    "eventType": 4,
                    "marketId": format!("1.{id}"),
                    "openDate": 1_735_689_600_000i64,
                    "streamingChannel": format!("9{id}"),
                })
            })
            .collect();
        json!({ "events": events })
    }

    struct Harness {
        pool: SqlitePool,
        feed: Arc<ScriptedFeed>,
        repo: Arc<SqlxEventRepository>,
        reconciler: EventReconciler,
    }

    async fn harness(body: Value, logged_in: bool) -> Harness {
        let pool = test_pool().await;
        let session = Arc::new(SessionManager::new(
            Arc::new(FakeProvider::default()),
            Arc::new(MemoryStore::default()),
        ));
        if logged_in {
            session.reauthenticate().await.unwrap();
        }
        let feed = Arc::new(ScriptedFeed::new(body));
        let repo = Arc::new(SqlxEventRepository::new(pool.clone()));
        let reconciler = EventReconciler::new(session, feed.clone(), repo.clone());
        Harness {
            pool,
            feed,
            repo,
            reconciler,
        }
    }

    async fn ids(repo: &SqlxEventRepository) -> Vec<String> {
        let mut ids: Vec<String> = repo
            .list_recent(100)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.event_id)
            .collect();
        ids.sort();
        ids
    }

    /// Hash of every column except `updated_at`.
    async fn content_hash(pool: &SqlitePool) -> u64 {
        let rows: Vec<(String, String, String, String, i64, Option<String>, Option<String>, String)> =
            sqlx::query_as(
                r#"
                SELECT event_id, name, event_type, market_id, open_date,
                       stream_channel, stream_url, raw_payload
                FROM events ORDER BY event_id
                "#,
            )
            .fetch_all(pool)
            .await
            .unwrap();
        let mut hasher = DefaultHasher::new();
        rows.hash(&mut hasher);
        hasher.finish()
    }

    #[tokio::test]
    async fn test_no_cookie_is_noop() {
        let h = harness(upstream(&["A"]), false).await;
        assert_eq!(
            h.reconciler.reconcile().await.unwrap(),
            ReconcileOutcome::NoSession
        );
        assert_eq!(h.feed.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.repo.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_converges_to_latest_snapshot() {
        let h = harness(upstream(&["A", "B", "C"]), true).await;
        h.reconciler.reconcile().await.unwrap();
        assert_eq!(ids(&h.repo).await, ["A", "B", "C"]);
        let b_before = h.repo.find_by_id("B").await.unwrap().unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        h.feed.set(Ok(upstream(&["B", "C", "D"])));
        let outcome = h.reconciler.reconcile().await.unwrap();

        assert_eq!(
            outcome,
            ReconcileOutcome::Applied(ReconcileReport {
                fetched: 3,
                upserted: 3,
                removed: 1,
                skipped: 0,
            })
        );
        assert_eq!(ids(&h.repo).await, ["B", "C", "D"]);
        let b_after = h.repo.find_by_id("B").await.unwrap().unwrap();
        assert!(b_after.updated_at > b_before.updated_at);
    }

    #[tokio::test]
    async fn test_unchanged_snapshot_is_idempotent() {
        let h = harness(upstream(&["A", "B"]), true).await;
        h.reconciler.reconcile().await.unwrap();
        let count = h.repo.count().await.unwrap();
        let hash = content_hash(&h.pool).await;

        h.reconciler.reconcile().await.unwrap();
        assert_eq!(h.repo.count().await.unwrap(), count);
        assert_eq!(content_hash(&h.pool).await, hash);
    }

    #[tokio::test]
    async fn test_stream_url_survives_reconcile() {
        let h = harness(upstream(&["E", "F"]), true).await;
        h.reconciler.reconcile().await.unwrap();
        assert!(
            h.repo
                .set_stream_url("E", "https://cdn.example/e.m3u8")
                .await
                .unwrap()
        );

        h.reconciler.reconcile().await.unwrap();
        let event = h.repo.find_by_id("E").await.unwrap().unwrap();
        assert_eq!(event.stream_url.as_deref(), Some("https://cdn.example/e.m3u8"));
    }

    #[tokio::test]
    async fn test_malformed_payload_leaves_mirror_untouched() {
        let h = harness(upstream(&["A", "B"]), true).await;
        h.reconciler.reconcile().await.unwrap();
        let hash = content_hash(&h.pool).await;

        h.feed.set(Ok(json!({ "events": { "id": "X" } })));
        let err = h.reconciler.reconcile().await.unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Session(SessionError::MalformedResponse(_))
        ));

        h.feed.set(Ok(json!({ "status": "logged off" })));
        assert!(h.reconciler.reconcile().await.is_err());

        assert_eq!(ids(&h.repo).await, ["A", "B"]);
        assert_eq!(content_hash(&h.pool).await, hash);
    }

    #[tokio::test]
    async fn test_fetch_error_aborts_pass() {
        let h = harness(upstream(&["A"]), true).await;
        h.reconciler.reconcile().await.unwrap();

        h.feed.set(Err(SessionError::UpstreamUnavailable {
            endpoint: "inplay".to_string(),
            status: 502,
        }));
        assert!(h.reconciler.reconcile().await.is_err());
        assert_eq!(ids(&h.repo).await, ["A"]);
    }

    #[tokio::test]
    async fn test_empty_list_keeps_mirror() {
        let h = harness(upstream(&["A"]), true).await;
        h.reconciler.reconcile().await.unwrap();

        h.feed.set(Ok(json!({ "events": [] })));
        assert_eq!(
            h.reconciler.reconcile().await.unwrap(),
            ReconcileOutcome::EmptySnapshot
        );
        assert_eq!(ids(&h.repo).await, ["A"]);
    }

    #[tokio::test]
    async fn test_records_without_id_are_skipped() {
        let h = harness(
            json!({ "events": [{ "id": "A", "eventName": "A" }, { "eventName": "no id" }] }),
            true,
        )
        .await;

        let outcome = h.reconciler.reconcile().await.unwrap();
        let ReconcileOutcome::Applied(report) = outcome else {
            panic!("expected an applied pass, got {outcome:?}");
        };
        assert_eq!(report.fetched, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(ids(&h.repo).await, ["A"]);
    }
}
