//! Event mirror repository.

use async_trait::async_trait;
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::debug;

use crate::Result;
use crate::database::models::{EventDbModel, EventSnapshot};
use crate::database::retry::retry_on_sqlite_busy;
use crate::database::time::now_ms;

/// Row counts written by one [`EventRepository::reconcile`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MirrorChanges {
    pub upserted: u64,
    pub removed: u64,
}

/// Event mirror data access.
#[async_trait]
pub trait EventRepository: Send + Sync {
    /// Insert or update events by id. Never touches `stream_url`.
    async fn upsert_snapshot(&self, events: &[EventSnapshot]) -> Result<u64>;

    /// Delete every event whose id is not in `keep_ids`.
    async fn prune_missing(&self, keep_ids: &[String]) -> Result<u64>;

    /// Upsert `events` and prune everything else, in one transaction.
    async fn reconcile(&self, events: &[EventSnapshot]) -> Result<MirrorChanges>;

    async fn find_by_id(&self, event_id: &str) -> Result<Option<EventDbModel>>;

    /// Events carrying a non-empty stream channel.
    async fn list_with_stream_channel(&self) -> Result<Vec<EventDbModel>>;

    /// Most recently updated events first.
    async fn list_recent(&self, limit: i64) -> Result<Vec<EventDbModel>>;

    async fn count(&self) -> Result<i64>;

    /// Cache a resolved stream URL on the event. Returns false if it does not exist.
    async fn set_stream_url(&self, event_id: &str, stream_url: &str) -> Result<bool>;

    /// Delete events not updated since `cutoff_ms`.
    async fn purge_stale(&self, cutoff_ms: i64) -> Result<u64>;
}

/// SQLx implementation of EventRepository.
pub struct SqlxEventRepository {
    pool: SqlitePool,
}

impl SqlxEventRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn upsert_in_tx(
        tx: &mut Transaction<'_, Sqlite>,
        events: &[EventSnapshot],
        now: i64,
    ) -> Result<u64> {
        let mut affected = 0u64;
        for event in events {
            let raw_payload = serde_json::to_string(&event.raw_payload)?;
            let result = sqlx::query(
                r#"
                INSERT INTO events (
                    event_id, name, event_type, market_id, open_date,
                    stream_channel, stream_url, raw_payload, updated_at
                ) VALUES (?, ?, ?, ?, COALESCE(?, ?), ?, NULL, ?, ?)
                ON CONFLICT(event_id) DO UPDATE SET
                    name = excluded.name,
                    event_type = excluded.event_type,
                    market_id = excluded.market_id,
                    open_date = CASE WHEN ? IS NULL THEN events.open_date ELSE excluded.open_date END,
                    stream_channel = excluded.stream_channel,
                    raw_payload = excluded.raw_payload,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(&event.event_id)
            .bind(&event.name)
            .bind(&event.event_type)
            .bind(&event.market_id)
            .bind(event.open_date)
            .bind(now)
            .bind(&event.stream_channel)
            .bind(&raw_payload)
            .bind(now)
            .bind(event.open_date)
            .execute(&mut **tx)
            .await?;
            affected += result.rows_affected();
        }
        Ok(affected)
    }

    async fn prune_in_tx(tx: &mut Transaction<'_, Sqlite>, keep_ids: &[String]) -> Result<u64> {
        let keep = serde_json::to_string(keep_ids)?;
        let result = sqlx::query(
            "DELETE FROM events WHERE event_id NOT IN (SELECT value FROM json_each(?))",
        )
        .bind(&keep)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected())
    }

    async fn reconcile_once(&self, events: &[EventSnapshot]) -> Result<MirrorChanges> {
        let now = now_ms();
        let keep_ids: Vec<String> = events.iter().map(|e| e.event_id.clone()).collect();

        let mut tx = self.pool.begin().await?;
        let upserted = Self::upsert_in_tx(&mut tx, events, now).await?;
        let removed = Self::prune_in_tx(&mut tx, &keep_ids).await?;
        tx.commit().await?;

        Ok(MirrorChanges { upserted, removed })
    }
}

#[async_trait]
impl EventRepository for SqlxEventRepository {
    async fn upsert_snapshot(&self, events: &[EventSnapshot]) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let affected = Self::upsert_in_tx(&mut tx, events, now_ms()).await?;
        tx.commit().await?;
        Ok(affected)
    }

    async fn prune_missing(&self, keep_ids: &[String]) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let removed = Self::prune_in_tx(&mut tx, keep_ids).await?;
        tx.commit().await?;
        Ok(removed)
    }

    async fn reconcile(&self, events: &[EventSnapshot]) -> Result<MirrorChanges> {
        let changes =
            retry_on_sqlite_busy("reconcile_events", || self.reconcile_once(events)).await?;
        debug!(
            upserted = changes.upserted,
            removed = changes.removed,
            "Event mirror reconciled"
        );
        Ok(changes)
    }

    async fn find_by_id(&self, event_id: &str) -> Result<Option<EventDbModel>> {
        let event = sqlx::query_as::<_, EventDbModel>("SELECT * FROM events WHERE event_id = ?")
            .bind(event_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(event)
    }

    async fn list_with_stream_channel(&self) -> Result<Vec<EventDbModel>> {
        let events = sqlx::query_as::<_, EventDbModel>(
            r#"
            SELECT * FROM events
            WHERE stream_channel IS NOT NULL AND stream_channel != ''
            ORDER BY open_date ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(events)
    }

    async fn list_recent(&self, limit: i64) -> Result<Vec<EventDbModel>> {
        let events = sqlx::query_as::<_, EventDbModel>(
            "SELECT * FROM events ORDER BY updated_at DESC, event_id ASC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(events)
    }

    async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM events")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn set_stream_url(&self, event_id: &str, stream_url: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE events SET stream_url = ?, updated_at = ? WHERE event_id = ?",
        )
        .bind(stream_url)
        .bind(now_ms())
        .bind(event_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn purge_stale(&self, cutoff_ms: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM events WHERE updated_at < ?")
            .bind(cutoff_ms)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_pool;
    use serde_json::json;

    fn snapshot(id: &str, channel: Option<&str>) -> EventSnapshot {
        EventSnapshot {
            event_id: id.to_string(),
            name: format!("Event {id}"),
            event_type: "4".to_string(),
            market_id: format!("1.{id}"),
            open_date: Some(1_700_000_000_000),
            stream_channel: channel.map(str::to_string),
            raw_payload: json!({ "id": id }),
        }
    }

    #[tokio::test]
    async fn test_upsert_and_find() {
        let repo = SqlxEventRepository::new(test_pool().await);
        repo.upsert_snapshot(&[snapshot("1", Some("11")), snapshot("2", None)])
            .await
            .unwrap();

        assert_eq!(repo.count().await.unwrap(), 2);
        let event = repo.find_by_id("1").await.unwrap().unwrap();
        assert_eq!(event.name, "Event 1");
        assert_eq!(event.stream_channel.as_deref(), Some("11"));
        assert_eq!(event.raw_payload_json(), json!({ "id": "1" }));
        assert!(repo.find_by_id("3").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_keeps_stream_url() {
        let repo = SqlxEventRepository::new(test_pool().await);
        repo.upsert_snapshot(&[snapshot("1", Some("11"))]).await.unwrap();
        assert!(repo.set_stream_url("1", "https://cdn/1.m3u8").await.unwrap());

        let mut changed = snapshot("1", Some("11"));
        changed.name = "Renamed".to_string();
        repo.upsert_snapshot(&[changed]).await.unwrap();

        let event = repo.find_by_id("1").await.unwrap().unwrap();
        assert_eq!(event.name, "Renamed");
        assert_eq!(event.stream_url.as_deref(), Some("https://cdn/1.m3u8"));
    }

    #[tokio::test]
    async fn test_upsert_without_open_date_keeps_stored_value() {
        let repo = SqlxEventRepository::new(test_pool().await);
        repo.upsert_snapshot(&[snapshot("1", None)]).await.unwrap();

        let mut undated = snapshot("1", None);
        undated.open_date = None;
        repo.upsert_snapshot(&[undated.clone()]).await.unwrap();
        assert_eq!(
            repo.find_by_id("1").await.unwrap().unwrap().open_date,
            1_700_000_000_000
        );

        undated.event_id = "2".to_string();
        repo.upsert_snapshot(&[undated]).await.unwrap();
        assert!(repo.find_by_id("2").await.unwrap().unwrap().open_date > 1_700_000_000_000);
    }

    #[tokio::test]
    async fn test_prune_missing() {
        let repo = SqlxEventRepository::new(test_pool().await);
        repo.upsert_snapshot(&[snapshot("1", None), snapshot("2", None), snapshot("3", None)])
            .await
            .unwrap();

        let removed = repo
            .prune_missing(&["2".to_string(), "9".to_string()])
            .await
            .unwrap();
        assert_eq!(removed, 2);
        assert_eq!(repo.count().await.unwrap(), 1);
        assert!(repo.find_by_id("2").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_reconcile_reports_changes() {
        let repo = SqlxEventRepository::new(test_pool().await);
        repo.reconcile(&[snapshot("A", None), snapshot("B", None)])
            .await
            .unwrap();

        let changes = repo
            .reconcile(&[snapshot("B", None), snapshot("C", None)])
            .await
            .unwrap();
        assert_eq!(changes.removed, 1);
        assert_eq!(changes.upserted, 2);

        let ids: Vec<String> = repo
            .list_recent(10)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.event_id)
            .collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&"B".to_string()));
        assert!(ids.contains(&"C".to_string()));
    }

    #[tokio::test]
    async fn test_list_with_stream_channel() {
        let repo = SqlxEventRepository::new(test_pool().await);
        repo.upsert_snapshot(&[snapshot("1", Some("11")), snapshot("2", None)])
            .await
            .unwrap();

        let listed = repo.list_with_stream_channel().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].event_id, "1");
    }

    #[tokio::test]
    async fn test_purge_stale() {
        let pool = test_pool().await;
        let repo = SqlxEventRepository::new(pool.clone());
        repo.upsert_snapshot(&[snapshot("old", None), snapshot("new", None)])
            .await
            .unwrap();
        sqlx::query("UPDATE events SET updated_at = 1000 WHERE event_id = 'old'")
            .execute(&pool)
            .await
            .unwrap();

        assert_eq!(repo.purge_stale(5000).await.unwrap(), 1);
        assert!(repo.find_by_id("old").await.unwrap().is_none());
        assert!(repo.find_by_id("new").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_set_stream_url_unknown_event() {
        let repo = SqlxEventRepository::new(test_pool().await);
        assert!(!repo.set_stream_url("missing", "u").await.unwrap());
    }
}
