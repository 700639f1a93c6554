//! Database maintenance.
//!
//! Expires mirrored events that have not been touched within the retention
//! window. Reconciliation normally prunes them first; this catches rows left
//! behind when reconciliation keeps failing.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::database::DbPool;
use crate::database::repositories::{EventRepository, SqlxEventRepository};
use crate::database::time::retention_cutoff_ms;

/// Configuration for the maintenance scheduler.
#[derive(Debug, Clone)]
pub struct MaintenanceConfig {
    /// Interval between runs (default: 1 hour).
    pub interval: Duration,
    /// How long an event may go without an update (default: 48 hours).
    pub event_retention: Duration,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60 * 60),
            event_retention: Duration::from_secs(48 * 60 * 60),
        }
    }
}

/// Database maintenance scheduler.
pub struct MaintenanceScheduler {
    events: SqlxEventRepository,
    config: MaintenanceConfig,
}

impl MaintenanceScheduler {
    pub fn new(pool: DbPool, config: MaintenanceConfig) -> Self {
        Self {
            events: SqlxEventRepository::new(pool),
            config,
        }
    }

    /// Start the maintenance loop; it stops when `cancel_token` is cancelled.
    pub fn start(self: Arc<Self>, cancel_token: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.config.interval);
            loop {
                tokio::select! {
                    _ = cancel_token.cancelled() => {
                        tracing::debug!("Maintenance scheduler shutting down");
                        break;
                    }
                    _ = interval.tick() => {
                        if let Err(e) = self.run_maintenance().await {
                            tracing::error!("Maintenance error: {}", e);
                        }
                    }
                }
            }
        })
    }

    /// Run all maintenance tasks once. Returns the number of expired events.
    pub async fn run_maintenance(&self) -> crate::Result<u64> {
        let cutoff = retention_cutoff_ms(self.config.event_retention);
        let purged = self.events.purge_stale(cutoff).await?;
        if purged > 0 {
            tracing::info!("Expired {} stale events", purged);
        }
        Ok(purged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::EventSnapshot;
    use crate::database::test_pool;
    use serde_json::json;

    #[tokio::test]
    async fn test_run_maintenance_expires_old_events() {
        let pool = test_pool().await;
        let repo = SqlxEventRepository::new(pool.clone());
        let snapshot = |id: &str| EventSnapshot {
            event_id: id.to_string(),
            name: id.to_string(),
            event_type: "1".to_string(),
            market_id: String::new(),
            open_date: Some(0),
            stream_channel: None,
            raw_payload: json!({}),
        };
        repo.upsert_snapshot(&[snapshot("old"), snapshot("fresh")])
            .await
            .unwrap();

        let three_days_ago = crate::database::time::now_ms() - 3 * 24 * 3_600_000;
        sqlx::query("UPDATE events SET updated_at = ? WHERE event_id = 'old'")
            .bind(three_days_ago)
            .execute(&pool)
            .await
            .unwrap();

        let scheduler = MaintenanceScheduler::new(pool, MaintenanceConfig::default());
        assert_eq!(scheduler.run_maintenance().await.unwrap(), 1);
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_start_stops_on_cancel() {
        let scheduler = Arc::new(MaintenanceScheduler::new(
            test_pool().await,
            MaintenanceConfig::default(),
        ));
        let token = CancellationToken::new();
        let handle = scheduler.start(token.clone());

        token.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
