//! Credential store repository (SQLx).
//!
//! Database-backed persistence for the session credentials, one row per key
//! in `system_config`.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::SqlitePool;
use tracing::{debug, instrument};

use crate::database::models::CredentialDbModel;
use crate::database::retry::retry_on_sqlite_busy;
use crate::database::time::{ms_to_datetime, now_ms};
use crate::session::{CredentialKey, CredentialRecord, CredentialStore, SessionError};

/// SQLx-backed credential store.
pub struct SqlxCredentialStore {
    pool: SqlitePool,
}

impl SqlxCredentialStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn write(&self, key: CredentialKey, value: &str) -> crate::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO system_config (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key.as_str())
        .bind(value)
        .bind(now_ms())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for SqlxCredentialStore {
    async fn get(&self, key: CredentialKey) -> Result<Option<CredentialRecord>, SessionError> {
        let row = sqlx::query_as::<_, CredentialDbModel>(
            "SELECT key, value, updated_at FROM system_config WHERE key = ?",
        )
        .bind(key.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(crate::Error::from)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let value: Value = serde_json::from_str(&row.value).map_err(crate::Error::from)?;
        Ok(Some(CredentialRecord {
            key,
            value,
            updated_at: ms_to_datetime(row.updated_at),
        }))
    }

    #[instrument(skip(self, value))]
    async fn upsert(&self, key: CredentialKey, value: &Value) -> Result<(), SessionError> {
        let text = serde_json::to_string(value).map_err(crate::Error::from)?;
        retry_on_sqlite_busy("upsert_credential", || self.write(key, &text)).await?;
        debug!(key = %key, "Credential persisted");
        Ok(())
    }
}
