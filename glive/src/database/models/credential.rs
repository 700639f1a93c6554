//! Credential row model (`system_config` table).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One persisted credential, keyed by `AUTH_TOKEN` or `COOKIE`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CredentialDbModel {
    pub key: String,
    /// JSON text.
    pub value: String,
    /// Unix epoch milliseconds (UTC).
    pub updated_at: i64,
}

impl CredentialDbModel {
    pub fn get_updated_at(&self) -> DateTime<Utc> {
        crate::database::time::ms_to_datetime(self.updated_at)
    }
}
