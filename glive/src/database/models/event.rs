//! Live event database model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;

use crate::database::time::ms_to_datetime;

/// Channel value the upstream uses for "no stream".
pub const NO_STREAM_CHANNEL: &str = "0";

/// Mirrored live event.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct EventDbModel {
    /// Upstream event id.
    pub event_id: String,
    pub name: String,
    pub event_type: String,
    pub market_id: String,
    /// Unix epoch milliseconds (UTC).
    pub open_date: i64,
    /// Identifier handed to the stream locator.
    pub stream_channel: Option<String>,
    /// Last resolved stream URL; only written by the stream lookup path.
    pub stream_url: Option<String>,
    /// Upstream record as JSON text.
    pub raw_payload: String,
    /// Unix epoch milliseconds (UTC) of the last reconcile or stream update.
    pub updated_at: i64,
}

impl EventDbModel {
    pub fn get_open_date(&self) -> DateTime<Utc> {
        ms_to_datetime(self.open_date)
    }

    pub fn get_updated_at(&self) -> DateTime<Utc> {
        ms_to_datetime(self.updated_at)
    }

    /// Decoded upstream record. Unparsable text decodes to `Null`.
    pub fn raw_payload_json(&self) -> Value {
        serde_json::from_str(&self.raw_payload).unwrap_or(Value::Null)
    }

    /// Channel usable for stream resolution, if any.
    pub fn streamable_channel(&self) -> Option<&str> {
        self.stream_channel
            .as_deref()
            .filter(|c| !c.is_empty() && *c != NO_STREAM_CHANNEL)
    }
}

/// One upstream event as written by a reconcile pass.
///
/// Carries no stream URL: reconciliation never touches it.
#[derive(Debug, Clone, PartialEq)]
pub struct EventSnapshot {
    pub event_id: String,
    pub name: String,
    pub event_type: String,
    pub market_id: String,
    /// `None` when the upstream record carried no usable open date; the stored
    /// value is kept on update and "now" is used on insert.
    pub open_date: Option<i64>,
    pub stream_channel: Option<String>,
    pub raw_payload: Value,
}
