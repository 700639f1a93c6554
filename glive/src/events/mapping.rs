//! Upstream event records to mirror rows.

use chrono::{DateTime, NaiveDateTime};
use serde_json::Value;

use crate::database::models::EventSnapshot;
use crate::session::SessionError;

/// The event list inside a live-events response.
///
/// The upstream wraps the list as `{"events": [...]}`; a bare array is
/// accepted too. Anything else is a protocol violation.
pub fn event_list(body: &Value) -> Result<&[Value], SessionError> {
    match body {
        Value::Array(list) => Ok(list.as_slice()),
        Value::Object(obj) => match obj.get("events") {
            Some(Value::Array(list)) => Ok(list.as_slice()),
            Some(other) => Err(SessionError::MalformedResponse(format!(
                "`events` is {}, expected an array",
                kind(other)
            ))),
            None => Err(SessionError::MalformedResponse(
                "response has no `events` list".to_string(),
            )),
        },
        other => Err(SessionError::MalformedResponse(format!(
            "response is {}, expected an object or array",
            kind(other)
        ))),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// String form of a scalar; `None` for null, empty strings and containers.
fn scalar_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Parse an upstream open date into epoch milliseconds.
///
/// Accepts epoch milliseconds (number or numeric string), RFC 3339 and
/// `YYYY-MM-DD HH:MM:SS` (read as UTC).
pub fn parse_open_date(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(ms) = s.parse::<i64>() {
                return Some(ms);
            }
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.timestamp_millis());
            }
            NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|dt| dt.and_utc().timestamp_millis())
        }
        _ => None,
    }
}

/// Map one upstream record. `None` when it has no usable `id`.
pub fn map_event(record: &Value) -> Option<EventSnapshot> {
    let obj = record.as_object()?;
    let event_id = scalar_string(obj.get("id"))?;

    let name = scalar_string(obj.get("eventName"))
        .or_else(|| scalar_string(obj.get("name")))
        .unwrap_or_default();

    Some(EventSnapshot {
        event_id,
        name,
        event_type: scalar_string(obj.get("eventType")).unwrap_or_default(),
        market_id: scalar_string(obj.get("marketId")).unwrap_or_default(),
        open_date: obj.get("openDate").and_then(parse_open_date),
        stream_channel: scalar_string(obj.get("streamingChannel")),
        raw_payload: record.clone(),
    })
}
