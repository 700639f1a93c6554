//! Diagnostic routes.
//!
//! - `GET /status`: session readiness and health counters
//! - `GET /events`: mirror size and the most recently updated events
//! - `GET /logging`, `PUT /logging`: read or replace the log filter

use axum::{
    Json, Router,
    extract::State,
    routing::get,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::error::{ApiError, ApiResult};
use crate::api::server::AppState;
use crate::database::models::EventDbModel;
use crate::session::SessionStatus;

/// Events listed by `GET /events`.
const RECENT_EVENTS_LIMIT: i64 = 10;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/status", get(status))
        .route("/events", get(events))
        .route("/logging", get(get_log_filter).put(set_log_filter))
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// `READY` or `MISSING`.
    pub token: &'static str,
    /// `READY` or `MISSING`.
    pub cookie: &'static str,
    pub uptime_secs: u64,
    pub session: SessionStatus,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSummary {
    pub event_id: String,
    pub name: String,
    pub event_type: String,
    pub stream_channel: Option<String>,
    pub stream_url: Option<String>,
    pub open_date: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<EventDbModel> for EventSummary {
    fn from(event: EventDbModel) -> Self {
        Self {
            open_date: event.get_open_date(),
            updated_at: event.get_updated_at(),
            event_id: event.event_id,
            name: event.name,
            event_type: event.event_type,
            stream_channel: event.stream_channel,
            stream_url: event.stream_url,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EventsResponse {
    pub total: i64,
    pub recent: Vec<EventSummary>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LogFilter {
    pub filter: String,
}

fn readiness(ready: bool) -> &'static str {
    if ready { "READY" } else { "MISSING" }
}

async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let session = state.session.status();
    Json(StatusResponse {
        token: readiness(session.token_ready),
        cookie: readiness(session.cookie_ready),
        uptime_secs: state.start_time.elapsed().as_secs(),
        session,
    })
}

async fn events(State(state): State<AppState>) -> ApiResult<Json<EventsResponse>> {
    let total = state.events.count().await?;
    let recent = state
        .events
        .list_recent(RECENT_EVENTS_LIMIT)
        .await?
        .into_iter()
        .map(EventSummary::from)
        .collect();
    Ok(Json(EventsResponse { total, recent }))
}

async fn get_log_filter(State(state): State<AppState>) -> ApiResult<Json<LogFilter>> {
    let logging = state
        .logging_config
        .as_ref()
        .ok_or_else(|| ApiError::service_unavailable("Logging is not configured"))?;
    Ok(Json(LogFilter {
        filter: logging.get_filter(),
    }))
}

async fn set_log_filter(
    State(state): State<AppState>,
    Json(request): Json<LogFilter>,
) -> ApiResult<Json<LogFilter>> {
    let logging = state
        .logging_config
        .as_ref()
        .ok_or_else(|| ApiError::service_unavailable("Logging is not configured"))?;
    logging.set_filter(&request.filter)?;
    Ok(Json(LogFilter {
        filter: logging.get_filter(),
    }))
}
