//! Stream routes.
//!
//! - `GET /glive/{match_id}`: resolve a stream channel and return the locator
//!   payload as-is
//! - `GET /event/{event_id}`: a mirrored event with a fresh stream URL

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::api::error::ApiResult;
use crate::api::server::AppState;
use crate::stream::EventStream;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/glive/{match_id}", get(glive_stream))
        .route("/event/{event_id}", get(event_stream))
}

/// Envelope of the event route.
#[derive(Debug, Serialize)]
pub struct EventStreamResponse {
    pub success: bool,
    pub data: EventStream,
}

async fn glive_stream(
    State(state): State<AppState>,
    Path(match_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let payload = state.resolver.resolve_stream(&match_id, true).await?;

    match payload.streaming_url() {
        Some(url) => info!(match_id = %match_id, url, "Stream obtained"),
        None => warn!(match_id = %match_id, "Stream locator returned no URL"),
    }

    Ok(Json(payload.into_inner()))
}

async fn event_stream(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> ApiResult<Json<EventStreamResponse>> {
    let data = state.streams.event_stream(&event_id).await?;
    Ok(Json(EventStreamResponse {
        success: true,
        data,
    }))
}
