//! Event stream lookup.
//!
//! Serves a mirrored event with a freshly resolved stream URL, caching the
//! URL on the event row. Falls back to the cached URL when resolution fails.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::resolver::StreamResolver;
use crate::database::models::{EventDbModel, NO_STREAM_CHANNEL};
use crate::database::repositories::EventRepository;

/// Event with its current stream URL.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventStream {
    pub event_id: String,
    pub name: String,
    pub event_type: String,
    /// `scores` from the upstream record.
    pub score: Option<Value>,
    pub streaming_channel: Option<String>,
    pub stream_url: Option<String>,
}

/// Counters for one bulk refresh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StreamRefreshReport {
    pub checked: usize,
    pub updated: usize,
    pub failed: usize,
}

pub struct EventStreamService {
    events: Arc<dyn EventRepository>,
    resolver: Arc<StreamResolver>,
}

impl EventStreamService {
    pub fn new(events: Arc<dyn EventRepository>, resolver: Arc<StreamResolver>) -> Self {
        Self { events, resolver }
    }

    /// Look up `event_id` and resolve a fresh stream URL for it.
    pub async fn event_stream(&self, event_id: &str) -> crate::Result<EventStream> {
        let event = self
            .events
            .find_by_id(event_id)
            .await?
            .ok_or_else(|| crate::Error::not_found("Event", event_id))?;

        let mut stream_url = event.stream_url.clone();

        match event.streamable_channel() {
            Some(channel) => {
                debug!(event_id, channel, "Resolving stream for event");
                if let Some(url) = self.resolve_and_store(&event, channel).await {
                    stream_url = Some(url);
                }
            }
            None if event.stream_channel.as_deref() == Some(NO_STREAM_CHANNEL) => {
                debug!(event_id, "Event has no stream");
            }
            None => {}
        }

        let raw = event.raw_payload_json();
        Ok(EventStream {
            score: raw.get("scores").cloned(),
            event_id: event.event_id,
            name: event.name,
            event_type: event.event_type,
            streaming_channel: event.stream_channel,
            stream_url,
        })
    }

    /// Re-resolve every event that has a stream channel.
    ///
    /// Runs the events one after another; a failure only skips that event.
    pub async fn refresh_streams(&self) -> crate::Result<StreamRefreshReport> {
        let events = self.events.list_with_stream_channel().await?;
        let mut report = StreamRefreshReport::default();

        for event in &events {
            let Some(channel) = event.streamable_channel() else {
                continue;
            };
            report.checked += 1;
            match self.resolve_and_store(event, channel).await {
                Some(_) => report.updated += 1,
                None => report.failed += 1,
            }
        }

        info!(
            checked = report.checked,
            updated = report.updated,
            failed = report.failed,
            "Stream refresh finished"
        );
        Ok(report)
    }

    /// Resolve `channel` and cache the URL on `event`. `None` when nothing
    /// usable came back.
    async fn resolve_and_store(&self, event: &EventDbModel, channel: &str) -> Option<String> {
        let payload = match self.resolver.resolve_stream(channel, true).await {
            Ok(payload) => payload,
            Err(e) => {
                warn!(event_id = %event.event_id, channel, error = %e, "Stream resolution failed");
                return None;
            }
        };

        let Some(url) = payload.streaming_url().map(str::to_string) else {
            warn!(event_id = %event.event_id, channel, "Stream locator returned no URL");
            return None;
        };

        match self.events.set_stream_url(&event.event_id, &url).await {
            Ok(true) => {}
            Ok(false) => debug!(event_id = %event.event_id, "Event pruned before stream URL was stored"),
            Err(e) => warn!(event_id = %event.event_id, error = %e, "Failed to store stream URL"),
        }
        Some(url)
    }
}
