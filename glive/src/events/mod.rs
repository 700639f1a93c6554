//! Live event mirror.
//!
//! The upstream live-event list is the source of truth; [`EventReconciler`]
//! copies it into the local event table on every pass.

mod feed;
mod mapping;
mod reconciler;

pub use feed::EventFeed;
pub use mapping::{event_list, map_event, parse_open_date};
pub use reconciler::{EventReconciler, ReconcileOutcome, ReconcileReport};
