//! Stream resolution.
//!
//! [`StreamResolver`] turns a stream channel into a playable URL using the
//! current session; [`EventStreamService`] serves mirrored events with that
//! URL attached.

mod resolver;
mod service;

pub use resolver::{Attempt, StreamLocator, StreamPayload, StreamResolver};
pub use service::{EventStream, EventStreamService, StreamRefreshReport};
