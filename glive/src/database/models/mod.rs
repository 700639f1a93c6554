//! Database models.
//!
//! These models map directly to the database schema; JSON columns are kept
//! as text and decoded on demand.

pub mod credential;
pub mod event;

pub use credential::*;
pub use event::*;
