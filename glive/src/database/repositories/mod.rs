//! Repository layer for database access.

pub mod credential_store;
pub mod event;

pub use credential_store::*;
pub use event::*;
