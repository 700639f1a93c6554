//! glive library crate.
//!
//! Keeps an authenticated exchange session alive, mirrors the live-event
//! feed into SQLite and resolves stream URLs for the HTTP API.

pub mod api;
pub mod config;
pub mod database;
pub mod error;
pub mod events;
pub mod logging;
pub mod scheduler;
pub mod services;
pub mod session;
pub mod stream;
pub mod upstream;

pub use error::{Error, Result};
