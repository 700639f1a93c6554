//! HTTP API.
//!
//! Stream lookups for players plus a few read-only diagnostics.

pub mod error;
pub mod routes;
pub mod server;

pub use error::{ApiError, ApiResult};
pub use server::{ApiServer, ApiServerConfig, AppState};

#[cfg(test)]
pub(crate) mod testing;
