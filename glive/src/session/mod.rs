//! Session lifecycle management.
//!
//! Keeps one authenticated upstream session alive for the whole process:
//! a bearer token from the login exchange and the `JSESSIONID` cookie derived
//! from it.
//!
//! # Architecture
//!
//! - [`SessionProvider`]: the upstream exchanges (login, game locator, cookie)
//! - [`CredentialStore`]: durable `AUTH_TOKEN` / `COOKIE` records
//! - [`SingleFlight`]: collapses concurrent acquisitions into one
//! - [`SessionHealth`]: failure and success bookkeeping per credential
//! - [`SessionManager`]: owns the in-memory session and ties it all together

mod error;
mod flight;
mod manager;
mod provider;
mod store;
mod tracker;
mod types;

pub use error::SessionError;
pub use flight::SingleFlight;
pub use manager::{SessionManager, SessionStatus, WarmStart};
pub use provider::{LoginOutcome, SessionProvider};
pub use store::CredentialStore;
pub use tracker::{FailureInfo, SessionHealth};
pub use types::{AuthToken, CredentialKey, CredentialRecord, SessionCookie};

#[cfg(test)]
pub(crate) mod testing;
