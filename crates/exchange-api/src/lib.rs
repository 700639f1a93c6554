//! Protocol client for the exchange endpoints.
//!
//! The exchange exposes a small set of endpoints that together yield a
//! playable stream URL for a live event:
//!
//! 1. [`auth::login`] trades account credentials for a bearer token.
//! 2. [`auth::locate_game`] turns the token into a game-server redirect target.
//! 3. [`auth::open_session`] posts to that target and reads the `JSESSIONID`
//!    cookie from the (non-followed) response.
//! 4. [`inplay::query_events`] lists the live events using the session.
//! 5. [`stream::fetch_stream`] resolves a stream URL for a single event.
//!
//! Nothing here keeps state; callers own caching, persistence and retries.

pub mod auth;
pub mod client;
pub mod cookie;
pub mod error;
pub mod inplay;
pub mod stream;

pub use auth::{Account, GameLocation, LoginGrant, locate_game, login, open_session};
pub use client::{create_client, create_client_builder, create_session_client};
pub use cookie::{SESSION_COOKIE_NAME, extract_cookie_value, find_set_cookie};
pub use error::ExchangeError;
pub use inplay::query_events;
pub use stream::{fetch_stream, is_not_authorized};
