//! HTTP client construction.

use std::sync::OnceLock;
use std::time::Duration;

use reqwest::{Client, ClientBuilder, redirect};
use tracing::debug;

use crate::error::ExchangeError;

/// Chrome user agent used for the game-locator and session endpoints.
pub const DEFAULT_UA: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 Chrome/120 Safari/537.36";

/// Short user agent accepted by the login endpoint.
pub const LOGIN_UA: &str = "Mozilla/5.0 Chrome/120";

/// Firefox user agent expected by the stream locator.
pub const FIREFOX_UA: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:147.0) Gecko/20100101 Firefox/147.0";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Install the process-wide rustls crypto provider once.
pub fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            // Another crate got there first.
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

/// Base builder shared by every exchange client.
///
/// Individual requests still set their own, tighter timeouts.
pub fn create_client_builder() -> ClientBuilder {
    install_rustls_provider();

    Client::builder()
        .user_agent(DEFAULT_UA)
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(REQUEST_TIMEOUT)
}

/// Client for the login, event and stream endpoints.
pub fn create_client() -> Result<Client, ExchangeError> {
    Ok(create_client_builder().build()?)
}

/// Client for the session-cookie exchange.
///
/// Redirects are never followed: the cookie lives on the first response.
pub fn create_session_client() -> Result<Client, ExchangeError> {
    Ok(create_client_builder()
        .redirect(redirect::Policy::none())
        .build()?)
}
