//! Live ("in-play") event listing.

use std::time::Duration;

use reqwest::Client;
use reqwest::header::{ACCEPT, COOKIE, ORIGIN, REFERER, USER_AGENT};
use serde_json::Value;
use tracing::{debug, instrument};
use url::Url;

use crate::error::ExchangeError;

const INPLAY_TIMEOUT: Duration = Duration::from_secs(20);
const INPLAY_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64)";
const INPLAY_PAGE: &str = "/exchange/member/inplay";

/// Query the live events visible to the session.
///
/// The body is returned untouched; validating its shape is up to the caller.
#[instrument(skip(client, cookie_header, query_pass))]
pub async fn query_events(
    client: &Client,
    inplay_url: &str,
    cookie_header: &str,
    query_pass: &str,
) -> Result<Value, ExchangeError> {
    let parsed = Url::parse(inplay_url).map_err(|e| ExchangeError::InvalidUrl(e.to_string()))?;
    let origin = parsed.origin().ascii_serialization();

    let form = [
        ("type", "inplay"),
        ("eventType", "-1"),
        ("eventTs", "-1"),
        ("marketTs", "-1"),
        ("selectionTs", "-1"),
        ("collectEventIds", ""),
        ("queryPass", query_pass),
    ];

    let response = client
        .post(inplay_url)
        .header(ACCEPT, "application/json, text/javascript, */*; q=0.01")
        .header(ORIGIN, origin.as_str())
        .header(REFERER, format!("{origin}{INPLAY_PAGE}"))
        .header(USER_AGENT, INPLAY_UA)
        .header("X-Requested-With", "XMLHttpRequest")
        .header(COOKIE, cookie_header)
        .form(&form)
        .timeout(INPLAY_TIMEOUT)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(ExchangeError::Status {
            endpoint: "inplay",
            status: status.as_u16(),
        });
    }

    let body: Value = response
        .json()
        .await
        .map_err(|e| ExchangeError::Parse(e.to_string()))?;

    debug!("In-play events fetched");
    Ok(body)
}
