//! Stream locator.

use std::time::Duration;

use reqwest::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, AUTHORIZATION, COOKIE, ORIGIN, REFERER, USER_AGENT};
use serde_json::Value;
use tracing::{debug, instrument};
use url::Url;

use crate::client::FIREFOX_UA;
use crate::error::ExchangeError;

const STREAM_TIMEOUT: Duration = Duration::from_secs(15);

/// Body-level status code the locator uses for a rejected session.
const NOT_AUTHORIZED_STATUS: &str = "1001";
const NOT_AUTHORIZED_MSG: &str = "Not Authorized";

/// Origin the stream locator expects: the API host with its `bkqawscf.`
/// prefix swapped for `www.`.
fn stream_origin(stream_url: &str) -> Result<String, ExchangeError> {
    let parsed = Url::parse(stream_url).map_err(|e| ExchangeError::InvalidUrl(e.to_string()))?;
    Ok(parsed
        .origin()
        .ascii_serialization()
        .replace("bkqawscf.", "www."))
}

/// Resolve a stream for `match_id`.
///
/// The locator may answer HTTP 200 with an authorization failure in the body;
/// use [`is_not_authorized`] on the returned value.
#[instrument(skip(client, cookie_header, auth_token))]
pub async fn fetch_stream(
    client: &Client,
    stream_url: &str,
    match_id: &str,
    cookie_header: &str,
    auth_token: &str,
) -> Result<Value, ExchangeError> {
    let origin = stream_origin(stream_url)?;

    let response = client
        .post(stream_url)
        .header(ACCEPT, "application/json, text/plain, */*")
        .header(ACCEPT_LANGUAGE, "en-US,en;q=0.9")
        .header(AUTHORIZATION, auth_token)
        .header(COOKIE, cookie_header)
        .header(ORIGIN, origin.as_str())
        .header(REFERER, format!("{origin}/"))
        .header("Sec-Fetch-Dest", "empty")
        .header("Sec-Fetch-Mode", "cors")
        .header("Sec-Fetch-Site", "same-site")
        .header("source", "1")
        .header(USER_AGENT, FIREFOX_UA)
        .form(&[("matchId", match_id)])
        .timeout(STREAM_TIMEOUT)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(ExchangeError::Status {
            endpoint: "stream",
            status: status.as_u16(),
        });
    }

    let body: Value = response
        .json()
        .await
        .map_err(|e| ExchangeError::Parse(e.to_string()))?;

    debug!("Stream locator responded");
    Ok(body)
}

/// Whether a locator body reports a rejected session.
pub fn is_not_authorized(body: &Value) -> bool {
    let status_matches = match body.get("status") {
        Some(Value::String(s)) => s == NOT_AUTHORIZED_STATUS,
        Some(Value::Number(n)) => n.to_string() == NOT_AUTHORIZED_STATUS,
        _ => false,
    };

    status_matches
        || body.get("status_msg").and_then(Value::as_str) == Some(NOT_AUTHORIZED_MSG)
}
