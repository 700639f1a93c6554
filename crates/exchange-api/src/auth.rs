//! Login, game-server location and session-cookie exchange.

use std::fmt;
use std::time::Duration;

use reqwest::Client;
use reqwest::header::{AUTHORIZATION, ORIGIN, REFERER, USER_AGENT};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::client::{DEFAULT_UA, LOGIN_UA};
use crate::cookie::{SESSION_COOKIE_NAME, find_set_cookie};
use crate::error::ExchangeError;

const LOGIN_TIMEOUT: Duration = Duration::from_secs(15);
const GAME_LOCATOR_TIMEOUT: Duration = Duration::from_secs(15);
const SESSION_TIMEOUT: Duration = Duration::from_secs(20);

/// Account used for the credential exchange.
#[derive(Clone)]
pub struct Account {
    pub account_id: String,
    pub password: String,
    pub country_code: String,
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("account_id", &self.account_id)
            .field("password", &"<redacted>")
            .field("country_code", &self.country_code)
            .finish()
    }
}

/// Successful login response.
#[derive(Debug, Clone)]
pub struct LoginGrant {
    /// Bearer token for the game locator.
    pub token: String,
    /// Full response body, persisted as-is.
    pub raw: Value,
}

/// Redirect target returned by the game locator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameLocation {
    pub url: String,
    pub params: Vec<(String, String)>,
}

fn referer_for(origin: &str) -> String {
    format!("{}/", origin.trim_end_matches('/'))
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Exchange account credentials for a bearer token.
#[instrument(skip(client, account), fields(account_id = %account.account_id))]
pub async fn login(
    client: &Client,
    login_url: &str,
    site_origin: &str,
    account: &Account,
) -> Result<LoginGrant, ExchangeError> {
    let form = [
        ("account_id", account.account_id.as_str()),
        ("password", account.password.as_str()),
        ("verify_token", ""),
        ("country_code", account.country_code.as_str()),
    ];

    let response = client
        .post(login_url)
        .header(USER_AGENT, LOGIN_UA)
        .header(ORIGIN, site_origin)
        .header(REFERER, referer_for(site_origin))
        .form(&form)
        .timeout(LOGIN_TIMEOUT)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(ExchangeError::Status {
            endpoint: "login",
            status: status.as_u16(),
        });
    }

    let body: Value = response
        .json()
        .await
        .map_err(|e| ExchangeError::Parse(e.to_string()))?;

    let token = body
        .get("token")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .ok_or(ExchangeError::MissingField("token"))?
        .to_string();

    debug!("Login succeeded");
    Ok(LoginGrant { token, raw: body })
}

/// Ask the game locator where to open a session.
#[instrument(skip(client, token))]
pub async fn locate_game(
    client: &Client,
    game_url: &str,
    site_origin: &str,
    token: &str,
) -> Result<GameLocation, ExchangeError> {
    let response = client
        .get(game_url)
        .header(AUTHORIZATION, token)
        .header(ORIGIN, site_origin)
        .header(REFERER, referer_for(site_origin))
        .header(USER_AGENT, DEFAULT_UA)
        .timeout(GAME_LOCATOR_TIMEOUT)
        .send()
        .await?;

    let status = response.status();
    if status.as_u16() != 200 {
        return Err(ExchangeError::Status {
            endpoint: "game_locator",
            status: status.as_u16(),
        });
    }

    let body: Value = response
        .json()
        .await
        .map_err(|e| ExchangeError::Parse(e.to_string()))?;

    let data = body.get("data").ok_or(ExchangeError::MissingField("data"))?;
    let url = data
        .get("url")
        .and_then(Value::as_str)
        .filter(|u| !u.is_empty())
        .ok_or(ExchangeError::MissingField("data.url"))?
        .to_string();

    let params = data
        .get("params")
        .and_then(Value::as_object)
        .map(|obj| {
            obj.iter()
                .map(|(k, v)| (k.clone(), stringify(v)))
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    debug!(target_url = %url, param_count = params.len(), "Game server located");
    Ok(GameLocation { url, params })
}

/// Post the locator parameters to the game server and return the session id.
///
/// `client` must not follow redirects; see [`crate::create_session_client`].
#[instrument(skip(client, location), fields(target_url = %location.url))]
pub async fn open_session(
    client: &Client,
    location: &GameLocation,
) -> Result<String, ExchangeError> {
    let response = client
        .post(&location.url)
        .header(USER_AGENT, DEFAULT_UA)
        .form(&location.params)
        .timeout(SESSION_TIMEOUT)
        .send()
        .await?;

    let status = response.status();
    if !(status.is_success() || status.is_redirection()) {
        return Err(ExchangeError::Status {
            endpoint: "session",
            status: status.as_u16(),
        });
    }

    let session_id = find_set_cookie(response.headers(), SESSION_COOKIE_NAME)?;
    debug!(status = status.as_u16(), "Session cookie issued");
    Ok(session_id)
}
