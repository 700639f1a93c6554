//! Core session types.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use exchange_api::{SESSION_COOKIE_NAME, extract_cookie_value};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Keys of the two persisted credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CredentialKey {
    #[serde(rename = "AUTH_TOKEN")]
    AuthToken,
    #[serde(rename = "COOKIE")]
    Cookie,
}

impl CredentialKey {
    /// Storage key.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthToken => "AUTH_TOKEN",
            Self::Cookie => "COOKIE",
        }
    }
}

impl fmt::Display for CredentialKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted credential.
#[derive(Debug, Clone, PartialEq)]
pub struct CredentialRecord {
    pub key: CredentialKey,
    pub value: Value,
    pub updated_at: DateTime<Utc>,
}

fn redact(value: &str) -> String {
    let prefix: String = value.chars().take(4).collect();
    format!("{prefix}…")
}

/// Bearer token from the login exchange.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(Arc<str>);

impl AuthToken {
    /// Wrap a token; `None` when it is blank.
    pub fn new(token: impl AsRef<str>) -> Option<Self> {
        let token = token.as_ref().trim();
        (!token.is_empty()).then(|| Self(Arc::from(token)))
    }

    /// Token held by a persisted `AUTH_TOKEN` value (the full login response).
    pub fn from_store_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Self::new(s),
            Value::Object(obj) => obj.get("token").and_then(Value::as_str).and_then(Self::new),
            _ => None,
        }
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AuthToken").field(&redact(&self.0)).finish()
    }
}

/// The upstream session cookie (`JSESSIONID`).
///
/// Holds the bare session id. The same id is the `queryPass` of the event
/// query and the `Authorization` value of the stream locator.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionCookie(Arc<str>);

impl SessionCookie {
    /// Wrap a bare session id; `None` when it is blank.
    pub fn new(id: impl AsRef<str>) -> Option<Self> {
        let id = id.as_ref().trim();
        (!id.is_empty()).then(|| Self(Arc::from(id)))
    }

    /// Parse either a bare id or a cookie string such as `JSESSIONID=abc; lang=en`.
    ///
    /// Session ids may themselves contain `=`, so only input that starts with
    /// the cookie name or holds several pairs is read as a cookie string.
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        let is_cookie_string = input.contains(';')
            || input
                .strip_prefix(SESSION_COOKIE_NAME)
                .is_some_and(|rest| rest.starts_with('='));
        if is_cookie_string {
            extract_cookie_value(input, SESSION_COOKIE_NAME).and_then(Self::new)
        } else {
            Self::new(input)
        }
    }

    /// Read a persisted `COOKIE` value: `{"value": id}`, possibly nested once
    /// more, or a plain cookie string.
    pub fn from_store_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Self::parse(s),
            Value::Object(obj) => match obj.get("value")? {
                Value::String(id) => Self::new(id),
                nested => Self::from_store_value(nested),
            },
            _ => None,
        }
    }

    pub fn to_store_value(&self) -> Value {
        json!({ "value": self.id() })
    }

    #[inline]
    pub fn id(&self) -> &str {
        &self.0
    }

    /// `Cookie` header form.
    pub fn header_value(&self) -> String {
        format!("{}={}", SESSION_COOKIE_NAME, self.0)
    }
}

impl fmt::Debug for SessionCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SessionCookie").field(&redact(&self.0)).finish()
    }
}
