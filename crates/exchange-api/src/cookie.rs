//! Cookie string and `Set-Cookie` helpers.

use reqwest::header::{HeaderMap, SET_COOKIE};

use crate::error::ExchangeError;

/// Name of the session cookie issued by the game server.
pub const SESSION_COOKIE_NAME: &str = "JSESSIONID";

/// Extract a specific cookie value from a cookie string.
///
/// # Example
/// ```
/// use exchange_api::extract_cookie_value;
///
/// let cookies = "JSESSIONID=abc.node1; lang=en";
/// assert_eq!(extract_cookie_value(cookies, "JSESSIONID"), Some("abc.node1".to_string()));
/// ```
pub fn extract_cookie_value(cookies: &str, name: &str) -> Option<String> {
    for cookie in cookies.split(';') {
        let parts: Vec<&str> = cookie.trim().splitn(2, '=').collect();
        if parts.len() == 2 && parts[0] == name {
            return Some(parts[1].to_string());
        }
    }
    None
}

/// Find the value of cookie `name` among the `Set-Cookie` response headers.
///
/// Returns `SessionHeaderMissing` when no header sets `name`, and
/// `InvalidSessionValue` when it is set to an empty value.
pub fn find_set_cookie(headers: &HeaderMap, name: &str) -> Result<String, ExchangeError> {
    for value in headers.get_all(SET_COOKIE) {
        let Ok(cookie_str) = value.to_str() else {
            continue;
        };

        // "name=value; Path=/; HttpOnly"
        let Some(kv) = cookie_str.split(';').next() else {
            continue;
        };
        let mut parts = kv.splitn(2, '=');
        let key = parts.next().unwrap_or_default().trim();
        if key != name {
            continue;
        }

        let value = parts.next().unwrap_or_default().trim();
        if value.is_empty() {
            return Err(ExchangeError::InvalidSessionValue);
        }
        return Ok(value.to_string());
    }

    Err(ExchangeError::SessionHeaderMissing)
}
