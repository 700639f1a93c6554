//! Process configuration from environment variables.

use std::time::Duration;

use exchange_api::Account;

use crate::Result;
use crate::database::MaintenanceConfig;
use crate::error::Error;

/// Default live-event query endpoint.
pub const DEFAULT_INPLAY_URL: &str =
    "https://bxawscf.skyinplay.com/exchange/member/playerService/queryEvents";

const DEFAULT_DATABASE_URL: &str = "sqlite:glive.db?mode=rwc";
const DEFAULT_LOG_DIR: &str = "logs";

/// Upstream account and endpoints.
#[derive(Debug, Clone)]
pub struct ExchangeConfig {
    pub account: Account,
    pub login_url: String,
    pub game_url: String,
    pub stream_url: String,
    pub inplay_url: String,
    /// Origin of the betting site, sent as `Origin`/`Referer` on login and
    /// game location.
    pub site_origin: String,
}

/// Intervals for the background tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleConfig {
    /// Time between session renewals (default: 9 minutes).
    pub session_renewal: Duration,
    /// Pause between a new token and the cookie exchange (default: 5 seconds).
    pub session_settle: Duration,
    /// Time between reconcile passes (default: 1 minute).
    pub reconcile_interval: Duration,
    /// Time between bulk stream refreshes; `None` disables them.
    pub stream_refresh: Option<Duration>,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            session_renewal: Duration::from_secs(9 * 60),
            session_settle: Duration::from_secs(5),
            reconcile_interval: Duration::from_secs(60),
            stream_refresh: None,
        }
    }
}

/// Everything the service reads from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub log_dir: String,
    pub exchange: ExchangeConfig,
    pub schedule: ScheduleConfig,
    pub maintenance: MaintenanceConfig,
}

impl AppConfig {
    /// Load from the process environment.
    ///
    /// Environment variables:
    /// - `DATABASE_URL` (default: `sqlite:glive.db?mode=rwc`)
    /// - `LOG_DIR` (default: `logs`)
    /// - `EXCHANGE_ACCOUNT_ID`, `EXCHANGE_PASSWORD`, `EXCHANGE_COUNTRY_CODE` (required)
    /// - `EXCHANGE_LOGIN_URL`, `EXCHANGE_GAME_URL`, `EXCHANGE_STREAM_URL`,
    ///   `EXCHANGE_SITE_ORIGIN` (required)
    /// - `EXCHANGE_INPLAY_URL` (default: [`DEFAULT_INPLAY_URL`])
    /// - `SESSION_RENEWAL_SECS` (540), `SESSION_SETTLE_SECS` (5),
    ///   `RECONCILE_INTERVAL_SECS` (60), `STREAM_REFRESH_SECS` (unset or 0: off),
    ///   `EVENT_RETENTION_HOURS` (48)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using `lookup` as the variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &str| {
            get(key).ok_or_else(|| Error::config(format!("{key} must be set")))
        };
        let secs = |key: &str, default: u64| -> Result<u64> {
            match get(key) {
                Some(v) => v.trim().parse::<u64>().map_err(|_| {
                    Error::config(format!("{key} must be a whole number of seconds, got {v:?}"))
                }),
                None => Ok(default),
            }
        };

        let account = Account {
            account_id: required("EXCHANGE_ACCOUNT_ID")?,
            password: required("EXCHANGE_PASSWORD")?,
            country_code: required("EXCHANGE_COUNTRY_CODE")?,
        };

        let exchange = ExchangeConfig {
            account,
            login_url: required("EXCHANGE_LOGIN_URL")?,
            game_url: required("EXCHANGE_GAME_URL")?,
            stream_url: required("EXCHANGE_STREAM_URL")?,
            inplay_url: get("EXCHANGE_INPLAY_URL").unwrap_or_else(|| DEFAULT_INPLAY_URL.to_string()),
            site_origin: required("EXCHANGE_SITE_ORIGIN")?
                .trim_end_matches('/')
                .to_string(),
        };

        for (key, url) in [
            ("EXCHANGE_LOGIN_URL", &exchange.login_url),
            ("EXCHANGE_GAME_URL", &exchange.game_url),
            ("EXCHANGE_STREAM_URL", &exchange.stream_url),
            ("EXCHANGE_INPLAY_URL", &exchange.inplay_url),
            ("EXCHANGE_SITE_ORIGIN", &exchange.site_origin),
        ] {
            url::Url::parse(url)
                .map_err(|e| Error::config(format!("{key} is not a valid URL: {e}")))?;
        }

        let defaults = ScheduleConfig::default();
        let schedule = ScheduleConfig {
            session_renewal: Duration::from_secs(secs(
                "SESSION_RENEWAL_SECS",
                defaults.session_renewal.as_secs(),
            )?),
            session_settle: Duration::from_secs(secs(
                "SESSION_SETTLE_SECS",
                defaults.session_settle.as_secs(),
            )?),
            reconcile_interval: Duration::from_secs(secs(
                "RECONCILE_INTERVAL_SECS",
                defaults.reconcile_interval.as_secs(),
            )?),
            stream_refresh: match secs("STREAM_REFRESH_SECS", 0)? {
                0 => None,
                n => Some(Duration::from_secs(n)),
            },
        };

        if schedule.session_renewal.is_zero() || schedule.reconcile_interval.is_zero() {
            return Err(Error::config(
                "SESSION_RENEWAL_SECS and RECONCILE_INTERVAL_SECS must be positive",
            ));
        }

        let mut maintenance = MaintenanceConfig::default();
        let retention_hours = secs("EVENT_RETENTION_HOURS", 48)?;
        if retention_hours == 0 {
            return Err(Error::config("EVENT_RETENTION_HOURS must be positive"));
        }
        maintenance.event_retention = Duration::from_secs(retention_hours * 3600);

        Ok(Self {
            database_url: get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            log_dir: get("LOG_DIR").unwrap_or_else(|| DEFAULT_LOG_DIR.to_string()),
            exchange,
            schedule,
            maintenance,
        })
    }
}
