//! Session health bookkeeping.
//!
//! Records consecutive failures and the last success per credential, plus a
//! running count of credential-store failures. Store errors never fail a
//! session operation, so this is where they become visible.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;

use super::types::CredentialKey;

#[derive(Clone)]
struct FailureRecord {
    count: u32,
    first_failure: DateTime<Utc>,
    last_failure: DateTime<Utc>,
    last_error: String,
}

/// Failure and success tracking for the session credentials.
pub struct SessionHealth {
    failures: DashMap<CredentialKey, FailureRecord>,
    last_success: DashMap<CredentialKey, DateTime<Utc>>,
    store_failures: AtomicU64,
}

impl SessionHealth {
    pub fn new() -> Self {
        Self {
            failures: DashMap::new(),
            last_success: DashMap::new(),
            store_failures: AtomicU64::new(0),
        }
    }

    /// Record a failure and return the updated consecutive count.
    pub fn record_failure(&self, key: CredentialKey, error: &str) -> u32 {
        let now = Utc::now();

        let mut entry = self.failures.entry(key).or_insert(FailureRecord {
            count: 0,
            first_failure: now,
            last_failure: now,
            last_error: String::new(),
        });

        entry.count += 1;
        entry.last_failure = now;
        entry.last_error = error.to_string();

        entry.count
    }

    /// Clear failures and stamp the success time.
    pub fn record_success(&self, key: CredentialKey) {
        self.failures.remove(&key);
        self.last_success.insert(key, Utc::now());
    }

    /// Count a credential-store failure and return the running total.
    pub fn record_store_failure(&self) -> u64 {
        self.store_failures.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn failure_count(&self, key: CredentialKey) -> u32 {
        self.failures.get(&key).map(|r| r.count).unwrap_or(0)
    }

    pub fn failure_info(&self, key: CredentialKey) -> Option<FailureInfo> {
        self.failures.get(&key).map(|r| FailureInfo {
            count: r.count,
            first_failure: r.first_failure,
            last_failure: r.last_failure,
            last_error: r.last_error.clone(),
        })
    }

    pub fn last_success(&self, key: CredentialKey) -> Option<DateTime<Utc>> {
        self.last_success.get(&key).map(|t| *t)
    }

    pub fn store_failures(&self) -> u64 {
        self.store_failures.load(Ordering::Relaxed)
    }
}

impl Default for SessionHealth {
    fn default() -> Self {
        Self::new()
    }
}

/// Consecutive failures of one credential.
#[derive(Debug, Clone, Serialize)]
pub struct FailureInfo {
    /// Number of consecutive failures.
    pub count: u32,
    /// Time of first failure in this sequence.
    pub first_failure: DateTime<Utc>,
    /// Time of most recent failure.
    pub last_failure: DateTime<Utc>,
    /// Error message from last failure.
    pub last_error: String,
}
