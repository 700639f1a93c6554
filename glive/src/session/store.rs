//! Credential persistence abstraction.
//!
//! The SQL implementation lives in the database repository layer.

use async_trait::async_trait;
use serde_json::Value;

use super::error::SessionError;
use super::types::{CredentialKey, CredentialRecord};

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Last stored value for `key`, if any.
    async fn get(&self, key: CredentialKey) -> Result<Option<CredentialRecord>, SessionError>;

    /// Replace the value for `key` and stamp it with the current time.
    async fn upsert(&self, key: CredentialKey, value: &Value) -> Result<(), SessionError>;
}
