//! Registration and admin storage.
//!
//! Provides traits and implementations for keeping records in Redis or in
//! process memory. Both backends share the same semantics:
//! - Record ids come from a counter starting at 1
//! - Every stored record's email is kept in a set for duplicate checks
//! - Listing returns the most recent record first

mod credentials;
mod memory;
mod redis_store;

use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::form::FormValues;

pub use credentials::{hash_password, verify_password};
pub use memory::{MemoryAdminStore, MemoryRecordStore};
pub use redis_store::{RedisAdminStore, RedisRecordStore};

/// Record identifier (the `index` shown to admins).
pub type RecordId = u64;

/// Stored attributes of a record.
pub type RecordFields = BTreeMap<String, String>;

/// Attribute under which the unique email is stored.
pub const EMAIL_FIELD: &str = "email";

/// Attribute holding an admin's password (plaintext or Argon2 hash).
pub const PASSWORD_FIELD: &str = "password";

/// A stored registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record {
    #[serde(rename = "index")]
    pub id: RecordId,

    #[serde(flatten)]
    pub fields: RecordFields,
}

/// An admin's stored attributes, without the password.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdminRecord {
    pub username: String,

    #[serde(flatten)]
    pub attributes: RecordFields,
}

impl AdminRecord {
    pub(crate) fn from_stored(username: &str, mut attributes: RecordFields) -> Self {
        attributes.remove(PASSWORD_FIELD);
        Self {
            username: username.to_string(),
            attributes,
        }
    }
}

/// Registration record storage.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Check whether a record with this email exists.
    async fn record_exists(&self, email: &str) -> Result<bool>;

    /// Store a new record and return its id.
    async fn add_record(&self, fields: &RecordFields) -> Result<RecordId>;

    /// Replace an existing record's fields.
    async fn update_record(&self, id: RecordId, fields: &RecordFields) -> Result<()>;

    /// Delete a record. Deleting a missing record is a no-op.
    async fn delete_record(&self, id: RecordId) -> Result<()>;

    /// Fetch a record's fields.
    async fn get_record(&self, id: RecordId) -> Result<Option<RecordFields>>;

    /// List all records, most recent first.
    async fn get_all_records(&self) -> Result<Vec<Record>>;
}

/// Admin credential storage.
#[async_trait]
pub trait AdminStore: Send + Sync {
    /// Fetch an admin's attributes.
    async fn get_admin_record(&self, username: &str) -> Result<Option<AdminRecord>>;

    /// Check a username/password pair.
    async fn credentials_valid(&self, username: &str, password: &str) -> Result<bool>;

    /// Create or replace an admin. The password is stored as an Argon2 hash.
    async fn add_admin(&self, username: &str, password: &str, attributes: &RecordFields)
    -> Result<()>;
}

/// Flatten validated form values into storable record fields.
pub fn record_fields(values: &FormValues) -> RecordFields {
    values
        .iter()
        .map(|(key, value)| {
            let text = match value {
                Value::String(s) => s.clone(),
                Value::Null => String::new(),
                Value::Array(items) => items
                    .iter()
                    .map(|item| item.as_str().map_or_else(|| item.to_string(), str::to_string))
                    .collect::<Vec<_>>()
                    .join(", "),
                other => other.to_string(),
            };
            (key.clone(), text)
        })
        .collect()
}
