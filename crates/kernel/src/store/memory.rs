//! In-process storage for development and tests.

use std::collections::{BTreeMap, HashMap, HashSet};

use anyhow::{Result, bail};
use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use super::credentials::{hash_password, verify_password};
use super::{
    AdminRecord, AdminStore, EMAIL_FIELD, PASSWORD_FIELD, Record, RecordFields, RecordId,
    RecordStore,
};

#[derive(Default)]
struct RecordTable {
    last_id: RecordId,
    records: BTreeMap<RecordId, RecordFields>,
    emails: HashSet<String>,
}

/// Registration storage held in memory.
///
/// Mirrors the Redis layout: ids are never reused, and the email set is
/// updated together with the record under one lock.
#[derive(Default)]
pub struct MemoryRecordStore {
    table: Mutex<RecordTable>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn record_exists(&self, email: &str) -> Result<bool> {
        Ok(self.table.lock().emails.contains(email))
    }

    async fn add_record(&self, fields: &RecordFields) -> Result<RecordId> {
        let mut table = self.table.lock();
        table.last_id += 1;
        let id = table.last_id;

        if let Some(email) = fields.get(EMAIL_FIELD) {
            table.emails.insert(email.clone());
        }
        table.records.insert(id, fields.clone());

        debug!(id, "record added");
        Ok(id)
    }

    async fn update_record(&self, id: RecordId, fields: &RecordFields) -> Result<()> {
        let mut table = self.table.lock();

        let Some(previous) = table.records.get(&id) else {
            bail!("record {id} does not exist");
        };

        if let Some(email) = previous.get(EMAIL_FIELD).cloned() {
            table.emails.remove(&email);
        }
        if let Some(email) = fields.get(EMAIL_FIELD) {
            table.emails.insert(email.clone());
        }
        table.records.insert(id, fields.clone());

        debug!(id, "record updated");
        Ok(())
    }

    async fn delete_record(&self, id: RecordId) -> Result<()> {
        let mut table = self.table.lock();

        let removed_email = table
            .records
            .remove(&id)
            .and_then(|mut removed| removed.remove(EMAIL_FIELD));
        if let Some(email) = removed_email {
            table.emails.remove(&email);
        }

        debug!(id, "record deleted");
        Ok(())
    }

    async fn get_record(&self, id: RecordId) -> Result<Option<RecordFields>> {
        Ok(self.table.lock().records.get(&id).cloned())
    }

    async fn get_all_records(&self) -> Result<Vec<Record>> {
        let table = self.table.lock();

        Ok(table
            .records
            .iter()
            .rev()
            .map(|(&id, fields)| Record {
                id,
                fields: fields.clone(),
            })
            .collect())
    }
}

/// Admin storage held in memory.
#[derive(Default)]
pub struct MemoryAdminStore {
    admins: Mutex<HashMap<String, RecordFields>>,
}

impl MemoryAdminStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an admin whose password is stored as given.
    pub fn with_admin(self, username: &str, password: &str) -> Self {
        self.admins.lock().insert(
            username.to_string(),
            RecordFields::from([(PASSWORD_FIELD.to_string(), password.to_string())]),
        );
        self
    }
}

#[async_trait]
impl AdminStore for MemoryAdminStore {
    async fn get_admin_record(&self, username: &str) -> Result<Option<AdminRecord>> {
        let stored = self.admins.lock().get(username).cloned();
        Ok(stored.map(|stored| AdminRecord::from_stored(username, stored)))
    }

    async fn credentials_valid(&self, username: &str, password: &str) -> Result<bool> {
        let stored = self
            .admins
            .lock()
            .get(username)
            .and_then(|attrs| attrs.get(PASSWORD_FIELD).cloned());

        Ok(stored.is_some_and(|stored| verify_password(&stored, password)))
    }

    async fn add_admin(
        &self,
        username: &str,
        password: &str,
        attributes: &RecordFields,
    ) -> Result<()> {
        let hash = hash_password(password)?;

        let mut stored = attributes.clone();
        stored.insert(PASSWORD_FIELD.to_string(), hash);
        self.admins.lock().insert(username.to_string(), stored);

        Ok(())
    }
}
