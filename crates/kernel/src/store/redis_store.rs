//! Redis-backed record and admin storage.
//!
//! Key layout:
//! - `records:` counter holding the last issued record id
//! - `records:<id>` hash per registration
//! - `emails` set of every stored registration email
//! - `admin:<username>` hash per admin, including a `password` attribute

use std::sync::LazyLock;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client as RedisClient, Script};
use tracing::{debug, info};

use super::credentials::{hash_password, verify_password};
use super::{
    AdminRecord, AdminStore, EMAIL_FIELD, PASSWORD_FIELD, Record, RecordFields, RecordId,
    RecordStore,
};

/// Counter key for record ids.
const RECORD_COUNTER_KEY: &str = "records:";

/// Set of registered emails.
const EMAIL_SET_KEY: &str = "emails";

fn record_key(id: RecordId) -> String {
    format!("records:{id}")
}

fn admin_key(username: &str) -> String {
    format!("admin:{username}")
}

/// Replace an existing record and move its email in the email set.
///
/// KEYS: record hash, email set. ARGV: email field name, new email (may be
/// empty), then field/value pairs. Returns 0 when the record does not exist.
static UPDATE_SCRIPT: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r"
        if redis.call('EXISTS', KEYS[1]) == 0 then
            return 0
        end
        local previous = redis.call('HGET', KEYS[1], ARGV[1])
        redis.call('DEL', KEYS[1])
        if #ARGV > 2 then
            redis.call('HSET', KEYS[1], unpack(ARGV, 3))
        end
        if previous then
            redis.call('SREM', KEYS[2], previous)
        end
        if ARGV[2] ~= '' then
            redis.call('SADD', KEYS[2], ARGV[2])
        end
        return 1
        ",
    )
});

/// Remove a record and its email. KEYS: record hash, email set. ARGV: email
/// field name.
static DELETE_SCRIPT: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r"
        local previous = redis.call('HGET', KEYS[1], ARGV[1])
        if previous then
            redis.call('SREM', KEYS[2], previous)
        end
        return redis.call('DEL', KEYS[1])
        ",
    )
});

/// Open a multiplexed connection.
async fn connect(redis: &RedisClient) -> Result<MultiplexedConnection> {
    redis
        .get_multiplexed_async_connection()
        .await
        .context("failed to get Redis connection")
}

/// Write a fresh record's hash and email membership in one transaction.
async fn insert_record(
    conn: &mut MultiplexedConnection,
    id: RecordId,
    fields: &RecordFields,
) -> Result<()> {
    let key = record_key(id);
    let items: Vec<(&str, &str)> = fields
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();

    let mut pipe = redis::pipe();
    pipe.atomic().del(&key).ignore();
    if !items.is_empty() {
        pipe.hset_multiple(&key, items.as_slice()).ignore();
    }
    if let Some(email) = fields.get(EMAIL_FIELD) {
        pipe.sadd(EMAIL_SET_KEY, email).ignore();
    }

    pipe.query_async::<()>(conn)
        .await
        .context("failed to write record")?;

    Ok(())
}

/// Registration storage in Redis.
#[derive(Clone)]
pub struct RedisRecordStore {
    redis: RedisClient,
}

impl RedisRecordStore {
    /// Create a new Redis record store.
    pub fn new(redis: RedisClient) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl RecordStore for RedisRecordStore {
    async fn record_exists(&self, email: &str) -> Result<bool> {
        let mut conn = connect(&self.redis).await?;

        let exists: bool = conn
            .sismember(EMAIL_SET_KEY, email)
            .await
            .context("failed to check email set")?;

        Ok(exists)
    }

    async fn add_record(&self, fields: &RecordFields) -> Result<RecordId> {
        let mut conn = connect(&self.redis).await?;

        let id: RecordId = conn
            .incr(RECORD_COUNTER_KEY, 1)
            .await
            .context("failed to allocate record id")?;

        insert_record(&mut conn, id, fields).await?;

        debug!(id, "record added");
        Ok(id)
    }

    async fn update_record(&self, id: RecordId, fields: &RecordFields) -> Result<()> {
        let mut conn = connect(&self.redis).await?;

        let mut invocation = UPDATE_SCRIPT.prepare_invoke();
        invocation
            .key(record_key(id))
            .key(EMAIL_SET_KEY)
            .arg(EMAIL_FIELD)
            .arg(fields.get(EMAIL_FIELD).map(String::as_str).unwrap_or_default());
        for (field, value) in fields {
            invocation.arg(field).arg(value);
        }

        let updated: bool = invocation
            .invoke_async(&mut conn)
            .await
            .context("failed to update record")?;
        if !updated {
            bail!("record {id} does not exist");
        }

        debug!(id, "record updated");
        Ok(())
    }

    async fn delete_record(&self, id: RecordId) -> Result<()> {
        let mut conn = connect(&self.redis).await?;

        let deleted: bool = DELETE_SCRIPT
            .key(record_key(id))
            .key(EMAIL_SET_KEY)
            .arg(EMAIL_FIELD)
            .invoke_async(&mut conn)
            .await
            .context("failed to delete record")?;

        debug!(id, deleted, "record deleted");
        Ok(())
    }

    async fn get_record(&self, id: RecordId) -> Result<Option<RecordFields>> {
        let mut conn = connect(&self.redis).await?;

        let fields: RecordFields = conn
            .hgetall(record_key(id))
            .await
            .context("failed to fetch record")?;

        Ok((!fields.is_empty()).then_some(fields))
    }

    async fn get_all_records(&self) -> Result<Vec<Record>> {
        let mut conn = connect(&self.redis).await?;

        let last_id: Option<RecordId> = conn
            .get(RECORD_COUNTER_KEY)
            .await
            .context("failed to read record counter")?;

        let Some(last_id) = last_id.filter(|&n| n > 0) else {
            return Ok(Vec::new());
        };

        let mut pipe = redis::pipe();
        for id in 1..=last_id {
            pipe.hgetall(record_key(id));
        }
        let all: Vec<RecordFields> = pipe
            .query_async(&mut conn)
            .await
            .context("failed to fetch records")?;

        let mut records: Vec<Record> = (1..=last_id)
            .zip(all)
            .filter(|(_, fields)| !fields.is_empty())
            .map(|(id, fields)| Record { id, fields })
            .collect();
        records.reverse();

        Ok(records)
    }
}

/// Admin credential storage in Redis.
#[derive(Clone)]
pub struct RedisAdminStore {
    redis: RedisClient,
}

impl RedisAdminStore {
    /// Create a new Redis admin store.
    pub fn new(redis: RedisClient) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl AdminStore for RedisAdminStore {
    async fn get_admin_record(&self, username: &str) -> Result<Option<AdminRecord>> {
        let mut conn = connect(&self.redis).await?;

        let stored: RecordFields = conn
            .hgetall(admin_key(username))
            .await
            .context("failed to fetch admin record")?;

        if stored.is_empty() {
            return Ok(None);
        }

        Ok(Some(AdminRecord::from_stored(username, stored)))
    }

    async fn credentials_valid(&self, username: &str, password: &str) -> Result<bool> {
        let mut conn = connect(&self.redis).await?;

        let stored: Option<String> = conn
            .hget(admin_key(username), PASSWORD_FIELD)
            .await
            .context("failed to fetch admin password")?;

        Ok(stored.is_some_and(|stored| verify_password(&stored, password)))
    }

    async fn add_admin(
        &self,
        username: &str,
        password: &str,
        attributes: &RecordFields,
    ) -> Result<()> {
        let hash = hash_password(password)?;
        let mut conn = connect(&self.redis).await?;

        let mut items: Vec<(&str, &str)> = attributes
            .iter()
            .filter(|(k, _)| k.as_str() != PASSWORD_FIELD)
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        items.push((PASSWORD_FIELD, hash.as_str()));

        conn.hset_multiple::<_, _, _, ()>(admin_key(username), items.as_slice())
            .await
            .context("failed to store admin record")?;

        info!(username = %username, "admin stored");
        Ok(())
    }
}
