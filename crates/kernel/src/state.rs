//! Application state shared across all handlers.

use std::sync::Arc;

use anyhow::{Context, Result};
use redis::Client as RedisClient;
use tracing::{info, warn};

use crate::config::{Config, StoreBackend};
use crate::form::Form;
use crate::forms::{login_form, signup_form};
use crate::store::{
    AdminStore, MemoryAdminStore, MemoryRecordStore, RecordStore, RedisAdminStore,
    RedisRecordStore,
};
use crate::theme::ThemeEngine;

/// Shared application state.
///
/// Wrapped in Arc internally so Clone is cheap.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Registration storage.
    records: Arc<dyn RecordStore>,

    /// Admin credential storage.
    admins: Arc<dyn AdminStore>,

    /// Theme engine for template rendering.
    theme: ThemeEngine,

    /// Public signup form, built once.
    signup_form: Form,

    /// Admin login form, built once.
    login_form: Form,

    /// Configuration the state was built from.
    config: Config,
}

impl AppState {
    /// Create new application state for the configured backend.
    pub async fn new(config: &Config) -> Result<Self> {
        let theme = ThemeEngine::new(&config.templates_dir)?;

        let (records, admins): (Arc<dyn RecordStore>, Arc<dyn AdminStore>) =
            match config.store_backend {
                StoreBackend::Redis => {
                    info!("connecting to Redis");
                    let redis =
                        RedisClient::open(config.redis_url.as_str()).context("invalid REDIS_URL")?;
                    (
                        Arc::new(RedisRecordStore::new(redis.clone())),
                        Arc::new(RedisAdminStore::new(redis)),
                    )
                }
                StoreBackend::Memory => {
                    let admins = match (&config.admin_username, &config.admin_password) {
                        (Some(username), Some(password)) => {
                            info!(username = %username, "seeding memory admin");
                            MemoryAdminStore::new().with_admin(username, password)
                        }
                        _ => {
                            warn!("memory backend without ADMIN_USERNAME/ADMIN_PASSWORD");
                            MemoryAdminStore::new()
                        }
                    };
                    (Arc::new(MemoryRecordStore::new()), Arc::new(admins))
                }
            };

        Self::from_parts(records, admins, theme, config.clone())
    }

    /// Assemble state from already-built parts.
    pub fn from_parts(
        records: Arc<dyn RecordStore>,
        admins: Arc<dyn AdminStore>,
        theme: ThemeEngine,
        config: Config,
    ) -> Result<Self> {
        let signup_form = signup_form(records.clone()).context("invalid signup form")?;
        let login_form = login_form(admins.clone()).context("invalid login form")?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                records,
                admins,
                theme,
                signup_form,
                login_form,
                config,
            }),
        })
    }

    /// Get the record store.
    pub fn records(&self) -> &Arc<dyn RecordStore> {
        &self.inner.records
    }

    /// Get the admin store.
    pub fn admins(&self) -> &Arc<dyn AdminStore> {
        &self.inner.admins
    }

    /// Get the theme engine.
    pub fn theme(&self) -> &ThemeEngine {
        &self.inner.theme
    }

    pub fn signup_form(&self) -> &Form {
        &self.inner.signup_form
    }

    pub fn login_form(&self) -> &Form {
        &self.inner.login_form
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }
}
