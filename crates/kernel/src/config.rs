//! Configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result, bail};

/// Minimum length of the session signing secret, in bytes.
pub const MIN_SESSION_SECRET_LEN: usize = 64;

/// Default `Cache-Control` header sent with every response.
pub const DEFAULT_CACHE_CONTROL: &str = "no-cache, no-store, must-revalidate";

/// Redis URL used when `REDIS_URL` is unset.
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";

/// Redis connection URL from `REDIS_URL`, or the local default.
pub fn redis_url_from_env() -> String {
    env::var("REDIS_URL").unwrap_or_else(|_| DEFAULT_REDIS_URL.to_string())
}

/// Where registrations, admins and sessions live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Redis,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "redis" => Ok(Self::Redis),
            "memory" => Ok(Self::Memory),
            other => bail!("unknown store backend: {other}"),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port (default: 5000).
    pub port: u16,

    /// Redis connection URL.
    pub redis_url: String,

    /// Storage backend (default: redis).
    pub store_backend: StoreBackend,

    /// Path to the Tera templates (default: ./templates).
    pub templates_dir: PathBuf,

    /// Secret used to sign the session cookie.
    pub session_secret: String,

    /// Cookie SameSite policy: "strict", "lax", or "none" (default: "strict").
    pub cookie_same_site: String,

    /// Only send the session cookie over HTTPS (default: true).
    pub cookie_secure: bool,

    /// Value of the `Cache-Control` response header.
    pub cache_control: String,

    /// Admin seeded into the memory backend.
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let port = env::var("PORT")
            .unwrap_or_else(|_| "5000".to_string())
            .parse()
            .context("PORT must be a valid u16")?;

        let redis_url = redis_url_from_env();

        let store_backend = env::var("STORE_BACKEND")
            .unwrap_or_else(|_| "redis".to_string())
            .parse()
            .context("STORE_BACKEND must be \"redis\" or \"memory\"")?;

        let templates_dir = env::var("TEMPLATES_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./templates"));

        let session_secret = env::var("SESSION_SECRET")
            .context("SESSION_SECRET environment variable is required")?;
        if session_secret.len() < MIN_SESSION_SECRET_LEN {
            bail!("SESSION_SECRET must be at least {MIN_SESSION_SECRET_LEN} bytes");
        }

        let cookie_same_site = env::var("COOKIE_SAME_SITE")
            .unwrap_or_else(|_| "strict".to_string())
            .to_lowercase();

        let cookie_secure = env::var("COOKIE_SECURE")
            .unwrap_or_else(|_| "true".to_string())
            .parse()
            .context("COOKIE_SECURE must be true or false")?;

        let cache_control =
            env::var("CACHE_CONTROL").unwrap_or_else(|_| DEFAULT_CACHE_CONTROL.to_string());

        let admin_username = env::var("ADMIN_USERNAME").ok();
        let admin_password = env::var("ADMIN_PASSWORD").ok();

        Ok(Self {
            port,
            redis_url,
            store_backend,
            templates_dir,
            session_secret,
            cookie_same_site,
            cookie_secure,
            cache_control,
            admin_username,
            admin_password,
        })
    }

    /// Configuration for in-process use: memory backend, plain-HTTP cookies.
    pub fn for_memory(
        templates_dir: impl Into<PathBuf>,
        session_secret: impl Into<String>,
    ) -> Self {
        Self {
            port: 0,
            redis_url: String::new(),
            store_backend: StoreBackend::Memory,
            templates_dir: templates_dir.into(),
            session_secret: session_secret.into(),
            cookie_same_site: "strict".to_string(),
            cookie_secure: false,
            cache_control: DEFAULT_CACHE_CONTROL.to_string(),
            admin_username: None,
            admin_password: None,
        }
    }
}
