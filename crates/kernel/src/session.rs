//! Session management.
//!
//! Sessions live in Redis (via fred) or in process memory, and the cookie is
//! signed with `SESSION_SECRET`. An authenticated admin session carries the
//! admin's username under [`SESSION_USERNAME`].

use anyhow::{Context, Result};
use fred::prelude::*;
use tower_sessions::cookie::time::Duration;
use tower_sessions::cookie::{Key, SameSite};
use tower_sessions::service::SignedCookie;
use tower_sessions::{Expiry, Session, SessionManagerLayer, SessionStore};
use tower_sessions_redis_store::RedisStore;

use crate::config::Config as AppConfig;

/// Session key marking an authenticated admin.
pub const SESSION_USERNAME: &str = "username";

/// Default session expiry (24 hours).
pub const DEFAULT_SESSION_EXPIRY_HOURS: i64 = 24;

/// Connect the Redis session store.
pub async fn redis_session_store(redis_url: &str) -> Result<RedisStore<Pool>> {
    let config = Config::from_url(redis_url).context("failed to parse Redis URL")?;

    let pool = Builder::from_config(config)
        .build_pool(1)
        .context("failed to create Redis pool")?;

    pool.init()
        .await
        .context("failed to connect to Redis for sessions")?;

    Ok(RedisStore::new(pool))
}

fn same_site(policy: &str) -> SameSite {
    match policy {
        "lax" => SameSite::Lax,
        "none" => SameSite::None,
        _ => SameSite::Strict,
    }
}

/// Create the session layer over `store` with a signed cookie.
pub fn create_session_layer<S: SessionStore + Clone>(
    store: S,
    config: &AppConfig,
) -> Result<SessionManagerLayer<S, SignedCookie>> {
    let key = Key::try_from(config.session_secret.as_bytes())
        .map_err(|e| anyhow::anyhow!("invalid SESSION_SECRET: {e}"))?;

    let session_layer = SessionManagerLayer::new(store)
        .with_secure(config.cookie_secure)
        .with_http_only(true)
        .with_same_site(same_site(&config.cookie_same_site))
        .with_expiry(Expiry::OnInactivity(Duration::hours(
            DEFAULT_SESSION_EXPIRY_HOURS,
        )))
        .with_signed(key);

    Ok(session_layer)
}

/// Username of the admin signed in on this session, if any.
pub async fn authenticated_admin(session: &Session) -> Result<Option<String>> {
    session
        .get::<String>(SESSION_USERNAME)
        .await
        .context("failed to read session")
}

/// Mark the session as signed in as `username`.
///
/// The session id is rotated first so a pre-login id cannot be reused.
pub async fn sign_in(session: &Session, username: &str) -> Result<()> {
    session
        .cycle_id()
        .await
        .context("failed to rotate session id")?;

    session
        .insert(SESSION_USERNAME, username)
        .await
        .context("failed to store session")
}

/// Drop the signed-in marker.
pub async fn sign_out(session: &Session) -> Result<()> {
    session
        .remove::<String>(SESSION_USERNAME)
        .await
        .context("failed to update session")?;
    Ok(())
}
