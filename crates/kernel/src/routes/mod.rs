//! HTTP route handlers.

pub mod admin;
pub mod helpers;
pub mod signup;

use anyhow::{Context, Result};
use axum::Router;
use axum::http::HeaderValue;
use axum::http::header::CACHE_CONTROL;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tower_sessions::service::SignedCookie;
use tower_sessions::{SessionManagerLayer, SessionStore};

use crate::state::AppState;

/// Build the full application router.
///
/// Layers, outermost first: tracing, `Cache-Control`, session, routes.
pub fn app<S>(
    state: AppState,
    session_layer: SessionManagerLayer<S, SignedCookie>,
) -> Result<Router>
where
    S: SessionStore + Clone,
{
    let cache_control = HeaderValue::from_str(&state.config().cache_control)
        .context("CACHE_CONTROL is not a valid header value")?;

    let app = Router::new()
        .merge(signup::router())
        .merge(admin::router())
        .layer(session_layer)
        .layer(SetResponseHeaderLayer::overriding(CACHE_CONTROL, cache_control))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    Ok(app)
}
