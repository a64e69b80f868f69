//! Admin routes: sign in, registration listing, edit and delete.

use axum::Router;
use axum::body::{Body, Bytes};
use axum::extract::{Extension, State};
use axum::http::Request;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use serde_json::Value;
use tower_sessions::Session;
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult};
use crate::form::FormValues;
use crate::forms::update_form;
use crate::routes::helpers::{declared_values, form_values, render_template};
use crate::session::{authenticated_admin, sign_in, sign_out};
use crate::state::AppState;
use crate::store::{EMAIL_FIELD, RecordId, record_fields};

/// Username of the admin signed in on the current request.
#[derive(Debug, Clone)]
pub struct AdminUser(pub String);

/// Let signed-in admins through, send everyone else to the sign-in page.
async fn require_admin(session: Session, mut request: Request<Body>, next: Next) -> Response {
    match authenticated_admin(&session).await {
        Ok(Some(username)) => {
            request.extensions_mut().insert(AdminUser(username));
            next.run(request).await
        }
        Ok(None) => Redirect::to("/admin").into_response(),
        Err(e) => AppError::from(e).into_response(),
    }
}

fn record_index(input: &FormValues) -> AppResult<RecordId> {
    input
        .get("index")
        .and_then(Value::as_str)
        .and_then(|index| index.trim().parse().ok())
        .ok_or_else(|| AppError::BadRequest("index must be a record number".to_string()))
}

/// Render the admin home page, optionally with update errors.
async fn render_home(
    state: &AppState,
    username: &str,
    errors: Option<(Vec<String>, &FormValues)>,
) -> AppResult<Response> {
    let admin_info = state.admins().get_admin_record(username).await?;
    let users = state.records().get_all_records().await?;

    let mut context = tera::Context::new();
    context.insert("username", username);
    context.insert("admin_info", &admin_info);
    context.insert("users", &users);
    if let Some((messages, input)) = errors {
        context.insert("error_message_list", &messages);
        context.insert("user_input", input);
    }

    Ok(render_template(state, "admin-home.html", &context))
}

/// GET /admin
async fn login_page(State(state): State<AppState>, session: Session) -> AppResult<Response> {
    if authenticated_admin(&session).await?.is_some() {
        return Ok(Redirect::to("/admin/home").into_response());
    }

    Ok(render_template(&state, "admin.html", &tera::Context::new()))
}

/// POST /admin
async fn login_submit(
    State(state): State<AppState>,
    session: Session,
    body: Bytes,
) -> AppResult<Response> {
    if authenticated_admin(&session).await?.is_some() {
        return Ok(Redirect::to("/admin/home").into_response());
    }

    let form = state.login_form();
    let mut input = declared_values(form, form_values(&body));

    match form.validate(&input).await {
        Ok(values) => {
            let username = values
                .get("username")
                .and_then(Value::as_str)
                .unwrap_or_default();
            sign_in(&session, username).await?;
            info!(username = %username, "admin signed in");
            Ok(Redirect::to("/admin/home").into_response())
        }
        Err(errors) => {
            warn!(errors = errors.len(), "admin sign in rejected");
            input.remove("password");
            let mut context = tera::Context::new();
            context.insert("error_message_list", &errors.messages());
            context.insert("user_input", &input);
            Ok(render_template(&state, "admin.html", &context))
        }
    }
}

/// GET /admin/home
async fn home(
    State(state): State<AppState>,
    Extension(AdminUser(username)): Extension<AdminUser>,
) -> AppResult<Response> {
    render_home(&state, &username, None).await
}

/// GET /admin/signout
async fn signout(
    session: Session,
    Extension(AdminUser(username)): Extension<AdminUser>,
) -> AppResult<Response> {
    sign_out(&session).await?;
    info!(username = %username, "admin signed out");
    Ok(Redirect::to("/admin").into_response())
}

/// POST /admin/del
async fn delete_record(State(state): State<AppState>, body: Bytes) -> AppResult<Response> {
    let id = record_index(&form_values(&body))?;

    state.records().delete_record(id).await?;
    info!(id, "registration deleted");

    Ok(Redirect::to("/admin/home").into_response())
}

/// POST /admin/update
///
/// The record keeps its id. Its own email is not treated as a duplicate.
async fn update_record(
    State(state): State<AppState>,
    Extension(AdminUser(username)): Extension<AdminUser>,
    body: Bytes,
) -> AppResult<Response> {
    let submitted = form_values(&body);
    let id = record_index(&submitted)?;

    let current = state
        .records()
        .get_record(id)
        .await?
        .ok_or(AppError::NotFound)?;
    let current_email = current.get(EMAIL_FIELD).cloned().unwrap_or_default();

    let form =
        update_form(state.records().clone(), current_email).map_err(anyhow::Error::from)?;
    let mut input = declared_values(&form, submitted);

    match form.validate(&input).await {
        Ok(values) => {
            state
                .records()
                .update_record(id, &record_fields(&values))
                .await?;
            info!(id, "registration updated");
            Ok(Redirect::to("/admin/home").into_response())
        }
        Err(errors) => {
            debug!(id, errors = errors.len(), "update rejected");
            input.insert("index".to_string(), Value::from(id));
            render_home(&state, &username, Some((errors.into_messages(), &input))).await
        }
    }
}

/// GET /admin/success
async fn success(State(state): State<AppState>) -> Response {
    render_template(&state, "admin-success.html", &tera::Context::new())
}

/// Create the admin router.
pub fn router() -> Router<AppState> {
    let gated = Router::new()
        .route("/admin/home", get(home))
        .route("/admin/signout", get(signout))
        .route("/admin/del", post(delete_record))
        .route("/admin/update", post(update_record))
        .route("/admin/success", get(success))
        .route_layer(middleware::from_fn(require_admin));

    Router::new()
        .route("/admin", get(login_page).post(login_submit))
        .merge(gated)
}

#[cfg(test)]
// Tests are allowed to use unwrap/expect freely.
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_record_index_parsing() {
        assert_eq!(record_index(&form_values(b"index=12")).unwrap(), 12);
        assert_eq!(record_index(&form_values(b"index=+3+")).unwrap(), 3);
        assert!(matches!(
            record_index(&form_values(b"index=abc")),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            record_index(&form_values(b"")),
            Err(AppError::BadRequest(_))
        ));
    }
}
