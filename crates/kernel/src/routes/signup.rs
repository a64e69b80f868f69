//! Public competition signup pages.

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use tracing::{debug, info};

use crate::error::AppResult;
use crate::routes::helpers::{declared_values, form_values, render_template};
use crate::state::AppState;
use crate::store::record_fields;

/// GET /
async fn signup_page(State(state): State<AppState>) -> Response {
    render_template(&state, "index.html", &tera::Context::new())
}

/// POST /
///
/// Stores a valid registration and redirects to the success page, otherwise
/// re-renders the signup page with every error and the submitted values.
async fn signup_submit(State(state): State<AppState>, body: Bytes) -> AppResult<Response> {
    let form = state.signup_form();
    let input = declared_values(form, form_values(&body));

    match form.validate(&input).await {
        Ok(values) => {
            let id = state.records().add_record(&record_fields(&values)).await?;
            info!(id, "registration stored");
            Ok(Redirect::to("/success").into_response())
        }
        Err(errors) => {
            debug!(errors = errors.len(), "signup rejected");
            let mut context = tera::Context::new();
            context.insert("error_message_list", &errors.messages());
            context.insert("user_input", &input);
            Ok(render_template(&state, "index.html", &context))
        }
    }
}

/// GET /success
async fn signup_success(State(state): State<AppState>) -> Response {
    render_template(&state, "success.html", &tera::Context::new())
}

/// Create the signup router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(signup_page).post(signup_submit))
        .route("/success", get(signup_success))
}
