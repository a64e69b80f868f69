//! Shared route helpers for page rendering and form bodies.

use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use serde_json::Value;

use crate::form::{Form, FormValues};
use crate::state::AppState;

/// Render a page template.
///
/// Template failures are logged and answered with a minimal error page.
pub fn render_template(state: &AppState, template: &str, context: &tera::Context) -> Response {
    match state.theme().render(template, context) {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            tracing::error!(error = %e, template = %template, "failed to render template");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(format!(
                    r#"<!DOCTYPE html>
<html><head><title>Error</title></head>
<body><h1>Template Error</h1><pre>{}</pre></body></html>"#,
                    html_escape(&e.to_string())
                )),
            )
                .into_response()
        }
    }
}

/// HTML-escape a string for safe output.
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

/// Decode an urlencoded body into form values.
///
/// A key submitted once maps to a string; a key submitted several times
/// (checkbox groups) maps to an array of strings in submission order.
pub fn form_values(body: &[u8]) -> FormValues {
    let mut values = FormValues::new();

    for (key, value) in url::form_urlencoded::parse(body) {
        let value = Value::String(value.into_owned());
        match values.get_mut(key.as_ref()) {
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                values.insert(key.into_owned(), value);
            }
        }
    }

    values
}

/// Keep only the submitted keys `form` declares.
pub fn declared_values(form: &Form, mut input: FormValues) -> FormValues {
    input.retain(|key, _| form.field(key).is_some());
    input
}
