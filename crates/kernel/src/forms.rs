//! Forms used by the signup and admin pages.

use std::sync::Arc;

use serde_json::Value;

use crate::form::{
    FieldDescriptor, FieldValidator, Form, GroupValidator, Outcome, Preset, Rule, SchemaError,
};
use crate::store::{AdminStore, RecordStore};

/// Message recorded when a submitted email is already registered.
pub const EMAIL_TAKEN: &str = "Email already exists.";

/// Message recorded when a login attempt does not match a stored admin.
pub const INVALID_CREDENTIALS: &str = "Invalid username or password";

fn text(value: &Value) -> String {
    value.as_str().map_or_else(|| value.to_string(), str::to_string)
}

async fn email_available(
    records: &dyn RecordStore,
    current_email: Option<&str>,
    value: &Value,
) -> anyhow::Result<Outcome> {
    let email = text(value);
    if current_email == Some(email.as_str()) || !records.record_exists(&email).await? {
        return Ok(Outcome::Valid);
    }
    Ok(Outcome::invalid(EMAIL_TAKEN))
}

/// Email field that must not collide with a stored record.
///
/// `current_email` is accepted as-is, so a record can keep its own address.
fn unique_email(records: Arc<dyn RecordStore>, current_email: Option<String>) -> Rule {
    let validator = FieldValidator::with_async(move |value: Value| {
        let records = records.clone();
        let current_email = current_email.clone();
        async move { email_available(records.as_ref(), current_email.as_deref(), &value).await }
    });

    FieldDescriptor::new()
        .preset(Preset::Email)
        .validator(validator)
        .into()
}

fn registration_form(
    records: Arc<dyn RecordStore>,
    current_email: Option<String>,
) -> Result<Form, SchemaError> {
    Form::with_schema([
        ("name", Rule::Required),
        ("email", unique_email(records, current_email)),
        ("competitions", Rule::Required),
    ])
}

/// Public signup form.
pub fn signup_form(records: Arc<dyn RecordStore>) -> Result<Form, SchemaError> {
    registration_form(records, None)
}

/// Admin form for editing the record currently registered as `current_email`.
pub fn update_form(
    records: Arc<dyn RecordStore>,
    current_email: impl Into<String>,
) -> Result<Form, SchemaError> {
    registration_form(records, Some(current_email.into()))
}

async fn credentials_match(admins: &dyn AdminStore, values: &[Value]) -> anyhow::Result<Outcome> {
    let [username, password] = values else {
        return Ok(Outcome::invalid(INVALID_CREDENTIALS));
    };

    if admins
        .credentials_valid(&text(username), &text(password))
        .await?
    {
        Ok(Outcome::Valid)
    } else {
        Ok(Outcome::invalid(INVALID_CREDENTIALS))
    }
}

/// Admin login form.
///
/// Passwords are never trimmed. The credential check only runs once both
/// fields are present.
pub fn login_form(admins: Arc<dyn AdminStore>) -> Result<Form, SchemaError> {
    let mut form = Form::with_schema([
        ("username", Rule::Required),
        ("password", FieldDescriptor::new().trim(false).into()),
    ])?;

    let check = GroupValidator::with_async(move |values: Vec<Value>| {
        let admins = admins.clone();
        async move { credentials_match(admins.as_ref(), &values).await }
    });
    form.set_validation_fx(&["username", "password"], check)?;

    Ok(form)
}
