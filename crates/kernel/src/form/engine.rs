//! Declarative form schema and validation.
//!
//! A [`Form`] is configured once with a schema and any number of group
//! validators, then shared (typically behind an `Arc`) and validated against
//! each submission. Validation state lives in the call, never in the schema,
//! so concurrent `validate` calls on the same form do not interfere.

use std::borrow::Cow;
use std::collections::HashMap;
use std::time::Duration;

use serde_json::{Map, Value};
use tracing::debug;

use super::error::{ErrorKind, FieldError, SchemaError, ValidationError};
use super::types::{FieldSpec, GroupSpec, GroupValidator, Outcome, Rule, ValidatorFuture};

/// Submitted or sanitized form values keyed by field.
pub type FormValues = Map<String, Value>;

/// Message recorded for a group validator that exceeded the timeout.
const GROUP_TIMEOUT_MESSAGE: &str = "Validation timed out.";

/// Validation state of one field during a single `validate` call.
#[derive(Debug, Default)]
struct FieldState {
    value: Value,
    validated: bool,
}

/// A form schema with per-field and cross-field validation rules.
#[derive(Debug, Clone, Default)]
pub struct Form {
    /// Field specs in declaration order.
    fields: Vec<FieldSpec>,

    /// Field key to position in `fields`.
    index: HashMap<String, usize>,

    /// Group validators in registration order.
    groups: Vec<GroupSpec>,

    /// Upper bound for each validator invocation.
    validator_timeout: Option<Duration>,
}

impl Form {
    /// Create a form with an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a form and set its schema in one step.
    pub fn with_schema<I, K>(rules: I) -> Result<Self, SchemaError>
    where
        I: IntoIterator<Item = (K, Rule)>,
        K: Into<String>,
    {
        let mut form = Self::new();
        form.set_schema(rules)?;
        Ok(form)
    }

    /// Bound every validator invocation by `timeout`.
    pub fn validator_timeout(mut self, timeout: Duration) -> Self {
        self.validator_timeout = Some(timeout);
        self
    }

    /// Replace the schema.
    ///
    /// A key given twice keeps its position and takes the later rule. The
    /// schema is left untouched if a registered group names a key the new
    /// schema does not declare.
    pub fn set_schema<I, K>(&mut self, rules: I) -> Result<(), SchemaError>
    where
        I: IntoIterator<Item = (K, Rule)>,
        K: Into<String>,
    {
        let mut fields: Vec<FieldSpec> = Vec::new();
        let mut index = HashMap::new();

        for (key, rule) in rules {
            let spec = FieldSpec::from_rule(key, rule);
            match index.get(spec.key()) {
                Some(&position) => fields[position] = spec,
                None => {
                    index.insert(spec.key().to_string(), fields.len());
                    fields.push(spec);
                }
            }
        }

        for group in &self.groups {
            if let Some(missing) = group.keys().iter().find(|k| !index.contains_key(*k)) {
                return Err(SchemaError::UnknownGroupKey(missing.clone()));
            }
        }

        debug!(fields = fields.len(), "form schema set");
        self.fields = fields;
        self.index = index;
        Ok(())
    }

    /// Register a cross-field validator over `keys`.
    ///
    /// The validator receives the sanitized values in the order of `keys`
    /// and only runs when every one of those fields validated on its own.
    /// Groups may overlap; each runs independently.
    pub fn set_validation_fx<K: AsRef<str>>(
        &mut self,
        keys: &[K],
        validator: GroupValidator,
    ) -> Result<(), SchemaError> {
        if keys.is_empty() {
            return Err(SchemaError::EmptyGroup);
        }

        let keys: Vec<String> = keys.iter().map(|k| k.as_ref().to_string()).collect();
        if let Some(missing) = keys.iter().find(|k| !self.index.contains_key(*k)) {
            return Err(SchemaError::UnknownGroupKey(missing.clone()));
        }

        self.groups.push(GroupSpec::new(keys, validator));
        Ok(())
    }

    /// Field specs in declaration order.
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Look up a field spec by key.
    pub fn field(&self, key: &str) -> Option<&FieldSpec> {
        self.index.get(key).and_then(|&i| self.fields.get(i))
    }

    /// Registered group validators.
    pub fn groups(&self) -> &[GroupSpec] {
        &self.groups
    }

    /// Validate submitted values against the schema.
    ///
    /// Every field is checked, then every group whose fields all passed.
    /// On success the result holds each schema field's sanitized value plus
    /// any input keys the schema does not declare, unchanged.
    pub async fn validate(&self, input: &FormValues) -> Result<FormValues, ValidationError> {
        let mut errors = Vec::new();
        let mut states = Vec::with_capacity(self.fields.len());

        for spec in &self.fields {
            let raw = input.get(spec.key()).cloned().unwrap_or(Value::Null);
            match self.check_field(spec, raw).await {
                Ok(value) => states.push(FieldState {
                    value,
                    validated: true,
                }),
                Err(error) => {
                    errors.push(error);
                    states.push(FieldState::default());
                }
            }
        }

        for group in &self.groups {
            let Some(values) = self.group_values(group, &states) else {
                debug!(keys = ?group.keys(), "group validator skipped");
                continue;
            };

            let outcome = self
                .bounded(group.validator().call(values))
                .await
                .unwrap_or_else(|| Outcome::invalid(GROUP_TIMEOUT_MESSAGE));

            if let Outcome::Invalid(message) = outcome {
                errors.push(FieldError::group(message));
            }
        }

        if !errors.is_empty() {
            debug!(errors = errors.len(), "form validation failed");
            return Err(ValidationError::new(errors));
        }

        let mut output = FormValues::new();
        for (spec, state) in self.fields.iter().zip(states) {
            output.insert(spec.key().to_string(), state.value);
        }
        for (key, value) in input {
            if !self.index.contains_key(key) {
                output.insert(key.clone(), value.clone());
            }
        }

        Ok(output)
    }

    /// Run one field's checks, returning its sanitized value.
    async fn check_field(&self, spec: &FieldSpec, raw: Value) -> Result<Value, FieldError> {
        let value = match raw {
            Value::String(s) if spec.trims() => Value::String(s.trim().to_string()),
            other => other,
        };

        if is_blank(&value) {
            if spec.is_required() {
                return Err(FieldError::field(
                    ErrorKind::Required,
                    spec.key(),
                    format!("{} field is required.", spec.name()),
                ));
            }
            return Ok(Value::String(String::new()));
        }

        if let Some(pattern) = spec.pattern() {
            if !pattern.is_match(&text_of(&value)) {
                return Err(FieldError::field(
                    ErrorKind::Pattern,
                    spec.key(),
                    format!("{} field is invalid.", spec.name()),
                ));
            }
        }

        if let Some(validator) = spec.validator() {
            let outcome = self
                .bounded(validator.call(value.clone()))
                .await
                .unwrap_or_else(|| {
                    Outcome::Invalid(format!("{} field could not be validated.", spec.name()))
                });

            if let Outcome::Invalid(message) = outcome {
                return Err(FieldError::field(ErrorKind::Custom, spec.key(), message));
            }
        }

        Ok(value)
    }

    /// Collect a group's values, or None if any of its fields failed.
    fn group_values(&self, group: &GroupSpec, states: &[FieldState]) -> Option<Vec<Value>> {
        group
            .keys()
            .iter()
            .map(|key| {
                self.index
                    .get(key)
                    .and_then(|&i| states.get(i))
                    .filter(|state| state.validated)
                    .map(|state| state.value.clone())
            })
            .collect()
    }

    /// Await a validator, honoring the configured timeout.
    async fn bounded(&self, pending: ValidatorFuture) -> Option<Outcome> {
        match self.validator_timeout {
            Some(limit) => tokio::time::timeout(limit, pending).await.ok(),
            None => Some(pending.await),
        }
    }
}

/// Whether a value counts as empty for required/optional handling.
fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// Text a pattern is matched against.
fn text_of(value: &Value) -> Cow<'_, str> {
    match value {
        Value::String(s) => Cow::Borrowed(s.as_str()),
        Value::Null => Cow::Borrowed(""),
        Value::Array(items) => Cow::Owned(
            items
                .iter()
                .map(|item| text_of(item).into_owned())
                .collect::<Vec<_>>()
                .join(","),
        ),
        other => Cow::Owned(other.to_string()),
    }
}

#[cfg(test)]
// Tests are allowed to use unwrap/expect freely.
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;
    use crate::form::types::{FieldDescriptor, FieldValidator, Preset};

    fn values(value: Value) -> FormValues {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected a JSON object"),
        }
    }

    fn counting_validator(calls: Arc<AtomicUsize>) -> FieldValidator {
        FieldValidator::new(move |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            Outcome::Valid
        })
    }

    fn login_form(calls: Arc<AtomicUsize>) -> Form {
        let mut form = Form::with_schema([
            ("username", Rule::Required),
            ("password", FieldDescriptor::new().trim(false).into()),
        ])
        .unwrap();

        form.set_validation_fx(
            &["username", "password"],
            GroupValidator::new(move |values| {
                calls.fetch_add(1, Ordering::SeqCst);
                if values[0] == "a" && values[1] == "good" {
                    Outcome::Valid
                } else {
                    Outcome::invalid("Invalid username or password")
                }
            }),
        )
        .unwrap();

        form
    }

    #[tokio::test]
    async fn test_required_whitespace_stops_other_checks() {
        let calls = Arc::new(AtomicUsize::new(0));
        let form = Form::with_schema([(
            "name",
            FieldDescriptor::new()
                .pattern(regex::Regex::new("^x+$").unwrap())
                .validator(counting_validator(calls.clone()))
                .into(),
        )])
        .unwrap();

        let err = form.validate(&values(json!({"name": "   "}))).await.unwrap_err();
        assert_eq!(err.messages(), vec!["name field is required."]);
        assert_eq!(err.errors()[0].kind, ErrorKind::Required);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let err = form.validate(&FormValues::new()).await.unwrap_err();
        assert_eq!(err.messages(), vec!["name field is required."]);
    }

    #[tokio::test]
    async fn test_optional_empty_skips_checks() {
        let calls = Arc::new(AtomicUsize::new(0));
        let form = Form::with_schema([(
            "email",
            FieldDescriptor::new()
                .optional()
                .preset(Preset::Email)
                .validator(counting_validator(calls.clone()))
                .into(),
        )])
        .unwrap();

        let output = form.validate(&values(json!({"email": "  "}))).await.unwrap();
        assert_eq!(output["email"], json!(""));

        let output = form.validate(&FormValues::new()).await.unwrap();
        assert_eq!(output["email"], json!(""));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_trim_enabled_and_disabled() {
        let form = Form::with_schema([
            ("email", Rule::Preset(Preset::Email)),
            ("password", FieldDescriptor::new().trim(false).into()),
        ])
        .unwrap();

        let output = form
            .validate(&values(json!({
                "email": "  bob@example.com  ",
                "password": "  secret  ",
            })))
            .await
            .unwrap();

        assert_eq!(output["email"], json!("bob@example.com"));
        assert_eq!(output["password"], json!("  secret  "));
    }

    #[tokio::test]
    async fn test_email_preset() {
        let form = Form::with_schema([("email", "email".parse().unwrap())]).unwrap();

        let err = form
            .validate(&values(json!({"email": "not-an-email"})))
            .await
            .unwrap_err();
        assert_eq!(err.messages(), vec!["email field is invalid."]);
        assert_eq!(err.errors()[0].kind, ErrorKind::Pattern);

        let output = form.validate(&values(json!({"email": "a@b.co"}))).await.unwrap();
        assert_eq!(output["email"], json!("a@b.co"));
    }

    #[tokio::test]
    async fn test_display_name_in_messages() {
        let form = Form::with_schema([(
            "email",
            FieldDescriptor::new()
                .name("E-mail")
                .preset(Preset::Email)
                .into(),
        )])
        .unwrap();

        let err = form.validate(&FormValues::new()).await.unwrap_err();
        assert_eq!(err.messages(), vec!["E-mail field is required."]);
    }

    #[tokio::test]
    async fn test_async_validator_failure_is_recorded_verbatim() {
        let form = Form::with_schema([(
            "email",
            FieldDescriptor::new()
                .preset(Preset::Email)
                .validator(FieldValidator::with_async(|value: Value| async move {
                    if value == "taken@example.com" {
                        Err("Email already exists.")
                    } else {
                        Ok(Outcome::Valid)
                    }
                }))
                .into(),
        )])
        .unwrap();

        let err = form
            .validate(&values(json!({"email": "taken@example.com"})))
            .await
            .unwrap_err();
        assert_eq!(err.messages(), vec!["Email already exists."]);
        assert_eq!(err.errors()[0].kind, ErrorKind::Custom);
        assert_eq!(err.errors()[0].field.as_deref(), Some("email"));

        assert!(
            form.validate(&values(json!({"email": "free@example.com"})))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_sync_validator_outcomes() {
        let form = Form::with_schema([(
            "code",
            FieldDescriptor::new()
                .validator(FieldValidator::new(|value| {
                    if value.as_str().is_some_and(|s| s.len() >= 4) {
                        Outcome::Valid
                    } else {
                        Outcome::invalid("Code is too short.")
                    }
                }))
                .into(),
        )])
        .unwrap();

        assert!(form.validate(&values(json!({"code": "abcd"}))).await.is_ok());

        let err = form
            .validate(&values(json!({"code": "ab"})))
            .await
            .unwrap_err();
        assert_eq!(err.messages(), vec!["Code is too short."]);
    }

    #[tokio::test]
    async fn test_group_failure_only() {
        let calls = Arc::new(AtomicUsize::new(0));
        let form = login_form(calls.clone());

        let err = form
            .validate(&values(json!({"username": "a", "password": "bad"})))
            .await
            .unwrap_err();

        assert_eq!(err.len(), 1);
        assert_eq!(err.errors()[0].kind, ErrorKind::Group);
        assert!(err.errors()[0].field.is_none());
        assert_eq!(err.messages(), vec!["Invalid username or password"]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        assert!(
            form.validate(&values(json!({"username": " a ", "password": "good"})))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_group_skipped_when_field_fails() {
        let calls = Arc::new(AtomicUsize::new(0));
        let form = login_form(calls.clone());

        let err = form
            .validate(&values(json!({"username": "", "password": "bad"})))
            .await
            .unwrap_err();

        assert_eq!(err.messages(), vec!["username field is required."]);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_overlapping_groups_run_independently() {
        let mut form = Form::with_schema([
            ("a", Rule::Required),
            ("b", Rule::Required),
            ("c", Rule::Required),
        ])
        .unwrap();

        form.set_validation_fx(
            &["a", "b"],
            GroupValidator::new(|_| Outcome::invalid("first group")),
        )
        .unwrap();
        form.set_validation_fx(
            &["b", "c"],
            GroupValidator::with_async(|values: Vec<Value>| async move {
                if values == vec![json!("2"), json!("3")] {
                    Err("second group")
                } else {
                    Ok(Outcome::Valid)
                }
            }),
        )
        .unwrap();

        let err = form
            .validate(&values(json!({"a": "1", "b": "2", "c": "3"})))
            .await
            .unwrap_err();
        assert_eq!(err.messages(), vec!["first group", "second group"]);
    }

    #[tokio::test]
    async fn test_error_order_fields_then_groups() {
        let mut form = Form::with_schema([
            ("zeta", Rule::Required),
            ("alpha", Rule::Required),
            ("beta", Rule::Required),
        ])
        .unwrap();
        form.set_validation_fx(
            &["beta"],
            GroupValidator::new(|_| Outcome::invalid("beta rejected")),
        )
        .unwrap();

        let err = form
            .validate(&values(json!({"beta": "x"})))
            .await
            .unwrap_err();
        assert_eq!(
            err.messages(),
            vec![
                "zeta field is required.",
                "alpha field is required.",
                "beta rejected"
            ]
        );
    }

    #[tokio::test]
    async fn test_pass_through_unknown_keys() {
        let form = Form::with_schema([
            ("name", Rule::Required),
            ("email", Rule::Preset(Preset::Email)),
            ("competitions", Rule::Required),
        ])
        .unwrap();

        let output = form
            .validate(&values(json!({
                "name": "X",
                "email": "x@y.co",
                "competitions": "Chess",
                "extra": "ignored",
                "count": 3,
            })))
            .await
            .unwrap();

        assert_eq!(output["extra"], json!("ignored"));
        assert_eq!(output["count"], json!(3));
        assert_eq!(output.len(), 5);
    }

    #[tokio::test]
    async fn test_validate_is_idempotent() {
        let form = Form::with_schema([
            ("name", Rule::Required),
            ("email", Rule::Preset(Preset::Email)),
        ])
        .unwrap();
        let input = values(json!({"name": " Ann ", "email": "ann@example.com"}));

        let first = form.validate(&input).await.unwrap();
        let second = form.validate(&input).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_concurrent_validation_on_shared_form() {
        let form = Arc::new(
            Form::with_schema([(
                "email",
                FieldDescriptor::new()
                    .preset(Preset::Email)
                    .validator(FieldValidator::with_async(|value: Value| async move {
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        if value == "slow@example.com" {
                            Ok(Outcome::Valid)
                        } else {
                            Err("Email already exists.")
                        }
                    }))
                    .into(),
            )])
            .unwrap(),
        );

        let ok_input = values(json!({"email": "slow@example.com"}));
        let bad_input = values(json!({"email": "taken@example.com"}));
        let (ok, bad) = tokio::join!(form.validate(&ok_input), form.validate(&bad_input));

        assert_eq!(ok.unwrap()["email"], json!("slow@example.com"));
        assert_eq!(bad.unwrap_err().messages(), vec!["Email already exists."]);
    }

    #[tokio::test]
    async fn test_non_string_values() {
        let form = Form::with_schema([("competitions", Rule::Required)]).unwrap();

        let output = form
            .validate(&values(json!({"competitions": ["Chess", "Debate"]})))
            .await
            .unwrap();
        assert_eq!(output["competitions"], json!(["Chess", "Debate"]));

        let err = form
            .validate(&values(json!({"competitions": []})))
            .await
            .unwrap_err();
        assert_eq!(err.messages(), vec!["competitions field is required."]);
    }

    #[tokio::test]
    async fn test_pattern_on_array_joins_items() {
        let form = Form::with_schema([("tags", Rule::matching("^[a-z]+(,[a-z]+)*$").unwrap())])
            .unwrap();

        assert!(
            form.validate(&values(json!({"tags": ["ab", "cd"]})))
                .await
                .is_ok()
        );
        assert!(
            form.validate(&values(json!({"tags": ["ab", "C"]})))
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_validator_timeout() {
        let form = Form::with_schema([(
            "email",
            FieldDescriptor::new()
                .validator(FieldValidator::with_async(|_| async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok::<_, String>(Outcome::Valid)
                }))
                .into(),
        )])
        .unwrap()
        .validator_timeout(Duration::from_millis(10));

        let err = form
            .validate(&values(json!({"email": "a@b.co"})))
            .await
            .unwrap_err();
        assert_eq!(err.messages(), vec!["email field could not be validated."]);
    }

    #[tokio::test]
    async fn test_group_validator_timeout() {
        let mut form =
            Form::with_schema([("username", Rule::Required), ("password", Rule::Required)])
                .unwrap()
                .validator_timeout(Duration::from_millis(10));
        form.set_validation_fx(
            &["username", "password"],
            GroupValidator::with_async(|_| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, String>(Outcome::Valid)
            }),
        )
        .unwrap();

        let err = form
            .validate(&values(json!({"username": "root", "password": "pw"})))
            .await
            .unwrap_err();
        assert_eq!(err.messages(), vec!["Validation timed out."]);
    }

    #[test]
    fn test_group_configuration_errors() {
        let mut form = Form::with_schema([("username", Rule::Required)]).unwrap();

        let err = form
            .set_validation_fx(&["username", "password"], GroupValidator::new(|_| Outcome::Valid))
            .unwrap_err();
        assert!(matches!(err, SchemaError::UnknownGroupKey(ref key) if key == "password"));

        let no_keys: [&str; 0] = [];
        let err = form
            .set_validation_fx(&no_keys, GroupValidator::new(|_| Outcome::Valid))
            .unwrap_err();
        assert!(matches!(err, SchemaError::EmptyGroup));
        assert!(form.groups().is_empty());
    }

    #[test]
    fn test_set_schema_keeps_groups_resolvable() {
        let mut form = Form::with_schema([("username", Rule::Required)]).unwrap();
        form.set_validation_fx(&["username"], GroupValidator::new(|_| Outcome::Valid))
            .unwrap();

        let err = form.set_schema([("email", Rule::Required)]).unwrap_err();
        assert!(matches!(err, SchemaError::UnknownGroupKey(ref key) if key == "username"));
        assert!(form.field("username").is_some());
        assert!(form.field("email").is_none());
    }

    #[test]
    fn test_duplicate_key_replaces_rule() {
        let form = Form::with_schema([
            ("name", Rule::Required),
            ("email", Rule::Required),
            ("name", FieldDescriptor::new().optional().into()),
        ])
        .unwrap();

        assert_eq!(form.fields().len(), 2);
        assert_eq!(form.fields()[0].key(), "name");
        assert!(!form.field("name").unwrap().is_required());
    }
}
