//! Schema rules, field specs and validator types.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde_json::Value;

use super::error::SchemaError;

/// Shape check applied by the `email` preset.
///
/// # Panics
///
/// Panics if the hard-coded regex literal is invalid (impossible in practice).
#[allow(clippy::expect_used)]
static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[a-zA-Z0-9_-]+@[a-zA-Z0-9_-]+\.[a-zA-Z0-9_-]{2,}").expect("valid regex literal")
});

/// Result of a field or group validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The value passed the check.
    Valid,

    /// The value failed the check; the message is recorded as-is.
    Invalid(String),
}

impl Outcome {
    /// Create a failed outcome.
    pub fn invalid(message: impl Into<String>) -> Self {
        Outcome::Invalid(message.into())
    }
}

/// Boxed future returned by validators.
pub type ValidatorFuture = Pin<Box<dyn Future<Output = Outcome> + Send>>;

type FieldFn = dyn Fn(Value) -> ValidatorFuture + Send + Sync;
type GroupFn = dyn Fn(Vec<Value>) -> ValidatorFuture + Send + Sync;

/// Custom check run on a single field's sanitized value.
#[derive(Clone)]
pub struct FieldValidator(Arc<FieldFn>);

impl FieldValidator {
    /// Wrap a synchronous check.
    pub fn new<F>(check: F) -> Self
    where
        F: Fn(&Value) -> Outcome + Send + Sync + 'static,
    {
        Self(Arc::new(move |value: Value| -> ValidatorFuture {
            let outcome = check(&value);
            Box::pin(std::future::ready(outcome))
        }))
    }

    /// Wrap an asynchronous check.
    ///
    /// If the future resolves to an error, its display text becomes the
    /// recorded error message.
    pub fn with_async<F, Fut, E>(check: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Outcome, E>> + Send + 'static,
        E: fmt::Display,
    {
        Self(Arc::new(move |value: Value| -> ValidatorFuture {
            let pending = check(value);
            Box::pin(async move {
                pending
                    .await
                    .unwrap_or_else(|e| Outcome::Invalid(e.to_string()))
            })
        }))
    }

    pub(crate) fn call(&self, value: Value) -> ValidatorFuture {
        (self.0)(value)
    }
}

impl fmt::Debug for FieldValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldValidator").finish_non_exhaustive()
    }
}

/// Cross-field check run on several fields' sanitized values.
///
/// Values are passed in the order the group's keys were declared.
#[derive(Clone)]
pub struct GroupValidator(Arc<GroupFn>);

impl GroupValidator {
    /// Wrap a synchronous check.
    pub fn new<F>(check: F) -> Self
    where
        F: Fn(&[Value]) -> Outcome + Send + Sync + 'static,
    {
        Self(Arc::new(move |values: Vec<Value>| -> ValidatorFuture {
            let outcome = check(&values);
            Box::pin(std::future::ready(outcome))
        }))
    }

    /// Wrap an asynchronous check. Errors are recorded by display text.
    pub fn with_async<F, Fut, E>(check: F) -> Self
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Outcome, E>> + Send + 'static,
        E: fmt::Display,
    {
        Self(Arc::new(move |values: Vec<Value>| -> ValidatorFuture {
            let pending = check(values);
            Box::pin(async move {
                pending
                    .await
                    .unwrap_or_else(|e| Outcome::Invalid(e.to_string()))
            })
        }))
    }

    pub(crate) fn call(&self, values: Vec<Value>) -> ValidatorFuture {
        (self.0)(values)
    }
}

impl fmt::Debug for GroupValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupValidator").finish_non_exhaustive()
    }
}

/// Named shortcut that fills in a field's pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    /// Loose `local@domain.tld` shape check.
    Email,
}

impl Preset {
    /// Get the preset name as used in rule literals.
    pub fn name(&self) -> &'static str {
        match self {
            Preset::Email => "email",
        }
    }

    /// Get the pattern this preset applies.
    pub fn pattern(&self) -> Regex {
        match self {
            Preset::Email => EMAIL_PATTERN.clone(),
        }
    }
}

impl FromStr for Preset {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "email" => Ok(Preset::Email),
            _ => Err(SchemaError::UnknownRule(s.to_string())),
        }
    }
}

/// Rule description for one schema key.
///
/// Resolved once into a [`FieldSpec`] when the schema is set.
#[derive(Debug, Clone)]
pub enum Rule {
    /// The `"required"` literal: every attribute keeps its default.
    Required,

    /// A preset literal such as `"email"`.
    Preset(Preset),

    /// A bare matcher.
    Pattern(Regex),

    /// A descriptor overriding individual attributes.
    Descriptor(FieldDescriptor),
}

impl Rule {
    /// Build a pattern rule from a regex source string.
    pub fn matching(pattern: &str) -> Result<Self, SchemaError> {
        Regex::new(pattern)
            .map(Rule::Pattern)
            .map_err(|source| SchemaError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })
    }
}

impl FromStr for Rule {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("required") {
            return Ok(Rule::Required);
        }
        s.parse().map(Rule::Preset)
    }
}

impl From<Preset> for Rule {
    fn from(preset: Preset) -> Self {
        Rule::Preset(preset)
    }
}

impl From<Regex> for Rule {
    fn from(pattern: Regex) -> Self {
        Rule::Pattern(pattern)
    }
}

impl From<FieldDescriptor> for Rule {
    fn from(descriptor: FieldDescriptor) -> Self {
        Rule::Descriptor(descriptor)
    }
}

/// Attribute overrides for a field. Unset attributes keep their defaults.
#[derive(Debug, Clone, Default)]
pub struct FieldDescriptor {
    name: Option<String>,
    required: Option<bool>,
    pattern: Option<Regex>,
    validator: Option<FieldValidator>,
    preset: Option<Preset>,
    trim: Option<bool>,
}

impl FieldDescriptor {
    /// Create an empty descriptor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the display name used in error messages.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set whether the field is required.
    pub fn required(mut self, required: bool) -> Self {
        self.required = Some(required);
        self
    }

    /// Mark the field as optional.
    pub fn optional(self) -> Self {
        self.required(false)
    }

    /// Set the pattern the value must match.
    pub fn pattern(mut self, pattern: Regex) -> Self {
        self.pattern = Some(pattern);
        self
    }

    /// Set a custom validator.
    pub fn validator(mut self, validator: FieldValidator) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Apply a preset. It takes precedence over an explicit pattern.
    pub fn preset(mut self, preset: Preset) -> Self {
        self.preset = Some(preset);
        self
    }

    /// Set whether textual values are trimmed.
    pub fn trim(mut self, trim: bool) -> Self {
        self.trim = Some(trim);
        self
    }
}

/// Normalized validation rule for one schema key.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    key: String,
    name: String,
    required: bool,
    pattern: Option<Regex>,
    validator: Option<FieldValidator>,
    preset: Option<Preset>,
    trim: bool,
}

impl FieldSpec {
    /// Resolve a rule into a field spec.
    pub fn from_rule(key: impl Into<String>, rule: Rule) -> Self {
        let key = key.into();
        let mut spec = Self {
            name: key.clone(),
            key,
            required: true,
            pattern: None,
            validator: None,
            preset: None,
            trim: true,
        };

        match rule {
            Rule::Required => {}
            Rule::Preset(preset) => spec.apply_preset(preset),
            Rule::Pattern(pattern) => spec.pattern = Some(pattern),
            Rule::Descriptor(descriptor) => {
                if let Some(name) = descriptor.name {
                    spec.name = name;
                }
                if let Some(required) = descriptor.required {
                    spec.required = required;
                }
                if let Some(trim) = descriptor.trim {
                    spec.trim = trim;
                }
                spec.pattern = descriptor.pattern;
                spec.validator = descriptor.validator;
                if let Some(preset) = descriptor.preset {
                    spec.apply_preset(preset);
                }
            }
        }

        spec
    }

    fn apply_preset(&mut self, preset: Preset) {
        self.pattern = Some(preset.pattern());
        self.preset = Some(preset);
    }

    /// Schema key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Display name used in error messages.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether a blank value is an error.
    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Whether textual values are trimmed before checking.
    pub fn trims(&self) -> bool {
        self.trim
    }

    /// Pattern the value must match, if any.
    pub fn pattern(&self) -> Option<&Regex> {
        self.pattern.as_ref()
    }

    /// Preset that populated the pattern, if any.
    pub fn preset(&self) -> Option<Preset> {
        self.preset
    }

    pub(crate) fn validator(&self) -> Option<&FieldValidator> {
        self.validator.as_ref()
    }
}

/// Cross-field validation rule over a set of keys.
#[derive(Debug, Clone)]
pub struct GroupSpec {
    keys: Vec<String>,
    validator: GroupValidator,
}

impl GroupSpec {
    pub(crate) fn new(keys: Vec<String>, validator: GroupValidator) -> Self {
        Self { keys, validator }
    }

    /// Field keys in declared order.
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub(crate) fn validator(&self) -> &GroupValidator {
        &self.validator
    }
}
