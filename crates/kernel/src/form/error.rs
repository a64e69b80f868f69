//! Form configuration and validation errors.

use serde::Serialize;
use thiserror::Error;

/// Schema configuration errors, reported while the form is being built.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// A literal rule token that names neither `required` nor a preset.
    #[error("unknown rule token '{0}'")]
    UnknownRule(String),

    /// A pattern string that does not compile.
    #[error("invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// A group validator registered without any field keys.
    #[error("a group validator needs at least one field key")]
    EmptyGroup,

    /// A group names a key the schema does not declare.
    #[error("group validator references unknown field '{0}'")]
    UnknownGroupKey(String),
}

/// Which check produced a validation error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A required field was blank.
    Required,
    /// A field value did not match its pattern.
    Pattern,
    /// A field validator reported or raised an error.
    Custom,
    /// A cross-field group validator reported or raised an error.
    Group,
}

/// A single recorded validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// The check that failed.
    pub kind: ErrorKind,

    /// Field key (None for group errors).
    pub field: Option<String>,

    /// Error message shown to the user.
    pub message: String,
}

impl FieldError {
    /// Create a field-level error.
    pub fn field(kind: ErrorKind, key: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            field: Some(key.into()),
            message: message.into(),
        }
    }

    /// Create a group-level error.
    pub fn group(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Group,
            field: None,
            message: message.into(),
        }
    }
}

/// Aggregated failure of a `validate` call.
///
/// Field errors come first in schema order, then group errors in the order
/// the groups were registered. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("form validation failed: {}", join_messages(.errors))]
pub struct ValidationError {
    errors: Vec<FieldError>,
}

impl ValidationError {
    pub(crate) fn new(errors: Vec<FieldError>) -> Self {
        Self { errors }
    }

    /// All recorded errors.
    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// Error messages in order, as shown to users.
    pub fn messages(&self) -> Vec<&str> {
        self.errors.iter().map(|e| e.message.as_str()).collect()
    }

    /// Consume the error and return the owned message list.
    pub fn into_messages(self) -> Vec<String> {
        self.errors.into_iter().map(|e| e.message).collect()
    }

    /// Number of recorded errors.
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Whether no errors were recorded.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

fn join_messages(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_and_group_constructors() {
        let field_error =
            FieldError::field(ErrorKind::Required, "email", "email field is required.");
        assert_eq!(field_error.field.as_deref(), Some("email"));
        assert_eq!(field_error.kind, ErrorKind::Required);

        let group_error = FieldError::group("Invalid username or password");
        assert!(group_error.field.is_none());
        assert_eq!(group_error.kind, ErrorKind::Group);
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::new(vec![
            FieldError::field(ErrorKind::Required, "name", "name field is required."),
            FieldError::group("Invalid username or password"),
        ]);

        assert_eq!(err.len(), 2);
        assert_eq!(
            err.messages(),
            vec!["name field is required.", "Invalid username or password"]
        );
        assert_eq!(
            err.to_string(),
            "form validation failed: name field is required. Invalid username or password"
        );
    }
}
