//! Declarative form validation.
//!
//! A form is built from a schema mapping field keys to [`Rule`]s plus any
//! number of cross-field group validators. Each submission is checked field
//! by field, then group by group, and yields either the sanitized values or
//! every error message in one [`ValidationError`]:
//! - Required/optional handling with whitespace trimming
//! - Pattern checks, including named presets such as `email`
//! - Synchronous and asynchronous custom validators
//! - Group validators that only run when all their fields passed

mod engine;
mod error;
mod types;

pub use engine::{Form, FormValues};
pub use error::{ErrorKind, FieldError, SchemaError, ValidationError};
pub use types::{
    FieldDescriptor, FieldSpec, FieldValidator, GroupSpec, GroupValidator, Outcome, Preset, Rule,
    ValidatorFuture,
};
