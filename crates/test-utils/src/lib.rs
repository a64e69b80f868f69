//! Signup test utilities.
//!
//! Fixtures for registrations and admin logins, plus assertion helpers for
//! rendered pages.

use serde_json::{Map, Value};

/// Session secret long enough to sign cookies in tests.
pub const TEST_SESSION_SECRET: &str =
    "test-session-secret-0123456789abcdef0123456789abcdef0123456789abcdef";

/// Create a registration with one competition.
pub fn test_registration(name: &str, email: &str) -> TestRegistration {
    TestRegistration {
        name: name.to_string(),
        email: email.to_string(),
        competitions: vec!["Chess".to_string()],
    }
}

/// A registration builder for creating test fixtures.
#[derive(Debug, Clone)]
pub struct TestRegistration {
    pub name: String,
    pub email: String,
    pub competitions: Vec<String>,
}

impl TestRegistration {
    /// Replace the selected competitions.
    pub fn with_competitions(mut self, competitions: &[&str]) -> Self {
        self.competitions = competitions.iter().map(|c| c.to_string()).collect();
        self
    }

    /// Set the email.
    pub fn with_email(mut self, email: &str) -> Self {
        self.email = email.to_string();
        self
    }

    /// Encode as an urlencoded form body, one pair per competition.
    pub fn to_form_body(&self) -> String {
        let mut body = url::form_urlencoded::Serializer::new(String::new());
        body.append_pair("name", &self.name);
        body.append_pair("email", &self.email);
        for competition in &self.competitions {
            body.append_pair("competitions", competition);
        }
        body.finish()
    }

    /// Form values as submitted, with a single competition as a plain string.
    pub fn to_values(&self) -> Map<String, Value> {
        let competitions = match self.competitions.as_slice() {
            [one] => Value::String(one.clone()),
            many => Value::Array(many.iter().cloned().map(Value::String).collect()),
        };

        let mut values = Map::new();
        values.insert("name".to_string(), Value::String(self.name.clone()));
        values.insert("email".to_string(), Value::String(self.email.clone()));
        values.insert("competitions".to_string(), competitions);
        values
    }
}

/// Urlencoded admin login body.
pub fn login_body(username: &str, password: &str) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .append_pair("username", username)
        .append_pair("password", password)
        .finish()
}

/// Assertion helpers for rendered pages.
pub mod assert {
    /// Assert that a string contains a substring.
    pub fn contains(haystack: &str, needle: &str) {
        assert!(
            haystack.contains(needle),
            "Expected string to contain '{needle}'\nActual: {haystack}"
        );
    }

    /// Assert that a string does not contain a substring.
    pub fn not_contains(haystack: &str, needle: &str) {
        assert!(
            !haystack.contains(needle),
            "Expected string to NOT contain '{needle}'\nActual: {haystack}"
        );
    }
}
