//! Competition Signup Kernel Library
//!
//! Declarative form validation, registration storage and the HTTP surface
//! for the signup and admin pages. The `signup` binary runs the server.

pub mod config;
pub mod error;
pub mod form;
pub mod forms;
pub mod routes;
pub mod session;
pub mod state;
pub mod store;
pub mod theme;
