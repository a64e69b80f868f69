//! Page rendering with Tera templates.

mod engine;

pub use engine::ThemeEngine;
