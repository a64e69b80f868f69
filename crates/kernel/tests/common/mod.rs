#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Common test utilities for integration tests.
//!
//! [`TestApp`] wires the real router, forms and templates to the in-memory
//! record, admin and session stores, so no Redis server is needed.

#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, header};
use axum::response::Response;
use http_body_util::BodyExt;
use tower::ServiceExt;
use tower_sessions::MemoryStore;

use signup_kernel::config::Config;
use signup_kernel::state::AppState;
use signup_kernel::store::{MemoryAdminStore, MemoryRecordStore};
use signup_kernel::theme::ThemeEngine;
use signup_kernel::{routes, session};
use signup_test_utils::TEST_SESSION_SECRET;

/// Username of the admin seeded into every [`TestApp`].
pub const ADMIN_USERNAME: &str = "root";

/// Password of the seeded admin.
pub const ADMIN_PASSWORD: &str = "correct horse";

/// Test application wrapper using the real routes and state.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub records: Arc<MemoryRecordStore>,
}

impl TestApp {
    /// Create a new test application backed by memory stores.
    pub fn new() -> Self {
        // Tests run from crates/kernel/, templates live at the project root
        let manifest_dir = env!("CARGO_MANIFEST_DIR");
        let templates_dir = std::path::Path::new(manifest_dir)
            .join("../../templates");

        let config = Config::for_memory(&templates_dir, TEST_SESSION_SECRET);
        let theme = ThemeEngine::new(&templates_dir).expect("Failed to load templates");

        let records = Arc::new(MemoryRecordStore::new());
        let admins =
            Arc::new(MemoryAdminStore::new().with_admin(ADMIN_USERNAME, ADMIN_PASSWORD));

        let state = AppState::from_parts(records.clone(), admins, theme, config.clone())
            .expect("Failed to build AppState");

        let session_layer = session::create_session_layer(MemoryStore::default(), &config)
            .expect("Failed to create session layer");
        let router = routes::app(state.clone(), session_layer).expect("Failed to build router");

        Self {
            router,
            state,
            records,
        }
    }

    /// Send a request to the test application.
    pub async fn request(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request")
    }

    /// Send a request with cookies from a previous response.
    pub async fn request_with_cookies(
        &self,
        mut request: Request<Body>,
        cookies: &str,
    ) -> Response {
        if !cookies.is_empty() {
            request.headers_mut().insert(
                header::COOKIE,
                cookies.parse().expect("Invalid cookie header"),
            );
        }
        self.request(request).await
    }

    /// GET `path` with optional cookies.
    pub async fn get(&self, path: &str, cookies: &str) -> Response {
        let request = Request::get(path).body(Body::empty()).unwrap();
        self.request_with_cookies(request, cookies).await
    }

    /// POST an urlencoded `body` to `path` with optional cookies.
    pub async fn post_form(&self, path: &str, body: impl Into<String>, cookies: &str) -> Response {
        let request = Request::post(path)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.into()))
            .unwrap();
        self.request_with_cookies(request, cookies).await
    }

    /// Sign in as the seeded admin and return the session cookies.
    ///
    /// # Panics
    ///
    /// Panics if the sign in does not redirect to the admin home page.
    pub async fn login(&self) -> String {
        let response = self
            .post_form(
                "/admin",
                signup_test_utils::login_body(ADMIN_USERNAME, ADMIN_PASSWORD),
                "",
            )
            .await;

        assert_eq!(location(&response), Some("/admin/home"), "login failed");
        extract_cookies(&response)
    }
}

/// Collect `name=value` pairs from every `Set-Cookie` header.
pub fn extract_cookies(response: &Response) -> String {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .collect::<Vec<_>>()
        .join("; ")
}

/// The `Location` header of a redirect.
pub fn location(response: &Response) -> Option<&str> {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
}

/// Read a response body as text.
pub async fn body_string(response: Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}
