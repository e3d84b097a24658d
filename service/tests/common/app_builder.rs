//! Test app builder that mirrors main.rs wiring with injectable keys and routes.
//!
//! This module provides a [`TestAppBuilder`] that constructs an Axum router matching
//! the production configuration in `main.rs`, but with keys, limits, and extra
//! routes supplied by the test instead of the environment.
//!
//! # Usage
//!
//! ```ignore
//! use crate::common::app_builder::TestAppBuilder;
//!
//! #[tokio::test]
//! async fn test_with_full_app() {
//!     let app = TestAppBuilder::with_rest()
//!         .with_keys(common::both_keys())
//!         .with_cors(&["http://localhost:3000"])
//!         .build();
//!
//!     // Use app.oneshot(...) to send requests
//! }
//! ```
//!
//! # Preset Builders
//!
//! - [`TestAppBuilder::minimal()`] - Health check only
//! - [`TestAppBuilder::with_rest()`] - REST routes and health check, no keys

use axum::{
    http::{HeaderValue, Method, StatusCode},
    middleware,
    response::IntoResponse,
    routing::{get, MethodRouter},
    Extension, Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;
use vormiaquery_api::{
    config::AccessConfig,
    http::{
        allowlist_middleware, decrypt_request_middleware, encrypt_response_middleware,
        AccessPolicy, EncryptionContext,
    },
    keys::{KeySet, SharedKeyProvider},
    rest::{self, ApiDoc},
};

/// Health check handler (mirrors main.rs)
async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}

/// Builder for test applications that mirrors main.rs wiring.
pub struct TestAppBuilder {
    /// Whether to include REST API routes
    include_rest: bool,
    /// Whether to include health check route
    include_health: bool,
    /// Whether to include Swagger UI
    include_swagger: bool,
    /// Key provider handed to the encryption stages
    keys: SharedKeyProvider,
    /// Body buffering limit for the encryption stages
    max_body_bytes: usize,
    /// Extra routes registered by the test
    routes: Vec<(&'static str, MethodRouter)>,
    /// CORS allowed origins (None means no CORS layer)
    cors_origins: Option<Vec<String>>,
    /// Allow-lists (None means the layer is not installed)
    access: Option<AccessConfig>,
}

impl Default for TestAppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestAppBuilder {
    /// Create a new empty builder with no keys.
    #[must_use]
    pub fn new() -> Self {
        Self {
            include_rest: false,
            include_health: false,
            include_swagger: false,
            keys: KeySet::empty().shared(),
            max_body_bytes: 2 * 1024 * 1024,
            routes: Vec::new(),
            cors_origins: None,
            access: None,
        }
    }

    // =========================================================================
    // Preset Builders
    // =========================================================================

    /// Create a minimal app with only the health check endpoint.
    #[must_use]
    pub fn minimal() -> Self {
        Self::new().with_health()
    }

    /// Create an app with the REST routes and health check.
    #[must_use]
    pub fn with_rest() -> Self {
        Self::new().rest().with_health()
    }

    // =========================================================================
    // Component Configuration
    // =========================================================================

    /// Include REST API routes (/api/v1/*).
    #[must_use]
    pub fn rest(mut self) -> Self {
        self.include_rest = true;
        self
    }

    /// Include health check route (/health).
    #[must_use]
    pub fn with_health(mut self) -> Self {
        self.include_health = true;
        self
    }

    /// Include Swagger UI (/swagger-ui).
    #[must_use]
    pub fn with_swagger(mut self) -> Self {
        self.include_swagger = true;
        self
    }

    /// Use these keys for the encryption stages.
    #[must_use]
    pub fn with_keys(mut self, keys: KeySet) -> Self {
        self.keys = keys.shared();
        self
    }

    /// Use a custom key provider.
    #[must_use]
    pub fn with_key_provider(mut self, keys: SharedKeyProvider) -> Self {
        self.keys = keys;
        self
    }

    /// Override the body buffering limit.
    #[must_use]
    pub fn with_max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    /// Register an extra route inside the encryption layers.
    #[must_use]
    pub fn with_route(mut self, path: &'static str, route: MethodRouter) -> Self {
        self.routes.push((path, route));
        self
    }

    /// Configure CORS with specific allowed origins.
    ///
    /// Pass an empty slice to block all cross-origin requests.
    /// Pass `&["*"]` to allow any origin.
    #[must_use]
    pub fn with_cors(mut self, origins: &[&str]) -> Self {
        self.cors_origins = Some(origins.iter().map(|s| (*s).to_string()).collect());
        self
    }

    /// Install the allow-list layer.
    #[must_use]
    pub fn with_access(mut self, access: AccessConfig) -> Self {
        self.access = Some(access);
        self
    }

    // =========================================================================
    // Build
    // =========================================================================

    /// Build the Axum router.
    ///
    /// The layer ordering matches main.rs exactly:
    /// 1. Routes (REST, Health, Swagger, extra)
    /// 2. Decrypt stage, then encrypt stage, then their shared context
    /// 3. CORS layer
    /// 4. Allow-list middleware (outermost)
    #[must_use]
    pub fn build(self) -> Router {
        let mut app = Router::new();

        if self.include_rest {
            app = app.nest("/api/v1", rest::router());
        }

        if self.include_health {
            app = app.route("/health", get(health_check));
        }

        if self.include_swagger {
            app = app.merge(
                SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()),
            );
        }

        for (path, route) in self.routes {
            app = app.route(path, route);
        }

        app = app
            .layer(middleware::from_fn(decrypt_request_middleware))
            .layer(middleware::from_fn(encrypt_response_middleware))
            .layer(Extension(EncryptionContext::new(
                self.keys,
                self.max_body_bytes,
            )));

        // Add CORS layer if configured
        if let Some(origins) = self.cors_origins {
            let allow_origin: AllowOrigin = if origins.iter().any(|o| o == "*") {
                AllowOrigin::any()
            } else if origins.is_empty() {
                AllowOrigin::list(Vec::<HeaderValue>::new())
            } else {
                let header_values: Vec<HeaderValue> = origins
                    .iter()
                    .filter_map(|origin| origin.parse().ok())
                    .collect();
                AllowOrigin::list(header_values)
            };

            app = app.layer(
                CorsLayer::new()
                    .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                    .allow_headers(Any)
                    .allow_origin(allow_origin),
            );
        }

        if let Some(access) = self.access {
            if access.is_enabled() {
                app = app
                    .layer(middleware::from_fn(allowlist_middleware))
                    .layer(Extension(AccessPolicy::from_config(&access)));
            }
        }

        app
    }
}
