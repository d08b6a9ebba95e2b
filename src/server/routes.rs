//! Router configuration for the post service.
//!
//! # Route Structure
//!
//! ```text
//! /health                 - Health check
//! /api/posts              - List (GET), create (POST, auth)
//! /api/posts/users        - List posts of one user (GET)
//! /api/posts/{id}         - Fetch (GET), replace (PUT, auth), delete (DELETE, auth)
//! /images/{file}          - Stored images (local disk storage only)
//! ```
//!
//! Authentication is enforced per handler through the `AuthUser` extractor,
//! so reads stay public while every mutation requires a bearer token.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use petpack::post::MemoryPostStore;
//! use petpack::server::{create_router, AppState, RouterConfig, TokenAuth};
//! use petpack::upload::LocalImageStorage;
//!
//! let state = AppState::new(
//!     Arc::new(MemoryPostStore::new()),
//!     Arc::new(LocalImageStorage::new("images")),
//!     TokenAuth::new("my-secret-key"),
//! );
//! let router = create_router(state, RouterConfig::new().with_images_dir("images"));
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, router).await?;
//! ```

use std::path::PathBuf;
use std::time::Duration;

use axum::{extract::DefaultBodyLimit, routing::get, Router};
use http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use http::Method;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use super::handlers::{
    create_post, delete_post, get_post, health_handler, list_posts, update_post, user_posts,
    AppState,
};
use crate::upload::IMAGES_ROUTE;

/// Default upload body limit (10 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

// =============================================================================
// Router Configuration
// =============================================================================

/// Configuration for the HTTP router.
#[derive(Clone, Debug)]
pub struct RouterConfig {
    /// Allowed CORS origins (None = allow any origin)
    pub cors_origins: Option<Vec<String>>,

    /// Whether to enable request tracing
    pub enable_tracing: bool,

    /// Maximum accepted request body size for post create/update
    pub max_upload_bytes: usize,

    /// Directory served under `/images` (None = no static image route)
    pub images_dir: Option<PathBuf>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl RouterConfig {
    /// Create a router configuration.
    ///
    /// By default:
    /// - CORS allows any origin
    /// - Tracing is enabled
    /// - Uploads are capped at 10 MiB
    /// - No static image route
    pub fn new() -> Self {
        Self {
            cors_origins: None,
            enable_tracing: true,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            images_dir: None,
        }
    }

    /// Set specific allowed CORS origins.
    ///
    /// Pass an empty vec to disallow all cross-origin requests.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    /// Enable or disable request tracing.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }

    /// Set the upload body limit in bytes.
    pub fn with_max_upload_bytes(mut self, bytes: usize) -> Self {
        self.max_upload_bytes = bytes;
        self
    }

    /// Serve a local image directory under `/images`.
    pub fn with_images_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.images_dir = Some(dir.into());
        self
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// Create the main application router.
pub fn create_router(state: AppState, config: RouterConfig) -> Router {
    let cors = build_cors_layer(&config);

    let post_routes = Router::new()
        .route("/", get(list_posts).post(create_post))
        .route("/users", get(user_posts))
        .route("/{id}", get(get_post).put(update_post).delete(delete_post))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .with_state(state);

    let mut router = Router::new()
        .route("/health", get(health_handler))
        .nest("/api/posts", post_routes);

    if let Some(ref dir) = config.images_dir {
        router = router.nest_service(IMAGES_ROUTE, ServeDir::new(dir));
    }

    let router = router.layer(cors);

    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// Build the CORS layer based on configuration.
fn build_cors_layer(config: &RouterConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([ACCEPT, AUTHORIZATION, CONTENT_TYPE])
        .max_age(Duration::from_secs(86400));

    match &config.cors_origins {
        None => cors.allow_origin(Any),
        Some(origins) if origins.is_empty() => cors,
        Some(origins) => {
            let parsed_origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            cors.allow_origin(parsed_origins)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
