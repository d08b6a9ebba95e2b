//! HTTP server layer for the post service.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │            /api/posts   /api/posts/{id}   /images               │
//! │                                                                 │
//! │  ┌─────────────┐  ┌─────────────┐  ┌──────────┐  ┌───────────┐  │
//! │  │  handlers   │  │    auth     │  │   form   │  │  routes   │  │
//! │  │ (requests)  │  │  (bearer)   │  │(multipart│  │ (router)  │  │
//! │  └─────────────┘  └─────────────┘  └──────────┘  └───────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod auth;
pub mod form;
pub mod handlers;
pub mod routes;

pub use auth::{bearer_token, AuthError, AuthUser, TokenAuth, UserClaims};
pub use form::PostForm;
pub use handlers::{
    create_post, delete_post, get_post, health_handler, list_posts, update_post, user_posts,
    AppState, CreatePostResponse, ErrorResponse, HealthResponse, ListQueryParams,
    MessageResponse, PostsResponse, RequestOrigin, UserPostsQueryParams,
};
pub use routes::{create_router, RouterConfig, DEFAULT_MAX_UPLOAD_BYTES};
