//! # PetPack
//!
//! REST backend for PetPack, where users share short text and image posts
//! about their pets.
//!
//! ## Features
//!
//! - **Posts API**: create, list, paginate, fetch, replace and delete posts
//! - **Ownership**: updates and deletes only apply to the caller's own posts
//! - **Image uploads**: PNG/JPEG only, stored on local disk or in S3
//! - **Authentication**: HMAC-SHA256 signed bearer tokens
//! - **Persistence**: PostgreSQL, or an in-memory store for development
//!
//! ## Architecture
//!
//! - [`post`] - Post model and the [`PostStore`] repository
//! - [`upload`] - Image validation and [`ImageStorage`] backends
//! - [`server`] - Axum handlers, auth extractor and router
//! - [`config`] - CLI and configuration types
//! - [`error`] - Error types for each layer
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use petpack::{create_router, AppState, LocalImageStorage, MemoryPostStore, RouterConfig, TokenAuth};
//!
//! #[tokio::main]
//! async fn main() {
//!     let state = AppState::new(
//!         Arc::new(MemoryPostStore::new()),
//!         Arc::new(LocalImageStorage::new("images")),
//!         TokenAuth::new("my-secret-key"),
//!     );
//!     let router = create_router(state, RouterConfig::new().with_images_dir("images"));
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
//!     axum::serve(listener, router).await.unwrap();
//! }
//! ```

pub mod config;
pub mod error;
pub mod post;
pub mod server;
pub mod upload;

// Re-export commonly used types
pub use config::{Cli, Command, ServeConfig, SignConfig, SignOutputFormat, StorageBackend};
pub use error::{PostError, StorageError, StoreError};
pub use post::{
    MemoryPostStore, NewPost, PageWindow, PgPostStore, Post, PostFilter, PostPage, PostStore,
    PostUpdate,
};
pub use server::{
    create_router, AppState, AuthError, AuthUser, ErrorResponse, RouterConfig, TokenAuth,
    UserClaims,
};
pub use upload::{
    create_s3_client, ImageStorage, ImageUpload, LocalImageStorage, S3ImageStorage,
};
