//! Post records and the repository interface over them.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              HTTP handlers              │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │            PostStore Trait              │
//! │  create / find / update-if-owned /      │
//! │  delete-if-owned                        │
//! └────────────────────┬────────────────────┘
//!                      │
//!          ┌───────────┴───────────┐
//!          ▼                       ▼
//! ┌─────────────────┐    ┌─────────────────────┐
//! │ MemoryPostStore │    │    PgPostStore      │
//! │  (dev / tests)  │    │   (PostgreSQL)      │
//! └─────────────────┘    └─────────────────────┘
//! ```

mod memory;
mod model;
mod postgres;
mod store;

pub use memory::MemoryPostStore;
pub use model::{
    newest_first, now_millis, NewPost, PageWindow, Post, PostFilter, PostPage, PostUpdate,
};
pub use postgres::PgPostStore;
pub use store::PostStore;
