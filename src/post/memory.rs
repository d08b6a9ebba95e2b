//! In-memory post store.
//!
//! Used for development runs without `--database-url` and by the test
//! suite. Contents are lost when the process exits.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::StoreError;

use super::model::{newest_first, NewPost, PageWindow, Post, PostFilter, PostPage, PostUpdate};
use super::store::PostStore;

/// Post store backed by a map behind an async read-write lock.
///
/// Owner-scoped mutations hold the write lock across the match and the
/// mutation, so they are atomic with respect to each other.
#[derive(Default)]
pub struct MemoryPostStore {
    posts: RwLock<HashMap<Uuid, Post>>,
}

impl MemoryPostStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored posts.
    pub async fn len(&self) -> usize {
        self.posts.read().await.len()
    }

    /// Whether the store holds no posts.
    pub async fn is_empty(&self) -> bool {
        self.posts.read().await.is_empty()
    }
}

#[async_trait]
impl PostStore for MemoryPostStore {
    async fn create(&self, post: NewPost) -> Result<Post, StoreError> {
        let post = post.into_post(Uuid::now_v7());
        self.posts.write().await.insert(post.id, post.clone());
        Ok(post)
    }

    async fn find_by_filter(
        &self,
        filter: &PostFilter,
        window: Option<PageWindow>,
    ) -> Result<PostPage, StoreError> {
        let posts = self.posts.read().await;

        let mut matching: Vec<&Post> = posts.values().filter(|p| filter.matches(p)).collect();
        matching.sort_by(|a, b| newest_first(a, b));

        let total = matching.len() as u64;
        let (skip, limit) = match window {
            Some(w) => (w.skip(), w.limit()),
            None => (0, u64::MAX),
        };

        let posts = matching
            .into_iter()
            .skip(usize::try_from(skip).unwrap_or(usize::MAX))
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .cloned()
            .collect();

        Ok(PostPage { posts, total })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Post>, StoreError> {
        Ok(self.posts.read().await.get(&id).cloned())
    }

    async fn update_if_owned(
        &self,
        id: Uuid,
        creator: &str,
        update: PostUpdate,
    ) -> Result<Option<Post>, StoreError> {
        let mut posts = self.posts.write().await;
        match posts.get_mut(&id) {
            Some(post) if post.creator == creator => {
                let previous = post.clone();
                update.apply_to(post);
                Ok((*post != previous).then_some(previous))
            }
            _ => Ok(None),
        }
    }

    async fn delete_if_owned(&self, id: Uuid, creator: &str) -> Result<bool, StoreError> {
        let mut posts = self.posts.write().await;
        let owned = posts.get(&id).is_some_and(|p| p.creator == creator);
        if owned {
            posts.remove(&id);
        }
        Ok(owned)
    }

    async fn count(&self) -> Result<u64, StoreError> {
        Ok(self.posts.read().await.len() as u64)
    }

    async fn image_in_use(&self, image_path: &str) -> Result<bool, StoreError> {
        Ok(self
            .posts
            .read()
            .await
            .values()
            .any(|p| p.image_path == image_path))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
