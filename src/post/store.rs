use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StoreError;

use super::model::{NewPost, PageWindow, Post, PostFilter, PostPage, PostUpdate};

/// Repository interface over the post collection.
///
/// Implementations must make `update_if_owned` and `delete_if_owned`
/// atomic single-record match-and-mutate operations: the id and creator
/// checks and the write happen as one step.
#[async_trait]
pub trait PostStore: Send + Sync {
    /// Persist a new post and return it with its generated id.
    async fn create(&self, post: NewPost) -> Result<Post, StoreError>;

    /// List posts matching `filter`, newest first.
    ///
    /// `total` counts every post matching the filter regardless of the window.
    async fn find_by_filter(
        &self,
        filter: &PostFilter,
        window: Option<PageWindow>,
    ) -> Result<PostPage, StoreError>;

    /// Look up a single post.
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Post>, StoreError>;

    /// Apply `update` to the post with `id` if it is owned by `creator`.
    ///
    /// Returns the post as it was before the update, or `None` when nothing
    /// was modified: unknown id, foreign post, or an update that leaves
    /// every field as it was.
    async fn update_if_owned(
        &self,
        id: Uuid,
        creator: &str,
        update: PostUpdate,
    ) -> Result<Option<Post>, StoreError>;

    /// Delete the post with `id` if it is owned by `creator`.
    ///
    /// Returns `true` when a post was deleted.
    async fn delete_if_owned(&self, id: Uuid, creator: &str) -> Result<bool, StoreError>;

    /// Number of stored posts, regardless of filter.
    async fn count(&self) -> Result<u64, StoreError>;

    /// Whether any post links to `image_path`.
    async fn image_in_use(&self, image_path: &str) -> Result<bool, StoreError>;

    /// List every post, newest first.
    async fn find_page(&self, window: Option<PageWindow>) -> Result<PostPage, StoreError> {
        self.find_by_filter(&PostFilter::All, window).await
    }

    /// Short backend name for logs.
    fn backend_name(&self) -> &'static str;
}
