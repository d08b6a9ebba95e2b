//! Post records and the query types shared by every store backend.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// A user-authored post with an optional image, owned by its creator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    /// Store generated identifier (UUID v7, time ordered)
    pub id: Uuid,

    /// Post time in Unix epoch milliseconds
    #[serde(rename = "timeStamp")]
    pub timestamp: i64,

    /// Post text
    pub content: String,

    /// Absolute URL of the attached image, empty when there is none
    pub image_path: String,

    /// Id of the owning user
    pub creator: String,

    /// Display name of the owning user at write time
    pub creator_username: String,

    /// Avatar reference of the owning user at write time
    pub post_avatar: String,
}

/// Fields needed to persist a new post. The store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPost {
    pub timestamp: i64,
    pub content: String,
    pub image_path: String,
    pub creator: String,
    pub creator_username: String,
    pub post_avatar: String,
}

impl NewPost {
    /// Materialize the post under the given id.
    pub fn into_post(self, id: Uuid) -> Post {
        Post {
            id,
            timestamp: self.timestamp,
            content: self.content,
            image_path: self.image_path,
            creator: self.creator,
            creator_username: self.creator_username,
            post_avatar: self.post_avatar,
        }
    }
}

/// Replacement body for an owner-scoped update.
///
/// `content`, `image_path` and `creator_username` are always overwritten.
/// `post_avatar` is only overwritten when present. The id, creator and
/// timestamp of a post never change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostUpdate {
    pub content: String,
    pub image_path: String,
    pub creator_username: String,
    pub post_avatar: Option<String>,
}

impl PostUpdate {
    /// Apply the update to a stored post in place.
    pub fn apply_to(&self, post: &mut Post) {
        post.content.clone_from(&self.content);
        post.image_path.clone_from(&self.image_path);
        post.creator_username.clone_from(&self.creator_username);
        if let Some(ref avatar) = self.post_avatar {
            post.post_avatar.clone_from(avatar);
        }
    }
}

/// Which posts a listing covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostFilter {
    /// Every post
    All,
    /// Posts whose `creator_username` equals the given name
    CreatorUsername(String),
}

impl PostFilter {
    /// Whether a post passes this filter.
    pub fn matches(&self, post: &Post) -> bool {
        match self {
            PostFilter::All => true,
            PostFilter::CreatorUsername(name) => post.creator_username == *name,
        }
    }
}

/// Skip/limit pair derived from a page number and a page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    /// Posts per page (never zero)
    pub page_size: u64,
    /// 1-based page number (never zero)
    pub page: u64,
}

impl PageWindow {
    /// Build a window when both values are non-zero.
    pub fn new(page_size: u64, page: u64) -> Option<Self> {
        (page_size > 0 && page > 0).then_some(Self { page_size, page })
    }

    /// Build a window from raw query values.
    ///
    /// Missing, zero, negative or non-numeric values disable windowing, in
    /// which case the listing returns every matching post.
    pub fn from_query(page_size: Option<&str>, page: Option<&str>) -> Option<Self> {
        let parse = |raw: Option<&str>| raw.and_then(|v| v.trim().parse::<u64>().ok());
        Self::new(parse(page_size)?, parse(page)?)
    }

    /// Number of posts to skip.
    pub fn skip(&self) -> u64 {
        self.page_size.saturating_mul(self.page - 1)
    }

    /// Maximum number of posts to return.
    pub fn limit(&self) -> u64 {
        self.page_size
    }
}

/// One window of a listing plus the size of the whole filtered set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostPage {
    pub posts: Vec<Post>,
    pub total: u64,
}

/// Current time in Unix epoch milliseconds.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Ordering used by every listing: newest first, ties broken by id.
pub fn newest_first(a: &Post, b: &Post) -> std::cmp::Ordering {
    b.timestamp.cmp(&a.timestamp).then_with(|| b.id.cmp(&a.id))
}
