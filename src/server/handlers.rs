//! HTTP request handlers for the post API.
//!
//! # Endpoints
//!
//! - `POST /api/posts` - Create a post (auth)
//! - `GET /api/posts` - List posts
//! - `GET /api/posts/users` - List posts of one user
//! - `GET /api/posts/{id}` - Fetch a post
//! - `PUT /api/posts/{id}` - Replace an owned post (auth)
//! - `DELETE /api/posts/{id}` - Delete an owned post (auth)
//! - `GET /health` - Health check endpoint

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequestParts, Multipart, Path, Query, State},
    http::{header, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{PostError, StorageError};
use crate::post::{NewPost, PageWindow, Post, PostFilter, PostPage, PostStore, PostUpdate};
use crate::upload::ImageStorage;

use super::auth::{AuthUser, TokenAuth};
use super::form::PostForm;

// =============================================================================
// Application State
// =============================================================================

/// Shared application state.
///
/// This is passed to all handlers via Axum's State extractor.
#[derive(Clone)]
pub struct AppState {
    /// Post repository
    pub store: Arc<dyn PostStore>,

    /// Image storage backend
    pub storage: Arc<dyn ImageStorage>,

    /// Bearer token verifier
    pub auth: TokenAuth,

    /// Base URL used for image links instead of the request host
    pub public_base_url: Option<String>,
}

impl AppState {
    /// Create a new application state.
    pub fn new(
        store: Arc<dyn PostStore>,
        storage: Arc<dyn ImageStorage>,
        auth: TokenAuth,
    ) -> Self {
        Self {
            store,
            storage,
            auth,
            public_base_url: None,
        }
    }

    /// Build image URLs from a fixed public base instead of the request host.
    pub fn with_public_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.public_base_url = Some(base_url.into());
        self
    }

    /// Base URL for image links of a request.
    fn image_base(&self, origin: &RequestOrigin) -> String {
        match &self.public_base_url {
            Some(base) => base.clone(),
            None => origin.base_url(),
        }
    }
}

impl FromRef<AppState> for TokenAuth {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}

// =============================================================================
// Request Parameters
// =============================================================================

/// Query parameters for the post list endpoint.
///
/// Values are kept as strings: anything that is not a positive integer
/// disables windowing instead of rejecting the request.
#[derive(Debug, Default, Deserialize)]
pub struct ListQueryParams {
    /// Posts per page
    #[serde(default)]
    pub pagesize: Option<String>,

    /// 1-based page number
    #[serde(default)]
    pub page: Option<String>,
}

impl ListQueryParams {
    /// Pagination window, if both values are positive integers.
    pub fn window(&self) -> Option<PageWindow> {
        PageWindow::from_query(self.pagesize.as_deref(), self.page.as_deref())
    }
}

/// Query parameters for the per-user post list endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct UserPostsQueryParams {
    /// Posts per page
    #[serde(default)]
    pub pagesize: Option<String>,

    /// 1-based page number
    #[serde(default)]
    pub page: Option<String>,

    /// Creator display name to filter on
    #[serde(default)]
    pub username: Option<String>,
}

/// Scheme and host a request arrived on.
///
/// The scheme comes from `X-Forwarded-Proto` (reverse proxy support) and
/// defaults to `http`; the host comes from the `Host` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOrigin {
    pub scheme: String,
    pub host: String,
}

impl RequestOrigin {
    /// `scheme://host`
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.scheme, self.host)
    }
}

impl<S> FromRequestParts<S> for RequestOrigin
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let host = parts
            .headers
            .get(header::HOST)
            .and_then(|h| h.to_str().ok())
            .map(str::to_string)
            .or_else(|| parts.uri.authority().map(|a| a.to_string()))
            .unwrap_or_else(|| "localhost".to_string());

        let scheme = parts
            .headers
            .get("x-forwarded-proto")
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.split(',').next())
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| "http".to_string());

        Ok(RequestOrigin { scheme, host })
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON error response returned for all error conditions.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error type identifier (e.g., "not_found", "not_authorized")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// HTTP status code (included for convenience)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ErrorResponse {
    /// Create a new error response.
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: None,
        }
    }

    /// Create a new error response with status code.
    pub fn with_status(
        error: impl Into<String>,
        message: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: Some(status.as_u16()),
        }
    }
}

/// Plain acknowledgement.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Response from the create endpoint.
#[derive(Debug, Serialize)]
pub struct CreatePostResponse {
    pub message: String,
    pub post: Post,
}

/// Response from the list endpoints.
#[derive(Debug, Serialize)]
pub struct PostsResponse {
    pub message: String,

    /// Posts in the requested window, newest first
    pub posts: Vec<Post>,

    /// Number of posts matching the listing, ignoring the window
    #[serde(rename = "maxPosts")]
    pub max_posts: u64,
}

impl From<PostPage> for PostsResponse {
    fn from(page: PostPage) -> Self {
        Self {
            message: "Posts fetched successfully".to_string(),
            posts: page.posts,
            max_posts: page.total,
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Convert PostError to HTTP response.
///
/// This implementation logs errors appropriately based on their severity:
/// - 5xx errors are logged at ERROR level
/// - rejected uploads and bad requests at WARN level
/// - 401/404 at DEBUG level (common and expected)
impl IntoResponse for PostError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            PostError::NotFound => (StatusCode::NOT_FOUND, "not_found", self.to_string()),

            PostError::NotAuthorized => (
                StatusCode::UNAUTHORIZED,
                "not_authorized",
                self.to_string(),
            ),

            PostError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),

            PostError::Multipart { status, message } => {
                let status = StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_REQUEST);
                let error_type = if status == StatusCode::PAYLOAD_TOO_LARGE {
                    "payload_too_large"
                } else {
                    "bad_request"
                };
                (status, error_type, message.clone())
            }

            PostError::Storage(storage_err) => match storage_err {
                StorageError::InvalidMimeType(_) | StorageError::ContentMismatch { .. } => (
                    StatusCode::UNSUPPORTED_MEDIA_TYPE,
                    "unsupported_media_type",
                    storage_err.to_string(),
                ),
                StorageError::Io(_) | StorageError::S3(_) | StorageError::NameTaken(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "storage_error",
                    "Failed to store image".to_string(),
                ),
            },

            PostError::Store(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "store_error",
                "Failed to access post store".to_string(),
            ),
        };

        // Log errors based on severity
        if status.is_server_error() {
            error!(
                error_type = error_type,
                status = status.as_u16(),
                "Server error: {}",
                self
            );
        } else if status == StatusCode::NOT_FOUND || status == StatusCode::UNAUTHORIZED {
            debug!(
                error_type = error_type,
                status = status.as_u16(),
                "Request rejected: {}",
                message
            );
        } else {
            warn!(
                error_type = error_type,
                status = status.as_u16(),
                "Client error: {}",
                message
            );
        }

        let error_response = ErrorResponse::with_status(error_type, message, status);

        (status, Json(error_response)).into_response()
    }
}

/// Parse a path id. Malformed ids can never match a post.
fn parse_post_id(raw: &str) -> Option<Uuid> {
    Uuid::parse_str(raw.trim()).ok()
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle post creation.
///
/// # Endpoint
///
/// `POST /api/posts`
///
/// # Body
///
/// `multipart/form-data` with `content`, `timeStamp`, `postAvatar` and an
/// optional `image` file (png or jpeg).
///
/// # Response
///
/// - `201 Created`: `{ "message": ..., "post": { ... } }`
/// - `400 Bad Request`: Malformed form or timestamp
/// - `401 Unauthorized`: Missing or invalid token
/// - `415 Unsupported Media Type`: Image type outside the allow-list
/// - `500 Internal Server Error`: Store or storage failure
pub async fn create_post(
    State(state): State<AppState>,
    user: AuthUser,
    origin: RequestOrigin,
    multipart: Multipart,
) -> Result<(StatusCode, Json<CreatePostResponse>), PostError> {
    let form = PostForm::parse(multipart).await?;
    let timestamp = form.timestamp()?;

    let stored = match form.image {
        Some(ref image) => Some(state.storage.store(image).await?),
        None => None,
    };
    let image_path = stored
        .as_deref()
        .map(|name| state.storage.public_url(name, &state.image_base(&origin)))
        .unwrap_or_default();

    let new_post = NewPost {
        timestamp,
        content: form.text_or_empty("content"),
        image_path,
        creator: user.user_id,
        creator_username: user.user_name,
        post_avatar: form.text_or_empty("postAvatar"),
    };

    let post = match state.store.create(new_post).await {
        Ok(post) => post,
        Err(err) => {
            if let Some(ref name) = stored {
                discard_image(state.storage.as_ref(), name).await;
            }
            return Err(err.into());
        }
    };

    info!(post_id = %post.id, creator = %post.creator, "Post created");

    Ok((
        StatusCode::CREATED,
        Json(CreatePostResponse {
            message: "Post added successfully!".to_string(),
            post,
        }),
    ))
}

/// Handle post replacement.
///
/// # Endpoint
///
/// `PUT /api/posts/{id}`
///
/// # Body
///
/// `multipart/form-data` with `content`, an optional `image` file, and
/// `imagePath` (the current image URL, reused when no new file is sent).
/// `id` must equal the path id when present; `title` is ignored.
///
/// # Response
///
/// - `200 OK`: Post modified. A replaced image is removed when no other
///   post links to it.
/// - `401 Unauthorized`: Unknown id, foreign post, or nothing would change
pub async fn update_post(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    user: AuthUser,
    origin: RequestOrigin,
    multipart: Multipart,
) -> Result<Json<MessageResponse>, PostError> {
    let id = parse_post_id(&raw_id).ok_or(PostError::NotAuthorized)?;
    let form = PostForm::parse(multipart).await?;

    if let Some(body_id) = form.text("id").filter(|v| !v.trim().is_empty()) {
        if parse_post_id(body_id) != Some(id) {
            return Err(PostError::BadRequest(
                "Body id does not match the path id".to_string(),
            ));
        }
    }

    let stored = match form.image {
        Some(ref image) => Some(state.storage.store(image).await?),
        None => None,
    };
    let image_path = match stored {
        Some(ref name) => state.storage.public_url(name, &state.image_base(&origin)),
        None => form.text_or_empty("imagePath"),
    };

    let update = PostUpdate {
        content: form.text_or_empty("content"),
        image_path: image_path.clone(),
        creator_username: user.user_name,
        post_avatar: form.text("postAvatar").map(str::to_string),
    };

    let previous = match state.store.update_if_owned(id, &user.user_id, update).await {
        Ok(Some(previous)) => previous,
        result => {
            if let Some(ref name) = stored {
                discard_image(state.storage.as_ref(), name).await;
            }
            result?;
            return Err(PostError::NotAuthorized);
        }
    };

    if !previous.image_path.is_empty() && previous.image_path != image_path {
        release_image(&state, &previous.image_path).await;
    }

    info!(post_id = %id, creator = %user.user_id, "Post updated");
    Ok(Json(MessageResponse::new("Update successful")))
}

/// Handle post listing.
///
/// # Endpoint
///
/// `GET /api/posts?pagesize={n}&page={k}`
///
/// # Response
///
/// `200 OK` with JSON body:
/// ```json
/// {
///   "message": "Posts fetched successfully",
///   "posts": [ ... ],
///   "maxPosts": 42
/// }
/// ```
pub async fn list_posts(
    State(state): State<AppState>,
    Query(query): Query<ListQueryParams>,
) -> Result<Json<PostsResponse>, PostError> {
    let page = state.store.find_page(query.window()).await?;
    Ok(Json(page.into()))
}

/// Handle per-user post listing.
///
/// # Endpoint
///
/// `GET /api/posts/users?username={name}&pagesize={n}&page={k}`
///
/// Same response as [`list_posts`], restricted to posts whose
/// `creatorUsername` equals `username`. `maxPosts` is the same total as
/// on [`list_posts`]: every stored post, not just this user's.
pub async fn user_posts(
    State(state): State<AppState>,
    Query(query): Query<UserPostsQueryParams>,
) -> Result<Json<PostsResponse>, PostError> {
    let window = PageWindow::from_query(query.pagesize.as_deref(), query.page.as_deref());
    let filter = PostFilter::CreatorUsername(query.username.unwrap_or_default());

    let mut page = state.store.find_by_filter(&filter, window).await?;
    page.total = state.store.count().await?;
    Ok(Json(page.into()))
}

/// Handle single post requests.
///
/// # Endpoint
///
/// `GET /api/posts/{id}`
///
/// # Response
///
/// - `200 OK`: The post
/// - `404 Not Found`: No post with this id
pub async fn get_post(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<Post>, PostError> {
    let id = parse_post_id(&raw_id).ok_or(PostError::NotFound)?;

    state
        .store
        .find_by_id(id)
        .await?
        .map(Json)
        .ok_or(PostError::NotFound)
}

/// Handle post deletion.
///
/// # Endpoint
///
/// `DELETE /api/posts/{id}`
///
/// # Response
///
/// - `200 OK`: Post deleted
/// - `401 Unauthorized`: Unknown id, or the caller does not own the post
pub async fn delete_post(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    user: AuthUser,
) -> Result<Json<MessageResponse>, PostError> {
    let id = parse_post_id(&raw_id).ok_or(PostError::NotAuthorized)?;

    if !state.store.delete_if_owned(id, &user.user_id).await? {
        return Err(PostError::NotAuthorized);
    }

    info!(post_id = %id, creator = %user.user_id, "Post deleted");
    Ok(Json(MessageResponse::new("Deletion successful")))
}

/// Handle health check requests.
///
/// # Endpoint
///
/// `GET /health`
///
/// # Response
///
/// `200 OK` with JSON body:
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0"
/// }
/// ```
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Best-effort removal of an image whose post was never written.
async fn discard_image(storage: &dyn ImageStorage, file_name: &str) {
    if let Err(e) = storage.remove(file_name).await {
        warn!(file_name = file_name, "Failed to remove orphaned image: {}", e);
    }
}

/// Remove the image an update replaced, unless it lives elsewhere or
/// another post still links to it.
///
/// `imagePath` is client supplied on update, so a replaced link is not
/// proof that the post owned the file.
async fn release_image(state: &AppState, image_path: &str) {
    let Some(file_name) = state.storage.file_name_for_url(image_path) else {
        return;
    };

    match state.store.image_in_use(image_path).await {
        Ok(false) => discard_image(state.storage.as_ref(), &file_name).await,
        Ok(true) => debug!(image_path = image_path, "Replaced image still linked, keeping it"),
        Err(e) => warn!(image_path = image_path, "Failed to check image links: {}", e),
    }
}

// =============================================================================
// Tests
// =============================================================================
