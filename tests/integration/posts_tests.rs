//! Post lifecycle tests.
//!
//! Tests verify:
//! - Create returns the stored post and fetch round-trips it
//! - Unknown and malformed ids
//! - Owner replacement of content, avatar and image path
//! - Deletion

use axum::http::{Method, StatusCode};

use super::test_utils::{delete_request, MultipartForm, TestApp};

// =============================================================================
// Create and Fetch
// =============================================================================

#[tokio::test]
async fn test_create_and_fetch_text_post() {
    let app = TestApp::new();
    let token = app.token("u1", "rex");

    let form = MultipartForm::new()
        .text("content", "First walk in the park")
        .text("timeStamp", "1700000000000")
        .text("postAvatar", "https://cdn.test/rex.png");
    let (status, body) = app
        .send(form.into_request(Method::POST, "/api/posts", Some(&token)))
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "Post added successfully!");

    let post = &body["post"];
    assert_eq!(post["content"], "First walk in the park");
    assert_eq!(post["timeStamp"], 1700000000000i64);
    assert_eq!(post["imagePath"], "");
    assert_eq!(post["creator"], "u1");
    assert_eq!(post["creatorUsername"], "rex");
    assert_eq!(post["postAvatar"], "https://cdn.test/rex.png");

    let id = post["id"].as_str().unwrap();
    let (status, fetched) = app.get(&format!("/api/posts/{}", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&fetched, post);
}

#[tokio::test]
async fn test_create_ids_are_distinct() {
    let app = TestApp::new();
    let token = app.token("u1", "rex");

    let a = app.create_text_post(&token, "a", 1).await;
    let b = app.create_text_post(&token, "b", 1).await;

    assert_ne!(a["id"], b["id"]);
    assert_eq!(app.store.len().await, 2);
}

#[tokio::test]
async fn test_create_without_timestamp_uses_now() {
    let app = TestApp::new();
    let token = app.token("u1", "rex");

    let post = app
        .create_post(&token, MultipartForm::new().text("content", "no clock"))
        .await;

    assert!(post["timeStamp"].as_i64().unwrap() > 1_600_000_000_000);
}

#[tokio::test]
async fn test_create_with_bad_timestamp() {
    let app = TestApp::new();
    let token = app.token("u1", "rex");

    let form = MultipartForm::new()
        .text("content", "hello")
        .text("timeStamp", "yesterday");
    let (status, body) = app
        .send(form.into_request(Method::POST, "/api/posts", Some(&token)))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");
    assert!(app.store.is_empty().await);
}

#[tokio::test]
async fn test_get_unknown_post() {
    let app = TestApp::new();

    let (status, body) = app
        .get("/api/posts/0190a1b2-0000-7000-8000-000000000000")
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
    assert_eq!(body["message"], "Post not found");
    assert_eq!(body["status"], 404);
}

#[tokio::test]
async fn test_get_malformed_id() {
    let app = TestApp::new();

    let (status, body) = app.get("/api/posts/not-a-uuid").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::new();

    let (status, body) = app.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

// =============================================================================
// Update
// =============================================================================

#[tokio::test]
async fn test_owner_updates_post() {
    let app = TestApp::new();
    let token = app.token("u1", "rex");
    let post = app.create_text_post(&token, "before", 10).await;
    let id = post["id"].as_str().unwrap();

    let form = MultipartForm::new()
        .text("id", id)
        .text("title", "ignored")
        .text("content", "after")
        .text("imagePath", "http://pets.test/images/old.png");
    let (status, body) = app
        .send(form.into_request(Method::PUT, &format!("/api/posts/{}", id), Some(&token)))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Update successful");

    let (_, fetched) = app.get(&format!("/api/posts/{}", id)).await;
    assert_eq!(fetched["content"], "after");
    assert_eq!(fetched["imagePath"], "http://pets.test/images/old.png");
    assert_eq!(fetched["timeStamp"], 10);
    assert_eq!(fetched["creator"], "u1");
    // Avatar is kept when the form leaves it out
    assert_eq!(fetched["postAvatar"], "avatar.png");
}

#[tokio::test]
async fn test_update_refreshes_username_and_avatar() {
    let app = TestApp::new();
    let post = app
        .create_text_post(&app.token("u1", "rex"), "hello", 10)
        .await;
    let id = post["id"].as_str().unwrap();

    // Same user id, new display name
    let token = app.token("u1", "rexy");
    let form = MultipartForm::new()
        .text("content", "hello")
        .text("postAvatar", "new.png");
    let (status, _) = app
        .send(form.into_request(Method::PUT, &format!("/api/posts/{}", id), Some(&token)))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, fetched) = app.get(&format!("/api/posts/{}", id)).await;
    assert_eq!(fetched["creatorUsername"], "rexy");
    assert_eq!(fetched["postAvatar"], "new.png");
}

#[tokio::test]
async fn test_update_without_changes_is_rejected() {
    let app = TestApp::new();
    let token = app.token("u1", "rex");
    let post = app.create_text_post(&token, "same", 10).await;
    let id = post["id"].as_str().unwrap();

    let form = MultipartForm::new()
        .text("content", "same")
        .text("postAvatar", "avatar.png");
    let (status, body) = app
        .send(form.into_request(Method::PUT, &format!("/api/posts/{}", id), Some(&token)))
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "not_authorized");

    let (_, fetched) = app.get(&format!("/api/posts/{}", id)).await;
    assert_eq!(fetched, post);
}

#[tokio::test]
async fn test_update_body_id_mismatch() {
    let app = TestApp::new();
    let token = app.token("u1", "rex");
    let post = app.create_text_post(&token, "before", 10).await;
    let other = app.create_text_post(&token, "other", 11).await;
    let id = post["id"].as_str().unwrap();

    let form = MultipartForm::new()
        .text("id", other["id"].as_str().unwrap())
        .text("content", "after");
    let (status, body) = app
        .send(form.into_request(Method::PUT, &format!("/api/posts/{}", id), Some(&token)))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");

    let (_, fetched) = app.get(&format!("/api/posts/{}", id)).await;
    assert_eq!(fetched["content"], "before");
}

// =============================================================================
// Delete
// =============================================================================

#[tokio::test]
async fn test_owner_deletes_post() {
    let app = TestApp::new();
    let token = app.token("u1", "rex");
    let post = app.create_text_post(&token, "bye", 10).await;
    let uri = format!("/api/posts/{}", post["id"].as_str().unwrap());

    let (status, body) = app.send(delete_request(&uri, Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Deletion successful");

    let (status, _) = app.get(&uri).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // A second delete finds nothing owned by the caller
    let (status, body) = app.send(delete_request(&uri, Some(&token))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "not_authorized");
}
