//! Image upload tests.
//!
//! Tests verify:
//! - PNG and JPEG uploads are stored and linked from the post
//! - Disallowed types and mismatched bytes are rejected before anything is written
//! - Update replaces or keeps the image, and releases a replaced file nobody links to
//! - Uploads sharing a file name never overwrite each other
//! - Stored images are served under `/images`

use axum::http::{Method, StatusCode};

use super::test_utils::{
    create_test_gif, create_test_jpeg, create_test_png, get_request, MultipartForm, TestApp,
};

fn image_form(file_name: &str, content_type: &str, data: Vec<u8>) -> MultipartForm {
    MultipartForm::new()
        .text("content", "look at this")
        .text("timeStamp", "100")
        .image(file_name, content_type, data)
}

#[tokio::test]
async fn test_png_upload_is_stored_and_linked() {
    let app = TestApp::new();
    let token = app.token("u1", "rex");

    let post = app
        .create_post(&token, image_form("My Cat.png", "image/png", create_test_png(8, 8)))
        .await;

    let image_path = post["imagePath"].as_str().unwrap();
    assert!(
        image_path.starts_with("http://pets.test/images/my-cat.png-"),
        "unexpected image path {}",
        image_path
    );
    assert!(image_path.ends_with(".png"));
    assert_eq!(app.stored_image_count(), 1);

    let file_name = image_path.rsplit('/').next().unwrap();
    assert!(app.images_dir().join(file_name).exists());
}

#[tokio::test]
async fn test_jpeg_upload_uses_jpg_extension() {
    let app = TestApp::new();
    let token = app.token("u1", "rex");

    let post = app
        .create_post(&token, image_form("dog.jpeg", "image/jpeg", create_test_jpeg(8, 8)))
        .await;

    assert!(post["imagePath"].as_str().unwrap().ends_with(".jpg"));
}

#[tokio::test]
async fn test_stored_image_is_served() {
    let app = TestApp::new();
    let token = app.token("u1", "rex");
    let png = create_test_png(4, 4);

    let post = app
        .create_post(&token, image_form("cat.png", "image/png", png.clone()))
        .await;
    let image_path = post["imagePath"].as_str().unwrap();
    let path = image_path.trim_start_matches("http://pets.test");

    let (status, body) = app.send_raw(get_request(path)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, png);
}

#[tokio::test]
async fn test_forwarded_proto_in_image_url() {
    let app = TestApp::new();
    let token = app.token("u1", "rex");

    let mut request = image_form("cat.png", "image/png", create_test_png(4, 4)).into_request(
        Method::POST,
        "/api/posts",
        Some(&token),
    );
    request
        .headers_mut()
        .insert("x-forwarded-proto", "https".parse().unwrap());

    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body["post"]["imagePath"]
        .as_str()
        .unwrap()
        .starts_with("https://pets.test/images/"));
}

#[tokio::test]
async fn test_public_base_url_overrides_host() {
    let app = TestApp::with_public_base_url("https://api.petpack.app/");
    let token = app.token("u1", "rex");

    let post = app
        .create_post(&token, image_form("cat.png", "image/png", create_test_png(4, 4)))
        .await;

    assert!(post["imagePath"]
        .as_str()
        .unwrap()
        .starts_with("https://api.petpack.app/images/cat.png-"));
}

#[tokio::test]
async fn test_gif_rejected_without_side_effects() {
    let app = TestApp::new();
    let token = app.token("u1", "rex");

    let (status, body) = app
        .send(
            image_form("anim.gif", "image/gif", create_test_gif()).into_request(
                Method::POST,
                "/api/posts",
                Some(&token),
            ),
        )
        .await;

    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(body["error"], "unsupported_media_type");
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("Invalid mime type"));
    assert_eq!(app.stored_image_count(), 0);
    assert!(app.store.is_empty().await);
}

#[tokio::test]
async fn test_mislabeled_bytes_rejected() {
    let app = TestApp::new();
    let token = app.token("u1", "rex");

    // GIF bytes declared as PNG
    let (status, body) = app
        .send(
            image_form("fake.png", "image/png", create_test_gif()).into_request(
                Method::POST,
                "/api/posts",
                Some(&token),
            ),
        )
        .await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(body["error"], "unsupported_media_type");

    // JPEG bytes declared as PNG
    let (status, _) = app
        .send(
            image_form("fake.png", "image/png", create_test_jpeg(4, 4)).into_request(
                Method::POST,
                "/api/posts",
                Some(&token),
            ),
        )
        .await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);

    assert_eq!(app.stored_image_count(), 0);
    assert!(app.store.is_empty().await);
}

#[tokio::test]
async fn test_second_image_rejected() {
    let app = TestApp::new();
    let token = app.token("u1", "rex");

    let form = image_form("a.png", "image/png", create_test_png(4, 4)).image(
        "b.png",
        "image/png",
        create_test_png(4, 4),
    );
    let (status, body) = app
        .send(form.into_request(Method::POST, "/api/posts", Some(&token)))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");
    assert!(app.store.is_empty().await);
}

#[tokio::test]
async fn test_file_under_other_field_rejected() {
    let app = TestApp::new();
    let token = app.token("u1", "rex");

    let form = MultipartForm::new().text("content", "x").file(
        "attachment",
        "a.png",
        "image/png",
        create_test_png(4, 4),
    );
    let (status, _) = app
        .send(form.into_request(Method::POST, "/api/posts", Some(&token)))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.stored_image_count(), 0);
}

#[tokio::test]
async fn test_empty_file_part_is_ignored() {
    let app = TestApp::new();
    let token = app.token("u1", "rex");

    let form = MultipartForm::new()
        .text("content", "no picture")
        .image("", "application/octet-stream", Vec::new());
    let post = app.create_post(&token, form).await;

    assert_eq!(post["imagePath"], "");
    assert_eq!(app.stored_image_count(), 0);
}

#[tokio::test]
async fn test_oversized_upload_rejected() {
    let app = TestApp::with_max_upload_bytes(1024);
    let token = app.token("u1", "rex");

    let (status, _) = app
        .send(
            image_form("big.png", "image/png", vec![0u8; 4096]).into_request(
                Method::POST,
                "/api/posts",
                Some(&token),
            ),
        )
        .await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(app.store.is_empty().await);
    assert_eq!(app.stored_image_count(), 0);
}

#[tokio::test]
async fn test_update_replaces_image() {
    let app = TestApp::new();
    let token = app.token("u1", "rex");
    let post = app
        .create_post(&token, image_form("old.png", "image/png", create_test_png(4, 4)))
        .await;
    let uri = format!("/api/posts/{}", post["id"].as_str().unwrap());

    let form = MultipartForm::new()
        .text("content", "new picture")
        .text("imagePath", post["imagePath"].as_str().unwrap())
        .image("new.jpg", "image/jpeg", create_test_jpeg(4, 4));
    let (status, _) = app
        .send(form.into_request(Method::PUT, &uri, Some(&token)))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, fetched) = app.get(&uri).await;
    let image_path = fetched["imagePath"].as_str().unwrap();
    assert!(image_path.starts_with("http://pets.test/images/new.jpg-"));
    assert_ne!(image_path, post["imagePath"].as_str().unwrap());

    // The replaced image is gone, the new one is served
    assert_eq!(app.stored_image_count(), 1);
    let old_path = post["imagePath"]
        .as_str()
        .unwrap()
        .trim_start_matches("http://pets.test");
    let (status, _) = app.send_raw(get_request(old_path)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_update_keeps_replaced_image_linked_elsewhere() {
    let app = TestApp::new();
    let rex = app.token("u1", "rex");
    let fido = app.token("u2", "fido");

    let post = app
        .create_post(&rex, image_form("cat.png", "image/png", create_test_png(4, 4)))
        .await;
    let image_path = post["imagePath"].as_str().unwrap();

    // Another user links the same image from their own post
    let other = app.create_text_post(&fido, "borrowed", 2).await;
    let form = MultipartForm::new()
        .text("content", "borrowed picture")
        .text("imagePath", image_path);
    let other_uri = format!("/api/posts/{}", other["id"].as_str().unwrap());
    let (status, _) = app
        .send(form.into_request(Method::PUT, &other_uri, Some(&fido)))
        .await;
    assert_eq!(status, StatusCode::OK);

    let form = MultipartForm::new()
        .text("content", "new picture")
        .image("dog.png", "image/png", create_test_png(4, 4));
    let uri = format!("/api/posts/{}", post["id"].as_str().unwrap());
    let (status, _) = app
        .send(form.into_request(Method::PUT, &uri, Some(&rex)))
        .await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(app.stored_image_count(), 2);
    let (status, _) = app
        .send_raw(get_request(image_path.trim_start_matches("http://pets.test")))
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_same_name_uploads_keep_both_images() {
    let app = TestApp::new();
    let rex = app.token("u1", "rex");
    let fido = app.token("u2", "fido");
    let first_png = create_test_png(4, 4);
    let second_png = create_test_png(6, 6);

    let first = app
        .create_post(&rex, image_form("cat.png", "image/png", first_png.clone()))
        .await;
    let second = app
        .create_post(&fido, image_form("cat.png", "image/png", second_png.clone()))
        .await;
    assert_ne!(first["imagePath"], second["imagePath"]);

    for (post, bytes) in [(&first, first_png), (&second, second_png)] {
        let path = post["imagePath"]
            .as_str()
            .unwrap()
            .trim_start_matches("http://pets.test");
        let (status, body) = app.send_raw(get_request(path)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, bytes);
    }
}

#[tokio::test]
async fn test_update_without_image_keeps_path() {
    let app = TestApp::new();
    let token = app.token("u1", "rex");
    let post = app
        .create_post(&token, image_form("cat.png", "image/png", create_test_png(4, 4)))
        .await;
    let uri = format!("/api/posts/{}", post["id"].as_str().unwrap());

    let form = MultipartForm::new()
        .text("content", "caption only")
        .text("imagePath", post["imagePath"].as_str().unwrap());
    let (status, _) = app
        .send(form.into_request(Method::PUT, &uri, Some(&token)))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, fetched) = app.get(&uri).await;
    assert_eq!(fetched["imagePath"], post["imagePath"]);
    assert_eq!(fetched["content"], "caption only");
}

#[tokio::test]
async fn test_rejected_update_discards_new_image() {
    let app = TestApp::new();
    let post = app
        .create_text_post(&app.token("u1", "rex"), "mine", 1)
        .await;
    let uri = format!("/api/posts/{}", post["id"].as_str().unwrap());

    let form = MultipartForm::new()
        .text("content", "hijacked")
        .image("evil.png", "image/png", create_test_png(4, 4));
    let (status, _) = app
        .send(form.into_request(Method::PUT, &uri, Some(&app.token("u2", "fido"))))
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(app.stored_image_count(), 0);
}
