//! Multipart form parsing for post create and update requests.

use std::collections::HashMap;

use axum::extract::multipart::{Field, MultipartError};
use axum::extract::Multipart;
use tracing::debug;

use crate::error::PostError;
use crate::post::now_millis;
use crate::upload::{image_extension, ImageUpload, IMAGE_FIELD};

/// Text fields understood by the post endpoints.
const TEXT_FIELDS: [&str; 6] = ["content", "timeStamp", "postAvatar", "id", "title", "imagePath"];

/// A parsed post form: text fields plus at most one validated image.
#[derive(Debug, Default)]
pub struct PostForm {
    fields: HashMap<String, String>,
    pub image: Option<ImageUpload>,
}

impl PostForm {
    /// Get a text field.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Get a text field or an empty string.
    pub fn text_or_empty(&self, name: &str) -> String {
        self.text(name).unwrap_or_default().to_string()
    }

    /// The `timeStamp` field as epoch milliseconds, or the current time when absent.
    pub fn timestamp(&self) -> Result<i64, PostError> {
        match self.text("timeStamp").map(str::trim) {
            None | Some("") => Ok(now_millis()),
            Some(raw) => raw.parse::<i64>().map_err(|_| {
                PostError::BadRequest(format!("timeStamp must be an integer, got {:?}", raw))
            }),
        }
    }

    /// Read a multipart body.
    ///
    /// The image MIME type is checked before its bytes are read. A second
    /// image, or a file under any other field name, is rejected.
    pub async fn parse(mut multipart: Multipart) -> Result<Self, PostError> {
        let mut form = PostForm::default();

        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            if let Some(file_name) = field.file_name().map(str::to_string) {
                if name != IMAGE_FIELD {
                    return Err(PostError::BadRequest(format!(
                        "Unexpected file field: {}",
                        name
                    )));
                }
                // Browsers send an empty part when no file was picked
                if file_name.is_empty() {
                    continue;
                }
                if form.image.is_some() {
                    return Err(PostError::BadRequest(
                        "Only one image may be uploaded".to_string(),
                    ));
                }
                form.image = Some(read_image(field, &file_name).await?);
                continue;
            }

            if TEXT_FIELDS.contains(&name.as_str()) {
                let value = field.text().await.map_err(multipart_error)?;
                form.fields.insert(name, value);
            } else {
                debug!(field = %name, "Ignoring unknown form field");
            }
        }

        Ok(form)
    }
}

async fn read_image(field: Field<'_>, file_name: &str) -> Result<ImageUpload, PostError> {
    let content_type = field.content_type().unwrap_or_default().to_string();
    image_extension(&content_type)?;

    let data = field.bytes().await.map_err(multipart_error)?;
    let upload = ImageUpload::new(file_name, &content_type, data, now_millis())?;

    debug!(
        file_name = %upload.file_name,
        bytes = upload.data.len(),
        "Accepted image upload"
    );
    Ok(upload)
}

fn multipart_error(err: MultipartError) -> PostError {
    PostError::Multipart {
        status: err.status().as_u16(),
        message: err.body_text(),
    }
}
