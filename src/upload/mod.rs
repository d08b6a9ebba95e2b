//! Upload adapter for post images.
//!
//! An upload goes through three steps:
//!
//! 1. [`image_extension`] checks the declared MIME type against the
//!    allow-list before any byte is read.
//! 2. [`ImageUpload::new`] sniffs the payload and derives a collision
//!    resistant file name.
//! 3. An [`ImageStorage`] backend persists the bytes under a name no other
//!    upload holds and maps that name to a public URL.

mod local;
mod s3;

use async_trait::async_trait;
use bytes::Bytes;
use image::ImageFormat;

use crate::error::StorageError;

pub use local::{LocalImageStorage, IMAGES_ROUTE};
pub use s3::{create_s3_client, S3ImageStorage};

/// Multipart field name carrying the image.
pub const IMAGE_FIELD: &str = "image";

/// How many numbered variants of a file name a backend tries before giving up.
pub const MAX_NAME_ATTEMPTS: u32 = 100;

/// Allowed MIME types and the extension stored files get.
pub const MIME_TYPE_MAP: [(&str, &str); 3] = [
    ("image/png", "png"),
    ("image/jpeg", "jpg"),
    ("image/jpg", "jpg"),
];

/// Map an allowed MIME type to its file extension.
pub fn image_extension(content_type: &str) -> Result<&'static str, StorageError> {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();

    MIME_TYPE_MAP
        .iter()
        .find(|(allowed, _)| *allowed == mime)
        .map(|(_, ext)| *ext)
        .ok_or_else(|| StorageError::InvalidMimeType(content_type.to_string()))
}

/// Build the stored file name: `<lowercased-name-with-dashes>-<millis>.<ext>`.
///
/// Directory components of the client supplied name are dropped.
pub fn storage_file_name(original_name: &str, extension: &str, millis: i64) -> String {
    let base = original_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or("")
        .trim();
    let base = if base.is_empty() || base == "." || base == ".." {
        "image".to_string()
    } else {
        base.to_lowercase().split(' ').collect::<Vec<_>>().join("-")
    };

    format!("{}-{}.{}", base, millis, extension)
}

/// Variant `attempt` of a stored file name.
///
/// Attempt 0 is the name itself; later attempts insert a counter before
/// the extension: `cat.png-1000.png` becomes `cat.png-1000-1.png`.
pub fn numbered_file_name(file_name: &str, attempt: u32) -> String {
    if attempt == 0 {
        return file_name.to_string();
    }
    match file_name.rsplit_once('.') {
        Some((stem, ext)) => format!("{}-{}.{}", stem, attempt, ext),
        None => format!("{}-{}", file_name, attempt),
    }
}

/// Whether `name` is a single path component a backend may address.
pub fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}

/// A validated image ready to be handed to a storage backend.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    /// Preferred file name. Backends add a counter when it is taken.
    pub file_name: String,

    /// Normalized MIME type
    pub content_type: &'static str,

    /// Image bytes
    pub data: Bytes,
}

impl ImageUpload {
    /// Validate an uploaded file and derive its stored name.
    ///
    /// Fails with [`StorageError::InvalidMimeType`] for a type outside the
    /// allow-list and [`StorageError::ContentMismatch`] when the bytes are
    /// not PNG or JPEG data.
    pub fn new(
        original_name: &str,
        content_type: &str,
        data: Bytes,
        millis: i64,
    ) -> Result<Self, StorageError> {
        let extension = image_extension(content_type)?;
        let (format, content_type) = match extension {
            "png" => (ImageFormat::Png, "image/png"),
            _ => (ImageFormat::Jpeg, "image/jpeg"),
        };

        match image::guess_format(&data) {
            Ok(detected) if detected == format => {}
            _ => {
                return Err(StorageError::ContentMismatch {
                    expected: extension,
                })
            }
        }

        Ok(Self {
            file_name: storage_file_name(original_name, extension, millis),
            content_type,
            data,
        })
    }
}

/// Backend that persists uploaded images and knows their public URLs.
#[async_trait]
pub trait ImageStorage: Send + Sync {
    /// Persist the image and return the file name it was stored under.
    ///
    /// Never replaces an existing file: when the preferred name is taken a
    /// numbered variant is used instead.
    async fn store(&self, image: &ImageUpload) -> Result<String, StorageError>;

    /// Remove a previously stored image. Removing a missing file is not an error.
    async fn remove(&self, file_name: &str) -> Result<(), StorageError>;

    /// Public URL of a stored file.
    ///
    /// `request_base` is the `scheme://host` the upload arrived on, or the
    /// configured public base URL when one is set.
    fn public_url(&self, file_name: &str, request_base: &str) -> String;

    /// File name behind a URL built by [`ImageStorage::public_url`], or
    /// `None` when the URL does not point into this backend.
    fn file_name_for_url(&self, url: &str) -> Option<String>;

    /// Short backend name for logs.
    fn backend_name(&self) -> &'static str;
}
