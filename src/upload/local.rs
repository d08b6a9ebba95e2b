use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use url::Url;

use crate::error::StorageError;

use super::{is_plain_file_name, numbered_file_name, ImageStorage, ImageUpload, MAX_NAME_ATTEMPTS};

/// URL path prefix under which the local image directory is served.
pub const IMAGES_ROUTE: &str = "/images";

/// Stores images in a local directory served statically under `/images`.
#[derive(Debug, Clone)]
pub struct LocalImageStorage {
    dir: PathBuf,
}

impl LocalImageStorage {
    /// Create a storage rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Get the image directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl ImageStorage for LocalImageStorage {
    async fn store(&self, image: &ImageUpload) -> Result<String, StorageError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        for attempt in 0..MAX_NAME_ATTEMPTS {
            let file_name = numbered_file_name(&image.file_name, attempt);
            let path = self.dir.join(&file_name);

            let mut file = match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => file,
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            };

            let written = match file.write_all(&image.data).await {
                Ok(()) => file.flush().await,
                Err(e) => Err(e),
            };
            if let Err(e) = written {
                let _ = tokio::fs::remove_file(&path).await;
                return Err(e.into());
            }

            debug!(path = %path.display(), bytes = image.data.len(), "Stored image");
            return Ok(file_name);
        }

        Err(StorageError::NameTaken(image.file_name.clone()))
    }

    async fn remove(&self, file_name: &str) -> Result<(), StorageError> {
        match tokio::fs::remove_file(self.dir.join(file_name)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn public_url(&self, file_name: &str, request_base: &str) -> String {
        format!(
            "{}{}/{}",
            request_base.trim_end_matches('/'),
            IMAGES_ROUTE,
            urlencoding::encode(file_name)
        )
    }

    fn file_name_for_url(&self, url: &str) -> Option<String> {
        // Only the path is checked: the host differs between request origins
        let url = Url::parse(url).ok()?;
        let encoded = url.path().strip_prefix(IMAGES_ROUTE)?.strip_prefix('/')?;
        let file_name = urlencoding::decode(encoded).ok()?;
        is_plain_file_name(&file_name).then(|| file_name.into_owned())
    }

    fn backend_name(&self) -> &'static str {
        "local"
    }
}
