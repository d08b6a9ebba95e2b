use async_trait::async_trait;
use aws_sdk_s3::error::ProvideErrorMetadata;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tracing::debug;

use crate::error::StorageError;

use super::{is_plain_file_name, numbered_file_name, ImageStorage, ImageUpload, MAX_NAME_ATTEMPTS};

/// Stores images in an S3 or S3-compatible bucket.
///
/// Public URLs are built from a fixed base (a CDN, the bucket website, or
/// the bucket endpoint), never from the request host.
#[derive(Clone)]
pub struct S3ImageStorage {
    client: Client,
    bucket: String,
    prefix: Option<String>,
    public_base_url: String,
}

impl S3ImageStorage {
    /// Create a new S3 image storage.
    ///
    /// # Arguments
    /// * `client` - AWS S3 client to use for requests
    /// * `bucket` - Bucket receiving the images
    /// * `prefix` - Optional key prefix, e.g. `"images"`
    /// * `public_base_url` - URL under which stored keys are publicly readable
    pub fn new(
        client: Client,
        bucket: impl Into<String>,
        prefix: Option<String>,
        public_base_url: impl Into<String>,
    ) -> Self {
        let prefix = prefix
            .map(|p| p.trim_matches('/').to_string())
            .filter(|p| !p.is_empty());

        Self {
            client,
            bucket: bucket.into(),
            prefix,
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Default public base URL for a bucket.
    ///
    /// With a custom endpoint (MinIO etc.) objects are addressed path-style.
    pub fn default_public_base_url(bucket: &str, endpoint: Option<&str>, region: &str) -> String {
        match endpoint {
            Some(endpoint) => format!("{}/{}", endpoint.trim_end_matches('/'), bucket),
            None => format!("https://{}.s3.{}.amazonaws.com", bucket, region),
        }
    }

    /// Get the bucket name.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Object key for a file name.
    pub fn key(&self, file_name: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}/{}", prefix, file_name),
            None => file_name.to_string(),
        }
    }
}

#[async_trait]
impl ImageStorage for S3ImageStorage {
    async fn store(&self, image: &ImageUpload) -> Result<String, StorageError> {
        for attempt in 0..MAX_NAME_ATTEMPTS {
            let file_name = numbered_file_name(&image.file_name, attempt);
            let key = self.key(&file_name);

            // If-None-Match: * makes the put fail instead of replacing an object
            let result = self
                .client
                .put_object()
                .bucket(&self.bucket)
                .key(&key)
                .if_none_match("*")
                .content_type(image.content_type)
                .content_length(image.data.len() as i64)
                .body(ByteStream::from(image.data.clone()))
                .send()
                .await;

            match result {
                Ok(_) => {
                    debug!(bucket = %self.bucket, key = %key, "Stored image");
                    return Ok(file_name);
                }
                Err(err) if is_key_taken(err.code()) => {
                    debug!(bucket = %self.bucket, key = %key, "Key taken, trying next name");
                }
                Err(err) => return Err(StorageError::S3(err.to_string())),
            }
        }

        Err(StorageError::NameTaken(image.file_name.clone()))
    }

    async fn remove(&self, file_name: &str) -> Result<(), StorageError> {
        // S3 DeleteObject succeeds for missing keys
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(self.key(file_name))
            .send()
            .await
            .map_err(|e| StorageError::S3(e.to_string()))?;

        Ok(())
    }

    fn public_url(&self, file_name: &str, _request_base: &str) -> String {
        let key = self.key(file_name);
        let encoded: Vec<String> = key
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        format!("{}/{}", self.public_base_url, encoded.join("/"))
    }

    fn file_name_for_url(&self, url: &str) -> Option<String> {
        let encoded_key = url
            .strip_prefix(self.public_base_url.as_str())?
            .strip_prefix('/')?;
        let key = encoded_key
            .split('/')
            .map(|segment| urlencoding::decode(segment).map(|s| s.into_owned()))
            .collect::<Result<Vec<_>, _>>()
            .ok()?
            .join("/");

        let file_name = match &self.prefix {
            Some(prefix) => key.strip_prefix(prefix.as_str())?.strip_prefix('/')?,
            None => key.as_str(),
        };
        is_plain_file_name(file_name).then(|| file_name.to_string())
    }

    fn backend_name(&self) -> &'static str {
        "s3"
    }
}

/// Whether a failed conditional put lost against an existing object.
fn is_key_taken(code: Option<&str>) -> bool {
    matches!(
        code,
        Some("PreconditionFailed") | Some("ConditionalRequestConflict")
    )
}

/// Create an S3 client with optional custom endpoint and region.
///
/// Use a custom endpoint for S3-compatible services like MinIO:
/// ```ignore
/// let client = create_s3_client(Some("http://localhost:9000"), "us-east-1").await;
/// ```
pub async fn create_s3_client(endpoint_url: Option<&str>, region: &str) -> Client {
    let region = aws_config::Region::new(region.to_string());
    let mut config_loader =
        aws_config::defaults(aws_config::BehaviorVersion::latest()).region(region);

    if let Some(endpoint) = endpoint_url {
        config_loader = config_loader.endpoint_url(endpoint);
    }

    let sdk_config = config_loader.load().await;

    // S3-compatible services usually need path-style addressing
    let s3_config = if endpoint_url.is_some() {
        aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build()
    } else {
        aws_sdk_s3::config::Builder::from(&sdk_config).build()
    };

    Client::from_conf(s3_config)
}
