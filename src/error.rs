use thiserror::Error;

/// Errors raised by a post store backend
#[derive(Debug, Error)]
pub enum StoreError {
    /// Error from the PostgreSQL backend
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migration failed on startup
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Errors raised while validating or persisting an uploaded image
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    /// Declared MIME type is outside the allow-list (should map to HTTP 415)
    #[error("Invalid mime type: {0}")]
    InvalidMimeType(String),

    /// Payload bytes are not a PNG or JPEG image (should map to HTTP 415)
    #[error("Uploaded file is not a valid {expected} image")]
    ContentMismatch { expected: &'static str },

    /// Local filesystem error
    #[error("I/O error: {0}")]
    Io(String),

    /// Error from S3 or S3-compatible storage
    #[error("S3 error: {0}")]
    S3(String),

    /// Every numbered variant of the file name is already taken
    #[error("No free file name for {0}")]
    NameTaken(String),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}

/// Errors returned by the post handlers
#[derive(Debug, Error)]
pub enum PostError {
    /// No post matched the requested id
    #[error("Post not found")]
    NotFound,

    /// Owner-scoped mutation matched nothing: either the id is unknown or
    /// the caller is not the creator
    #[error("Not authorized")]
    NotAuthorized,

    /// Request was malformed
    #[error("{0}")]
    BadRequest(String),

    /// Multipart body could not be read; carries the status axum assigned
    #[error("{message}")]
    Multipart { status: u16, message: String },

    /// Upload rejected or storage backend failure
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Post store failure
    #[error(transparent)]
    Store(#[from] StoreError),
}
