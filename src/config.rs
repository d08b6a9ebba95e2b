//! Configuration management for the PetPack post service.
//!
//! Every option can be given on the command line or through an environment
//! variable with the `PETPACK_` prefix:
//!
//! - `PETPACK_HOST` - Server bind address (default: 0.0.0.0)
//! - `PETPACK_PORT` - Server port (default: 3000)
//! - `PETPACK_DATABASE_URL` - PostgreSQL URL (in-memory store when unset)
//! - `PETPACK_DB_MAX_CONNECTIONS` - Pool size (default: 5)
//! - `PETPACK_AUTH_SECRET` - HMAC secret for bearer tokens (required)
//! - `PETPACK_STORAGE` - `local` or `s3` (default: local)
//! - `PETPACK_IMAGES_DIR` - Directory for local images (default: images)
//! - `PETPACK_S3_BUCKET`, `PETPACK_S3_PREFIX`, `PETPACK_S3_ENDPOINT`,
//!   `PETPACK_S3_REGION`, `PETPACK_S3_PUBLIC_URL` - S3 image storage
//! - `PETPACK_PUBLIC_BASE_URL` - Base for image URLs instead of the request host
//! - `PETPACK_MAX_UPLOAD_BYTES` - Upload body limit (default: 10 MiB)
//! - `PETPACK_CORS_ORIGINS` - Comma-separated allowed origins
//!
//! # Example
//!
//! ```bash
//! petpack serve --auth-secret s3cret --database-url postgres://localhost/petpack
//! petpack sign --secret s3cret --user-id 42 --user-name rex --format header
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use url::Url;

use crate::server::DEFAULT_MAX_UPLOAD_BYTES;

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default AWS region.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Default directory for locally stored images.
pub const DEFAULT_IMAGES_DIR: &str = "images";

/// Default database pool size.
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;

/// Default token lifetime for `sign` (1 hour).
pub const DEFAULT_TOKEN_TTL: u64 = 3600;

// =============================================================================
// CLI Arguments
// =============================================================================

/// PetPack - REST backend for pet posts.
#[derive(Parser, Debug, Clone)]
#[command(name = "petpack")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Server options used when no subcommand is given.
    #[command(flatten)]
    pub serve: ServeConfig,
}

impl Cli {
    /// Resolve the command to run, defaulting to `serve`.
    pub fn into_command(self) -> Command {
        self.command.unwrap_or(Command::Serve(self.serve))
    }
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the HTTP server.
    Serve(ServeConfig),

    /// Mint a bearer token for a user.
    Sign(SignConfig),
}

/// Where uploaded images are kept.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// Local directory, served under `/images`
    Local,
    /// S3 or S3-compatible bucket
    S3,
}

/// Options for the `serve` command.
#[derive(Args, Debug, Clone)]
pub struct ServeConfig {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "PETPACK_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "PETPACK_PORT")]
    pub port: u16,

    // =========================================================================
    // Persistence
    // =========================================================================
    /// PostgreSQL connection URL.
    ///
    /// Without it posts live in memory and are lost on restart.
    #[arg(long, env = "PETPACK_DATABASE_URL")]
    pub database_url: Option<String>,

    /// Maximum number of pooled database connections.
    #[arg(long, default_value_t = DEFAULT_DB_MAX_CONNECTIONS, env = "PETPACK_DB_MAX_CONNECTIONS")]
    pub db_max_connections: u32,

    // =========================================================================
    // Authentication
    // =========================================================================
    /// Secret key for HMAC-SHA256 bearer tokens.
    #[arg(long, env = "PETPACK_AUTH_SECRET")]
    pub auth_secret: Option<String>,

    // =========================================================================
    // Image Storage
    // =========================================================================
    /// Image storage backend.
    #[arg(long, value_enum, default_value_t = StorageBackend::Local, env = "PETPACK_STORAGE")]
    pub storage: StorageBackend,

    /// Directory for locally stored images.
    #[arg(long, default_value = DEFAULT_IMAGES_DIR, env = "PETPACK_IMAGES_DIR")]
    pub images_dir: PathBuf,

    /// S3 bucket receiving images.
    #[arg(long, env = "PETPACK_S3_BUCKET")]
    pub s3_bucket: Option<String>,

    /// Key prefix inside the bucket.
    #[arg(long, env = "PETPACK_S3_PREFIX")]
    pub s3_prefix: Option<String>,

    /// Custom S3 endpoint URL for S3-compatible services (MinIO, etc.).
    #[arg(long, env = "PETPACK_S3_ENDPOINT")]
    pub s3_endpoint: Option<String>,

    /// AWS region for S3.
    #[arg(long, default_value = DEFAULT_REGION, env = "PETPACK_S3_REGION")]
    pub s3_region: String,

    /// Public URL under which bucket objects are readable.
    ///
    /// Defaults to the bucket endpoint.
    #[arg(long, env = "PETPACK_S3_PUBLIC_URL")]
    pub s3_public_url: Option<String>,

    /// Base URL for image links, e.g. `https://api.petpack.app`.
    ///
    /// When unset, links are built from the request's scheme and host.
    #[arg(long, env = "PETPACK_PUBLIC_BASE_URL")]
    pub public_base_url: Option<String>,

    /// Maximum accepted request body size in bytes.
    #[arg(long, default_value_t = DEFAULT_MAX_UPLOAD_BYTES, env = "PETPACK_MAX_UPLOAD_BYTES")]
    pub max_upload_bytes: usize,

    // =========================================================================
    // CORS Configuration
    // =========================================================================
    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "PETPACK_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl ServeConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        match self.auth_secret.as_deref() {
            None | Some("") => {
                return Err(
                    "An auth secret is required. Set --auth-secret or PETPACK_AUTH_SECRET"
                        .to_string(),
                )
            }
            Some(_) => {}
        }

        if self.db_max_connections == 0 {
            return Err("db_max_connections must be greater than 0".to_string());
        }

        if self.max_upload_bytes == 0 {
            return Err("max_upload_bytes must be greater than 0".to_string());
        }

        if self.storage == StorageBackend::S3 && self.bucket().is_none() {
            return Err(
                "S3 storage needs a bucket. Set --s3-bucket or PETPACK_S3_BUCKET".to_string(),
            );
        }

        check_url("public_base_url", self.public_base_url.as_deref())?;
        check_url("s3_public_url", self.s3_public_url.as_deref())?;
        check_url("s3_endpoint", self.s3_endpoint.as_deref())?;

        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The S3 bucket, if a non-empty one is configured.
    pub fn bucket(&self) -> Option<&str> {
        self.s3_bucket.as_deref().filter(|b| !b.is_empty())
    }

    /// Get the auth secret, or an empty string (call validate() first).
    pub fn auth_secret_or_empty(&self) -> &str {
        self.auth_secret.as_deref().unwrap_or("")
    }
}

fn check_url(name: &str, value: Option<&str>) -> Result<(), String> {
    let Some(value) = value else {
        return Ok(());
    };

    let url = Url::parse(value).map_err(|e| format!("{} is not a valid URL: {}", name, e))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("{} must be an http or https URL", name));
    }
    Ok(())
}

// =============================================================================
// Sign Command
// =============================================================================

/// How `sign` prints the token.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignOutputFormat {
    /// Bare token
    Token,
    /// `Authorization: Bearer <token>` header line
    Header,
    /// JSON object with the token, claims and expiry
    Json,
}

/// Options for the `sign` command.
#[derive(Args, Debug, Clone)]
pub struct SignConfig {
    /// Secret key shared with the server.
    #[arg(long, env = "PETPACK_AUTH_SECRET")]
    pub secret: String,

    /// User id stored as the post creator.
    #[arg(long)]
    pub user_id: String,

    /// Display name stored as the creator username.
    #[arg(long)]
    pub user_name: String,

    /// Token lifetime in seconds.
    #[arg(long, default_value_t = DEFAULT_TOKEN_TTL)]
    pub ttl: u64,

    /// Output format.
    #[arg(long, value_enum, default_value_t = SignOutputFormat::Token)]
    pub format: SignOutputFormat,
}

impl SignConfig {
    /// Validate the sign options.
    pub fn validate(&self) -> Result<(), String> {
        if self.secret.is_empty() {
            return Err("Secret must not be empty".to_string());
        }
        if self.user_id.trim().is_empty() {
            return Err("user_id must not be empty".to_string());
        }
        if self.ttl == 0 {
            return Err("ttl must be greater than 0".to_string());
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
