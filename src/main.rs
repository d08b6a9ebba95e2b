//! PetPack - REST backend for pet posts.
//!
//! This binary starts the HTTP server or mints bearer tokens.

use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use petpack::{
    config::{Cli, Command, ServeConfig, SignConfig, SignOutputFormat, StorageBackend},
    post::{MemoryPostStore, PgPostStore, PostStore},
    server::{create_router, AppState, RouterConfig, TokenAuth},
    upload::{create_s3_client, ImageStorage, LocalImageStorage, S3ImageStorage},
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.into_command() {
        Command::Serve(config) => run_serve(config).await,
        Command::Sign(config) => run_sign(config),
    }
}

// =============================================================================
// Serve Command
// =============================================================================

async fn run_serve(config: ServeConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("PetPack v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration:");
    info!("  Max upload: {} bytes", config.max_upload_bytes);
    if let Some(ref base) = config.public_base_url {
        info!("  Public base URL: {}", base);
    }

    let store: Arc<dyn PostStore> = match config.database_url {
        Some(ref url) => match PgPostStore::connect(url, config.db_max_connections).await {
            Ok(store) => Arc::new(store),
            Err(e) => {
                error!("Failed to connect to the database: {}", e);
                return ExitCode::FAILURE;
            }
        },
        None => {
            warn!("  Store: IN-MEMORY - posts are lost on restart");
            warn!("         Persist posts with --database-url=<postgres url>");
            Arc::new(MemoryPostStore::new())
        }
    };
    info!("  Store: {}", store.backend_name());

    let storage: Arc<dyn ImageStorage> = match config.storage {
        StorageBackend::Local => {
            info!("  Images: local directory {}", config.images_dir.display());
            Arc::new(LocalImageStorage::new(&config.images_dir))
        }
        StorageBackend::S3 => {
            // validate() guarantees a bucket for S3 storage
            let bucket = config.bucket().unwrap_or_default().to_string();
            info!("  Images: S3 bucket {}", bucket);
            if let Some(ref endpoint) = config.s3_endpoint {
                info!("  S3 endpoint: {}", endpoint);
            }
            info!("  S3 region: {}", config.s3_region);

            let client = create_s3_client(config.s3_endpoint.as_deref(), &config.s3_region).await;
            let public_base = config.s3_public_url.clone().unwrap_or_else(|| {
                S3ImageStorage::default_public_base_url(
                    &bucket,
                    config.s3_endpoint.as_deref(),
                    &config.s3_region,
                )
            });
            Arc::new(S3ImageStorage::new(
                client,
                bucket,
                config.s3_prefix.clone(),
                public_base,
            ))
        }
    };

    let mut state = AppState::new(
        store,
        storage,
        TokenAuth::new(config.auth_secret_or_empty()),
    );
    if let Some(ref base) = config.public_base_url {
        state = state.with_public_base_url(base.clone());
    }

    let router = create_router(state, build_router_config(&config));

    let addr = config.bind_address();

    info!("");
    info!("  Server listening on: http://{}", addr);
    info!("    curl http://{}/health", addr);
    info!("    curl http://{}/api/posts", addr);
    info!("");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = axum::serve(listener, router).await {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "petpack=debug,tower_http=debug"
    } else {
        "petpack=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build RouterConfig from the application ServeConfig.
fn build_router_config(config: &ServeConfig) -> RouterConfig {
    let mut router_config = RouterConfig::new()
        .with_max_upload_bytes(config.max_upload_bytes)
        .with_tracing(!config.no_tracing);

    if config.storage == StorageBackend::Local {
        router_config = router_config.with_images_dir(config.images_dir.clone());
    }

    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }

    router_config
}

// =============================================================================
// Sign Command
// =============================================================================

fn run_sign(config: SignConfig) -> ExitCode {
    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    let auth = TokenAuth::new(&config.secret);
    let (token, expiry) = auth.issue(
        &config.user_id,
        &config.user_name,
        Duration::from_secs(config.ttl),
    );

    match config.format {
        SignOutputFormat::Token => println!("{}", token),
        SignOutputFormat::Header => println!("Authorization: Bearer {}", token),
        SignOutputFormat::Json => {
            let json = serde_json::json!({
                "token": token,
                "userId": config.user_id,
                "userName": config.user_name,
                "exp": expiry,
                "ttl": config.ttl,
            });
            match serde_json::to_string_pretty(&json) {
                Ok(text) => println!("{}", text),
                Err(e) => {
                    eprintln!("Error: {}", e);
                    return ExitCode::FAILURE;
                }
            }
        }
    }

    ExitCode::SUCCESS
}
