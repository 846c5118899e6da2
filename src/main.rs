//! Teledrop -- self-hosted file-sharing server.
//!
//! Crash-only design: every startup is a recovery.  The only recovery
//! work is the temp-file sweep; committed state needs none.  SIGTERM and
//! SIGINT stop accepting connections and drain in-flight requests.

use std::sync::Arc;

use clap::Parser;
use tracing::info;

use teledrop::auth::StaticTokenVerifier;
use teledrop::engine::DropEngine;
use teledrop::metadata::sqlite::SqliteStore;
use teledrop::passphrase::PassphraseHasher;
use teledrop::storage::backend::BlobStore;
use teledrop::storage::local::LocalBlobStore;
use teledrop::storage::s3::S3BlobStore;
use teledrop::storage::sweep;

/// Command-line arguments for the Teledrop server.
#[derive(Parser, Debug)]
#[command(name = "teledrop", version, about = "Self-hosted file-sharing server")]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, default_value = "teledrop.example.yaml")]
    config: String,

    /// Override the bind address (host:port).
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = teledrop::config::load_config(&cli.config)?;

    // Initialize tracing / logging.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.logging.level.clone()));
    if config.logging.format == "json" {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }
    info!("Loaded configuration from {}", cli.config);

    let bind_addr = cli
        .bind
        .unwrap_or_else(|| format!("{}:{}", config.server.host, config.server.port));

    // Initialize Prometheus metrics recorder.
    if config.observability.metrics {
        teledrop::metrics::init_metrics();
        teledrop::metrics::describe_metrics();
        info!("Prometheus metrics initialized");
    }

    // Initialize the metadata store, creating the parent directory for
    // the SQLite file if needed.
    let metadata_path = &config.metadata.sqlite.path;
    if let Some(parent) = std::path::Path::new(metadata_path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    let meta = Arc::new(SqliteStore::new(metadata_path)?);
    info!("SQLite metadata store initialized at {}", metadata_path);

    // Initialize the blob storage backend.
    let storage: Arc<dyn BlobStore> = match config.storage.backend.as_str() {
        "s3" => {
            let s3_config = config.storage.s3.as_ref().ok_or_else(|| {
                anyhow::anyhow!("storage.backend is 's3' but storage.s3 config section is missing")
            })?;
            let backend = S3BlobStore::new(s3_config, &config.storage.spool_dir).await?;
            Arc::new(backend)
        }
        "local" | _ => {
            let root = &config.storage.local.root_dir;
            let backend = LocalBlobStore::new(root)?;
            info!("Local blob store initialized at {}", root);
            Arc::new(backend)
        }
    };

    // Crash-only startup: sweep temp files a crashed upload left behind.
    let local_root = std::path::Path::new(&config.storage.local.root_dir);
    let swept = sweep::sweep_stale_temp(local_root, sweep::DEFAULT_MAX_AGE)?;
    let spool_root = std::path::Path::new(&config.storage.spool_dir);
    let swept = swept + sweep::sweep_stale_temp(spool_root, sweep::DEFAULT_MAX_AGE)?;
    info!("Startup sweep complete ({} stale temp files removed)", swept);

    // Build the engine and shared state.
    let hasher = Arc::new(PassphraseHasher::new(&config.argon2)?);
    let verifier = Arc::new(StaticTokenVerifier::new(&config.auth));
    let engine = DropEngine::new(
        meta,
        storage.clone(),
        hasher,
        config.limits.clone(),
        config.slugs.clone(),
    );

    let state = Arc::new(teledrop::AppState {
        config: config.clone(),
        engine,
        storage,
        verifier,
    });

    let app = teledrop::server::app(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Teledrop listening on {}", bind_addr);

    // Graceful shutdown: on SIGTERM/SIGINT, stop accepting new connections
    // and wait for in-flight requests.  No cleanup -- the next startup
    // sweeps whatever an interrupted upload left behind.
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Teledrop shut down");

    Ok(())
}

/// Wait for SIGTERM or SIGINT (Ctrl+C), then return to trigger graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, shutting down");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down");
        },
    }
}
