mod api;
mod config;
mod registry;
mod scheduler;
mod source;
mod store;
mod synchronizer;

use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use anyhow::{Context, Result};
use crate::config::Config;
use crate::registry::db::RegistryDb;
use crate::registry::handle::RegistryHandle;
use crate::source::scanner::FsDirectory;
use crate::synchronizer::Synchronizer;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("discod=info"))
        )
        .init();

    tracing::info!("Starting discod");

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "/etc/discod/discod.toml".to_string());

    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path))?;

    tracing::info!("Loaded config from {}", config_path);

    let db = RegistryDb::open(&config.registry.db_path)?;
    tracing::info!("Opened registry at {:?}", config.registry.db_path);

    let initial_records = db.get_all_services()?;
    let initial_hash = registry::hash::compute_hash(&initial_records);
    tracing::info!("Initial registry hash: {}", initial_hash);

    let (hash_tx, hash_rx) = watch::channel(initial_hash);
    let registry_handle = RegistryHandle::spawn(db, hash_tx);

    let cancel = CancellationToken::new();

    let directory = FsDirectory::new(&config.source.directory);
    tracing::info!(
        "Watching {} for {} services",
        directory.root().display(),
        config.source.environment
    );
    let mut synchronizer = Synchronizer::new(
        directory,
        registry_handle.clone(),
        config.source.environment.clone(),
    );

    // Files removed while the daemon was down still need retracting
    let known = registry_handle
        .get_by_environment(config.source.environment.clone())
        .await
        .context("Failed to load known services from registry")?;
    tracing::info!("Restored {} known service(s) from registry", known.len());
    synchronizer.seed(known);

    let sync_task = scheduler::spawn(
        synchronizer,
        config.source.poll_interval(),
        cancel.child_token(),
    );

    let app_state = api::routes::AppState {
        registry: registry_handle.clone(),
        hash_rx,
        source: Arc::new(config.source.clone()),
    };
    let app = api::routes::router(app_state);

    let listener = tokio::net::TcpListener::bind(&config.api.listen)
        .await
        .with_context(|| format!("Failed to bind to {}", config.api.listen))?;

    tracing::info!("API listening on {}", config.api.listen);

    let server_cancel = cancel.clone();
    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async move { server_cancel.cancelled().await })
            .await
        {
            tracing::error!("Server error: {}", e);
        }
    });

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutdown signal received");

    cancel.cancel();

    // Let an in-flight tick finish before the registry goes away
    sync_task.stop().await;
    let _ = server_handle.await;

    if let Err(e) = registry_handle.shutdown().await {
        tracing::error!("Failed to shutdown registry: {}", e);
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
