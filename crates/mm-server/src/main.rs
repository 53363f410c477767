//! mm-server - text-to-image retrieval service entry point.
//!
//! Configuration comes from the JSON file named by `MM_CONFIG` or the first
//! argument, then `MM_*` environment overrides.

use std::path::PathBuf;
use std::sync::Arc;

use mm_core::{config::CONFIG_ENV, ServiceConfig};
use mm_library::provider::{answer_from_config, embedding_from_config};
use mm_library::RetrievalService;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::var_os(CONFIG_ENV)
        .or_else(|| std::env::args_os().nth(1))
        .map(PathBuf::from);
    let config = ServiceConfig::load(config_path.as_deref())?;

    // RUST_LOG wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log.level)))
        .init();

    tracing::info!(
        library = %config.library.path.display(),
        provider = ?config.embedding.provider,
        "Starting mm-server"
    );

    tokio::fs::create_dir_all(&config.library.path).await?;

    let embedder = embedding_from_config(&config)?;
    let mut service = RetrievalService::new(config.library.clone(), embedder);
    match answer_from_config(&config)? {
        Some(answerer) => service = service.with_answerer(answerer),
        None => tracing::warn!("no answer provider configured, /vqa will return 503"),
    }
    let service = Arc::new(service);

    let summary = service.rebuild().await?;
    tracing::info!(
        size = summary.image_library_size,
        skipped = summary.skipped,
        "image library ready"
    );

    let app = mm_server::app(service);
    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("shutdown requested"),
        Err(e) => {
            tracing::warn!(error = %e, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    }
}
