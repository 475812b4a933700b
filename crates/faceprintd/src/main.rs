use std::sync::Arc;

use anyhow::{Context, Result};
use faceprint_store::ProfileStore;
use faceprintd::engine::{load_onnx_providers, spawn_engine};
use faceprintd::{serve, AppState, Config};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            return Err(e).context("failed to read .env");
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "faceprintd starting");

    let config = Config::from_env();

    let store = ProfileStore::open(&config.db_path, config.reset_db)
        .await
        .with_context(|| format!("failed to open profile database {}", config.db_path.display()))?;

    let providers = load_onnx_providers(&config);
    let engine = spawn_engine(providers).with_context(|| {
        format!(
            "failed to start face engine (model dir {}, models {:?})",
            config.model_dir.display(),
            config.models
        )
    })?;

    let state = Arc::new(AppState::new(config, engine.clone(), store.clone()));
    let served = serve(state).await;

    if let Err(e) = engine.shutdown().await {
        tracing::warn!(error = %e, "engine did not shut down cleanly");
    }
    if let Err(e) = store.close().await {
        tracing::warn!(error = %e, "profile database did not close cleanly");
    }

    served.context("HTTP server failed")?;
    tracing::info!("faceprintd stopped");
    Ok(())
}
