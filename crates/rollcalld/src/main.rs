use anyhow::{Context, Result};
use rollcall_core::{FaceEngine, OnnxFaceEngine};
use rollcall_roster::{ReferenceStore, Roster};
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

mod config;
mod routes;

use config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("rollcalld starting");

    let config = Config::from_env();

    let roster = Roster::from_path(&config.roster_path)
        .with_context(|| format!("loading roster from {}", config.roster_path.display()))?;
    tracing::info!(
        members = roster.members.len(),
        path = %config.roster_path.display(),
        "roster loaded"
    );

    // Fail fast if either model file is missing; a daemon without models
    // cannot serve anything useful.
    let mut engine =
        OnnxFaceEngine::load(&config.detector_model_path(), &config.embedder_model_path())
            .context("loading ONNX models")?;

    // Sequential, blocking enrollment. A slow roster photo stalls startup;
    // there is no timeout guard here.
    let client = reqwest::Client::new();
    let store = ReferenceStore::build(&roster, &client, &mut engine).await;

    let engine: Arc<Mutex<dyn FaceEngine>> = Arc::new(Mutex::new(engine));
    let state = routes::AppState {
        engine,
        store: Arc::new(store),
        tolerance: config.match_tolerance,
    };

    let app = routes::router(state);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;
    tracing::info!(
        addr = %config.bind_addr,
        tolerance = config.match_tolerance,
        "rollcalld ready"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("rollcalld shutting down");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
