//! Livability Service: binary entrypoint.
//! Loads the fuzzy model, then serves the assessment API and `/metrics`.
//!
//! Env:
//! - `LIVABILITY_CONFIG_PATH` (default `config/livability.toml`)
//! - `LIVABILITY_OUTPUT_STEP` (optional output grid override)
//! - `LIVABILITY_ADDR` (default `0.0.0.0:5001`)
//! - `RUST_LOG` (default `livability=info,warn`)

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use livability_fis::api::{self, AppState};
use livability_fis::metrics::Metrics;

const DEFAULT_ADDR: &str = "0.0.0.0:5001";

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("livability=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();

    init_tracing();

    let state = AppState::from_env().context("Failed to load livability model")?;
    let metrics = Metrics::init()?;

    let app = api::router(state).merge(metrics.router());

    let addr = std::env::var("LIVABILITY_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(target: "livability", %addr, "listening");

    axum::serve(listener, app).await?;
    Ok(())
}
