//! Assembly worker binary.
//!
//! Usage: `reel-worker <request.json>`. Prints the published address.

use anyhow::Context;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use reel_models::AssemblyRequest;
use reel_worker::metrics::init_metrics;
use reel_worker::PipelineOrchestrator;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    dotenvy::dotenv().ok();
    init_tracing();

    let metrics_file = std::env::var("METRICS_TEXTFILE").ok();
    let metrics = match metrics_file {
        Some(_) => Some(init_metrics().context("Failed to install metrics recorder")?),
        None => None,
    };

    let request_path = std::env::args()
        .nth(1)
        .context("usage: reel-worker <request.json>")?;
    let raw = tokio::fs::read_to_string(&request_path)
        .await
        .with_context(|| format!("Failed to read {}", request_path))?;
    let request: AssemblyRequest =
        serde_json::from_str(&raw).with_context(|| format!("Invalid assembly request in {}", request_path))?;

    info!("Starting reel-worker");
    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling assembly");
            let _ = cancel_tx.send(true);
        }
    });

    let orchestrator = PipelineOrchestrator::from_env_with_cancel(Some(cancel_rx)).await?;
    let result = orchestrator.assemble(&request).await;

    if let (Some(path), Some(handle)) = (metrics_file, metrics) {
        tokio::fs::write(&path, handle.render())
            .await
            .with_context(|| format!("Failed to write metrics to {}", path))?;
    }

    let published = result?;
    println!("{}", published.address);
    Ok(())
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false)
                    .with_writer(std::io::stderr),
            )
            .with(env_filter)
            .init();
    }
}
