use std::path::Path;

use reel_media::{check_ffmpeg, check_ffprobe};
use reel_models::{Mood, OutputMode};
use reel_storage::S3ObjectStore;
use reel_worker::PipelineConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;
    dotenvy::dotenv().ok();
    let config = PipelineConfig::from_env()?;

    println!(
        "worker-selfcheck: starting with work_dir={}",
        config.work_dir.display()
    );
    ensure_workdir(&config.work_dir).await?;
    check_ffmpeg().map_err(|e| anyhow::anyhow!("ffmpeg not available: {}", e))?;
    check_ffprobe().map_err(|e| anyhow::anyhow!("ffprobe not available: {}", e))?;
    ensure_music(&config).await?;

    ensure_env_present(&["PROJECT_ID"])?;
    match &config.local_store_root {
        Some(root) => ensure_workdir(root).await?,
        None => {
            ensure_env_present(&["STORAGE_ACCESS_KEY_ID", "STORAGE_SECRET_ACCESS_KEY"])?;
            ensure_output_bucket(&config).await?;
        }
    }
    if config.output_mode == OutputMode::LocalPath {
        ensure_workdir(&config.local_output_dir).await?;
    }

    println!("worker-selfcheck: ok");
    Ok(())
}

async fn ensure_workdir<P: AsRef<Path>>(path: P) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(path.as_ref()).await?;
    Ok(())
}

async fn ensure_music(config: &PipelineConfig) -> anyhow::Result<()> {
    let tracks = config.mood_tracks();
    for mood in Mood::ALL {
        let path = tracks.track_for(mood)?;
        if !tokio::fs::try_exists(path).await? {
            println!("worker-selfcheck: warning: no music for {} at {}", mood, path.display());
        }
    }
    Ok(())
}

async fn ensure_output_bucket(config: &PipelineConfig) -> anyhow::Result<()> {
    let Some(prefix) = config.output_prefix()? else {
        return Ok(());
    };
    let store = S3ObjectStore::from_env()?;
    store.check_bucket(&prefix.bucket).await?;
    println!("worker-selfcheck: output bucket {} reachable", prefix.bucket);
    Ok(())
}

fn ensure_env_present(vars: &[&str]) -> anyhow::Result<()> {
    for var in vars {
        if std::env::var(var).is_err() {
            return Err(anyhow::anyhow!("missing required env var {}", var));
        }
    }
    Ok(())
}
