//! Camcast daemon entry point

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use camcast::application::StreamCoordinator;
use camcast::domain::config::{EngineConfig, DEFAULT_FFMPEG_PATH, DEFAULT_HLS_DIR, DEFAULT_PORT};
use camcast::infrastructure::{
    probe_ffmpeg, DiskSpaceProbe, FfmpegDeviceScanner, TranscodePlanner,
};

/// Camcast - camera-to-HLS live streaming engine
#[derive(Parser, Debug)]
#[command(name = "camcast")]
#[command(version)]
#[command(about = "Supervises per-camera live HLS publishing sessions")]
struct Cli {
    /// Path to the ffmpeg executable
    #[arg(long, value_name = "PATH", env = "CAMCAST_FFMPEG_PATH", default_value = DEFAULT_FFMPEG_PATH)]
    ffmpeg_path: PathBuf,

    /// Base directory for HLS output
    #[arg(long, value_name = "DIR", env = "CAMCAST_HLS_DIR", default_value = DEFAULT_HLS_DIR)]
    hls_dir: PathBuf,

    /// Listening port advertised to the HTTP layer
    #[arg(short, long, env = "CAMCAST_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = EngineConfig {
        ffmpeg_path: cli.ffmpeg_path,
        hls_root: cli.hls_dir,
        port: cli.port,
        ..Default::default()
    };

    if let Err(e) = tokio::fs::create_dir_all(&config.hls_root).await {
        error!(dir = %config.hls_root.display(), error = %e, "cannot create HLS output directory");
        return ExitCode::FAILURE;
    }

    match probe_ffmpeg(&config.ffmpeg_path).await {
        Ok(version) => info!(%version, "ffmpeg available"),
        Err(e) => warn!(error = %e, "ffmpeg not available; streams will fail to start"),
    }

    let coordinator = Arc::new(StreamCoordinator::new(
        FfmpegDeviceScanner::new(config.ffmpeg_path.clone()),
        TranscodePlanner::new(config.ffmpeg_path.clone()),
        DiskSpaceProbe,
        &config,
    ));

    match coordinator.refresh_cameras().await {
        Ok(cameras) => info!(count = cameras.len(), "discovered cameras"),
        Err(e) => warn!(error = %e, "camera discovery failed"),
    }

    let shutdown = CancellationToken::new();

    // deferred cleanup driver
    tokio::spawn(coordinator.cleanup_queue().run(shutdown.clone()));

    // periodic orphan sweep and record eviction
    {
        let coordinator = Arc::clone(&coordinator);
        let shutdown = shutdown.clone();
        let sweep_interval = config.timeouts.sweep_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(sweep_interval);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => coordinator.run_maintenance().await,
                }
            }
        });
    }

    info!(
        port = config.port,
        hls_dir = %config.hls_root.display(),
        "engine ready; attach the HTTP layer via StreamCoordinator"
    );

    wait_for_shutdown_signal().await;

    info!("shutting down; stopping all active streams");
    shutdown.cancel();
    coordinator.shutdown().await;

    ExitCode::SUCCESS
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(e) => {
            warn!(error = %e, "cannot listen for SIGTERM");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
