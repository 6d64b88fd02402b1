use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use ytdl_web::api::{ApiServer, AppState};
use ytdl_web::broadcast::BroadcastHub;
use ytdl_web::config::AppConfig;
use ytdl_web::downloader::{DownloadService, JobRegistry};
use ytdl_web::engine::{ExtractionEngine, YtDlpEngine};
use ytdl_web::logging::init_logging;
use ytdl_web::utils::fs::ensure_dir_all_with_op;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env_or_default();

    // Keep the guard alive so buffered log lines are flushed on exit
    let (logging_config, _log_guard) = init_logging(&config.log_dir)?;

    ensure_dir_all_with_op("creating download directory", &config.download_dir).await?;

    let engine = Arc::new(YtDlpEngine::new(config.ytdlp_path.clone()));
    let available = {
        let engine = Arc::clone(&engine);
        tokio::task::spawn_blocking(move || engine.is_available()).await?
    };
    if !available {
        warn!(
            binary = %config.ytdlp_path,
            "yt-dlp is not available; downloads will fail until it is installed"
        );
    }

    let registry = Arc::new(JobRegistry::new());
    let hub = Arc::new(BroadcastHub::new(Arc::clone(&registry), config.broadcast_tick));
    let service = Arc::new(DownloadService::new(
        engine,
        registry,
        Arc::clone(&hub),
        config.download_dir.clone(),
    ));

    let cancel_token = CancellationToken::new();

    let hub_task = hub.start(cancel_token.child_token());
    logging_config.start_retention_cleanup(cancel_token.child_token());
    if let Some(retention) = config.job_retention {
        service.start_retention_purge(retention, cancel_token.child_token());
    }

    let state = AppState::new(service).with_logging_config(logging_config);
    let server = ApiServer::new(config.api_server_config(), state, cancel_token.clone());

    let signal_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for shutdown signal");
            return;
        }
        info!("Shutdown signal received");
        signal_token.cancel();
    });

    info!(
        download_dir = %config.download_dir.display(),
        tick_ms = config.broadcast_tick.as_millis() as u64,
        "ytdl-web starting"
    );

    let result = server.run().await;
    cancel_token.cancel();
    let _ = hub_task.await;

    result?;
    info!("ytdl-web stopped");
    Ok(())
}
