use std::sync::Arc;

use anyhow::Context;
use dotenvy::dotenv;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod app;
mod common;
mod config;
mod docs;
mod infrastructure;
mod modules;
mod routes;
mod state;
mod workers;

use crate::config::settings::AppConfig;
use crate::infrastructure::storage::s3::StorageService;
use crate::modules::render::service::RenderQueue;
use crate::modules::render::sweeper::RetentionSweeper;
use crate::state::AppState;
use crate::workers::ffmpeg::FfmpegRenderer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting server...");

    let config = AppConfig::new().context("Invalid environment configuration")?;
    let storage = StorageService::new(
        &config.minio_url,
        &config.minio_bucket,
        &config.minio_access_key,
        &config.minio_secret_key,
    )?;

    let renderer = FfmpegRenderer::new(
        config.ffmpeg_path.clone(),
        config.ffprobe_path.clone(),
        config.render_work_dir.clone(),
        storage.clone(),
    );
    let jobs = RenderQueue::new(Arc::new(renderer), config.queue_options());

    let shutdown = CancellationToken::new();
    let sweeper = RetentionSweeper::new(jobs.clone(), config.sweep_interval());
    let sweeper_task = tokio::spawn(sweeper.run(shutdown.clone()));

    let addr = format!("0.0.0.0:{}", config.server_port);
    let app = app::create_app(AppState::new(config, storage, jobs));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Server running on http://{}", addr);

    let signal = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown requested");
            signal.cancel();
        })
        .await?;

    shutdown.cancel();
    let _ = sweeper_task.await;
    info!("Server stopped");
    Ok(())
}
