use std::sync::Arc;

use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

mod api;
mod carousel;
mod config;
mod ingest;
mod playlist;
mod ring;
mod rotation;
mod segments;
mod transcode;

use api::AppState;
use carousel::Carousel;
use config::Config;
use ingest::Ingestor;
use rotation::RotationScheduler;
use transcode::Transcoder;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("carousel=debug".parse()?))
        .init();

    let config = Config::load()?;
    let stream = &config.stream;
    tracing::info!(
        hls_dir = %stream.hls_dir.display(),
        capacity = stream.capacity,
        "loaded config"
    );

    std::fs::create_dir_all(&stream.hls_dir)?;

    let carousel = Carousel::new(stream);
    let restored = carousel.reload()?;
    tracing::info!(clips = restored, "carousel ready");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = RotationScheduler::new(
        Arc::clone(&carousel),
        stream.initial_period(),
        stream.io_timeout(),
    );
    let scheduler_handle = tokio::spawn(scheduler.run(shutdown_rx));

    let ingestor = Ingestor::new(
        Arc::clone(&carousel),
        Transcoder::new(&config.transcode),
        stream.upload_dir.clone(),
        stream.io_timeout(),
    );
    let state = AppState::new(carousel, ingestor);
    let mut server_handle = tokio::spawn(api::start_server(
        state,
        config.http.clone(),
        stream.hls_dir.clone(),
    ));

    tokio::select! {
        result = &mut server_handle => {
            match result {
                Ok(Err(e)) => tracing::error!("http server failed: {}", e),
                Err(e) => tracing::error!("http server task failed: {}", e),
                Ok(Ok(())) => {}
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
    }

    let _ = shutdown_tx.send(true);
    if let Err(e) = scheduler_handle.await {
        tracing::error!("rotation scheduler task failed: {}", e);
    }
    server_handle.abort();
    tracing::info!("shutdown complete");

    Ok(())
}
