use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::sync::oneshot;
use tracing::{error, info};

use vision_cluster::application::services::ClusterCoordinator;
use vision_cluster::domain::value_objects::RegionOfInterest;
use vision_cluster::infrastructure::broadcast::Broadcaster;
use vision_cluster::infrastructure::http;
use vision_cluster::{Config, JsonlDetectionSink, ProcessEngine, PrometheusReporter};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse configuration
    let config = Config::parse();
    config.validate()?;

    // Initialize logging
    let filter = if config.verbose { "debug" } else { "info" };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    // Initialize metrics
    PrometheusReporter::init_metrics()?;

    info!("Starting vision cluster");
    info!("  Engine binary: {}", config.engine_binary.display());
    info!("  Frame size: {}x{}", config.frame_width, config.frame_height);
    info!("  HTTP port: {}", config.http_port);

    // Load the camera registry
    let cameras = config.load_cameras().await?;
    info!("  Cameras: {}", cameras.len());

    // Convert CLI config to domain configs
    let settings = config
        .to_pipeline_settings()
        .map_err(|e| anyhow::anyhow!("{}", e))?;
    let default_roi = RegionOfInterest::full_frame(config.frame_width, config.frame_height);

    // Create infrastructure implementations (dependency injection)
    let metrics_reporter = Arc::new(PrometheusReporter::new());
    let engine = Arc::new(ProcessEngine::new(config.to_engine_config()));
    let sink = Arc::new(JsonlDetectionSink::open(&config.detections_file).await?);
    let broadcaster = Arc::new(Broadcaster::new(
        config.subscriber_queue_capacity,
        config.eviction_threshold,
        metrics_reporter.clone(),
    ));

    // Create application service
    let coordinator = Arc::new(ClusterCoordinator::new(
        cameras,
        engine,
        broadcaster.clone(),
        sink,
        metrics_reporter,
        settings,
        default_roi,
    ));

    if let Some(camera_id) = &config.initial_camera {
        if let Err(e) = coordinator.switch_camera(camera_id).await {
            error!("Cannot activate initial camera {}: {}", camera_id, e);
        }
    }

    // Set up graceful shutdown
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to listen for ctrl+c");
        info!("Received shutdown signal");
        let _ = shutdown_tx.send(());
    });

    // Start HTTP server (control API, status, streams, metrics)
    let routes = http::routes(coordinator.clone(), broadcaster);
    let (addr, server) = warp::serve(routes)
        .bind_with_graceful_shutdown(([0, 0, 0, 0], config.http_port), async {
            shutdown_rx.await.ok();
        });

    info!("HTTP server listening on http://{}", addr);
    server.await;

    // Stop the active pipeline before exiting
    coordinator.shutdown().await;

    info!("Cluster shutdown complete");
    Ok(())
}
