use std::convert::Infallible;
use std::sync::Arc;

use warp::http::StatusCode;
use warp::Filter;

use super::stream_ws;
use crate::application::services::ClusterCoordinator;
use crate::domain::errors::DomainError;
use crate::domain::value_objects::RoiSpec;
use crate::infrastructure::broadcast::Broadcaster;
use crate::infrastructure::metrics::PrometheusReporter;

/// Health check response structure
#[derive(serde::Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
}

#[derive(serde::Serialize)]
struct AckResponse {
    ok: bool,
}

#[derive(serde::Serialize)]
struct ErrorResponse {
    error: String,
}

/// Assemble the full HTTP surface: cluster control, the status
/// snapshot, websocket streaming, and the usual operational endpoints.
pub fn routes(
    coordinator: Arc<ClusterCoordinator>,
    broadcaster: Arc<Broadcaster>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    // CORS configuration for browser access
    let cors = warp::cors()
        .allow_any_origin()
        .allow_methods(vec!["GET", "POST", "PUT", "OPTIONS"])
        .allow_headers(vec!["Content-Type"]);

    let status_route = warp::path("status")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_coordinator(coordinator.clone()))
        .and_then(status_handler);

    let switch_route = warp::path!("cameras" / String / "switch")
        .and(warp::post())
        .and(with_coordinator(coordinator.clone()))
        .and_then(switch_handler);

    let roi_route = warp::path!("cameras" / String / "roi")
        .and(warp::put())
        .and(warp::body::content_length_limit(4 * 1024))
        .and(warp::body::json())
        .and(with_coordinator(coordinator))
        .and_then(roi_handler);

    let stream_route = warp::path!("stream" / String)
        .and(warp::ws())
        .map(move |camera_id: String, ws: warp::ws::Ws| {
            let broadcaster = broadcaster.clone();
            ws.on_upgrade(move |socket| stream_ws::handle_stream(socket, camera_id, broadcaster))
        });

    let metrics_route = warp::path("metrics").map(|| {
        let body = PrometheusReporter::gather_metrics();
        warp::reply::with_header(body, "content-type", "text/plain; version=0.0.4; charset=utf-8")
    });

    let health_route = warp::path("health").map(|| {
        let response = HealthResponse {
            status: "healthy",
            service: "vision-cluster",
            version: env!("CARGO_PKG_VERSION"),
        };
        warp::reply::json(&response)
    });

    // Liveness probe endpoint (minimal check - is the process running?)
    let liveness_route =
        warp::path("livez").map(|| warp::reply::with_status("OK", StatusCode::OK));

    // Readiness probe endpoint (can the service accept traffic?)
    let readiness_route = warp::path("readyz").map(|| {
        let response = HealthResponse {
            status: "ready",
            service: "vision-cluster",
            version: env!("CARGO_PKG_VERSION"),
        };
        warp::reply::json(&response)
    });

    status_route
        .or(switch_route)
        .or(roi_route)
        .or(stream_route)
        .or(metrics_route)
        .or(health_route)
        .or(liveness_route)
        .or(readiness_route)
        .with(cors)
}

fn with_coordinator(
    coordinator: Arc<ClusterCoordinator>,
) -> impl Filter<Extract = (Arc<ClusterCoordinator>,), Error = Infallible> + Clone {
    warp::any().map(move || coordinator.clone())
}

async fn status_handler(
    coordinator: Arc<ClusterCoordinator>,
) -> Result<impl warp::Reply, Infallible> {
    let snapshot = coordinator.snapshot().await;
    Ok(warp::reply::with_status(
        warp::reply::json(&snapshot),
        StatusCode::OK,
    ))
}

async fn switch_handler(
    camera_id: String,
    coordinator: Arc<ClusterCoordinator>,
) -> Result<impl warp::Reply, Infallible> {
    let reply = match coordinator.switch_camera(&camera_id).await {
        Ok(()) => ack(),
        Err(e) => {
            tracing::warn!(camera_id, error = %e, "Camera switch rejected");
            error_reply(&e)
        }
    };
    Ok(reply)
}

async fn roi_handler(
    camera_id: String,
    spec: RoiSpec,
    coordinator: Arc<ClusterCoordinator>,
) -> Result<impl warp::Reply, Infallible> {
    let reply = match coordinator.reconfigure(&camera_id, spec).await {
        Ok(()) => ack(),
        Err(e) => {
            tracing::warn!(camera_id, error = %e, "ROI update rejected");
            error_reply(&e)
        }
    };
    Ok(reply)
}

fn ack() -> warp::reply::WithStatus<warp::reply::Json> {
    warp::reply::with_status(warp::reply::json(&AckResponse { ok: true }), StatusCode::OK)
}

fn error_reply(error: &DomainError) -> warp::reply::WithStatus<warp::reply::Json> {
    let status = match error {
        DomainError::UnknownCamera(_) => StatusCode::NOT_FOUND,
        DomainError::InvalidRoi { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        DomainError::PipelineNotRunning(_) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    warp::reply::with_status(
        warp::reply::json(&ErrorResponse {
            error: error.to_string(),
        }),
        status,
    )
}
