//! # Health Check and Metrics Endpoints
//!
//! ## Endpoints:
//! - `GET /health`, `GET /api/v1/health`: liveness plus a summary of the
//!   sonification pipeline (mode, counters, artifacts on disk, sweep state)
//! - `GET /api/v1/metrics`: per-route request statistics

use actix_web::{web, HttpResponse};
use serde_json::json;
use std::path::Path;

use crate::state::AppState;

pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let metrics = state.get_metrics_snapshot();
    let config = &state.config;
    let settings = state.service.settings();
    let sweeper = state.service.sweeper();

    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": state.get_uptime_seconds(),
        "service": {
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
            "host": config.server.host,
            "port": config.server.port
        },
        "metrics": {
            "total_requests": metrics.request_count,
            "total_errors": metrics.error_count,
            "artifacts_rendered": metrics.artifacts_rendered,
            "sonification_failures": metrics.sonification_failures
        },
        "sonification": {
            "mode": settings.mode.as_str(),
            "limit": settings.limit,
            "default_variant": settings.default_variant.as_str(),
            "artifacts_on_disk": count_artifacts(sweeper.audio_dir()).await,
            "retention_hours": sweeper.max_age().as_secs() / 3600,
            "sweeping_enabled": sweeper.is_enabled(),
            "sweep_in_progress": sweeper.is_running()
        }
    }))
}

pub async fn detailed_metrics(state: web::Data<AppState>) -> HttpResponse {
    let metrics = state.get_metrics_snapshot();
    let uptime_seconds = state.get_uptime_seconds();

    let mut endpoint_stats: Vec<_> = metrics
        .endpoint_metrics
        .iter()
        .map(|(endpoint, metric)| {
            json!({
                "endpoint": endpoint,
                "request_count": metric.request_count,
                "error_count": metric.error_count,
                "error_rate": metric.error_rate(),
                "average_duration_ms": metric.average_duration_ms(),
                "total_duration_ms": metric.total_duration_ms
            })
        })
        .collect();
    endpoint_stats.sort_by(|a, b| a["endpoint"].as_str().cmp(&b["endpoint"].as_str()));

    HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": uptime_seconds,
        "overall": {
            "total_requests": metrics.request_count,
            "total_errors": metrics.error_count,
            "error_rate": if metrics.request_count > 0 {
                metrics.error_count as f64 / metrics.request_count as f64
            } else {
                0.0
            },
            "requests_per_second": if uptime_seconds > 0 {
                metrics.request_count as f64 / uptime_seconds as f64
            } else {
                0.0
            }
        },
        "endpoints": endpoint_stats
    }))
}

/// Regular files in the audio directory; an unreadable directory counts as
/// empty.
async fn count_artifacts(dir: &Path) -> usize {
    let Ok(mut entries) = tokio::fs::read_dir(dir).await else {
        return 0;
    };
    let mut count = 0;
    while let Ok(Some(entry)) = entries.next_entry().await {
        if matches!(entry.file_type().await, Ok(t) if t.is_file()) {
            count += 1;
        }
    }
    count
}
