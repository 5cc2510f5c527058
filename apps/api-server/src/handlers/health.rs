//! Health check endpoint.

use actix_web::{HttpResponse, web};
use serde::Serialize;

use postrate_core::ports::JobQueue;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub timestamp: String,
    pub durable_store: &'static str,
    pub fast_store: &'static str,
    pub jobs: JobsHealth,
}

#[derive(Serialize)]
pub struct JobsHealth {
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
}

/// Health check endpoint - returns server status.
///
/// GET /api/health
pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let stats = state.queue.stats().await.unwrap_or_default();

    HttpResponse::Ok().json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: chrono::Utc::now().to_rfc3339(),
        durable_store: state.backends.durable,
        fast_store: state.backends.fast,
        jobs: JobsHealth {
            pending: stats.pending,
            processing: stats.processing,
            completed: stats.completed,
            failed: stats.failed,
        },
    })
}
