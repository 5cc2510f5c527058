//! # Postrate API Server
//!
//! The main entry point for the Actix-web HTTP server.

use actix_web::{App, HttpServer, web};
use tokio::sync::watch;
use tracing_actix_web::TracingLogger;

mod background;
mod config;
mod handlers;
mod middleware;
mod state;
mod telemetry;

use config::AppConfig;
use state::AppState;
use telemetry::{TelemetryConfig, init_telemetry};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_telemetry(&TelemetryConfig::from_env());
    let config = AppConfig::from_env();

    tracing::info!(host = %config.host, port = config.port, "Starting Postrate API server");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (state, workers) = AppState::build(&config, shutdown_rx)
        .await
        .map_err(std::io::Error::other)?;

    if let Some(admin) = &config.admin {
        state.ensure_admin(admin).await.map_err(std::io::Error::other)?;
    }

    #[cfg(feature = "scheduler")]
    let mut scheduler =
        background::start_rate_refresh(&config.scheduler, state.services.rates.clone()).await;

    let server_state = state.clone();
    let result = HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .app_data(web::Data::new(server_state.clone()))
            .configure(handlers::configure_routes)
    })
    .shutdown_timeout(config.shutdown_grace.as_secs())
    .bind((config.host.as_str(), config.port))?
    .run()
    .await;

    tracing::info!("HTTP server stopped, draining background work");

    #[cfg(feature = "scheduler")]
    if let Some(scheduler) = scheduler.as_mut() {
        if let Err(e) = scheduler.shutdown().await {
            tracing::warn!(error = %e, "Scheduler did not shut down cleanly");
        }
    }

    if shutdown_tx.send(true).is_err() {
        tracing::debug!("Job workers already stopped");
    }
    let drained =
        tokio::time::timeout(config.shutdown_grace, futures::future::join_all(workers)).await;
    if drained.is_err() {
        tracing::warn!(
            grace_secs = config.shutdown_grace.as_secs(),
            "Job workers still busy after the grace period"
        );
    }

    result
}
