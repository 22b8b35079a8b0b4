//! # Sonification Backend - Main Application Entry Point
//!
//! HTTP service that turns a slice of a web page into an audio file by
//! handing it to an external rendering script.
//!
//! ## Application Architecture:
//! - **config**: application configuration (defaults, config.toml, environment)
//! - **state**: shared state handed to every request handler
//! - **sonification**: fetch, slice, naming, rendering and retention sweeping
//! - **handlers**: HTTP request handlers for the API endpoints
//! - **health**: health and metrics endpoints
//! - **middleware**: request metrics collection
//! - **error**: error type and its HTTP representation

mod config;
mod error;
mod handlers;
mod health;
mod middleware;
mod sonification;
mod state;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use anyhow::Result;
use tracing::{error, info};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::AppConfig;
use crate::sonification::SonificationService;
use crate::state::AppState;

#[actix_web::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    init_tracing()?;

    let config = AppConfig::load()?;
    config.validate()?;

    let mode = config.sonification.mode();
    info!("Starting sonification-backend v{}", env!("CARGO_PKG_VERSION"));
    info!(
        mode = mode.as_str(),
        limit = config.sonification.limit,
        audio_dir = %config.sonification.audio_dir.display(),
        interpreter = %config.sonification.python_path,
        "Configuration loaded"
    );

    let service = SonificationService::from_config(&config)?;
    let app_state = AppState::new(config.clone(), service);
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);

    info!("Starting HTTP server on {}", bind_addr);

    let server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(handlers::json_config())
            .wrap(middleware::MetricsMiddleware)
            .wrap(cors)
            .wrap(TracingLogger::default())
            .service(
                web::scope("/api")
                    .route("/sonificate", web::post().to(handlers::sonificate))
                    .route("/sonification", web::post().to(handlers::sonificate))
                    .route("/audio/{filename}", web::get().to(handlers::serve_audio))
                    .service(
                        web::scope("/v1")
                            .route("/health", web::get().to(health::health_check))
                            .route("/metrics", web::get().to(health::detailed_metrics)),
                    ),
            )
            .route("/health", web::get().to(health::health_check))
    })
    .disable_signals()
    .bind(&bind_addr)?
    .run();

    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    tokio::select! {
        result = server_task => {
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Server error: {}", e),
                Err(e) => error!("Server task error: {}", e),
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received, stopping server...");
            server_handle.stop(true).await;
        }
    }

    info!("Server stopped gracefully");
    Ok(())
}

/// Initialize the tracing subscriber.
///
/// `RUST_LOG` controls verbosity; without it the crate logs at debug and
/// actix at info.
fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sonification_backend=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;

    Ok(())
}

/// Resolves on Ctrl+C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
