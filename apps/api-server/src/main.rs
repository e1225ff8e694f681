//! # Turnstile API Server
//!
//! Actix-web host that puts every route behind the admission gate.

use actix_web::{App, HttpServer, web};
use tracing_actix_web::TracingLogger;

mod config;
mod handlers;
mod middleware;
mod state;
mod telemetry;

use config::AppConfig;
use middleware::RateLimitMiddleware;
use state::AppState;
use telemetry::{TelemetryConfig, init_telemetry};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_telemetry(&TelemetryConfig::from_env());

    let config = AppConfig::from_env()?;

    tracing::info!(
        "Starting Turnstile API Server on {}:{} ({:?})",
        config.host,
        config.port,
        config.environment
    );

    let state = AppState::new(&config).await?;

    // Last wrap is outermost: TracingLogger also sees rejected requests.
    HttpServer::new(move || {
        App::new()
            .wrap(RateLimitMiddleware::new(&state))
            .wrap(TracingLogger::default())
            .app_data(web::Data::new(state.clone()))
            .configure(handlers::configure_routes)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await?;

    Ok(())
}
