//! citifix-api: REST API server for the citifix issue reporting platform
//!
//! Serves accounts, issues, votes, comments, notifications, the leaderboard
//! and the staff dashboard over JSON.

mod app;
mod routes;

use app::AppState;
use citifix_core::{Error, Service, Store};
use std::path::Path;

fn init_tracing() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Open the data directory, initializing it on first start
fn open_service(data_dir: &Path) -> anyhow::Result<Service> {
    match Service::open(data_dir) {
        Ok(service) => Ok(service),
        Err(Error::NotInitialized(_)) => {
            Store::init(data_dir)
                .map_err(|e| anyhow::anyhow!("Failed to initialize store: {}", e))?;
            tracing::info!("Initialized data directory {}", data_dir.display());
            Ok(Service::open(data_dir)?)
        }
        Err(e) => Err(anyhow::anyhow!("Failed to open store: {}", e)),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let data_dir = citifix_core::config::data_dir(None)?;
    let service = open_service(&data_dir)?;

    let config = service.config().clone();
    let body_limit = (config.media.max_file_size as usize)
        .saturating_mul(config.media.max_files)
        .saturating_add(64 * 1024);

    let state = AppState::new(service);
    let app = routes::router(state, body_limit);

    let addr = format!("{}:{}", config.server.host, config.port());
    tracing::info!("Starting citifix-api on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
