use clap::Parser;
use r2d2::Pool;
use std::sync::Arc;
use tracing::{error, info, warn};

mod config;
mod db;
mod error;
mod llm;
mod nl;
mod util;
mod web;

use crate::config::{AppConfig, CliArgs};
use crate::db::pool::DuckDbConnectionManager;
use crate::util::logging::init_tracing;
use crate::web::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    init_tracing();

    let args = CliArgs::parse();

    let config = match AppConfig::new(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    info!(
        "Initializing DuckDB connection pool at {}",
        config.database.connection_string
    );
    let db_manager = DuckDbConnectionManager::new(config.database.connection_string.clone());
    let pool = Pool::builder()
        .max_size(config.database.pool_size as u32)
        .build(db_manager)?;

    // The sync jobs populate these tables out of band; we only make sure
    // they exist so queries against a fresh store behave.
    db::bootstrap::ensure_tables(pool.clone()).await?;

    if config.llm.api_key.is_none() {
        // Not fatal: requests will get a structured 401 until a key shows up
        warn!("No OpenAI API key configured; question endpoints will return 401");
    }

    let app_state = Arc::new(AppState::new(&config, pool)?);

    info!(
        "Starting workbench-qa server on {}:{}",
        config.web.host, config.web.port
    );
    match web::run_server(config.web, app_state).await {
        Ok(_) => info!("Server stopped gracefully"),
        Err(e) => {
            error!("Server error: {}", e);
            return Err(std::io::Error::other(e.to_string()).into());
        }
    }

    Ok(())
}
