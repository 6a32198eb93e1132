//! Warden API Server
//!
//! Configuration comes from the TOML file named by `WARDEN_CONFIG` plus
//! environment overrides; `RUST_LOG` takes precedence over `logging.level`.
//!
//! Author: hephaex@gmail.com

use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use warden_api::{create_router, AppState};
use warden_core::{AppConfig, LoggingConfig};
use warden_store::Repositories;

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warden_api={level},warden_store={level},audit=info,tower_http=info",
            level = logging.level
        ))
    });

    if logging.json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    init_tracing(&config.logging);

    if config.auth.uses_development_secret() {
        tracing::warn!("JWT_SECRET is not set; using the development secret");
    }

    let repositories = Repositories::connect(&config.database).await?;

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = Arc::new(AppState::new(config, repositories)?);
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Warden API Server starting on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
