//! Server entry point: config, storage, migrations, then axum.

use mediclear::api::{api_router, ApiContext};
use mediclear::config::{self, AppConfig};
use mediclear::db::sqlite::open_database;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config::default_log_filter().into()),
        )
        .init();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "configuration error");
            std::process::exit(1);
        }
    };

    if let Err(e) = std::fs::create_dir_all(config.files_dir()) {
        tracing::error!(error = %e, dir = %config.files_dir().display(), "cannot create storage directory");
        std::process::exit(1);
    }

    // Open once at startup so migrations run before the first request
    if let Err(e) = open_database(&config.db_path()) {
        tracing::error!(error = %e, "database initialization failed");
        std::process::exit(1);
    }

    let bind_addr = config.bind_addr;
    let app = api_router(ApiContext::new(config));

    let listener = match tokio::net::TcpListener::bind(bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, %bind_addr, "cannot bind server address");
            std::process::exit(1);
        }
    };
    tracing::info!(%bind_addr, version = config::APP_VERSION, "server listening");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "server error");
        std::process::exit(1);
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("shutdown signal received");
    }
}
