mod config;

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use bluenote_api::storage::MediaStorage;
use bluenote_api::rate_limit::{self, FILE_DELETES_PER_MINUTE};
use bluenote_api::{AppState, AppStateInner, cleanup};
use bluenote_db::Database;

use crate::config::Config;

/// How often abandoned uploads are swept.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(3600);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bluenote=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    // Init database and media storage
    let db = Arc::new(Database::open(&config.db_path)?);
    let storage = MediaStorage::new(config.media_dir.clone()).await?;

    let state: AppState = Arc::new(AppStateInner {
        db,
        jwt_secret: config.jwt_secret.clone(),
        jwt_expire_hours: config.jwt_expire_hours,
        storage,
        db_timeout: config.db_timeout,
        file_delete_limiter: rate_limit::per_minute(FILE_DELETES_PER_MINUTE),
    });

    // Background cleanup of uploads no post ever claimed
    tokio::spawn(cleanup::run_cleanup_loop(
        state.clone(),
        chrono::Duration::hours(config.media_retention_hours),
        CLEANUP_INTERVAL,
    ));

    let app = bluenote_api::router(state);

    let addr = config.addr()?;
    info!("Bluenote server listening on {}", addr);
    info!("Media retention: {} hours", config.media_retention_hours);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
