use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use backseat_api::{create_router, AppState};
use backseat_core::provider::MediaService;
use backseat_core::{Config, PgRoomStore, RoomRegistry, RoomService};

pub async fn init_database(config: &Config) -> Result<PgPool> {
    info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(Duration::from_secs(config.database.connect_timeout_seconds))
        .idle_timeout(Duration::from_secs(config.database.idle_timeout_seconds))
        .connect(&config.database.url)
        .await?;
    Ok(pool)
}

pub async fn run(config: Config, pool: PgPool) -> Result<()> {
    let store = Arc::new(PgRoomStore::new(pool.clone()));

    let state = AppState {
        registry: Arc::new(RoomRegistry::new(store.clone())),
        rooms: RoomService::new(store),
        media: Arc::new(MediaService::from_config(&config.providers)?),
        db: Some(pool),
        cors_allowed_origins: config.server.cors_allowed_origins.clone(),
    };
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(config.http_address()).await?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }
}
