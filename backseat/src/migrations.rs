use anyhow::Result;
use sqlx::PgPool;
use tracing::{error, info};

/// Run database migrations. Single-process deployment, so no coordination
/// lock is needed; `sqlx::migrate!` is idempotent on restart.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    info!("Running database migrations...");

    sqlx::migrate!("../migrations").run(pool).await.map_err(|e| {
        error!("Failed to run migrations: {}", e);
        anyhow::anyhow!("Migration failed: {e}")
    })?;

    info!("Migrations completed");
    Ok(())
}
