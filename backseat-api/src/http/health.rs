//! Health check endpoints
//!
//! - `/health` - Liveness probe: the process is up and serving
//! - `/health/ready` - Readiness probe: the database answers

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use tracing::error;

use super::AppState;

pub fn create_health_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(liveness_check))
        .route("/health/ready", get(readiness_check))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

pub async fn liveness_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".to_string(),
            message: None,
        }),
    )
}

pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    let Some(pool) = &state.db else {
        // No pool wired in (tests); nothing further to probe.
        return (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok".to_string(),
                message: None,
            }),
        );
    };

    match sqlx::query("SELECT 1").execute(pool).await {
        Ok(_) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok".to_string(),
                message: None,
            }),
        ),
        Err(err) => {
            error!("Readiness check failed: {}", err);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "unavailable".to_string(),
                    message: Some("database unreachable".to_string()),
                }),
            )
        }
    }
}
