// Module: http
// REST endpoints plus the WebSocket session gateway

pub mod error;
pub mod health;
pub mod media;
pub mod rooms;
pub mod websocket;

use std::sync::Arc;

use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use backseat_core::provider::MediaService;
use backseat_core::{RoomRegistry, RoomService};

pub use error::{AppError, AppResult};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<RoomRegistry>,
    pub rooms: RoomService,
    pub media: Arc<MediaService>,
    /// Present in production; absent in tests that run on the in-memory store.
    pub db: Option<PgPool>,
    pub cors_allowed_origins: Vec<String>,
}

/// Create the HTTP router with all routes and global layers
pub fn create_router(state: AppState) -> Router {
    let cors = if state.cors_allowed_origins.is_empty() {
        CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
    } else {
        let origins: Vec<HeaderValue> = state
            .cors_allowed_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        CorsLayer::new().allow_origin(origins).allow_methods(Any).allow_headers(Any)
    };

    Router::new()
        .merge(health::create_health_router())
        .route("/api/rooms", post(rooms::create_room))
        .route("/api/rooms/{code}", get(rooms::get_room))
        .route("/api/media/search", get(media::search))
        .route("/api/media/video", get(media::video))
        .route("/api/media/playlist", get(media::playlist))
        .route("/ws", get(websocket::websocket_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
