// Room management HTTP handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use backseat_core::models::{Room, Video};
use backseat_proto::PlaylistEntry;

use super::{AppError, AppResult, AppState};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomBody {
    pub id: String,
    pub code: String,
    pub current_video_id: Option<String>,
    pub is_playing: bool,
    pub current_time: f64,
    pub created_at: String,
    pub updated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub videos: Option<Vec<PlaylistEntry>>,
}

impl RoomBody {
    fn from_room(room: &Room, videos: Option<&[Video]>) -> Self {
        Self {
            id: room.id.as_str().to_string(),
            code: room.code.clone(),
            current_video_id: room.current_video_id.clone(),
            is_playing: room.is_playing,
            current_time: room.current_time,
            created_at: room.created_at.to_rfc3339(),
            updated_at: room.updated_at.to_rfc3339(),
            videos: videos.map(|list| list.iter().map(Video::to_entry).collect()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RoomResponse {
    pub room: RoomBody,
}

/// Create a new room with a fresh code
pub async fn create_room(State(state): State<AppState>) -> AppResult<(StatusCode, Json<RoomResponse>)> {
    let room = state.rooms.create_room().await?;
    Ok((
        StatusCode::CREATED,
        Json(RoomResponse {
            room: RoomBody::from_room(&room, None),
        }),
    ))
}

/// Look up a room by code, including its playlist
pub async fn get_room(
    Path(code): Path<String>,
    State(state): State<AppState>,
) -> AppResult<Json<RoomResponse>> {
    let code = code.to_uppercase();
    if !backseat_core::models::is_valid_room_code(&code) {
        return Err(AppError::not_found("Room not found"));
    }

    let (room, videos) = state.rooms.get_room_with_videos(&code).await?;
    Ok(Json(RoomResponse {
        room: RoomBody::from_room(&room, Some(&videos)),
    }))
}
