//! Wire protocol for the backseat room coordinator
//!
//! Every frame is a single UTF-8 JSON object with a `type` discriminator.
//! Field names keep the legacy camelCase spelling (including `youtubeId` for
//! what the server models as an opaque external id) so existing clients keep
//! working.

use serde::{Deserialize, Serialize};

/// Role a session declares when joining a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The single client that renders media and reports playback position.
    Host,
    /// A remote-control client mirroring the host's state.
    Guest,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Host => "host",
            Self::Guest => "guest",
        }
    }
}

/// A video submitted by a client (`ADD_VIDEO` / `ADD_VIDEOS` payload).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSubmission {
    /// Opaque upstream media id. Legacy wire name.
    #[serde(rename = "youtubeId")]
    pub external_id: String,
    pub title: String,
    pub thumbnail: String,
}

/// A playlist entry as broadcast to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistEntry {
    pub id: String,
    pub external_id: String,
    pub title: String,
    pub thumbnail_url: String,
    pub added_by: String,
    pub is_played: bool,
    pub order: i32,
}

/// Messages a client sends to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all_fields = "camelCase")]
pub enum ClientMessage {
    Join {
        /// The room *code*, not the internal id.
        room_id: String,
        user_id: String,
        role: Role,
    },
    AddVideo {
        room_id: String,
        video: VideoSubmission,
        user_id: String,
    },
    AddVideos {
        room_id: String,
        videos: Vec<VideoSubmission>,
        user_id: String,
    },
    Play {
        room_id: String,
    },
    Pause {
        room_id: String,
    },
    SyncTime {
        room_id: String,
        current_time: f64,
        is_playing: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration: Option<f64>,
    },
    NextVideo {
        room_id: String,
    },
    RemoveVideo {
        room_id: String,
        video_id: String,
    },
    SelectVideo {
        room_id: String,
        #[serde(rename = "youtubeId")]
        external_id: String,
    },
    Ping,
}

impl ClientMessage {
    /// The room code a message targets, if it targets one at all.
    #[must_use]
    pub fn room_code(&self) -> Option<&str> {
        match self {
            Self::Join { room_id, .. }
            | Self::AddVideo { room_id, .. }
            | Self::AddVideos { room_id, .. }
            | Self::Play { room_id }
            | Self::Pause { room_id }
            | Self::SyncTime { room_id, .. }
            | Self::NextVideo { room_id }
            | Self::RemoveVideo { room_id, .. }
            | Self::SelectVideo { room_id, .. } => Some(room_id),
            Self::Ping => None,
        }
    }
}

/// Messages the server sends to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// Full authoritative snapshot, sent on every (re)join.
    SyncState {
        current_video_id: Option<String>,
        is_playing: bool,
        current_time: f64,
        playlist: Vec<PlaylistEntry>,
    },
    PlaylistUpdate {
        playlist: Vec<PlaylistEntry>,
    },
    Play {
        video_id: Option<String>,
        current_time: f64,
    },
    Pause,
    SyncTime {
        current_time: f64,
        is_playing: bool,
    },
    PlayVideo {
        video_id: Option<String>,
    },
    Pong,
    Error {
        message: String,
    },
}
