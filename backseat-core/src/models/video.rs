use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use backseat_proto::PlaylistEntry;

use super::id::{RoomId, UserId, VideoId};

/// A playlist entry owned by a room.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Video {
    pub id: VideoId,
    pub room_id: RoomId,
    /// Opaque upstream media id (`youtubeId` on the wire).
    pub external_id: String,
    pub title: String,
    pub thumbnail_url: String,
    pub added_by: UserId,
    /// Advisory: set when the entry is advanced past.
    pub is_played: bool,
    /// Sort key within the room. Total order: `order` asc, then `created_at`,
    /// then `id`.
    pub order: i32,
    pub created_at: DateTime<Utc>,
}

impl Video {
    #[must_use]
    pub fn new(
        room_id: RoomId,
        external_id: String,
        title: String,
        thumbnail_url: String,
        added_by: UserId,
        order: i32,
    ) -> Self {
        Self {
            id: VideoId::new(),
            room_id,
            external_id,
            title,
            thumbnail_url,
            added_by,
            is_played: false,
            order,
            created_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn to_entry(&self) -> PlaylistEntry {
        PlaylistEntry {
            id: self.id.as_str().to_string(),
            external_id: self.external_id.clone(),
            title: self.title.clone(),
            thumbnail_url: self.thumbnail_url.clone(),
            added_by: self.added_by.as_str().to_string(),
            is_played: self.is_played,
            order: self.order,
        }
    }
}

/// Playlist ordering: `order` ascending, ties broken by `created_at` then `id`.
#[must_use]
pub fn playlist_ordering(a: &Video, b: &Video) -> std::cmp::Ordering {
    a.order
        .cmp(&b.order)
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| a.id.cmp(&b.id))
}
