//! Durable-store seam between the in-memory registry and the database.
//!
//! The registry only needs a handful of operations, so they are expressed as
//! a trait: production code wires in [`PgRoomStore`], registry tests use the
//! in-memory store from `test_helpers`.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::{
    models::{Room, RoomId, Video, VideoId},
    repository::{RoomRepository, VideoRepository},
    Result,
};

#[async_trait]
pub trait RoomStore: Send + Sync {
    async fn create_room(&self, room: &Room) -> Result<Room>;

    async fn find_room_by_code(&self, code: &str) -> Result<Option<Room>>;

    async fn list_videos(&self, room_id: &RoomId) -> Result<Vec<Video>>;

    async fn insert_video(&self, video: &Video) -> Result<Video>;

    async fn delete_video(&self, video_id: &VideoId) -> Result<()>;

    async fn set_video_played(&self, video_id: &VideoId, played: bool) -> Result<()>;

    /// Persist the playback triple for a room.
    async fn save_playback(
        &self,
        room_id: &RoomId,
        current_video_id: Option<&str>,
        is_playing: bool,
        current_time: f64,
    ) -> Result<()>;
}

/// Postgres-backed store used by the server binary.
#[derive(Clone)]
pub struct PgRoomStore {
    rooms: RoomRepository,
    videos: VideoRepository,
}

impl PgRoomStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            rooms: RoomRepository::new(pool.clone()),
            videos: VideoRepository::new(pool),
        }
    }
}

#[async_trait]
impl RoomStore for PgRoomStore {
    async fn create_room(&self, room: &Room) -> Result<Room> {
        self.rooms.create(room).await
    }

    async fn find_room_by_code(&self, code: &str) -> Result<Option<Room>> {
        self.rooms.find_by_code(code).await
    }

    async fn list_videos(&self, room_id: &RoomId) -> Result<Vec<Video>> {
        self.videos.list_by_room(room_id).await
    }

    async fn insert_video(&self, video: &Video) -> Result<Video> {
        self.videos.create(video).await
    }

    async fn delete_video(&self, video_id: &VideoId) -> Result<()> {
        self.videos.delete(video_id).await
    }

    async fn set_video_played(&self, video_id: &VideoId, played: bool) -> Result<()> {
        self.videos.set_played(video_id, played).await
    }

    async fn save_playback(
        &self,
        room_id: &RoomId,
        current_video_id: Option<&str>,
        is_playing: bool,
        current_time: f64,
    ) -> Result<()> {
        self.rooms
            .update_playback(room_id, current_video_id, is_playing, current_time)
            .await
    }
}
