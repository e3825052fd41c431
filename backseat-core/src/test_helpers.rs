//! Test helpers and fixtures
//!
//! Provides an in-memory [`RoomStore`] so registry and gateway tests run
//! against a fresh store per case, without a database.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::{
    models::{playlist_ordering, Room, RoomId, UserId, Video, VideoId},
    store::RoomStore,
    Error, Result,
};

/// In-memory implementation of [`RoomStore`].
///
/// `fail_writes` makes every mutating call error, for exercising the
/// durable-store failure paths. `playback_saves` counts `save_playback`
/// calls, for asserting the position-persist throttle.
#[derive(Default)]
pub struct MemoryRoomStore {
    rooms: Mutex<HashMap<String, Room>>,
    videos: Mutex<Vec<Video>>,
    pub fail_writes: AtomicBool,
    pub playback_saves: AtomicUsize,
}

impl MemoryRoomStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a room directly, bypassing the failure toggle.
    pub fn seed_room(&self, room: Room) {
        self.rooms.lock().insert(room.code.clone(), room);
    }

    /// Seed a playlist entry directly, bypassing the failure toggle.
    pub fn seed_video(&self, video: Video) {
        self.videos.lock().push(video);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn playback_save_count(&self) -> usize {
        self.playback_saves.load(Ordering::SeqCst)
    }

    /// The persisted playback triple for a room, if the room exists.
    pub fn persisted_playback(&self, code: &str) -> Option<(Option<String>, bool, f64)> {
        self.rooms
            .lock()
            .get(code)
            .map(|r| (r.current_video_id.clone(), r.is_playing, r.current_time))
    }

    pub fn video_count(&self) -> usize {
        self.videos.lock().len()
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::Internal("store writes disabled".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl RoomStore for MemoryRoomStore {
    async fn create_room(&self, room: &Room) -> Result<Room> {
        self.check_writable()?;
        let mut rooms = self.rooms.lock();
        if rooms.contains_key(&room.code) {
            return Err(Error::AlreadyExists("Room code already taken".to_string()));
        }
        rooms.insert(room.code.clone(), room.clone());
        Ok(room.clone())
    }

    async fn find_room_by_code(&self, code: &str) -> Result<Option<Room>> {
        Ok(self.rooms.lock().get(code).cloned())
    }

    async fn list_videos(&self, room_id: &RoomId) -> Result<Vec<Video>> {
        let mut videos: Vec<Video> = self
            .videos
            .lock()
            .iter()
            .filter(|v| v.room_id == *room_id)
            .cloned()
            .collect();
        videos.sort_by(playlist_ordering);
        Ok(videos)
    }

    async fn insert_video(&self, video: &Video) -> Result<Video> {
        self.check_writable()?;
        self.videos.lock().push(video.clone());
        Ok(video.clone())
    }

    async fn delete_video(&self, video_id: &VideoId) -> Result<()> {
        self.check_writable()?;
        let mut videos = self.videos.lock();
        let before = videos.len();
        videos.retain(|v| v.id != *video_id);
        if videos.len() == before {
            return Err(Error::NotFound("Video not found".to_string()));
        }
        Ok(())
    }

    async fn set_video_played(&self, video_id: &VideoId, played: bool) -> Result<()> {
        self.check_writable()?;
        if let Some(video) = self.videos.lock().iter_mut().find(|v| v.id == *video_id) {
            video.is_played = played;
        }
        Ok(())
    }

    async fn save_playback(
        &self,
        room_id: &RoomId,
        current_video_id: Option<&str>,
        is_playing: bool,
        current_time: f64,
    ) -> Result<()> {
        self.check_writable()?;
        self.playback_saves.fetch_add(1, Ordering::SeqCst);
        let mut rooms = self.rooms.lock();
        let room = rooms
            .values_mut()
            .find(|r| r.id == *room_id)
            .ok_or_else(|| Error::NotFound("Room not found".to_string()))?;
        room.current_video_id = current_video_id.map(ToString::to_string);
        room.is_playing = is_playing;
        room.current_time = current_time;
        room.updated_at = chrono::Utc::now();
        Ok(())
    }
}

/// A seeded empty room with a fresh code. Returns the room for convenience.
pub fn seeded_room(store: &MemoryRoomStore, code: &str) -> Room {
    let room = Room::new(code.to_string());
    store.seed_room(room.clone());
    room
}

/// A playlist entry fixture.
#[must_use]
pub fn video_fixture(room_id: &RoomId, external_id: &str, order: i32) -> Video {
    Video::new(
        room_id.clone(),
        external_id.to_string(),
        format!("Title {external_id}"),
        format!("https://thumbs.invalid/{external_id}.jpg"),
        UserId::from_string("fixture-user".to_string()),
        order,
    )
}
