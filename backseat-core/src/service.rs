//! Room lifecycle operations backing the REST endpoints.

use std::sync::Arc;

use tracing::info;

use crate::{
    models::{generate_room_code, Room, Video},
    store::RoomStore,
    Error, Result,
};

/// How many fresh codes to try before giving up on a pathological collision
/// streak. With a 32^6 code space this never triggers in practice.
const CODE_RETRY_LIMIT: usize = 5;

#[derive(Clone)]
pub struct RoomService {
    store: Arc<dyn RoomStore>,
}

impl RoomService {
    #[must_use]
    pub fn new(store: Arc<dyn RoomStore>) -> Self {
        Self { store }
    }

    /// Create a room under a freshly generated code, retrying on collision.
    pub async fn create_room(&self) -> Result<Room> {
        for _ in 0..CODE_RETRY_LIMIT {
            let room = Room::new(generate_room_code());
            match self.store.create_room(&room).await {
                Ok(created) => {
                    info!(room_code = %created.code, room_id = %created.id, "Room created");
                    return Ok(created);
                }
                Err(Error::AlreadyExists(_)) => continue,
                Err(err) => return Err(err),
            }
        }
        Err(Error::Internal("Could not allocate a unique room code".to_string()))
    }

    /// Look up a room by code together with its playlist.
    pub async fn get_room_with_videos(&self, code: &str) -> Result<(Room, Vec<Video>)> {
        let room = self
            .store
            .find_room_by_code(code)
            .await?
            .ok_or_else(|| Error::NotFound("Room not found".to_string()))?;
        let videos = self.store.list_videos(&room.id).await?;
        Ok((room, videos))
    }

    /// Whether a room code exists in durable storage.
    pub async fn room_exists(&self, code: &str) -> Result<bool> {
        Ok(self.store.find_room_by_code(code).await?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::is_valid_room_code;
    use crate::test_helpers::{seeded_room, video_fixture, MemoryRoomStore};

    #[tokio::test]
    async fn created_rooms_carry_well_formed_codes() {
        let store = Arc::new(MemoryRoomStore::new());
        let service = RoomService::new(store);
        let room = service.create_room().await.expect("create");
        assert!(is_valid_room_code(&room.code));
        assert!(room.is_idle());
    }

    #[tokio::test]
    async fn lookup_returns_room_and_sorted_playlist() {
        let store = Arc::new(MemoryRoomStore::new());
        let room = seeded_room(&store, "ABCDEF");
        store.seed_video(video_fixture(&room.id, "b", 1));
        store.seed_video(video_fixture(&room.id, "a", 0));

        let service = RoomService::new(store);
        let (found, videos) = service.get_room_with_videos("ABCDEF").await.expect("lookup");
        assert_eq!(found.code, "ABCDEF");
        let externals: Vec<&str> = videos.iter().map(|v| v.external_id.as_str()).collect();
        assert_eq!(externals, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn lookup_of_unknown_code_is_not_found() {
        let store = Arc::new(MemoryRoomStore::new());
        let service = RoomService::new(store);
        let err = service.get_room_with_videos("ZZZZZZ").await.expect_err("missing");
        assert!(matches!(err, Error::NotFound(_)));
        assert!(!service.room_exists("ZZZZZZ").await.expect("exists"));
    }
}
