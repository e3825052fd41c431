use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::RoomId;

/// Alphabet for human-friendly room codes. 32 characters, no `0/O/1/I` so
/// codes survive being read aloud or copied from a screen across the room.
pub const ROOM_CODE_ALPHABET: [char; 32] = [
    'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'J', 'K', 'L', 'M', 'N', 'P', 'Q', 'R', 'S', 'T', 'U',
    'V', 'W', 'X', 'Y', 'Z', '2', '3', '4', '5', '6', '7', '8', '9',
];

pub const ROOM_CODE_LEN: usize = 6;

/// Generate a fresh 6-character room code.
#[must_use]
pub fn generate_room_code() -> String {
    nanoid::nanoid!(ROOM_CODE_LEN, &ROOM_CODE_ALPHABET)
}

/// Check that a string is a well-formed room code.
#[must_use]
pub fn is_valid_room_code(code: &str) -> bool {
    code.len() == ROOM_CODE_LEN && code.chars().all(|c| ROOM_CODE_ALPHABET.contains(&c))
}

/// A room's durable record. The playback triple
/// (`current_video_id`, `is_playing`, `current_time`) is authoritative in the
/// in-memory registry while the room is live; the persisted copy is what a
/// restarted server seeds from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub code: String,
    pub current_video_id: Option<String>,
    pub is_playing: bool,
    pub current_time: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Room {
    #[must_use]
    pub fn new(code: String) -> Self {
        let now = Utc::now();
        Self {
            id: RoomId::new(),
            code,
            current_video_id: None,
            is_playing: false,
            current_time: 0.0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Nothing selected means nothing can be playing.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.current_video_id.is_none()
    }
}
