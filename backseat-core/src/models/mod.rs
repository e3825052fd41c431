pub mod id;
pub mod room;
pub mod video;

pub use id::{RoomId, UserId, VideoId};
pub use room::{generate_room_code, is_valid_room_code, Room, ROOM_CODE_ALPHABET, ROOM_CODE_LEN};
pub use video::{playlist_ordering, Video};
