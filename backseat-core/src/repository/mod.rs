pub mod room;
pub mod video;

pub use room::RoomRepository;
pub use video::VideoRepository;
