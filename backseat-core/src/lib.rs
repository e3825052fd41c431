pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod provider;
pub mod registry;
pub mod repository;
pub mod service;
pub mod store;
pub mod test_helpers;

pub use config::Config;
pub use error::{Error, Result};
pub use registry::RoomRegistry;
pub use service::RoomService;
pub use store::{PgRoomStore, RoomStore};
