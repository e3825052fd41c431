use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, warn};

use backseat_proto::{PlaylistEntry, Role, ServerMessage};

use crate::models::{playlist_ordering, Room, UserId, Video};

use super::{Snapshot, PLAY_PAUSE_COOLDOWN};

/// One attached client channel.
#[derive(Debug)]
pub(crate) struct Session {
    pub connection_id: String,
    pub user_id: UserId,
    #[allow(dead_code)]
    pub role: Role,
    pub sender: mpsc::Sender<ServerMessage>,
}

/// A room's live state while at least one client is attached.
///
/// All fields are guarded by the per-room mutex in the registry; every
/// read-modify-broadcast sequence happens under that lock, which is what
/// makes room mutations linearizable and keeps broadcast order consistent
/// across clients.
pub(crate) struct LiveRoom {
    pub room: Room,
    /// Kept sorted by the playlist total order.
    pub playlist: Vec<Video>,
    pub sessions: Vec<Session>,
    /// Set on explicit PLAY/PAUSE; host-reported `is_playing` is ignored
    /// until [`PLAY_PAUSE_COOLDOWN`] has elapsed.
    pub control_cooldown_at: Option<Instant>,
    /// Last time the playback triple was written to the durable store.
    pub last_playback_save: Option<Instant>,
}

impl LiveRoom {
    pub fn new(room: Room, mut playlist: Vec<Video>) -> Self {
        playlist.sort_by(playlist_ordering);
        Self {
            room,
            playlist,
            sessions: Vec::new(),
            control_cooldown_at: None,
            last_playback_save: None,
        }
    }

    /// Cooldown tie-break: exactly the cooldown duration counts as elapsed.
    pub fn cooldown_elapsed(&self, now: Instant) -> bool {
        self.control_cooldown_at
            .is_none_or(|at| now.duration_since(at) >= PLAY_PAUSE_COOLDOWN)
    }

    pub fn next_order(&self) -> i32 {
        self.playlist.iter().map(|v| v.order).max().map_or(0, |max| max + 1)
    }

    pub fn insert_sorted(&mut self, video: Video) {
        self.playlist.push(video);
        self.playlist.sort_by(playlist_ordering);
    }

    pub fn playlist_entries(&self) -> Vec<PlaylistEntry> {
        self.playlist.iter().map(Video::to_entry).collect()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            current_video_id: self.room.current_video_id.clone(),
            is_playing: self.room.is_playing,
            current_time: self.room.current_time,
            playlist: self.playlist_entries(),
        }
    }

    /// Best-effort fan-out to every attached session except `exclude`.
    ///
    /// A full buffer drops the message for that client only; a closed channel
    /// removes the session. Neither aborts delivery to siblings.
    pub fn broadcast(&mut self, message: &ServerMessage, exclude: Option<&str>) {
        let mut closed: Vec<String> = Vec::new();

        for session in &self.sessions {
            if exclude == Some(session.connection_id.as_str()) {
                continue;
            }
            match session.sender.try_send(message.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(
                        room_code = %self.room.code,
                        user_id = %session.user_id,
                        connection_id = %session.connection_id,
                        "Session channel full, dropping message for slow consumer"
                    );
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!(
                        room_code = %self.room.code,
                        connection_id = %session.connection_id,
                        "Session channel closed, removing session"
                    );
                    closed.push(session.connection_id.clone());
                }
            }
        }

        if !closed.is_empty() {
            self.sessions.retain(|s| !closed.contains(&s.connection_id));
        }
    }
}
