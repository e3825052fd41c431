//! Local mirror of room state
//!
//! A pure reducer over inbound server messages plus the optimistic-update
//! hooks for guest-originated mutations. Snapshots and playlist updates
//! *replace* local state wholesale, which is what reconciles optimistic
//! entries: confirmed ones come back with server ids, dropped ones vanish.

use std::collections::HashSet;

use backseat_proto::{PlaylistEntry, ServerMessage, VideoSubmission};

/// Connection lifecycle as exposed to the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoomView {
    pub status: ConnectionStatus,
    /// Total reconnection attempts, for UI display.
    pub reconnect_count: u32,
    pub playlist: Vec<PlaylistEntry>,
    pub current_video_id: Option<String>,
    pub is_playing: bool,
    pub current_time: f64,
    /// External ids of optimistic playlist inserts awaiting server state.
    pub pending: HashSet<String>,
    /// Latest server ERROR message, until the next successful snapshot.
    pub last_error: Option<String>,
}

impl RoomView {
    /// Fold one inbound server message into the view.
    pub fn apply(&mut self, message: &ServerMessage) {
        match message {
            ServerMessage::SyncState {
                current_video_id,
                is_playing,
                current_time,
                playlist,
            } => {
                self.current_video_id.clone_from(current_video_id);
                self.is_playing = *is_playing;
                self.current_time = *current_time;
                self.playlist.clone_from(playlist);
                self.pending.clear();
                self.last_error = None;
            }
            ServerMessage::PlaylistUpdate { playlist } => {
                self.playlist.clone_from(playlist);
                self.pending.clear();
            }
            ServerMessage::Play {
                video_id,
                current_time,
            } => {
                if video_id.is_some() {
                    self.current_video_id.clone_from(video_id);
                }
                self.is_playing = true;
                self.current_time = *current_time;
            }
            ServerMessage::Pause => {
                self.is_playing = false;
            }
            ServerMessage::SyncTime {
                current_time,
                is_playing,
            } => {
                self.current_time = *current_time;
                self.is_playing = *is_playing;
            }
            ServerMessage::PlayVideo { video_id } => {
                self.current_video_id.clone_from(video_id);
                self.is_playing = video_id.is_some();
                self.current_time = 0.0;
            }
            ServerMessage::Error { message } => {
                self.last_error = Some(message.clone());
                self.pending.clear();
            }
            // Consumed by the heartbeat watchdog, not state.
            ServerMessage::Pong => {}
        }
    }

    /// Insert an optimistic playlist entry for a not-yet-acknowledged add.
    pub fn apply_optimistic_add(&mut self, submission: &VideoSubmission, added_by: &str) {
        let order = self.playlist.iter().map(|e| e.order).max().map_or(0, |max| max + 1);
        self.playlist.push(PlaylistEntry {
            id: format!("optimistic-{}", submission.external_id),
            external_id: submission.external_id.clone(),
            title: submission.title.clone(),
            thumbnail_url: submission.thumbnail.clone(),
            added_by: added_by.to_string(),
            is_played: false,
            order,
        });
        self.pending.insert(submission.external_id.clone());
    }

    /// Optimistically flip the play/pause bit ahead of the server round trip.
    pub fn apply_optimistic_playing(&mut self, playing: bool) {
        if self.current_video_id.is_some() {
            self.is_playing = playing;
        }
    }
}
