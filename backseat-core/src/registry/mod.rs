//! Room registry and state store
//!
//! Owns the set of live rooms and each room's authoritative playback state.
//! Rooms are materialized lazily on first attach (seeded from the durable
//! store) and garbage-collected when the last client detaches; the durable
//! record outlives the live state.
//!
//! Every mutation takes the room's mutex and broadcasts inside the critical
//! section, so per-room writes are linearizable and clients observe
//! broadcasts in processing order.

mod live_room;

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{mpsc, Mutex};
use tokio::time::Instant;
use tracing::{info, warn};

use backseat_proto::{PlaylistEntry, Role, ServerMessage, VideoSubmission};

use crate::{
    models::{UserId, Video},
    store::RoomStore,
    Error, Result,
};

use live_room::{LiveRoom, Session};

/// Window after an explicit PLAY/PAUSE during which host-reported
/// `is_playing` values are ignored. The embedded player takes hundreds of
/// milliseconds to actually transition, and its reports during that window
/// would overwrite the authoritative bit with the old value.
pub const PLAY_PAUSE_COOLDOWN: Duration = Duration::from_millis(3000);

/// Minimum interval between durable writes triggered by position reports.
pub const PLAYBACK_SAVE_INTERVAL: Duration = Duration::from_secs(5);

/// Capacity of each session's outbound message buffer.
pub const SESSION_CHANNEL_CAPACITY: usize = 256;

/// Full authoritative state handed to a client on (re)attach.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub current_video_id: Option<String>,
    pub is_playing: bool,
    pub current_time: f64,
    pub playlist: Vec<PlaylistEntry>,
}

impl Snapshot {
    #[must_use]
    pub fn into_message(self) -> ServerMessage {
        ServerMessage::SyncState {
            current_video_id: self.current_video_id,
            is_playing: self.is_playing,
            current_time: self.current_time,
            playlist: self.playlist,
        }
    }
}

/// The values the server intends other clients to see after a position
/// report has been reconciled with the cooldown rule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectivePosition {
    pub current_time: f64,
    pub is_playing: bool,
}

/// Attach parameters for a client that has completed a JOIN.
pub struct AttachRequest {
    pub room_code: String,
    pub user_id: UserId,
    pub role: Role,
    pub connection_id: String,
    pub sender: mpsc::Sender<ServerMessage>,
}

/// Process-wide registry of live rooms. Cheap to clone via `Arc`.
pub struct RoomRegistry {
    rooms: DashMap<String, Arc<Mutex<LiveRoom>>>,
    store: Arc<dyn RoomStore>,
}

impl RoomRegistry {
    #[must_use]
    pub fn new(store: Arc<dyn RoomStore>) -> Self {
        Self {
            rooms: DashMap::new(),
            store,
        }
    }

    /// Attach a client to a room, materializing the room's live state from
    /// the durable store on first use. An existing session with the same
    /// `user_id` is evicted. Returns the full snapshot for the new session.
    pub async fn attach(&self, req: AttachRequest) -> Result<Snapshot> {
        let live = self.get_or_load(&req.room_code).await?;
        let mut room = live.lock().await;

        let before = room.sessions.len();
        room.sessions.retain(|s| s.user_id != req.user_id);
        if room.sessions.len() < before {
            info!(
                room_code = %req.room_code,
                user_id = %req.user_id,
                "Evicted previous session for rejoining user"
            );
        }

        room.sessions.push(Session {
            connection_id: req.connection_id,
            user_id: req.user_id,
            role: req.role,
            sender: req.sender,
        });

        Ok(room.snapshot())
    }

    /// Remove a session. Garbage-collects the room's in-memory state when the
    /// last session leaves; the durable record stays.
    pub async fn detach(&self, room_code: &str, connection_id: &str) {
        let Some(live) = self.rooms.get(room_code).map(|entry| Arc::clone(entry.value())) else {
            return;
        };

        let mut room = live.lock().await;
        room.sessions.retain(|s| s.connection_id != connection_id);
        let empty = room.sessions.is_empty();
        drop(room);

        if empty {
            // Re-check under try_lock: a concurrent attach may have raced in.
            let removed = self.rooms.remove_if(room_code, |_, value| {
                value.try_lock().map(|r| r.sessions.is_empty()).unwrap_or(false)
            });
            if removed.is_some() {
                info!(room_code = %room_code, "Last client left, dropping live room state");
            }
        }
    }

    /// Append one video. Auto-starts playback when the room was idle.
    pub async fn add_video(
        &self,
        room_code: &str,
        submission: &VideoSubmission,
        added_by: &UserId,
    ) -> Result<()> {
        self.add_videos(room_code, std::slice::from_ref(submission), added_by)
            .await
    }

    /// Append a batch of videos preserving input order. If the room was idle
    /// the first added video auto-starts, and `PLAY_VIDEO` is broadcast
    /// before the `PLAYLIST_UPDATE`.
    pub async fn add_videos(
        &self,
        room_code: &str,
        submissions: &[VideoSubmission],
        added_by: &UserId,
    ) -> Result<()> {
        if submissions.is_empty() {
            return Ok(());
        }

        let live = self.get_live(room_code)?;
        let mut room = live.lock().await;

        let mut order = room.next_order();
        for submission in submissions {
            let video = Video::new(
                room.room.id.clone(),
                submission.external_id.clone(),
                submission.title.clone(),
                submission.thumbnail.clone(),
                added_by.clone(),
                order,
            );
            let video = self.store.insert_video(&video).await?;
            room.insert_sorted(video);
            order += 1;
        }

        let auto_start = room.room.is_idle();
        if auto_start {
            let first = submissions[0].external_id.clone();
            room.room.current_video_id = Some(first);
            room.room.is_playing = true;
            room.room.current_time = 0.0;
            self.persist_playback(&mut room).await?;
            let started = room.room.current_video_id.clone();
            room.broadcast(&ServerMessage::PlayVideo { video_id: started }, None);
        }

        let playlist = room.playlist_entries();
        room.broadcast(&ServerMessage::PlaylistUpdate { playlist }, None);
        Ok(())
    }

    /// Delete a playlist entry. Never touches `current_video_id`: removing
    /// the playing entry leaves it dangling until the next NEXT_VIDEO or
    /// SELECT_VIDEO.
    pub async fn remove_video(&self, room_code: &str, video_id: &str) -> Result<()> {
        let live = self.get_live(room_code)?;
        let mut room = live.lock().await;

        let position = room
            .playlist
            .iter()
            .position(|v| v.id.as_str() == video_id)
            .ok_or_else(|| Error::NotFound("Video not found".to_string()))?;

        let id = room.playlist[position].id.clone();
        self.store.delete_video(&id).await?;
        room.playlist.remove(position);

        let playlist = room.playlist_entries();
        room.broadcast(&ServerMessage::PlaylistUpdate { playlist }, None);
        Ok(())
    }

    /// Jump to a specific external id and start playing from zero.
    pub async fn select_video(&self, room_code: &str, external_id: &str) -> Result<()> {
        let live = self.get_live(room_code)?;
        let mut room = live.lock().await;

        room.room.current_video_id = Some(external_id.to_string());
        room.room.is_playing = true;
        room.room.current_time = 0.0;
        self.persist_playback(&mut room).await?;

        room.broadcast(
            &ServerMessage::PlayVideo {
                video_id: Some(external_id.to_string()),
            },
            None,
        );
        Ok(())
    }

    /// Advance to the successor of the current entry in playlist order, or
    /// stop playback when there is none (end of list, or the current id is
    /// not in the playlist at all).
    pub async fn next_video(&self, room_code: &str) -> Result<()> {
        let live = self.get_live(room_code)?;
        let mut room = live.lock().await;

        let current_index = room
            .room
            .current_video_id
            .as_deref()
            .and_then(|ext| room.playlist.iter().position(|v| v.external_id == ext));

        if let Some(index) = current_index {
            room.playlist[index].is_played = true;
            let advanced = room.playlist[index].id.clone();
            if let Err(err) = self.store.set_video_played(&advanced, true).await {
                warn!(room_code = %room_code, error = %err, "Failed to persist is_played flag");
            }
        }

        let successor = current_index
            .and_then(|index| room.playlist.get(index + 1))
            .map(|v| v.external_id.clone());

        match successor {
            Some(next) => {
                room.room.current_video_id = Some(next);
                room.room.is_playing = true;
                room.room.current_time = 0.0;
            }
            None => {
                room.room.current_video_id = None;
                room.room.is_playing = false;
                room.room.current_time = 0.0;
            }
        }
        self.persist_playback(&mut room).await?;

        let video_id = room.room.current_video_id.clone();
        room.broadcast(&ServerMessage::PlayVideo { video_id }, None);
        let playlist = room.playlist_entries();
        room.broadcast(&ServerMessage::PlaylistUpdate { playlist }, None);
        Ok(())
    }

    /// Set the play/pause bit from an explicit command and start the
    /// cooldown window. Ignored while nothing is selected.
    pub async fn set_playing(&self, room_code: &str, playing: bool) -> Result<()> {
        let live = self.get_live(room_code)?;
        let mut room = live.lock().await;

        if room.room.is_idle() {
            return Ok(());
        }

        room.room.is_playing = playing;
        room.control_cooldown_at = Some(Instant::now());

        let message = if playing {
            ServerMessage::Play {
                video_id: room.room.current_video_id.clone(),
                current_time: room.room.current_time,
            }
        } else {
            ServerMessage::Pause
        };
        room.broadcast(&message, None);
        Ok(())
    }

    /// Apply a host position report. `current_time` is taken unconditionally;
    /// `is_playing` only once the play/pause cooldown has elapsed. The
    /// reconciled values are broadcast to every client except the reporter
    /// and returned to the caller.
    pub async fn report_position(
        &self,
        room_code: &str,
        reporter_connection_id: &str,
        current_time: f64,
        is_playing: bool,
    ) -> Result<EffectivePosition> {
        let live = self.get_live(room_code)?;
        let mut room = live.lock().await;

        room.room.current_time = current_time.max(0.0);
        if room.cooldown_elapsed(Instant::now()) {
            room.room.is_playing = is_playing;
        }

        let effective = EffectivePosition {
            current_time: room.room.current_time,
            is_playing: room.room.is_playing,
        };

        let save_due = room
            .last_playback_save
            .is_none_or(|at| at.elapsed() >= PLAYBACK_SAVE_INTERVAL);
        if save_due {
            // Throttled write: failures are logged and swallowed, the next
            // report will retry.
            if let Err(err) = self.persist_playback(&mut room).await {
                warn!(room_code = %room_code, error = %err, "Failed to persist playback position");
            }
        }

        room.broadcast(
            &ServerMessage::SyncTime {
                current_time: effective.current_time,
                is_playing: effective.is_playing,
            },
            Some(reporter_connection_id),
        );

        Ok(effective)
    }

    /// Whether a room currently has live in-memory state.
    #[must_use]
    pub fn is_live(&self, room_code: &str) -> bool {
        self.rooms.contains_key(room_code)
    }

    /// Number of attached sessions, for monitoring and tests.
    pub async fn session_count(&self, room_code: &str) -> usize {
        match self.rooms.get(room_code).map(|entry| Arc::clone(entry.value())) {
            Some(live) => live.lock().await.sessions.len(),
            None => 0,
        }
    }

    fn get_live(&self, room_code: &str) -> Result<Arc<Mutex<LiveRoom>>> {
        self.rooms
            .get(room_code)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| Error::NotFound("Room not found".to_string()))
    }

    async fn get_or_load(&self, room_code: &str) -> Result<Arc<Mutex<LiveRoom>>> {
        if let Some(existing) = self.rooms.get(room_code) {
            return Ok(Arc::clone(existing.value()));
        }

        let room = self
            .store
            .find_room_by_code(room_code)
            .await?
            .ok_or_else(|| Error::NotFound("Room not found".to_string()))?;
        let playlist = self.store.list_videos(&room.id).await?;
        let live = Arc::new(Mutex::new(LiveRoom::new(room, playlist)));

        // Two concurrent first-joins may both load; the map keeps one.
        let entry = self.rooms.entry(room_code.to_string()).or_insert(live);
        Ok(Arc::clone(entry.value()))
    }

    async fn persist_playback(&self, room: &mut LiveRoom) -> Result<()> {
        let result = self
            .store
            .save_playback(
                &room.room.id,
                room.room.current_video_id.as_deref(),
                room.room.is_playing,
                room.room.current_time,
            )
            .await;
        if result.is_ok() {
            room.last_playback_save = Some(Instant::now());
        }
        result
    }
}

#[cfg(test)]
mod tests;
