//! Reconnecting room session client
//!
//! Wraps the room coordinator's WebSocket protocol in a handle that survives
//! physical disconnects: exponential-backoff reconnection, identity replay on
//! every (re)connect, server-driven state snapshots, client-side heartbeat
//! with a pong watchdog, and optimistic local updates for guest mutations.
//!
//! ```no_run
//! use backseat_client::{ClientConfig, connect};
//! use backseat_proto::Role;
//!
//! # async fn demo() {
//! let config = ClientConfig::new(
//!     "ws://127.0.0.1:8080/ws",
//!     "ABCDEF",
//!     "user-1",
//!     Role::Guest,
//! );
//! let (client, _player_commands) = connect(config);
//! let mut view = client.view();
//! view.changed().await.ok();
//! println!("playlist length: {}", view.borrow().playlist.len());
//! # }
//! ```

mod backoff;
mod reconciler;
mod view;

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::warn;

use backseat_proto::{Role, VideoSubmission};

pub use view::{ConnectionStatus, RoomView};

/// Commands the host forwards to its embedded player.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerCommand {
    /// Load the given external id, or unload when `None`.
    Load(Option<String>),
    Play,
    Pause,
    Seek(f64),
}

/// Snapshot of the embedded player, as reported by the host UI.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PlayerStatus {
    /// Whether the player is ready enough to report meaningful positions.
    pub playable: bool,
    pub current_time: f64,
    pub is_playing: bool,
    pub duration: Option<f64>,
}

#[derive(Debug)]
pub(crate) enum Command {
    AddVideo(VideoSubmission),
    AddVideos(Vec<VideoSubmission>),
    Play,
    Pause,
    NextVideo,
    RemoveVideo(String),
    SelectVideo(String),
    PlayerStatus(PlayerStatus),
    VideoEnded,
    Shutdown,
}

/// Connection parameters and protocol timing.
///
/// The timing defaults are the wire contract; tests shrink them.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server_url: String,
    pub room_code: String,
    pub user_id: String,
    pub role: Role,
    pub heartbeat_interval: Duration,
    pub pong_timeout: Duration,
    pub position_report_interval: Duration,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    pub suppress_window: Duration,
}

impl ClientConfig {
    pub fn new(
        server_url: impl Into<String>,
        room_code: impl Into<String>,
        user_id: impl Into<String>,
        role: Role,
    ) -> Self {
        Self {
            server_url: server_url.into(),
            room_code: room_code.into(),
            user_id: user_id.into(),
            role,
            heartbeat_interval: Duration::from_secs(30),
            pong_timeout: Duration::from_secs(5),
            position_report_interval: Duration::from_secs(2),
            backoff_base: Duration::from_millis(1000),
            backoff_max: Duration::from_millis(30000),
            suppress_window: Duration::from_millis(400),
        }
    }
}

/// Handle to a running reconciler. Dropping every clone tears the session
/// down.
#[derive(Clone)]
pub struct RoomClient {
    commands: mpsc::UnboundedSender<Command>,
    view_rx: watch::Receiver<RoomView>,
}

impl RoomClient {
    /// A fresh receiver onto the reconciler's state.
    #[must_use]
    pub fn view(&self) -> watch::Receiver<RoomView> {
        self.view_rx.clone()
    }

    pub fn add_video(&self, video: VideoSubmission) {
        self.command(Command::AddVideo(video));
    }

    pub fn add_videos(&self, videos: Vec<VideoSubmission>) {
        self.command(Command::AddVideos(videos));
    }

    pub fn play(&self) {
        self.command(Command::Play);
    }

    pub fn pause(&self) {
        self.command(Command::Pause);
    }

    pub fn next_video(&self) {
        self.command(Command::NextVideo);
    }

    pub fn remove_video(&self, video_id: impl Into<String>) {
        self.command(Command::RemoveVideo(video_id.into()));
    }

    pub fn select_video(&self, external_id: impl Into<String>) {
        self.command(Command::SelectVideo(external_id.into()));
    }

    /// Host only: report the embedded player's current status. The
    /// reconciler relays it on the periodic position report.
    pub fn report_player(&self, status: PlayerStatus) {
        self.command(Command::PlayerStatus(status));
    }

    /// Host only: the embedded player fired its "ended" event. Advances the
    /// room unless the event falls inside the command echo-suppression
    /// window.
    pub fn video_ended(&self) {
        self.command(Command::VideoEnded);
    }

    /// Tear down: cancel timers, close the channel, never reconnect.
    pub fn shutdown(&self) {
        self.command(Command::Shutdown);
    }

    fn command(&self, command: Command) {
        if self.commands.send(command).is_err() {
            warn!("Reconciler is gone, dropping command");
        }
    }
}

/// Spawn the reconciler task for one room session.
///
/// Returns the control handle and the stream of commands the host must apply
/// to its embedded player (guests may drop it).
#[must_use]
pub fn connect(config: ClientConfig) -> (RoomClient, mpsc::UnboundedReceiver<PlayerCommand>) {
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (player_tx, player_rx) = mpsc::unbounded_channel();
    let (view_tx, view_rx) = watch::channel(RoomView::default());

    let reconciler = reconciler::Reconciler::new(config, command_rx, view_tx, player_tx);
    tokio::spawn(reconciler.run());

    (
        RoomClient {
            commands: command_tx,
            view_rx,
        },
        player_rx,
    )
}
