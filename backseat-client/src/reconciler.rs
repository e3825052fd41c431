//! The session reconciler task
//!
//! Gives the embedding UI the illusion of one long-lived connection with
//! monotonic server state. A single task owns every piece of reconciler
//! state; the UI talks to it through a command channel and observes it
//! through a watch channel, so no state is ever touched from two places.

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use backseat_proto::{ClientMessage, Role, ServerMessage};

use crate::backoff::ReconnectBackoff;
use crate::view::{ConnectionStatus, RoomView};
use crate::{ClientConfig, Command, PlayerCommand, PlayerStatus};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, WsMessage>;

/// Why a connected session ended.
enum SessionEnd {
    /// Socket closed, send failed or the watchdog fired: reconnect.
    Transport,
    /// Torn down on purpose: stop for good.
    Shutdown,
}

enum Event {
    Frame(Option<Result<WsMessage, tokio_tungstenite::tungstenite::Error>>),
    Command(Option<Command>),
    Heartbeat,
    Watchdog,
    PositionReport,
}

pub(crate) struct Reconciler {
    config: ClientConfig,
    commands: mpsc::UnboundedReceiver<Command>,
    view_tx: watch::Sender<RoomView>,
    player_tx: mpsc::UnboundedSender<PlayerCommand>,
    view: RoomView,
    backoff: ReconnectBackoff,
    /// Latest embedded-player status the host reported.
    player: PlayerStatus,
    /// Armed after each PING; any PONG disarms it.
    pong_deadline: Option<Instant>,
    /// While set in the future, player events echo programmatic commands and
    /// must not be treated as user intent.
    suppress_until: Option<Instant>,
    unmounted: bool,
}

impl Reconciler {
    pub(crate) fn new(
        config: ClientConfig,
        commands: mpsc::UnboundedReceiver<Command>,
        view_tx: watch::Sender<RoomView>,
        player_tx: mpsc::UnboundedSender<PlayerCommand>,
    ) -> Self {
        let backoff = ReconnectBackoff::new(config.backoff_base, config.backoff_max);
        Self {
            config,
            commands,
            view_tx,
            player_tx,
            view: RoomView::default(),
            backoff,
            player: PlayerStatus::default(),
            pong_deadline: None,
            suppress_until: None,
            unmounted: false,
        }
    }

    pub(crate) async fn run(mut self) {
        let mut first_attempt = true;
        loop {
            if self.unmounted {
                break;
            }

            if !first_attempt {
                let delay = self.backoff.delay();
                self.view.reconnect_count += 1;
                self.publish();
                debug!(delay_ms = delay.as_millis() as u64, "Scheduling reconnection attempt");
                self.sleep_disconnected(delay).await;
                if self.unmounted {
                    break;
                }
            }
            first_attempt = false;

            self.set_status(ConnectionStatus::Connecting);
            match connect_async(self.config.server_url.as_str()).await {
                Ok((ws, _)) => {
                    info!(room_code = %self.config.room_code, "Channel open");
                    self.backoff.reset();
                    self.set_status(ConnectionStatus::Connected);
                    if matches!(self.session(ws).await, SessionEnd::Shutdown) {
                        self.unmounted = true;
                    }
                    self.pong_deadline = None;
                    if !self.unmounted {
                        warn!("Channel lost, entering reconnect path");
                        self.set_status(ConnectionStatus::Disconnected);
                    }
                }
                Err(err) => {
                    warn!(error = %err, "Channel open failed");
                    self.set_status(ConnectionStatus::Disconnected);
                }
            }
        }

        self.set_status(ConnectionStatus::Disconnected);
        debug!("Reconciler torn down");
    }

    /// One established connection, from JOIN replay to close.
    async fn session(&mut self, ws: WsStream) -> SessionEnd {
        let (mut sink, mut stream) = ws.split();
        self.pong_deadline = None;

        // Replay identity: the server only knows us after a JOIN.
        let join = ClientMessage::Join {
            room_id: self.config.room_code.clone(),
            user_id: self.config.user_id.clone(),
            role: self.config.role,
        };
        if send(&mut sink, &join).await.is_err() {
            return SessionEnd::Transport;
        }

        let mut heartbeat = tokio::time::interval_at(
            Instant::now() + self.config.heartbeat_interval,
            self.config.heartbeat_interval,
        );
        let mut position_report = tokio::time::interval_at(
            Instant::now() + self.config.position_report_interval,
            self.config.position_report_interval,
        );

        loop {
            let pong_deadline = self.pong_deadline;
            let event = tokio::select! {
                frame = stream.next() => Event::Frame(frame),
                command = self.commands.recv() => Event::Command(command),
                _ = heartbeat.tick() => Event::Heartbeat,
                _ = position_report.tick() => Event::PositionReport,
                () = async move {
                    match pong_deadline {
                        Some(deadline) => tokio::time::sleep_until(deadline).await,
                        None => std::future::pending().await,
                    }
                } => Event::Watchdog,
            };

            match event {
                Event::Frame(Some(Ok(WsMessage::Text(text)))) => {
                    match serde_json::from_str::<ServerMessage>(text.as_str()) {
                        Ok(message) => self.handle_inbound(&message),
                        Err(err) => {
                            debug!(error = %err, "Ignoring unparseable server frame");
                        }
                    }
                }
                Event::Frame(Some(Ok(WsMessage::Close(_))) | None) => {
                    return SessionEnd::Transport;
                }
                Event::Frame(Some(Err(err))) => {
                    debug!(error = %err, "Channel receive error");
                    return SessionEnd::Transport;
                }
                Event::Frame(Some(Ok(_))) => {} // transport frames, not protocol

                Event::Command(None) => {
                    // Every handle is gone; nobody is left to observe us.
                    let _ = sink.close().await;
                    return SessionEnd::Shutdown;
                }
                Event::Command(Some(Command::Shutdown)) => {
                    let _ = sink.close().await;
                    return SessionEnd::Shutdown;
                }
                Event::Command(Some(command)) => {
                    if self.handle_command(command, &mut sink).await.is_err() {
                        return SessionEnd::Transport;
                    }
                }

                Event::Heartbeat => {
                    if send(&mut sink, &ClientMessage::Ping).await.is_err() {
                        return SessionEnd::Transport;
                    }
                    if self.pong_deadline.is_none() {
                        self.pong_deadline = Some(Instant::now() + self.config.pong_timeout);
                    }
                }
                Event::Watchdog => {
                    // A zombie connection: open in kernel space, silent on
                    // the wire. Force the reconnect path.
                    warn!("No PONG within the watchdog window, closing channel");
                    let _ = sink.close().await;
                    return SessionEnd::Transport;
                }

                Event::PositionReport => {
                    if self.config.role == Role::Host && self.player.playable {
                        let report = ClientMessage::SyncTime {
                            room_id: self.config.room_code.clone(),
                            current_time: self.player.current_time,
                            is_playing: self.player.is_playing,
                            duration: self.player.duration,
                        };
                        if send(&mut sink, &report).await.is_err() {
                            return SessionEnd::Transport;
                        }
                    }
                }
            }
        }
    }

    fn handle_inbound(&mut self, message: &ServerMessage) {
        if matches!(message, ServerMessage::Pong) {
            self.pong_deadline = None;
            return;
        }

        self.view.apply(message);
        self.publish();

        if self.config.role == Role::Host {
            self.drive_player(message);
        }
    }

    /// Translate an inbound command into embedded-player actions and open
    /// the echo-suppression window.
    fn drive_player(&mut self, message: &ServerMessage) {
        let actions: Vec<PlayerCommand> = match message {
            ServerMessage::SyncState {
                current_video_id,
                is_playing,
                current_time,
                ..
            } => {
                let mut actions = vec![
                    PlayerCommand::Load(current_video_id.clone()),
                    PlayerCommand::Seek(*current_time),
                ];
                actions.push(if *is_playing {
                    PlayerCommand::Play
                } else {
                    PlayerCommand::Pause
                });
                actions
            }
            ServerMessage::Play { .. } => vec![PlayerCommand::Play],
            ServerMessage::Pause => vec![PlayerCommand::Pause],
            ServerMessage::PlayVideo { video_id } => vec![PlayerCommand::Load(video_id.clone())],
            ServerMessage::SyncTime { .. }
            | ServerMessage::PlaylistUpdate { .. }
            | ServerMessage::Error { .. }
            | ServerMessage::Pong => Vec::new(),
        };

        if actions.is_empty() {
            return;
        }
        self.suppress_until = Some(Instant::now() + self.config.suppress_window);
        for action in actions {
            let _ = self.player_tx.send(action);
        }
    }

    async fn handle_command(&mut self, command: Command, sink: &mut WsSink) -> Result<(), ()> {
        let room_id = self.config.room_code.clone();
        let user_id = self.config.user_id.clone();
        let is_guest = self.config.role == Role::Guest;

        let outbound = match command {
            Command::AddVideo(video) => {
                if is_guest {
                    self.view.apply_optimistic_add(&video, &user_id);
                    self.publish();
                }
                Some(ClientMessage::AddVideo {
                    room_id,
                    video,
                    user_id,
                })
            }
            Command::AddVideos(videos) => {
                if is_guest {
                    for video in &videos {
                        self.view.apply_optimistic_add(video, &user_id);
                    }
                    self.publish();
                }
                Some(ClientMessage::AddVideos {
                    room_id,
                    videos,
                    user_id,
                })
            }
            Command::Play => {
                if is_guest {
                    self.view.apply_optimistic_playing(true);
                    self.publish();
                }
                Some(ClientMessage::Play { room_id })
            }
            Command::Pause => {
                if is_guest {
                    self.view.apply_optimistic_playing(false);
                    self.publish();
                }
                Some(ClientMessage::Pause { room_id })
            }
            Command::NextVideo => Some(ClientMessage::NextVideo { room_id }),
            Command::RemoveVideo(video_id) => Some(ClientMessage::RemoveVideo { room_id, video_id }),
            Command::SelectVideo(external_id) => Some(ClientMessage::SelectVideo {
                room_id,
                external_id,
            }),
            Command::PlayerStatus(status) => {
                self.player = status;
                None
            }
            Command::VideoEnded => {
                let suppressed = self
                    .suppress_until
                    .is_some_and(|until| Instant::now() < until);
                if suppressed {
                    debug!("Player ended inside the suppression window, not advancing");
                    None
                } else {
                    Some(ClientMessage::NextVideo { room_id })
                }
            }
            Command::Shutdown => None, // handled by the session loop
        };

        match outbound {
            Some(message) => send(sink, &message).await,
            None => Ok(()),
        }
    }

    /// Wait out the reconnect delay. Commands that arrive while the channel
    /// is down cannot be delivered; they are dropped with a warning, except
    /// for player status (cached) and teardown.
    async fn sleep_disconnected(&mut self, delay: std::time::Duration) {
        let deadline = Instant::now() + delay;
        loop {
            tokio::select! {
                () = tokio::time::sleep_until(deadline) => return,
                command = self.commands.recv() => match command {
                    None | Some(Command::Shutdown) => {
                        self.unmounted = true;
                        return;
                    }
                    Some(Command::PlayerStatus(status)) => {
                        self.player = status;
                    }
                    Some(dropped) => {
                        warn!(command = ?dropped, "Channel not open, dropping command");
                    }
                },
            }
        }
    }

    fn set_status(&mut self, status: ConnectionStatus) {
        if self.view.status != status {
            self.view.status = status;
            self.publish();
        }
    }

    fn publish(&self) {
        self.view_tx.send_replace(self.view.clone());
    }
}

async fn send(sink: &mut WsSink, message: &ClientMessage) -> Result<(), ()> {
    let text = match serde_json::to_string(message) {
        Ok(text) => text,
        Err(err) => {
            warn!(error = %err, "Failed to encode outbound message");
            return Err(());
        }
    };
    sink.send(WsMessage::text(text)).await.map_err(|err| {
        debug!(error = %err, "Channel send failed");
    })
}
