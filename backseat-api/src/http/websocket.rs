//! WebSocket session gateway
//!
//! Terminates one duplex JSON channel per client. Inbound frames are parsed
//! and routed to the owning room in the registry; server-originated messages
//! flow back through a bounded per-connection buffer so one slow client
//! never blocks its siblings.

use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use backseat_core::models::UserId;
use backseat_core::registry::{AttachRequest, SESSION_CHANNEL_CAPACITY};
use backseat_proto::{ClientMessage, ServerMessage};

use crate::http::AppState;

/// Handle WebSocket connection upgrade
///
/// # Route
/// GET /ws
///
/// # Protocol
/// Text frames carrying one JSON message each; see `backseat-proto`.
/// A client must JOIN before anything other than PING is accepted.
pub async fn websocket_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Room membership of a connection after a successful JOIN.
struct Joined {
    room_code: String,
    user_id: UserId,
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let connection_id = format!("ws_{}", nanoid::nanoid!(8));
    info!(connection_id = %connection_id, "WebSocket connected");

    let (mut sink, mut stream) = socket.split();

    // All outbound traffic for this client funnels through one bounded
    // channel: direct replies from the read loop and room broadcasts from
    // the registry. The writer task is the only place that touches the sink.
    let (tx, mut rx) = mpsc::channel::<ServerMessage>(SESSION_CHANNEL_CAPACITY);

    let writer_connection_id = connection_id.clone();
    let writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let text = match serde_json::to_string(&message) {
                Ok(text) => text,
                Err(err) => {
                    warn!(connection_id = %writer_connection_id, error = %err, "Failed to encode message");
                    continue;
                }
            };
            if sink.send(WsMessage::Text(text.into())).await.is_err() {
                break;
            }
        }
        // Every sender is gone: either the connection is tearing down or the
        // session was evicted by a rejoin. Close the socket so the peer's
        // read side learns about it.
        let _ = sink.close().await;
    });

    let mut joined: Option<Joined> = None;

    while let Some(result) = stream.next().await {
        match result {
            Ok(WsMessage::Text(text)) => {
                handle_frame(&state, &connection_id, &tx, &mut joined, text.as_str()).await;
            }
            Ok(WsMessage::Close(_)) => {
                debug!(connection_id = %connection_id, "WebSocket closed by client");
                break;
            }
            Err(err) => {
                debug!(connection_id = %connection_id, error = %err, "WebSocket receive error");
                break;
            }
            // Binary frames and transport-level ping/pong are not part of
            // the protocol.
            Ok(WsMessage::Binary(_) | WsMessage::Ping(_) | WsMessage::Pong(_)) => {}
        }
    }

    if let Some(session) = &joined {
        state.registry.detach(&session.room_code, &connection_id).await;
        info!(
            connection_id = %connection_id,
            room_code = %session.room_code,
            user_id = %session.user_id,
            "WebSocket disconnected"
        );
    } else {
        info!(connection_id = %connection_id, "WebSocket disconnected (never joined)");
    }

    // Dropping our sender lets the writer drain and close the socket.
    drop(tx);
    let _ = writer.await;
}

async fn handle_frame(
    state: &AppState,
    connection_id: &str,
    tx: &mpsc::Sender<ServerMessage>,
    joined: &mut Option<Joined>,
    text: &str,
) {
    let message = match serde_json::from_str::<ClientMessage>(text) {
        Ok(message) => message,
        Err(err) => {
            debug!(connection_id = %connection_id, error = %err, "Dropping malformed frame");
            reply(tx, error_message("Invalid message")).await;
            return;
        }
    };

    match message {
        ClientMessage::Ping => {
            reply(tx, ServerMessage::Pong).await;
        }
        ClientMessage::Join { room_id, user_id, role } => {
            // Rejoining another room moves the session; drop the old one first.
            let previous = joined.take();
            if let Some(previous) = &previous {
                if previous.room_code != room_id {
                    state.registry.detach(&previous.room_code, connection_id).await;
                }
            }

            let user_id = UserId::from_string(user_id);
            let attach = state
                .registry
                .attach(AttachRequest {
                    room_code: room_id.clone(),
                    user_id: user_id.clone(),
                    role,
                    connection_id: connection_id.to_string(),
                    sender: tx.clone(),
                })
                .await;

            match attach {
                Ok(snapshot) => {
                    info!(
                        connection_id = %connection_id,
                        room_code = %room_id,
                        user_id = %user_id,
                        role = %role.as_str(),
                        "Client joined room"
                    );
                    *joined = Some(Joined {
                        room_code: room_id,
                        user_id,
                    });
                    reply(tx, snapshot.into_message()).await;
                }
                Err(err) => {
                    // A failed same-room rejoin leaves the earlier session
                    // registered; keep tracking it for the disconnect path.
                    if let Some(previous) = previous {
                        if previous.room_code == room_id {
                            *joined = Some(previous);
                        }
                    }
                    reply(tx, error_message(&public_error(&err))).await;
                }
            }
        }
        other => {
            if joined.is_none() {
                reply(tx, error_message("Not joined")).await;
                return;
            }
            if let Err(err) = route_mutation(state, connection_id, &other).await {
                reply(tx, error_message(&public_error(&err))).await;
            }
        }
    }
}

/// Apply a post-join mutation to the room named in the message itself.
/// Identity is implicit in the channel; there is no per-message re-auth.
async fn route_mutation(
    state: &AppState,
    connection_id: &str,
    message: &ClientMessage,
) -> backseat_core::Result<()> {
    match message {
        ClientMessage::AddVideo { room_id, video, user_id } => {
            state
                .registry
                .add_video(room_id, video, &UserId::from_string(user_id.clone()))
                .await
        }
        ClientMessage::AddVideos { room_id, videos, user_id } => {
            state
                .registry
                .add_videos(room_id, videos, &UserId::from_string(user_id.clone()))
                .await
        }
        ClientMessage::Play { room_id } => state.registry.set_playing(room_id, true).await,
        ClientMessage::Pause { room_id } => state.registry.set_playing(room_id, false).await,
        ClientMessage::SyncTime {
            room_id,
            current_time,
            is_playing,
            duration: _,
        } => state
            .registry
            .report_position(room_id, connection_id, *current_time, *is_playing)
            .await
            .map(|_| ()),
        ClientMessage::NextVideo { room_id } => state.registry.next_video(room_id).await,
        ClientMessage::RemoveVideo { room_id, video_id } => {
            state.registry.remove_video(room_id, video_id).await
        }
        ClientMessage::SelectVideo { room_id, external_id } => {
            state.registry.select_video(room_id, external_id).await
        }
        ClientMessage::Join { .. } | ClientMessage::Ping => Ok(()),
    }
}

async fn reply(tx: &mpsc::Sender<ServerMessage>, message: ServerMessage) {
    if tx.send(message).await.is_err() {
        debug!("Reply dropped, connection is closing");
    }
}

fn error_message(message: &str) -> ServerMessage {
    ServerMessage::Error {
        message: message.to_string(),
    }
}

/// Client-facing text for a registry error. Internal detail stays in the log.
fn public_error(err: &backseat_core::Error) -> String {
    use backseat_core::Error;
    match err {
        Error::NotFound(msg) | Error::InvalidInput(msg) => msg.clone(),
        other => {
            warn!(error = %other, "Mutation failed");
            "Internal server error".to_string()
        }
    }
}
