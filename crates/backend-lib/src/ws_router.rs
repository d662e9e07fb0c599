// ============================
// chatware-backend-lib/src/ws_router.rs
// ============================
//! WebSocket router and the per-connection signaling relay loop.
use crate::calls::LeaveOutcome;
use crate::connections::ConnectionHandle;
use crate::messages::{ClientMessage, ServerMessage};
use crate::metrics as keys;
use crate::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use metrics::{counter, gauge};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Create the signaling WebSocket router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/calls/ws/{user_id}", get(ws_handler))
        .with_state(state)
}

/// Handler for WebSocket upgrade requests. The connection is addressed by the
/// user identity in the path, matching the client handshake URI.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(user_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, user_id, state))
}

async fn handle_connection(socket: WebSocket, user_id: String, state: Arc<AppState>) {
    counter!(keys::WS_CONNECTION).increment(1);
    gauge!(keys::WS_ACTIVE).increment(1.0);

    let (mut sink, mut stream) = socket.split();

    // Bounded outbound queue pumped by its own task. Registry sends into the
    // queue without blocking; only this task awaits the socket.
    let (client_tx, mut client_rx) = mpsc::channel(state.settings.outbound_queue);
    let send_task = tokio::spawn(async move {
        while let Some(message) = client_rx.recv().await {
            if sink.send(message).await.is_err() {
                break;
            }
        }
    });

    let handle = ConnectionHandle::new(client_tx.clone());
    let conn_id = handle.conn_id;
    if let Some(superseded) = state.connections.register(user_id.clone(), handle) {
        // Known gap: the old socket is neither closed nor notified. Its call
        // memberships stay attributed to it until its own loop exits.
        warn!(
            user = %user_id,
            superseded_conn = %superseded.conn_id,
            "user reconnected; replacing prior live connection"
        );
    }

    while let Some(Ok(message)) = stream.next().await {
        match message {
            Message::Text(text) => handle_frame(&state, &user_id, &text, &client_tx).await,
            Message::Close(_) => break,
            // binary frames and ping/pong are not part of the protocol
            _ => {},
        }
    }

    // Cleanup is unconditional and runs exactly once per connection,
    // regardless of exit cause: unregister first, then leave every call.
    state.connections.unregister(&user_id, conn_id);
    for (call_id, remaining) in state.calls.disconnect_cleanup(&user_id) {
        let event = ServerMessage::UserDisconnected {
            call_id,
            user_id: user_id.clone(),
        };
        for peer in remaining {
            state.connections.send(&peer, &event);
        }
    }

    counter!(keys::WS_DISCONNECTION).increment(1);
    gauge!(keys::WS_ACTIVE).decrement(1.0);
    send_task.abort();
}

/// Dispatch one inbound signaling frame.
///
/// Replies to the sender go through `reply` (this connection's own queue)
/// rather than a registry lookup, so they cannot be misrouted to a
/// replacement connection for the same identity.
pub async fn handle_frame(
    state: &AppState,
    user_id: &str,
    text: &str,
    reply: &mpsc::Sender<Message>,
) {
    let msg = match serde_json::from_str::<ClientMessage>(text) {
        Ok(msg) => msg,
        Err(e) => {
            counter!(keys::WS_PROTOCOL_ERROR).increment(1);
            warn!(user = %user_id, error = %e, "dropping malformed signaling message");
            return;
        },
    };

    match msg {
        ClientMessage::Signal { target } => {
            // the raw frame is forwarded verbatim, payload and all
            if state.connections.forward_raw(&target, text) {
                counter!(keys::SIGNAL_RELAYED).increment(1);
            } else {
                debug!(user = %user_id, target = %target, "signal target not connected");
                reply_to_sender(reply, &ServerMessage::unreachable_target(target));
            }
        },
        ClientMessage::JoinCall { call_id } => match state.calls.join(&call_id, user_id) {
            Ok(others) => {
                let event = ServerMessage::UserJoined {
                    call_id,
                    user_id: user_id.to_string(),
                };
                for peer in others {
                    state.connections.send(&peer, &event);
                }
            },
            Err(_) => reply_to_sender(reply, &ServerMessage::unknown_call(call_id)),
        },
        ClientMessage::LeaveCall { call_id } => {
            if let LeaveOutcome::Left { remaining } = state.calls.leave(&call_id, user_id) {
                let event = ServerMessage::UserLeft {
                    call_id,
                    user_id: user_id.to_string(),
                };
                for peer in remaining {
                    state.connections.send(&peer, &event);
                }
            }
        },
    }
}

fn reply_to_sender(reply: &mpsc::Sender<Message>, message: &ServerMessage) {
    match serde_json::to_string(message) {
        Ok(json) => {
            if reply.try_send(Message::Text(json.into())).is_err() {
                counter!(keys::SIGNAL_DROPPED).increment(1);
            }
        },
        Err(e) => warn!(error = %e, "failed to serialize reply"),
    }
}
