// ================
// crates/backend-lib/src/messages.rs
// ================
//! WebSocket signaling protocol messages.
//!
//! The envelope is a JSON object with a `type` discriminator. `signal`
//! messages may carry arbitrary additional fields (SDP offers/answers, ICE
//! candidates); the relay forwards the raw inbound text verbatim, so only
//! `target` is deserialized here and unknown fields are deliberately ignored.
use chatware_common::{CallId, UserId};
use serde::{Deserialize, Serialize};

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Relay an opaque signaling payload to another connected user
    Signal { target: UserId },
    /// Join an active call
    JoinCall { call_id: CallId },
    /// Leave an active call
    LeaveCall { call_id: CallId },
}

/// Server-to-client events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Error {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        target: Option<UserId>,
        #[serde(skip_serializing_if = "Option::is_none")]
        call_id: Option<CallId>,
    },
    UserJoined {
        call_id: CallId,
        user_id: UserId,
    },
    UserLeft {
        call_id: CallId,
        user_id: UserId,
    },
    UserDisconnected {
        call_id: CallId,
        user_id: UserId,
    },
}

impl ServerMessage {
    /// `error` event naming an unreachable signal target
    pub fn unreachable_target(target: UserId) -> Self {
        ServerMessage::Error {
            message: "Target user not connected".to_string(),
            target: Some(target),
            call_id: None,
        }
    }

    /// `error` event naming a call that is absent from the registry
    pub fn unknown_call(call_id: CallId) -> Self {
        ServerMessage::Error {
            message: "Call not found".to_string(),
            target: None,
            call_id: Some(call_id),
        }
    }
}
