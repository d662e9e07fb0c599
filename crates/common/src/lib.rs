// ================
// common/src/lib.rs
// ================
//! Common types shared between the Chatware signaling server and its clients.
//! This crate defines the call data model and the durable audit record; the
//! WebSocket protocol messages live in `backend-lib::messages`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Opaque call identifier (uuid v4, but treated as a plain string on the wire)
pub type CallId = String;

/// User identity as resolved by the auth collaborator
pub type UserId = String;

/// Kind of media a call carries. Media itself never flows through the
/// signaling server; this only tags the session.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CallType {
    Audio,
    Video,
}

impl fmt::Display for CallType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallType::Audio => write!(f, "audio"),
            CallType::Video => write!(f, "video"),
        }
    }
}

/// Error returned when parsing an unknown call type string
#[derive(thiserror::Error, Debug)]
#[error("Invalid call type '{0}'. Must be 'audio' or 'video'")]
pub struct InvalidCallType(pub String);

impl FromStr for CallType {
    type Err = InvalidCallType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "audio" => Ok(CallType::Audio),
            "video" => Ok(CallType::Video),
            other => Err(InvalidCallType(other.to_string())),
        }
    }
}

/// Lifecycle status of a call as recorded in the audit trail
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CallStatus {
    Created,
    Ended,
}

/// Durable audit record describing one call's lifecycle.
///
/// The in-memory registry is the source of truth for live membership; this
/// record is an eventually-consistent trail written best-effort on call
/// creation and termination.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CallRecord {
    pub call_id: CallId,
    pub participants: Vec<UserId>,
    pub start_time: DateTime<Utc>,
    pub call_type: CallType,
    pub initiator: UserId,
    pub status: CallStatus,
    pub end_time: Option<DateTime<Utc>>,
    /// Elapsed seconds between start and end, present once ended
    pub duration: Option<f64>,
}
