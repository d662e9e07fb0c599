// ==============
// crates/backend-lib/src/metrics.rs

//! Central place for Prometheus metric keys
pub const WS_CONNECTION: &str = "ws.connection";
pub const WS_DISCONNECTION: &str = "ws.disconnection";
pub const WS_ACTIVE: &str = "ws.active";
pub const WS_PROTOCOL_ERROR: &str = "ws.protocol_error";
pub const CALL_CREATED: &str = "call.created";
pub const CALL_ENDED: &str = "call.ended";
pub const CALLS_ACTIVE: &str = "call.active";
pub const SIGNAL_RELAYED: &str = "signal.relayed";
pub const SIGNAL_DROPPED: &str = "signal.dropped";
pub const AUDIT_WRITE_FAILED: &str = "audit.write_failed";
