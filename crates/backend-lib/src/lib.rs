// ============================
// chatware-backend-lib/src/lib.rs
// ============================
//! Core backend-lib functionality for the Chatware call signaling server.

pub mod auth;
pub mod calls;
pub mod config;
pub mod connections;
pub mod error;
pub mod handlers;
pub mod messages;
pub mod metrics;
pub mod storage;
pub mod ws_router;

use crate::auth::AuthService;
use crate::calls::CallManager;
use crate::config::Settings;
use crate::connections::ConnectionRegistry;
use crate::storage::Storage;
use std::sync::Arc;

/// Application state shared across all handlers.
///
/// The two registries are the sole source of truth for who is in what call
/// right now; the storage backend only receives the best-effort audit trail.
#[derive(Clone)]
pub struct AppState {
    /// Authentication collaborator (bearer token -> user identity)
    pub auth: Arc<dyn AuthService>,
    /// Settings manager
    pub settings: Arc<Settings>,
    /// Live signaling connections, one per user identity
    pub connections: Arc<ConnectionRegistry>,
    /// Active call registry and lifecycle manager
    pub calls: Arc<CallManager>,
    /// Audit-trail backend
    pub storage: Arc<dyn Storage>,
}

impl AppState {
    /// Create a new application state with injected collaborators
    pub fn new(auth: Arc<dyn AuthService>, storage: Arc<dyn Storage>, settings: Settings) -> Self {
        Self {
            auth,
            settings: Arc::new(settings),
            connections: Arc::new(ConnectionRegistry::new()),
            calls: Arc::new(CallManager::new(Arc::clone(&storage))),
            storage,
        }
    }
}
