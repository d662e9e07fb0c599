// ============================
// chatware-backend-lib/src/handlers/mod.rs
// ============================
//! HTTP request handlers.

pub mod calls;

pub use calls::create_router;
