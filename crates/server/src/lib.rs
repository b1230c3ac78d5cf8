//! Call bridge server
//!
//! Terminates the telephony peer's WebSocket, spawns one session bridge per
//! stream, and exposes a health endpoint.

pub mod http;
pub mod state;
pub mod websocket;

pub use http::create_router;
pub use state::AppState;
