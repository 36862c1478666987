//! Backend gateway for the tutoring whiteboard application.
//!
//! Three surfaces share one axum server:
//! - a WebSocket relay (`/ws`) that fans frames and control events out
//!   between the desktop and mobile clients of a session,
//! - an HTTP facade over a hosted OpenAI-compatible completion API
//!   (blocking, streamed, and JSON-constrained sketch generation),
//! - upload management over a pluggable object store (signed upload
//!   tickets, listing, deletion, folders).

pub mod config;
pub mod relay;
pub mod routers;
pub mod server;
pub mod storage;
pub mod upstream;

pub use server::{build_app, serve, AppState};
