//! Session-scoped realtime relay.
//!
//! The desktop (control) and mobile (data) clients of a tutoring session
//! join a shared room named by the session id; everything one member sends
//! is fanned out verbatim to the rest of the room. Best-effort delivery:
//! no acknowledgements, no resume protocol, no cross-sender ordering.

pub mod event;
pub mod handshake;
pub mod registry;
pub mod ws;

pub use registry::RoomRegistry;
