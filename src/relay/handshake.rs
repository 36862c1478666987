//! Connection handshake: role and session id from the upgrade query.
//!
//! Malformed or missing parameters degrade to defaults instead of failing
//! the upgrade: an unrecognized role becomes [`Role::Desktop`], a missing
//! session id becomes an anonymous session whose room holds only this
//! connection.

use serde::Deserialize;
use uuid::Uuid;

/// The single wire sub-protocol the relay negotiates.
pub const RELAY_SUBPROTOCOL: &str = "tutor-relay-v1";

/// Participant kind within a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Role {
    /// Control side (the tutor's desktop).
    #[default]
    Desktop,
    /// Data side (the student's mobile camera).
    Mobile,
}

impl Role {
    fn parse(value: &str) -> Self {
        match value {
            "mobile" => Self::Mobile,
            _ => Self::Desktop,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Desktop => "desktop",
            Self::Mobile => "mobile",
        }
    }
}

/// Session identity: caller-supplied, or anonymous when the handshake
/// carried no `sid`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionId {
    Named(String),
    Anonymous(Uuid),
}

impl SessionId {
    /// Room name this session maps to. Anonymous sessions get a room no
    /// other connection can name, so their events reach no one.
    pub fn room_name(&self) -> String {
        match self {
            Self::Named(sid) => sid.clone(),
            Self::Anonymous(conn_id) => format!("anon-{conn_id}"),
        }
    }
}

/// Raw query parameters of the upgrade request.
#[derive(Debug, Default, Deserialize)]
pub struct HandshakeQuery {
    pub role: Option<String>,
    pub sid: Option<String>,
}

/// Validated handshake record for one connection.
#[derive(Debug, Clone)]
pub struct Handshake {
    pub role: Role,
    pub session: SessionId,
    pub conn_id: Uuid,
}

impl Handshake {
    pub fn from_query(query: HandshakeQuery) -> Self {
        let conn_id = Uuid::new_v4();
        let role = query.role.as_deref().map(Role::parse).unwrap_or_default();
        let session = match query.sid.filter(|sid| !sid.trim().is_empty()) {
            Some(sid) => SessionId::Named(sid),
            None => SessionId::Anonymous(conn_id),
        };
        Self {
            role,
            session,
            conn_id,
        }
    }

    pub fn room_name(&self) -> String {
        self.session.room_name()
    }
}
