//! In-memory room registry for relay connections.
//!
//! Owned by the application state and passed by handle to connection
//! handlers; rooms are created on first join and dropped when the last
//! member leaves. Fan-out is fire-and-forget over per-connection unbounded
//! senders, so a slow receiver buffers in its own channel and never stalls
//! the sender.

use std::{
    collections::HashMap,
    sync::atomic::{AtomicUsize, Ordering},
};

use axum::extract::ws::Message;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

pub type OutboundSender = mpsc::UnboundedSender<Message>;

#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: DashMap<String, HashMap<Uuid, OutboundSender>>,
    connection_count: AtomicUsize,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection to `room`, creating the room if needed.
    /// Returns the room's member count after the join.
    pub fn join(&self, room: &str, conn: Uuid, tx: OutboundSender) -> usize {
        let mut members = self.rooms.entry(room.to_string()).or_default();
        members.insert(conn, tx);
        self.connection_count.fetch_add(1, Ordering::Relaxed);
        members.len()
    }

    /// Remove a connection from `room`; the room entry is dropped once it
    /// is empty.
    pub fn leave(&self, room: &str, conn: Uuid) {
        let mut removed = false;
        let mut now_empty = false;
        if let Some(mut members) = self.rooms.get_mut(room) {
            removed = members.remove(&conn).is_some();
            now_empty = members.is_empty();
        }
        if removed {
            self.connection_count.fetch_sub(1, Ordering::Relaxed);
        }
        if now_empty {
            // Re-check under the entry lock: a racing join may have
            // repopulated the room since the guard above was dropped.
            self.rooms.remove_if(room, |_, members| members.is_empty());
            debug!(room, "room emptied");
        }
    }

    /// Fan a message out to every member of `room` except `from`.
    /// Returns the number of members it reached; members whose channel has
    /// already closed are skipped silently.
    pub fn broadcast(&self, room: &str, from: Uuid, msg: &Message) -> usize {
        let Some(members) = self.rooms.get(room) else {
            return 0;
        };
        let mut delivered = 0;
        for (conn, tx) in members.iter() {
            if *conn == from {
                continue;
            }
            if tx.send(msg.clone()).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    pub fn room_size(&self, room: &str) -> usize {
        self.rooms.get(room).map_or(0, |members| members.len())
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn connection_count(&self) -> usize {
        self.connection_count.load(Ordering::Relaxed)
    }
}
