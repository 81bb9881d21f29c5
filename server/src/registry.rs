//! Live connection tracking and room-scoped delivery
//!
//! This module keeps the server's in-memory view of who is connected:
//! - One entry per live connection, holding its outbound message queue
//! - The room and player name a connection has joined, if any
//! - Delivery to a single connection or to everyone in a room
//!
//! The registry never owns a socket. Each entry holds the sending half of a
//! queue drained by the connection's writer task, so routing a message is a
//! non-blocking push that cannot stall on a slow client.

use log::{debug, info, warn};
use shared::ServerMessage;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Instant;
use tokio::sync::mpsc::UnboundedSender;

/// Identifier assigned to each accepted connection. Never reused within a
/// server process.
pub type ConnectionId = u64;

/// The room and player name a connection has joined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Membership {
    pub room: String,
    pub name: String,
}

impl Membership {
    pub fn new(room: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            room: room.into(),
            name: name.into(),
        }
    }

    pub fn matches(&self, room: &str, name: &str) -> bool {
        self.room == room && self.name == name
    }
}

/// A live connection as seen by the registry
#[derive(Debug)]
pub struct Connection {
    pub id: ConnectionId,
    pub addr: SocketAddr,
    pub connected_at: Instant,
    sender: UnboundedSender<ServerMessage>,
    membership: Option<Membership>,
}

impl Connection {
    pub fn new(id: ConnectionId, addr: SocketAddr, sender: UnboundedSender<ServerMessage>) -> Self {
        Self {
            id,
            addr,
            connected_at: Instant::now(),
            sender,
            membership: None,
        }
    }

    /// Queues `message` for this connection's writer.
    ///
    /// Fails only when the writer has already shut down.
    fn deliver(&self, message: ServerMessage) -> bool {
        self.sender.send(message).is_ok()
    }
}

/// Routing table from connections to rooms.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: HashMap<ConnectionId, Connection>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking a freshly accepted connection.
    ///
    /// Returns false if `id` is already attached; the existing entry is kept.
    pub fn attach(
        &mut self,
        id: ConnectionId,
        addr: SocketAddr,
        sender: UnboundedSender<ServerMessage>,
    ) -> bool {
        if self.connections.contains_key(&id) {
            warn!("Connection {} is already attached", id);
            return false;
        }

        info!("Connection {} attached from {}", id, addr);
        self.connections.insert(id, Connection::new(id, addr, sender));
        true
    }

    /// Stops tracking a connection and returns the membership it still held.
    pub fn detach(&mut self, id: ConnectionId) -> Option<Membership> {
        let connection = self.connections.remove(&id)?;
        info!(
            "Connection {} detached after {:?}",
            id,
            connection.connected_at.elapsed()
        );
        connection.membership
    }

    /// Associates a connection with a room and player name, replacing any
    /// previous association. Returns false for an unknown connection.
    pub fn register(&mut self, id: ConnectionId, room: &str, name: &str) -> bool {
        match self.connections.get_mut(&id) {
            Some(connection) => {
                debug!("Connection {} registered as {} in {}", id, name, room);
                connection.membership = Some(Membership::new(room, name));
                true
            }
            None => {
                warn!("Cannot register unknown connection {}", id);
                false
            }
        }
    }

    /// Clears a connection's association, returning what it was.
    pub fn unregister(&mut self, id: ConnectionId) -> Option<Membership> {
        self.connections
            .get_mut(&id)
            .and_then(|connection| connection.membership.take())
    }

    pub fn association(&self, id: ConnectionId) -> Option<&Membership> {
        self.connections
            .get(&id)
            .and_then(|connection| connection.membership.as_ref())
    }

    pub fn is_attached(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }

    /// Finds the live connection currently registered under `name`.
    pub fn find_by_name(&self, name: &str) -> Option<ConnectionId> {
        self.connections
            .values()
            .find(|connection| {
                connection
                    .membership
                    .as_ref()
                    .is_some_and(|membership| membership.name == name)
            })
            .map(|connection| connection.id)
    }

    /// Connections registered to `room`, in ascending id order.
    pub fn members(&self, room: &str) -> Vec<ConnectionId> {
        let mut ids: Vec<ConnectionId> = self
            .connections
            .values()
            .filter(|connection| {
                connection
                    .membership
                    .as_ref()
                    .is_some_and(|membership| membership.room == room)
            })
            .map(|connection| connection.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Sends `message` to one connection. Returns false if it could not be queued.
    pub fn send_to(&self, id: ConnectionId, message: ServerMessage) -> bool {
        match self.connections.get(&id) {
            Some(connection) => {
                let delivered = connection.deliver(message);
                if !delivered {
                    warn!("Connection {} writer is gone, dropping message", id);
                }
                delivered
            }
            None => {
                debug!("Dropping message for unknown connection {}", id);
                false
            }
        }
    }

    /// Sends `message` to every connection in `room` except `exclude`.
    ///
    /// A failed delivery is logged and skipped. Returns how many connections
    /// accepted the message.
    pub fn broadcast_to_room(
        &self,
        room: &str,
        exclude: Option<ConnectionId>,
        message: &ServerMessage,
    ) -> usize {
        let mut delivered = 0;

        for id in self.members(room) {
            if Some(id) == exclude {
                continue;
            }

            if self.send_to(id, message.clone()) {
                delivered += 1;
            }
        }

        delivered
    }

    /// Returns the number of live connections
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
