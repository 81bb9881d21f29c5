//! Room membership and stat synchronization
//!
//! The coordinator executes join, update and leave requests against the
//! player store and the connection registry, and decides which messages go to
//! which connections. It does not touch sockets: every operation returns a list
//! of [`Emission`]s which [`RoomCoordinator::deliver`] routes through the
//! registry.
//!
//! ## Consistency rules
//! - A connection registered to room R corresponds to exactly one player
//!   record with that name in R. A name held by one live connection cannot be
//!   claimed by another.
//! - When a connection goes away its record is deleted and the room is told,
//!   exactly as if it had sent `LeaveRoom`.
//! - Store failures are reported to the originating connection only; any
//!   emissions produced before the failure are still delivered.
//!
//! ## Capacity
//! Occupancy is read from the store and compared against the capacity before
//! the joiner's record is written. Operations on one coordinator never
//! interleave, but two server processes sharing a store (each started with
//! `purge_on_start` off) can both pass the check for the last seat. Capacity
//! is an admission gate, not a hard bound.

use crate::error::{StoreError, SyncError};
use crate::registry::{ConnectionId, ConnectionRegistry, Membership};
use crate::store::{PlayerRecord, PlayerStore};
use log::{debug, error, info, warn};
use shared::{ClientMessage, FrameError, PlayerStats, ServerMessage};
use std::net::SocketAddr;
use tokio::sync::mpsc::UnboundedSender;

/// Who a message is addressed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Connection(ConnectionId),
    /// Everyone registered to `room` at delivery time, minus `exclude`.
    Room {
        room: String,
        exclude: Option<ConnectionId>,
    },
}

/// A message the coordinator wants sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Emission {
    pub target: Target,
    pub message: ServerMessage,
}

impl Emission {
    pub fn to(id: ConnectionId, message: ServerMessage) -> Self {
        Self {
            target: Target::Connection(id),
            message,
        }
    }

    pub fn room(room: &str, exclude: Option<ConnectionId>, message: ServerMessage) -> Self {
        Self {
            target: Target::Room {
                room: room.to_string(),
                exclude,
            },
            message,
        }
    }
}

pub struct RoomCoordinator<S> {
    store: S,
    registry: ConnectionRegistry,
    capacity: usize,
}

impl<S: PlayerStore> RoomCoordinator<S> {
    pub fn new(store: S, capacity: usize) -> Self {
        Self {
            store,
            registry: ConnectionRegistry::new(),
            capacity,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drops records left behind by a previous process.
    ///
    /// No connection survives a restart, so any record found at startup
    /// belongs to nobody and would otherwise hold a seat forever.
    pub async fn purge_stale(&self) -> Result<usize, StoreError> {
        let dropped = self.store.purge().await?;
        if dropped > 0 {
            warn!("Purged {} stale player records", dropped);
        }
        Ok(dropped)
    }

    /// Begins routing for a new connection.
    pub fn connect(
        &mut self,
        id: ConnectionId,
        addr: SocketAddr,
        sender: UnboundedSender<ServerMessage>,
    ) -> bool {
        self.registry.attach(id, addr, sender)
    }

    /// Dispatches one decoded client message.
    pub async fn handle(&mut self, id: ConnectionId, message: ClientMessage) -> Vec<Emission> {
        match message {
            ClientMessage::JoinRoom {
                room,
                name,
                level,
                gear,
            } => self.join_room(id, &room, &name, level, gear).await,
            ClientMessage::SendChanges {
                room,
                name,
                level,
                gear,
            } => self.send_changes(id, &room, &name, level, gear).await,
            ClientMessage::LeaveRoom { room, name } => self.leave_room(id, &room, &name).await,
        }
    }

    /// Answers a frame that could not be decoded. The connection stays open.
    pub fn handle_malformed(&self, id: ConnectionId, error: &FrameError) -> Vec<Emission> {
        let violation = SyncError::ProtocolViolation(error.to_string());
        warn!("Connection {}: {}", id, violation);
        vec![Emission::to(id, ServerMessage::error(violation.to_string()))]
    }

    pub async fn join_room(
        &mut self,
        id: ConnectionId,
        room: &str,
        name: &str,
        level: u32,
        gear: u32,
    ) -> Vec<Emission> {
        let mut out = Vec::new();
        let record = PlayerRecord::new(name, level, gear, room);
        if let Err(e) = self.try_join(id, record, &mut out).await {
            self.reject(id, "joining the room", e, &mut out);
        }
        out
    }

    pub async fn send_changes(
        &mut self,
        id: ConnectionId,
        room: &str,
        name: &str,
        level: u32,
        gear: u32,
    ) -> Vec<Emission> {
        let mut out = Vec::new();
        let record = PlayerRecord::new(name, level, gear, room);
        if let Err(e) = self.try_send_changes(id, record, &mut out).await {
            self.reject(id, "processing player changes", e, &mut out);
        }
        out
    }

    pub async fn leave_room(&mut self, id: ConnectionId, room: &str, name: &str) -> Vec<Emission> {
        let mut out = Vec::new();
        if let Err(e) = self.try_leave(id, room, name, &mut out).await {
            self.reject(id, "processing player leave", e, &mut out);
        }
        out
    }

    /// Tears down a closed connection, leaving its room if it had joined one.
    pub async fn disconnect(&mut self, id: ConnectionId) -> Vec<Emission> {
        let mut out = Vec::new();
        let Some(membership) = self.registry.detach(id) else {
            return out;
        };

        info!(
            "Player {} dropped from room {} (connection {} closed)",
            membership.name, membership.room, id
        );
        if let Err(e) = self
            .depart(id, &membership.room, &membership.name, &mut out)
            .await
        {
            // Nobody left to tell
            error!(
                "Cleanup for {} in room {} failed: {}",
                membership.name, membership.room, e
            );
        }
        out
    }

    /// Routes emissions through the registry.
    pub fn deliver(&self, emissions: Vec<Emission>) {
        for emission in emissions {
            match emission.target {
                Target::Connection(id) => {
                    self.registry.send_to(id, emission.message);
                }
                Target::Room { room, exclude } => {
                    let reached = self
                        .registry
                        .broadcast_to_room(&room, exclude, &emission.message);
                    debug!("Broadcast to room {} reached {} connections", room, reached);
                }
            }
        }
    }

    async fn try_join(
        &mut self,
        id: ConnectionId,
        record: PlayerRecord,
        out: &mut Vec<Emission>,
    ) -> Result<(), SyncError> {
        if record.room.is_empty() {
            return Err(SyncError::ProtocolViolation("room must not be empty".into()));
        }
        if record.name.is_empty() {
            return Err(SyncError::ProtocolViolation("name must not be empty".into()));
        }
        if let Some(holder) = self.registry.find_by_name(&record.name) {
            if holder != id {
                return Err(SyncError::ProtocolViolation(format!(
                    "name {} is already in use",
                    record.name
                )));
            }
        }

        let previous = self.registry.association(id).cloned();

        // A connection re-joining its own room does not compete for a seat
        let mut occupied = self.store.count_in_room(&record.room).await?;
        if previous.as_ref().is_some_and(|m| m.room == record.room) {
            occupied = occupied.saturating_sub(1);
        }
        if occupied >= self.capacity {
            return Err(SyncError::AdmissionRejected {
                room: record.room,
                capacity: self.capacity,
            });
        }

        if let Some(previous) = previous.filter(|m| !m.matches(&record.room, &record.name)) {
            info!(
                "Connection {} moving from {} in {} to {} in {}",
                id, previous.name, previous.room, record.name, record.room
            );
            self.depart(id, &previous.room, &previous.name, out).await?;
        }

        self.store.upsert(record.clone()).await?;
        self.registry.register(id, &record.room, &record.name);
        info!("Player {} joined room {}", record.name, record.room);

        out.push(Emission::room(
            &record.room,
            Some(id),
            ServerMessage::StatsChanged(record.stats()),
        ));

        let players = self.snapshot(&record.room).await?;
        out.push(Emission::to(id, ServerMessage::InitialData { players }));
        Ok(())
    }

    async fn try_send_changes(
        &mut self,
        id: ConnectionId,
        record: PlayerRecord,
        out: &mut Vec<Emission>,
    ) -> Result<(), SyncError> {
        match self.registry.association(id) {
            Some(membership) if !membership.matches(&record.room, &record.name) => {
                return Err(mismatch(membership));
            }
            Some(_) => {}
            None => return Err(SyncError::StaleReference(record.name)),
        }

        if !self.store.update(record.clone()).await? {
            return Err(SyncError::StaleReference(record.name));
        }

        debug!(
            "Player {} in {} now level {} gear {}",
            record.name, record.room, record.level, record.gear
        );
        out.push(Emission::room(
            &record.room,
            Some(id),
            ServerMessage::StatsChanged(record.stats()),
        ));
        Ok(())
    }

    async fn try_leave(
        &mut self,
        id: ConnectionId,
        room: &str,
        name: &str,
        out: &mut Vec<Emission>,
    ) -> Result<(), SyncError> {
        match self.registry.association(id) {
            Some(membership) if !membership.matches(room, name) => {
                return Err(mismatch(membership));
            }
            Some(_) => {}
            None => {
                if self.registry.find_by_name(name).is_some() {
                    return Err(SyncError::ProtocolViolation(format!(
                        "name {} belongs to another connection",
                        name
                    )));
                }
            }
        }

        info!("Player {} left room {}", name, room);
        self.depart(id, room, name, out).await
    }

    /// Deletes `name` and tells the rest of `room`.
    ///
    /// The connection keeps its association until the delete has gone
    /// through, so a failed delete is retried when the connection closes.
    /// Nothing is broadcast when there was no record to delete, which makes a
    /// repeated leave silent.
    async fn depart(
        &mut self,
        id: ConnectionId,
        room: &str,
        name: &str,
        out: &mut Vec<Emission>,
    ) -> Result<(), SyncError> {
        let existed = self.store.delete(name).await?;
        self.registry.unregister(id);

        if !existed {
            debug!("No record for {} in {}, nothing to announce", name, room);
            return Ok(());
        }

        out.push(Emission::room(
            room,
            Some(id),
            ServerMessage::PlayerLeft {
                name: name.to_string(),
            },
        ));

        let players = self.snapshot(room).await?;
        out.push(Emission::room(
            room,
            Some(id),
            ServerMessage::InitialData { players },
        ));
        Ok(())
    }

    async fn snapshot(&self, room: &str) -> Result<Vec<PlayerStats>, StoreError> {
        let records = self.store.list_room(room).await?;
        Ok(records.iter().map(PlayerRecord::stats).collect())
    }

    fn reject(&self, id: ConnectionId, operation: &str, error: SyncError, out: &mut Vec<Emission>) {
        match &error {
            SyncError::AdmissionRejected { room, capacity } => {
                info!(
                    "Connection {} turned away from {} ({} players)",
                    id, room, capacity
                );
                out.push(Emission::to(id, ServerMessage::RoomFull));
            }
            SyncError::StaleReference(name) => {
                debug!("Connection {} referenced unknown player {}", id, name);
            }
            SyncError::ProtocolViolation(_) => {
                warn!("Connection {} while {}: {}", id, operation, error);
                out.push(Emission::to(
                    id,
                    ServerMessage::error(error.client_message(operation)),
                ));
            }
            SyncError::Store(e) => {
                error!("Error while {} for connection {}: {}", operation, id, e);
                out.push(Emission::to(
                    id,
                    ServerMessage::error(error.client_message(operation)),
                ));
            }
        }
    }
}

fn mismatch(membership: &Membership) -> SyncError {
    SyncError::ProtocolViolation(format!(
        "connection is registered as {} in {}",
        membership.name, membership.room
    ))
}
