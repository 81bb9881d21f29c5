//! Client-side view of the room
//!
//! The client keeps its own stats locally and mirrors everyone else from
//! server messages. Snapshots replace the mirror wholesale, incremental
//! updates overwrite one player, and departures remove one player.

use shared::{ClientMessage, PlayerStats, ServerMessage, MIN_LEVEL};
use std::collections::BTreeMap;

/// The local player's own counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalStats {
    pub level: u32,
    pub gear: u32,
}

impl LocalStats {
    pub fn new(level: u32, gear: u32) -> Self {
        Self {
            level: level.max(MIN_LEVEL),
            gear,
        }
    }

    pub fn level_up(&mut self) {
        self.level = self.level.saturating_add(1);
    }

    /// Never drops below level 1.
    pub fn level_down(&mut self) {
        self.level = self.level.saturating_sub(1).max(MIN_LEVEL);
    }

    pub fn gear_up(&mut self) {
        self.gear = self.gear.saturating_add(1);
    }

    pub fn gear_down(&mut self) {
        self.gear = self.gear.saturating_sub(1);
    }

    pub fn power(&self) -> u32 {
        self.level.saturating_add(self.gear)
    }
}

impl Default for LocalStats {
    fn default() -> Self {
        Self::new(MIN_LEVEL, 0)
    }
}

/// Everything the client knows about its room
#[derive(Debug, Clone)]
pub struct ClientState {
    pub name: String,
    pub room: String,
    pub me: LocalStats,
    pub joined: bool,
    /// Last room that turned us away, until the next successful join.
    pub refused_room: Option<String>,
    pub last_error: Option<String>,
    /// Room asked for by a join the server has not answered yet.
    pending_room: Option<String>,
    players: BTreeMap<String, PlayerStats>,
}

impl ClientState {
    pub fn new(name: impl Into<String>, room: impl Into<String>, me: LocalStats) -> Self {
        Self {
            name: name.into(),
            room: room.into(),
            me,
            joined: false,
            refused_room: None,
            last_error: None,
            pending_room: None,
            players: BTreeMap::new(),
        }
    }

    /// Folds one server message into the mirror.
    pub fn apply(&mut self, message: &ServerMessage) {
        match message {
            ServerMessage::InitialData { players } => {
                self.players = players
                    .iter()
                    .map(|player| (player.name.clone(), player.clone()))
                    .collect();
                if let Some(room) = self.pending_room.take() {
                    self.room = room;
                }
                self.joined = true;
                self.refused_room = None;
            }
            ServerMessage::StatsChanged(player) => {
                self.players.insert(player.name.clone(), player.clone());
            }
            ServerMessage::PlayerLeft { name } => {
                self.players.remove(name);
            }
            // The server keeps us wherever we were before the join
            ServerMessage::RoomFull => {
                let refused = self.pending_room.take().unwrap_or_else(|| self.room.clone());
                self.refused_room = Some(refused);
            }
            ServerMessage::Error { message } => {
                self.pending_room = None;
                self.last_error = Some(message.clone());
            }
        }
    }

    /// Every known player in the room, including ourselves, by name.
    pub fn players(&self) -> impl Iterator<Item = &PlayerStats> {
        self.players.values()
    }

    /// Everyone except the local player.
    pub fn others(&self) -> impl Iterator<Item = &PlayerStats> {
        self.players
            .values()
            .filter(move |player| player.name != self.name)
    }

    pub fn player(&self, name: &str) -> Option<&PlayerStats> {
        self.players.get(name)
    }

    pub fn pending_room(&self) -> Option<&str> {
        self.pending_room.as_deref()
    }

    /// Builds a join for `room`, or for the current room when `None`.
    ///
    /// The current room only changes once the server answers with a snapshot.
    pub fn request_join(&mut self, room: Option<String>) -> ClientMessage {
        let room = room.unwrap_or_else(|| self.room.clone());
        self.pending_room = Some(room.clone());
        ClientMessage::JoinRoom {
            room,
            name: self.name.clone(),
            level: self.me.level,
            gear: self.me.gear,
        }
    }

    pub fn changes_message(&self) -> ClientMessage {
        ClientMessage::SendChanges {
            room: self.room.clone(),
            name: self.name.clone(),
            level: self.me.level,
            gear: self.me.gear,
        }
    }

    /// Builds the leave message and forgets the room's players.
    pub fn leave(&mut self) -> ClientMessage {
        self.joined = false;
        self.pending_room = None;
        self.players.clear();
        ClientMessage::LeaveRoom {
            room: self.room.clone(),
            name: self.name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(name: &str, level: u32, gear: u32) -> PlayerStats {
        PlayerStats::new(name, level, gear)
    }

    #[test]
    fn test_level_never_below_one() {
        let mut me = LocalStats::new(2, 0);
        me.level_down();
        me.level_down();
        me.level_down();
        assert_eq!(me.level, 1);

        me.level_up();
        assert_eq!(me.level, 2);
    }

    #[test]
    fn test_gear_floors_at_zero() {
        let mut me = LocalStats::default();
        me.gear_down();
        assert_eq!(me.gear, 0);

        me.gear_up();
        me.gear_up();
        me.gear_down();
        assert_eq!(me.gear, 1);
        assert_eq!(me.power(), 2);
    }

    #[test]
    fn test_new_clamps_level() {
        assert_eq!(LocalStats::new(0, 3), LocalStats { level: 1, gear: 3 });
    }

    #[test]
    fn test_snapshot_replaces_roster() {
        let mut state = ClientState::new("me", "lobby", LocalStats::default());
        state.apply(&ServerMessage::StatsChanged(stats("stale", 9, 9)));

        state.apply(&ServerMessage::InitialData {
            players: vec![stats("me", 1, 0), stats("bob", 4, 2)],
        });

        assert!(state.joined);
        assert!(state.player("stale").is_none());
        let others: Vec<&str> = state.others().map(|p| p.name.as_str()).collect();
        assert_eq!(others, vec!["bob"]);
        assert_eq!(state.players().count(), 2);
    }

    #[test]
    fn test_changes_overwrite_and_departures_remove() {
        let mut state = ClientState::new("me", "lobby", LocalStats::default());
        state.apply(&ServerMessage::InitialData {
            players: vec![stats("me", 1, 0), stats("bob", 1, 0)],
        });

        state.apply(&ServerMessage::StatsChanged(stats("bob", 5, 3)));
        assert_eq!(state.player("bob"), Some(&stats("bob", 5, 3)));

        state.apply(&ServerMessage::StatsChanged(stats("amy", 2, 0)));
        assert_eq!(state.others().count(), 2);

        state.apply(&ServerMessage::PlayerLeft { name: "bob".into() });
        assert!(state.player("bob").is_none());
    }

    #[test]
    fn test_room_full_and_error_flags() {
        let mut state = ClientState::new("me", "lobby", LocalStats::default());

        state.apply(&ServerMessage::RoomFull);
        assert_eq!(state.refused_room.as_deref(), Some("lobby"));
        assert!(!state.joined);

        state.apply(&ServerMessage::error("database offline"));
        assert_eq!(state.last_error.as_deref(), Some("database offline"));
    }

    #[test]
    fn test_refused_switch_keeps_current_room() {
        let mut state = ClientState::new("me", "lobby", LocalStats::new(2, 0));
        state.apply(&ServerMessage::InitialData {
            players: vec![stats("me", 2, 0), stats("bob", 1, 0)],
        });

        let join = state.request_join(Some("cellar".into()));
        assert!(matches!(join, ClientMessage::JoinRoom { ref room, .. } if room == "cellar"));
        assert_eq!(state.room, "lobby");

        state.apply(&ServerMessage::RoomFull);
        assert!(state.joined);
        assert_eq!(state.room, "lobby");
        assert_eq!(state.refused_room.as_deref(), Some("cellar"));
        assert!(state.pending_room().is_none());

        state.me.level_up();
        assert_eq!(
            state.changes_message(),
            ClientMessage::SendChanges {
                room: "lobby".into(),
                name: "me".into(),
                level: 3,
                gear: 0,
            }
        );
        state.apply(&ServerMessage::StatsChanged(stats("bob", 4, 0)));
        assert_eq!(state.player("bob"), Some(&stats("bob", 4, 0)));
    }

    #[test]
    fn test_confirmed_switch_moves_room() {
        let mut state = ClientState::new("me", "lobby", LocalStats::default());
        state.apply(&ServerMessage::InitialData {
            players: vec![stats("me", 1, 0), stats("bob", 1, 0)],
        });

        state.request_join(Some("cellar".into()));
        state.apply(&ServerMessage::InitialData {
            players: vec![stats("amy", 3, 3), stats("me", 1, 0)],
        });

        assert_eq!(state.room, "cellar");
        assert!(state.player("bob").is_none());
        assert_eq!(
            state.leave(),
            ClientMessage::LeaveRoom {
                room: "cellar".into(),
                name: "me".into(),
            }
        );
    }

    #[test]
    fn test_failed_switch_error_clears_pending_room() {
        let mut state = ClientState::new("me", "lobby", LocalStats::default());
        state.apply(&ServerMessage::InitialData {
            players: vec![stats("me", 1, 0)],
        });

        state.request_join(Some("cellar".into()));
        state.apply(&ServerMessage::error("An error occurred while joining the room."));

        assert!(state.pending_room().is_none());
        assert!(state.joined);
        assert_eq!(state.room, "lobby");
    }

    #[test]
    fn test_messages_carry_current_stats() {
        let mut state = ClientState::new("me", "lobby", LocalStats::new(3, 1));
        state.me.gear_up();

        assert_eq!(
            state.changes_message(),
            ClientMessage::SendChanges {
                room: "lobby".into(),
                name: "me".into(),
                level: 3,
                gear: 2,
            }
        );

        state.apply(&ServerMessage::InitialData {
            players: vec![stats("me", 3, 2)],
        });
        let leave = state.leave();
        assert_eq!(
            leave,
            ClientMessage::LeaveRoom {
                room: "lobby".into(),
                name: "me".into(),
            }
        );
        assert!(!state.joined);
        assert_eq!(state.players().count(), 0);
    }
}
