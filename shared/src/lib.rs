use serde::{Deserialize, Serialize};

mod frame;

pub use frame::{decode, read_frame, read_message, write_frame, FrameError, MAX_FRAME_LEN};

pub const ROOM_CAPACITY: usize = 6;
pub const DEFAULT_PORT: u16 = 3001;
pub const MIN_LEVEL: u32 = 1;

/// Messages a client sends to the server.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    JoinRoom {
        room: String,
        name: String,
        level: u32,
        gear: u32,
    },
    SendChanges {
        room: String,
        name: String,
        level: u32,
        gear: u32,
    },
    LeaveRoom {
        room: String,
        name: String,
    },
}

/// Messages the server pushes to a client.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// Full room snapshot, sorted by player name.
    InitialData { players: Vec<PlayerStats> },
    StatsChanged(PlayerStats),
    RoomFull,
    PlayerLeft { name: String },
    Error { message: String },
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Hash)]
pub struct PlayerStats {
    pub name: String,
    pub level: u32,
    pub gear: u32,
}

impl PlayerStats {
    pub fn new(name: impl Into<String>, level: u32, gear: u32) -> Self {
        Self {
            name: name.into(),
            level,
            gear,
        }
    }

    /// Combat strength shown next to every player.
    pub fn power(&self) -> u32 {
        self.level.saturating_add(self.gear)
    }
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }
}
