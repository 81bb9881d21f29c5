//! Error types for the room sync server

use std::fmt;
use std::io;

/// Failures raised by a `PlayerStore` backend.
#[derive(Debug)]
pub enum StoreError {
    Io(io::Error),
    Encode(bincode::Error),
    Unavailable(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Io(e) => write!(f, "Store IO error: {}", e),
            StoreError::Encode(e) => write!(f, "Store encoding error: {}", e),
            StoreError::Unavailable(s) => write!(f, "Store unavailable: {}", s),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<io::Error> for StoreError {
    fn from(error: io::Error) -> Self {
        StoreError::Io(error)
    }
}

impl From<bincode::Error> for StoreError {
    fn from(error: bincode::Error) -> Self {
        StoreError::Encode(error)
    }
}

/// Outcome of a rejected or failed coordinator operation.
#[derive(Debug)]
pub enum SyncError {
    /// Room already holds `capacity` players.
    AdmissionRejected { room: String, capacity: usize },
    Store(StoreError),
    ProtocolViolation(String),
    /// Message named a player with no stored record.
    StaleReference(String),
}

impl SyncError {
    /// Text sent to the client in an `Error` message.
    ///
    /// Store details stay in the server log.
    pub fn client_message(&self, operation: &str) -> String {
        match self {
            SyncError::Store(_) => format!("An error occurred while {}.", operation),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::AdmissionRejected { room, capacity } => {
                write!(f, "Room {} is full ({} players)", room, capacity)
            }
            SyncError::Store(e) => write!(f, "{}", e),
            SyncError::ProtocolViolation(s) => write!(f, "Protocol violation: {}", s),
            SyncError::StaleReference(name) => write!(f, "No player named {}", name),
        }
    }
}

impl std::error::Error for SyncError {}

impl From<StoreError> for SyncError {
    fn from(error: StoreError) -> Self {
        SyncError::Store(error)
    }
}
