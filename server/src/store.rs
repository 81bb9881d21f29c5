//! Player record persistence
//!
//! The coordinator only needs a handful of keyed operations from its backing
//! store, all atomic per call. Two backends are provided: an in-memory map for
//! tests and ephemeral servers, and a file-backed map that rewrites a bincode
//! snapshot after every mutation.

use crate::error::StoreError;
use bincode::{deserialize, serialize};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use shared::PlayerStats;
use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

/// Persisted layout of one player, keyed by `name`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PlayerRecord {
    pub name: String,
    pub level: u32,
    pub gear: u32,
    pub room: String,
}

impl PlayerRecord {
    pub fn new(name: impl Into<String>, level: u32, gear: u32, room: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            level,
            gear,
            room: room.into(),
        }
    }

    pub fn stats(&self) -> PlayerStats {
        PlayerStats::new(self.name.clone(), self.level, self.gear)
    }
}

/// Keyed player storage used by the room coordinator.
///
/// Every call is a suspension point. `delete` and `update` report whether a
/// record existed instead of failing, so a missing player is never an error.
pub trait PlayerStore: Send + Sync {
    fn count_in_room(&self, room: &str) -> impl Future<Output = Result<usize, StoreError>> + Send;

    /// Creates the record or overwrites the existing one with the same name.
    fn upsert(&self, record: PlayerRecord) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Overwrites an existing record. Returns `false` if none exists.
    fn update(&self, record: PlayerRecord)
        -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Returns `false` if there was nothing to delete.
    fn delete(&self, name: &str) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// All records in `room`, sorted by name.
    fn list_room(
        &self,
        room: &str,
    ) -> impl Future<Output = Result<Vec<PlayerRecord>, StoreError>> + Send;

    /// Removes every record and returns how many were dropped.
    fn purge(&self) -> impl Future<Output = Result<usize, StoreError>> + Send;
}

fn sorted_room(players: &HashMap<String, PlayerRecord>, room: &str) -> Vec<PlayerRecord> {
    let mut records: Vec<PlayerRecord> = players
        .values()
        .filter(|record| record.room == room)
        .cloned()
        .collect();
    records.sort_by(|a, b| a.name.cmp(&b.name));
    records
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    players: RwLock<HashMap<String, PlayerRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: impl IntoIterator<Item = PlayerRecord>) -> Self {
        let players = records
            .into_iter()
            .map(|record| (record.name.clone(), record))
            .collect();
        Self {
            players: RwLock::new(players),
        }
    }

    pub async fn get(&self, name: &str) -> Option<PlayerRecord> {
        self.players.read().await.get(name).cloned()
    }

    pub async fn len(&self) -> usize {
        self.players.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.players.read().await.is_empty()
    }
}

impl PlayerStore for MemoryStore {
    async fn count_in_room(&self, room: &str) -> Result<usize, StoreError> {
        let players = self.players.read().await;
        Ok(players.values().filter(|record| record.room == room).count())
    }

    async fn upsert(&self, record: PlayerRecord) -> Result<(), StoreError> {
        self.players.write().await.insert(record.name.clone(), record);
        Ok(())
    }

    async fn update(&self, record: PlayerRecord) -> Result<bool, StoreError> {
        let mut players = self.players.write().await;
        match players.get_mut(&record.name) {
            Some(existing) => {
                *existing = record;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, name: &str) -> Result<bool, StoreError> {
        Ok(self.players.write().await.remove(name).is_some())
    }

    async fn list_room(&self, room: &str) -> Result<Vec<PlayerRecord>, StoreError> {
        Ok(sorted_room(&*self.players.read().await, room))
    }

    async fn purge(&self) -> Result<usize, StoreError> {
        let mut players = self.players.write().await;
        let dropped = players.len();
        players.clear();
        Ok(dropped)
    }
}

/// Map persisted to a bincode snapshot file.
///
/// A mutation is applied to a copy of the map, written to `<path>.tmp` and
/// renamed over `path`; memory is only updated once the rename succeeded, so a
/// failed write leaves both the file and the map untouched.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    players: RwLock<HashMap<String, PlayerRecord>>,
}

impl FileStore {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();

        let players = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let records: Vec<PlayerRecord> = deserialize(&bytes)?;
                records
                    .into_iter()
                    .map(|record| (record.name.clone(), record))
                    .collect()
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };

        info!(
            "Opened player store {} with {} records",
            path.display(),
            players.len()
        );

        Ok(Self {
            path,
            players: RwLock::new(players),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, players: &HashMap<String, PlayerRecord>) -> Result<(), StoreError> {
        let mut records: Vec<&PlayerRecord> = players.values().collect();
        records.sort_by(|a, b| a.name.cmp(&b.name));
        let bytes = serialize(&records)?;

        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        debug!("Wrote {} records to {}", records.len(), self.path.display());
        Ok(())
    }
}

impl PlayerStore for FileStore {
    async fn count_in_room(&self, room: &str) -> Result<usize, StoreError> {
        let players = self.players.read().await;
        Ok(players.values().filter(|record| record.room == room).count())
    }

    async fn upsert(&self, record: PlayerRecord) -> Result<(), StoreError> {
        let mut players = self.players.write().await;
        let mut next = players.clone();
        next.insert(record.name.clone(), record);
        self.persist(&next).await?;
        *players = next;
        Ok(())
    }

    async fn update(&self, record: PlayerRecord) -> Result<bool, StoreError> {
        let mut players = self.players.write().await;
        if !players.contains_key(&record.name) {
            return Ok(false);
        }
        let mut next = players.clone();
        next.insert(record.name.clone(), record);
        self.persist(&next).await?;
        *players = next;
        Ok(true)
    }

    async fn delete(&self, name: &str) -> Result<bool, StoreError> {
        let mut players = self.players.write().await;
        if !players.contains_key(name) {
            return Ok(false);
        }
        let mut next = players.clone();
        next.remove(name);
        self.persist(&next).await?;
        *players = next;
        Ok(true)
    }

    async fn list_room(&self, room: &str) -> Result<Vec<PlayerRecord>, StoreError> {
        Ok(sorted_room(&*self.players.read().await, room))
    }

    async fn purge(&self) -> Result<usize, StoreError> {
        let mut players = self.players.write().await;
        let dropped = players.len();
        if dropped > 0 {
            self.persist(&HashMap::new()).await?;
            players.clear();
        }
        Ok(dropped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn test_upsert_creates_then_overwrites() {
        let store = MemoryStore::new();

        assert_ok!(store.upsert(PlayerRecord::new("alice", 1, 0, "lobby")).await);
        assert_ok!(store.upsert(PlayerRecord::new("alice", 4, 2, "cellar")).await);

        assert_eq!(store.len().await, 1);
        assert_eq!(
            store.get("alice").await,
            Some(PlayerRecord::new("alice", 4, 2, "cellar"))
        );
    }

    #[tokio::test]
    async fn test_count_is_scoped_to_room() {
        let store = MemoryStore::with_records(vec![
            PlayerRecord::new("a", 1, 0, "lobby"),
            PlayerRecord::new("b", 1, 0, "lobby"),
            PlayerRecord::new("c", 1, 0, "cellar"),
        ]);

        assert_eq!(store.count_in_room("lobby").await.unwrap(), 2);
        assert_eq!(store.count_in_room("cellar").await.unwrap(), 1);
        assert_eq!(store.count_in_room("attic").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_update_missing_record_reports_false() {
        let store = MemoryStore::new();

        let updated = store
            .update(PlayerRecord::new("ghost", 2, 2, "lobby"))
            .await
            .unwrap();

        assert!(!updated);
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = MemoryStore::with_records(vec![PlayerRecord::new("a", 1, 0, "lobby")]);

        assert!(store.delete("a").await.unwrap());
        assert!(!store.delete("a").await.unwrap());
        assert!(!store.delete("never-existed").await.unwrap());
    }

    #[tokio::test]
    async fn test_list_room_is_sorted_by_name() {
        let store = MemoryStore::with_records(vec![
            PlayerRecord::new("zed", 1, 0, "lobby"),
            PlayerRecord::new("amy", 2, 0, "lobby"),
            PlayerRecord::new("kim", 3, 0, "cellar"),
            PlayerRecord::new("max", 4, 0, "lobby"),
        ]);

        let names: Vec<String> = store
            .list_room("lobby")
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();

        assert_eq!(names, vec!["amy", "max", "zed"]);
    }

    #[tokio::test]
    async fn test_purge_empties_store() {
        let store = MemoryStore::with_records(vec![
            PlayerRecord::new("a", 1, 0, "lobby"),
            PlayerRecord::new("b", 1, 0, "cellar"),
        ]);

        assert_eq!(store.purge().await.unwrap(), 2);
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("players.bin");

        {
            let store = FileStore::open(&path).await.unwrap();
            store
                .upsert(PlayerRecord::new("alice", 3, 2, "lobby"))
                .await
                .unwrap();
            store
                .upsert(PlayerRecord::new("bob", 1, 0, "lobby"))
                .await
                .unwrap();
            store
                .update(PlayerRecord::new("bob", 5, 1, "lobby"))
                .await
                .unwrap();
            store.delete("alice").await.unwrap();
        }

        let reopened = FileStore::open(&path).await.unwrap();
        let lobby = reopened.list_room("lobby").await.unwrap();
        assert_eq!(lobby, vec![PlayerRecord::new("bob", 5, 1, "lobby")]);
        assert!(!path.with_extension("tmp").exists());
    }

    #[tokio::test]
    async fn test_file_store_write_failure_leaves_state_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("players.bin");
        let store = FileStore::open(&path).await.unwrap();

        let result = store.upsert(PlayerRecord::new("alice", 1, 0, "lobby")).await;

        assert!(matches!(result, Err(StoreError::Io(_))));
        assert_eq!(store.count_in_room("lobby").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_file_store_rejects_corrupt_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("players.bin");
        std::fs::write(&path, [0xde, 0xad]).unwrap();

        let result = FileStore::open(&path).await;
        assert!(matches!(result, Err(StoreError::Encode(_))));
    }
}
