//! # Room Sync Server Library
//!
//! This library provides the authoritative server for sharing live character
//! stats between players sitting in the same room. Clients join a room under a
//! player name, push level and gear changes, and receive every other player's
//! changes as they happen.
//!
//! ## Core Responsibilities
//!
//! ### Room Membership
//! The server decides who is in which room. Joins are admitted only while the
//! room holds fewer than its capacity (six players by default), and a player
//! name belongs to at most one live connection at a time.
//!
//! ### Stat Synchronization
//! Every accepted change is written to the player store and fanned out to the
//! other members of the same room. Joiners receive a full snapshot; leaves are
//! announced and followed by a fresh snapshot so clients can correct drift.
//!
//! ### Connection Cleanup
//! A connection that closes without leaving is treated exactly like an
//! explicit leave, so no record outlives its connection and rooms never fill
//! up with ghosts.
//!
//! ## Architecture Design
//!
//! ### Single Event Stream
//! Each connection has a reader task and a writer task. Readers decode frames
//! and push events onto one channel; the main loop handles those events one at
//! a time, each to completion, including its store calls. Writers drain a
//! per-connection queue, so a slow client never blocks the loop.
//!
//! ### TCP With Length-Prefixed Frames
//! Messages are bincode-encoded enums behind a 4-byte length. Per-connection
//! ordering comes from TCP; across connections there is no global order and
//! clients apply updates last-write-wins.
//!
//! ## Module Organization
//!
//! - [`coordinator`]: join/update/leave rules, capacity, broadcast decisions
//! - [`registry`]: live connections, their rooms, room-scoped delivery
//! - [`store`]: the `PlayerStore` trait with in-memory and file backends
//! - [`network`]: TCP accept loop, per-connection tasks, main event loop
//! - [`config`] and [`error`]: settings and error types
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//! use server::store::MemoryStore;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::default();
//!     let server = Server::bind(&config, MemoryStore::new()).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod coordinator;
pub mod error;
pub mod network;
pub mod registry;
pub mod store;
