//! # Room Sync Client Library
//!
//! Client-side pieces for sharing character stats with the room sync server:
//! a TCP connection, a local mirror of the room, command parsing for the
//! terminal client, and a plain-text renderer.
//!
//! ## Module Organization
//!
//! ### Network Module (`network`)
//! `RoomClient` owns the connection. Outgoing messages are written directly;
//! incoming messages are read by a background task and queued.
//!
//! ### Game Module (`game`)
//! `ClientState` mirrors the room from server messages and keeps the local
//! player's `LocalStats`, which clamp level at 1 and gear at 0.
//!
//! ### Input Module (`input`)
//! Turns terminal lines into `Command`s.
//!
//! ### Rendering Module (`rendering`)
//! Formats the room as text.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::game::{ClientState, LocalStats};
//! use client::network::RoomClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = RoomClient::connect("127.0.0.1:3001").await?;
//!     let mut state = ClientState::new("alice", "lobby", LocalStats::default());
//!
//!     client.send(&state.request_join(None)).await?;
//!     while let Some(message) = client.next_event().await {
//!         state.apply(&message);
//!         println!("{}", client::rendering::render(&state));
//!     }
//!     Ok(())
//! }
//! ```

pub mod game;
pub mod input;
pub mod network;
pub mod rendering;
