//! Server network layer handling TCP connections and event dispatch

use crate::config::ServerConfig;
use crate::coordinator::RoomCoordinator;
use crate::error::StoreError;
use crate::registry::ConnectionId;
use crate::store::PlayerStore;
use log::{debug, error, info, warn};
use shared::{decode, read_frame, write_frame, ClientMessage, FrameError, ServerMessage};
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

/// Events sent from connection tasks to the main server loop
///
/// Each connection produces exactly one `Connected` first and exactly one
/// `Disconnected` last. Everything in between arrives in the order the
/// client sent it.
#[derive(Debug)]
pub enum NetworkEvent {
    Connected {
        id: ConnectionId,
        addr: SocketAddr,
        sender: mpsc::UnboundedSender<ServerMessage>,
    },
    Message {
        id: ConnectionId,
        message: ClientMessage,
    },
    Malformed {
        id: ConnectionId,
        error: FrameError,
    },
    Disconnected {
        id: ConnectionId,
    },
}

/// Room sync server: accepts connections and drives the room coordinator
pub struct Server<S> {
    listener: TcpListener,
    coordinator: RoomCoordinator<S>,
    purge_on_start: bool,
    event_tx: mpsc::UnboundedSender<NetworkEvent>,
    event_rx: mpsc::UnboundedReceiver<NetworkEvent>,
}

impl<S: PlayerStore + 'static> Server<S> {
    pub async fn bind(config: &ServerConfig, store: S) -> io::Result<Self> {
        let listener = TcpListener::bind(config.address()).await?;
        info!(
            "Server listening on {} (room capacity {})",
            listener.local_addr()?,
            config.capacity
        );

        let (event_tx, event_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener,
            coordinator: RoomCoordinator::new(store, config.capacity),
            purge_on_start: config.purge_on_start,
            event_tx,
            event_rx,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Main server loop.
    ///
    /// Events are handled one at a time, each to completion, so no two
    /// requests ever interleave their store calls.
    pub async fn run(self) -> Result<(), StoreError> {
        let Server {
            listener,
            mut coordinator,
            purge_on_start,
            event_tx,
            mut event_rx,
        } = self;

        if purge_on_start {
            coordinator.purge_stale().await?;
        } else {
            info!("Keeping existing player records");
        }

        tokio::spawn(accept_connections(listener, event_tx));
        info!("Server started successfully");

        while let Some(event) = event_rx.recv().await {
            match event {
                NetworkEvent::Connected { id, addr, sender } => {
                    coordinator.connect(id, addr, sender);
                }
                NetworkEvent::Message { id, message } => {
                    debug!("Connection {} sent {:?}", id, message);
                    let out = coordinator.handle(id, message).await;
                    coordinator.deliver(out);
                }
                NetworkEvent::Malformed { id, error } => {
                    let out = coordinator.handle_malformed(id, &error);
                    coordinator.deliver(out);
                }
                NetworkEvent::Disconnected { id } => {
                    let out = coordinator.disconnect(id).await;
                    coordinator.deliver(out);
                }
            }
        }

        info!("Server shutting down");
        Ok(())
    }
}

/// Accepts clients and spawns a task per connection
async fn accept_connections(listener: TcpListener, events: mpsc::UnboundedSender<NetworkEvent>) {
    let mut next_id: ConnectionId = 1;

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let id = next_id;
                next_id += 1;

                if let Err(e) = stream.set_nodelay(true) {
                    warn!("Failed to set TCP_NODELAY for {}: {}", addr, e);
                }
                tokio::spawn(serve_connection(id, stream, addr, events.clone()));
            }
            Err(e) => {
                error!("Error accepting connection: {}", e);
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        }

        if events.is_closed() {
            break;
        }
    }
}

/// Owns one client's socket for its whole lifetime
async fn serve_connection(
    id: ConnectionId,
    stream: TcpStream,
    addr: SocketAddr,
    events: mpsc::UnboundedSender<NetworkEvent>,
) {
    let (reader, writer) = stream.into_split();
    let (sender, outbound) = mpsc::unbounded_channel();

    if events
        .send(NetworkEvent::Connected { id, addr, sender })
        .is_err()
    {
        return;
    }

    tokio::spawn(write_loop(id, writer, outbound));
    read_loop(id, reader, &events).await;

    // Runs exactly once, after every message this connection produced
    if let Err(e) = events.send(NetworkEvent::Disconnected { id }) {
        error!("Failed to report disconnect of {}: {}", id, e);
    }
}

/// Decodes frames and forwards them to the main loop until the peer goes away
async fn read_loop(
    id: ConnectionId,
    reader: OwnedReadHalf,
    events: &mpsc::UnboundedSender<NetworkEvent>,
) {
    let mut reader = BufReader::new(reader);

    loop {
        let event = match read_frame(&mut reader).await {
            Ok(Some(payload)) => match decode::<ClientMessage>(&payload) {
                Ok(message) => NetworkEvent::Message { id, message },
                Err(error) => NetworkEvent::Malformed { id, error },
            },
            Ok(None) => {
                debug!("Connection {} closed by peer", id);
                break;
            }
            Err(error @ FrameError::TooLarge(_)) => NetworkEvent::Malformed { id, error },
            Err(e) => {
                warn!("Connection {} read error: {}", id, e);
                break;
            }
        };

        if events.send(event).is_err() {
            break;
        }
    }
}

/// Drains the connection's outbound queue onto the socket.
///
/// Ends once the registry drops the queue's sender or the socket fails.
async fn write_loop(
    id: ConnectionId,
    mut writer: OwnedWriteHalf,
    mut outbound: mpsc::UnboundedReceiver<ServerMessage>,
) {
    while let Some(message) = outbound.recv().await {
        if let Err(e) = write_frame(&mut writer, &message).await {
            warn!("Failed to send to connection {}: {}", id, e);
            return;
        }
    }

    let _ = writer.shutdown().await;
}
