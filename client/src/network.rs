//! Client network layer: one TCP connection to the room sync server

use log::{debug, error, warn};
use shared::{read_message, write_frame, ClientMessage, FrameError, ServerMessage};
use std::io;
use std::time::Duration;
use tokio::io::BufReader;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;

/// Connection to the server.
///
/// Incoming messages are read by a background task and queued, so
/// [`RoomClient::next_event`] is safe to use inside `tokio::select!`.
pub struct RoomClient {
    writer: OwnedWriteHalf,
    events: mpsc::UnboundedReceiver<ServerMessage>,
}

impl RoomClient {
    pub async fn connect(server_addr: &str) -> io::Result<Self> {
        let stream = TcpStream::connect(server_addr).await?;
        stream.set_nodelay(true)?;
        debug!("Connected to {}", stream.peer_addr()?);

        let (reader, writer) = stream.into_split();
        let (tx, events) = mpsc::unbounded_channel();
        tokio::spawn(receive_loop(reader, tx));

        Ok(RoomClient { writer, events })
    }

    pub async fn send(&mut self, message: &ClientMessage) -> Result<(), FrameError> {
        write_frame(&mut self.writer, message).await
    }

    pub async fn join(
        &mut self,
        room: &str,
        name: &str,
        level: u32,
        gear: u32,
    ) -> Result<(), FrameError> {
        self.send(&ClientMessage::JoinRoom {
            room: room.to_string(),
            name: name.to_string(),
            level,
            gear,
        })
        .await
    }

    pub async fn send_changes(
        &mut self,
        room: &str,
        name: &str,
        level: u32,
        gear: u32,
    ) -> Result<(), FrameError> {
        self.send(&ClientMessage::SendChanges {
            room: room.to_string(),
            name: name.to_string(),
            level,
            gear,
        })
        .await
    }

    pub async fn leave(&mut self, room: &str, name: &str) -> Result<(), FrameError> {
        self.send(&ClientMessage::LeaveRoom {
            room: room.to_string(),
            name: name.to_string(),
        })
        .await
    }

    /// Next message from the server, or `None` once the connection is gone.
    pub async fn next_event(&mut self) -> Option<ServerMessage> {
        self.events.recv().await
    }

    /// Like `next_event`, but gives up after `wait`.
    pub async fn next_event_timeout(&mut self, wait: Duration) -> Option<ServerMessage> {
        timeout(wait, self.events.recv()).await.ok().flatten()
    }

    /// Returns a message only if one is already queued.
    pub fn try_next_event(&mut self) -> Option<ServerMessage> {
        self.events.try_recv().ok()
    }
}

/// Reads server frames until the connection closes
async fn receive_loop(reader: OwnedReadHalf, events: mpsc::UnboundedSender<ServerMessage>) {
    let mut reader = BufReader::new(reader);

    loop {
        match read_message::<_, ServerMessage>(&mut reader).await {
            Ok(Some(message)) => {
                if events.send(message).is_err() {
                    break;
                }
            }
            Ok(None) => {
                debug!("Server closed the connection");
                break;
            }
            Err(e @ FrameError::Decode(_)) | Err(e @ FrameError::TooLarge(_)) => {
                warn!("Skipping unreadable message: {}", e);
            }
            Err(e) => {
                error!("Error receiving from server: {}", e);
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{read_message, PlayerStats};
    use tokio::net::TcpListener;
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn test_client_sends_frames_and_queues_replies() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let received: ClientMessage = read_message(&mut stream).await.unwrap().unwrap();
            let reply = ServerMessage::InitialData {
                players: vec![PlayerStats::new("A", 3, 2)],
            };
            write_frame(&mut stream, &reply).await.unwrap();
            received
        });

        let mut client = RoomClient::connect(&addr).await.unwrap();
        assert_ok!(client.join("R1", "A", 3, 2).await);

        let event = client.next_event_timeout(Duration::from_secs(2)).await;
        assert_eq!(
            event,
            Some(ServerMessage::InitialData {
                players: vec![PlayerStats::new("A", 3, 2)]
            })
        );
        assert_eq!(
            server.await.unwrap(),
            ClientMessage::JoinRoom {
                room: "R1".into(),
                name: "A".into(),
                level: 3,
                gear: 2,
            }
        );
    }

    #[tokio::test]
    async fn test_next_event_ends_when_server_hangs_up() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            drop(stream);
        });

        let mut client = RoomClient::connect(&addr).await.unwrap();
        assert_eq!(client.next_event().await, None);
    }

    #[tokio::test]
    async fn test_timeout_returns_none() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let _keep = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(stream);
        });

        let mut client = RoomClient::connect(&addr).await.unwrap();
        let event = client.next_event_timeout(Duration::from_millis(50)).await;
        assert_eq!(event, None);
        assert!(client.try_next_event().is_none());
    }
}
