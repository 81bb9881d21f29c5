//! Length-prefixed bincode framing for the room sync protocol
//!
//! Every message on the wire is a 4-byte big-endian payload length followed by
//! the bincode encoding of a `ClientMessage` or `ServerMessage`. Frame boundaries
//! survive a payload that fails to decode, so a single bad message never
//! desynchronizes the stream.

use bincode::{deserialize, serialize};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest payload accepted in either direction.
pub const MAX_FRAME_LEN: usize = 64 * 1024;

#[derive(Debug)]
pub enum FrameError {
    Io(io::Error),
    Decode(bincode::Error),
    /// Payload length exceeded `MAX_FRAME_LEN`. When reading, the payload has
    /// already been drained from the stream.
    TooLarge(usize),
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::Io(e) => write!(f, "IO error: {}", e),
            FrameError::Decode(e) => write!(f, "Malformed message: {}", e),
            FrameError::TooLarge(len) => write!(
                f,
                "Frame of {} bytes exceeds the {} byte limit",
                len, MAX_FRAME_LEN
            ),
        }
    }
}

impl std::error::Error for FrameError {}

impl From<io::Error> for FrameError {
    fn from(error: io::Error) -> Self {
        FrameError::Io(error)
    }
}

impl From<bincode::Error> for FrameError {
    fn from(error: bincode::Error) -> Self {
        FrameError::Decode(error)
    }
}

/// Encodes `message` and writes it as one frame.
pub async fn write_frame<W, T>(writer: &mut W, message: &T) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let payload = serialize(message)?;
    if payload.len() > MAX_FRAME_LEN {
        return Err(FrameError::TooLarge(payload.len()));
    }

    writer.write_u32(payload.len() as u32).await?;
    writer.write_all(&payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads the next raw frame payload.
///
/// Returns `Ok(None)` when the peer closed the stream cleanly between frames.
/// A truncated frame is reported as an IO error.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Vec<u8>>, FrameError>
where
    R: AsyncRead + Unpin,
{
    let len = match reader.read_u32().await {
        Ok(len) => len as usize,
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    if len > MAX_FRAME_LEN {
        // Skip the payload so the next frame starts on a boundary
        let mut limited = (&mut *reader).take(len as u64);
        tokio::io::copy(&mut limited, &mut tokio::io::sink()).await?;
        return Err(FrameError::TooLarge(len));
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(Some(payload))
}

pub fn decode<T: DeserializeOwned>(payload: &[u8]) -> Result<T, FrameError> {
    Ok(deserialize(payload)?)
}

/// Reads and decodes the next frame in one step.
pub async fn read_message<R, T>(reader: &mut R) -> Result<Option<T>, FrameError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    match read_frame(reader).await? {
        Some(payload) => decode(&payload).map(Some),
        None => Ok(None),
    }
}
