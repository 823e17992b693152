//! Length-prefixed bincode framing shared by the server and client
//!
//! Every message on the wire is a 4-byte big-endian length followed by the
//! bincode encoding of one `ClientEvent` or `ServerEvent`.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    /// The frame boundary is intact, so the stream can keep going.
    #[error("failed to decode frame: {0}")]
    Decode(bincode::Error),
    #[error("failed to encode frame: {0}")]
    Encode(bincode::Error),
    #[error("frame of {len} bytes exceeds limit of {max} bytes")]
    TooLarge { len: usize, max: usize },
}

impl FrameError {
    /// Whether the stream is still usable after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, FrameError::Decode(_))
    }
}

pub async fn write_frame<W, T>(writer: &mut W, message: &T) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let data = bincode::serialize(message).map_err(FrameError::Encode)?;
    let len = u32::try_from(data.len()).map_err(|_| FrameError::TooLarge {
        len: data.len(),
        max: u32::MAX as usize,
    })?;

    writer.write_u32(len).await?;
    writer.write_all(&data).await?;
    writer.flush().await?;
    Ok(())
}

/// Size of the frame body `message` would produce, without encoding it.
pub fn encoded_len<T: Serialize>(message: &T) -> Result<usize, FrameError> {
    let len = bincode::serialized_size(message).map_err(FrameError::Encode)?;
    Ok(usize::try_from(len).unwrap_or(usize::MAX))
}

/// Reads one frame. Returns `Ok(None)` when the peer closed the stream
/// cleanly between frames.
pub async fn read_frame<R, T>(reader: &mut R, max_len: usize) -> Result<Option<T>, FrameError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let len = match reader.read_u32().await {
        Ok(len) => len as usize,
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    if len > max_len {
        return Err(FrameError::TooLarge { len, max: max_len });
    }

    let mut buffer = vec![0u8; len];
    reader.read_exact(&mut buffer).await?;

    bincode::deserialize(&buffer)
        .map(Some)
        .map_err(FrameError::Decode)
}
