//! TCP connection to the room coordinator

use log::{debug, info};
use shared::{
    read_frame, write_frame, ClientEvent, ConnectionId, FrameError, ServerEvent,
    MAX_SERVER_FRAME_LEN,
};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{BufReader, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::time::timeout;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error("server closed the connection")]
    Closed,
    #[error("timed out waiting for the server")]
    Timeout,
    #[error("expected a welcome, got {0:?}")]
    NoWelcome(Box<ServerEvent>),
}

/// Read side of a connection.
#[derive(Debug)]
pub struct EventReader {
    reader: BufReader<OwnedReadHalf>,
    max_frame_len: usize,
}

impl EventReader {
    /// Waits for the next event. `Ok(None)` means the server hung up.
    ///
    /// Not cancel safe: dropping the future halfway through a frame leaves
    /// the stream misaligned.
    pub async fn recv(&mut self) -> Result<Option<ServerEvent>, ClientError> {
        Ok(read_frame(&mut self.reader, self.max_frame_len).await?)
    }
}

/// Write side of a connection.
#[derive(Debug)]
pub struct EventWriter {
    writer: BufWriter<OwnedWriteHalf>,
}

impl EventWriter {
    pub async fn send(&mut self, event: &ClientEvent) -> Result<(), ClientError> {
        debug!("Sending {:?}", event);
        write_frame(&mut self.writer, event).await?;
        Ok(())
    }
}

#[derive(Debug)]
pub struct Connection {
    connection_id: ConnectionId,
    reader: EventReader,
    writer: EventWriter,
}

impl Connection {
    /// Connects and waits for the server's welcome, which carries the id the
    /// server uses for this connection.
    pub async fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;

        let (read_half, write_half) = stream.into_split();
        let mut reader = EventReader {
            reader: BufReader::new(read_half),
            max_frame_len: MAX_SERVER_FRAME_LEN,
        };
        let writer = EventWriter {
            writer: BufWriter::new(write_half),
        };

        let connection_id = match reader.recv().await? {
            Some(ServerEvent::Welcome { connection_id }) => connection_id,
            Some(other) => return Err(ClientError::NoWelcome(Box::new(other))),
            None => return Err(ClientError::Closed),
        };
        info!("Connected as connection {}", connection_id);

        Ok(Connection {
            connection_id,
            reader,
            writer,
        })
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    pub async fn send(&mut self, event: &ClientEvent) -> Result<(), ClientError> {
        self.writer.send(event).await
    }

    pub async fn recv(&mut self) -> Result<Option<ServerEvent>, ClientError> {
        self.reader.recv().await
    }

    /// Like `recv`, but a closed stream is an error and the wait is bounded.
    /// A timeout poisons the connection, so only use it where giving up is
    /// final.
    pub async fn recv_timeout(&mut self, limit: Duration) -> Result<ServerEvent, ClientError> {
        match timeout(limit, self.reader.recv()).await {
            Ok(Ok(Some(event))) => Ok(event),
            Ok(Ok(None)) => Err(ClientError::Closed),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(ClientError::Timeout),
        }
    }

    /// Skips events until one satisfies `wanted`.
    pub async fn recv_until<F>(
        &mut self,
        limit: Duration,
        mut wanted: F,
    ) -> Result<ServerEvent, ClientError>
    where
        F: FnMut(&ServerEvent) -> bool,
    {
        let wait = async {
            loop {
                match self.reader.recv().await? {
                    Some(event) if wanted(&event) => return Ok(event),
                    Some(event) => debug!("Skipping {:?}", event),
                    None => return Err(ClientError::Closed),
                }
            }
        };
        timeout(limit, wait)
            .await
            .unwrap_or(Err(ClientError::Timeout))
    }

    pub fn into_split(self) -> (EventReader, EventWriter) {
        (self.reader, self.writer)
    }
}
