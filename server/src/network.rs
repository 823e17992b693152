//! Server network layer: TCP accept loop, per-connection tasks, and the
//! coordinator loop that owns all room state

use crate::broadcast::Outbound;
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::router::Coordinator;
use log::{debug, error, info, warn};
use shared::{read_frame, write_frame, ClientEvent, ConnectionId, ServerEvent};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{BufReader, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::interval;

const STATS_INTERVAL: Duration = Duration::from_secs(60);

/// Messages sent from network tasks to the coordinator loop
#[derive(Debug)]
pub enum ServerMessage {
    Connected {
        connection_id: ConnectionId,
        outbound: Outbound,
    },
    EventReceived {
        connection_id: ConnectionId,
        event: ClientEvent,
    },
    Disconnected {
        connection_id: ConnectionId,
    },
    Shutdown,
}

/// Stops a running server from another task.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    server_tx: mpsc::UnboundedSender<ServerMessage>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        if self.server_tx.send(ServerMessage::Shutdown).is_err() {
            debug!("Server loop already stopped");
        }
    }
}

/// Room coordinator server
pub struct Server {
    listener: TcpListener,
    config: ServerConfig,
    coordinator: Coordinator,

    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl Server {
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        config.validate()?;

        let listener = TcpListener::bind(config.address()).await?;
        info!("Server listening on {}", listener.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let coordinator = Coordinator::new(&config);

        Ok(Server {
            listener,
            config,
            coordinator,
            server_tx,
            server_rx,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            server_tx: self.server_tx.clone(),
        }
    }

    /// Spawns the reader and writer tasks for one accepted stream
    fn spawn_connection(
        stream: TcpStream,
        connection_id: ConnectionId,
        server_tx: mpsc::UnboundedSender<ServerMessage>,
        max_frame_len: usize,
    ) {
        if let Err(e) = stream.set_nodelay(true) {
            warn!("Failed to set TCP_NODELAY for {}: {}", connection_id, e);
        }

        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        if server_tx
            .send(ServerMessage::Connected {
                connection_id,
                outbound,
            })
            .is_err()
        {
            error!("Coordinator loop is gone, dropping connection {}", connection_id);
            return;
        }

        let (read_half, write_half) = stream.into_split();
        tokio::spawn(Self::write_loop(connection_id, write_half, outbound_rx));
        tokio::spawn(Self::read_loop(
            connection_id,
            read_half,
            server_tx,
            max_frame_len,
        ));
    }

    /// Drains the connection's queue in order until the coordinator drops
    /// the sending side.
    async fn write_loop(
        connection_id: ConnectionId,
        write_half: OwnedWriteHalf,
        mut outbound_rx: mpsc::UnboundedReceiver<ServerEvent>,
    ) {
        let mut writer = BufWriter::new(write_half);

        while let Some(event) = outbound_rx.recv().await {
            if let Err(e) = write_frame(&mut writer, &event).await {
                warn!("Failed to write to connection {}: {}", connection_id, e);
                break;
            }
        }
        debug!("Writer for connection {} finished", connection_id);
    }

    async fn read_loop(
        connection_id: ConnectionId,
        read_half: OwnedReadHalf,
        server_tx: mpsc::UnboundedSender<ServerMessage>,
        max_frame_len: usize,
    ) {
        let mut reader = BufReader::new(read_half);

        loop {
            match read_frame::<_, ClientEvent>(&mut reader, max_frame_len).await {
                Ok(Some(event)) => {
                    let is_disconnect = matches!(event, ClientEvent::Disconnect);
                    if server_tx
                        .send(ServerMessage::EventReceived {
                            connection_id,
                            event,
                        })
                        .is_err()
                    {
                        return;
                    }
                    if is_disconnect {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) if e.is_recoverable() => {
                    warn!("Malformed event from connection {}: {}", connection_id, e);
                }
                Err(e) => {
                    warn!("Closing connection {}: {}", connection_id, e);
                    break;
                }
            }
        }

        if server_tx
            .send(ServerMessage::Disconnected { connection_id })
            .is_err()
        {
            debug!("Coordinator gone before connection {} closed", connection_id);
        }
    }

    /// Main server loop. Runs until a shutdown is requested.
    pub async fn run(self) -> Result<(), ServerError> {
        let Server {
            listener,
            config,
            mut coordinator,
            server_tx,
            mut server_rx,
        } = self;

        let max_frame_len = config.max_frame_len;
        let acceptor = tokio::spawn(async move {
            let mut next_connection_id: ConnectionId = 1;

            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        let connection_id = next_connection_id;
                        next_connection_id = next_connection_id.wrapping_add(1).max(1);
                        debug!("Accepted {} as connection {}", addr, connection_id);
                        Self::spawn_connection(
                            stream,
                            connection_id,
                            server_tx.clone(),
                            max_frame_len,
                        );
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });

        let mut stats_interval = interval(STATS_INTERVAL);
        info!("Server started successfully");

        loop {
            tokio::select! {
                message = server_rx.recv() => {
                    match message {
                        Some(ServerMessage::Connected { connection_id, outbound }) => {
                            coordinator.connect(connection_id, outbound);
                        },
                        Some(ServerMessage::EventReceived { connection_id, event }) => {
                            coordinator.handle_event(connection_id, event);
                        },
                        Some(ServerMessage::Disconnected { connection_id }) => {
                            coordinator.disconnect(connection_id);
                        },
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                _ = stats_interval.tick() => {
                    debug!(
                        "{} connections, {} rooms, {} members",
                        coordinator.connection_count(),
                        coordinator.rooms().len(),
                        coordinator.rooms().member_count()
                    );
                },
            }
        }

        acceptor.abort();
        Ok(())
    }
}
