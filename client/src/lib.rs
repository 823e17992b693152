//! Client side of the room coordinator
//!
//! - `network`: async connection handle speaking the framed protocol
//! - `commands`: line parsing and event formatting for the terminal client
//!
//! ```no_run
//! use client::network::Connection;
//! use shared::ClientEvent;
//!
//! # async fn demo() -> Result<(), client::network::ClientError> {
//! let mut connection = Connection::connect("127.0.0.1:8080").await?;
//! connection.send(&ClientEvent::RequestRoomList).await?;
//! let _rooms = connection.recv().await?;
//! # Ok(())
//! # }
//! ```

pub mod commands;
pub mod network;
