//! # Room Coordinator Server Library
//!
//! Authoritative coordinator for ephemeral multiplayer rooms. Clients hold a
//! persistent TCP connection, create or join rooms, relay peer-connection
//! signaling to each other, chat, and play a turn-based elimination game.
//! All state lives in memory and is gone when the process exits.
//!
//! ## Architecture Design
//!
//! ### Single Coordinator Loop
//! One task owns every room, member and turn order. Per-connection reader
//! tasks forward decoded events to it over a channel, and it handles them one
//! at a time. Two joins racing for the last slot in a room are therefore
//! ordered, and only the first can pass the capacity check.
//!
//! ### Per-Connection Writers
//! Each connection has its own outbound queue and writer task. Events queued
//! for one connection are delivered in order; nothing is promised across
//! connections.
//!
//! ## Module Organization
//!
//! - `registry`: connection id to member record
//! - `rooms`: room store, join/leave rules, room lifecycle
//! - `turn`: turn order generation and circular advancement
//! - `broadcast`: global and room-scoped fan-out
//! - `relay`: opaque offer/answer forwarding
//! - `router`: event validation, dispatch and teardown
//! - `network`: TCP transport and the coordinator loop
//! - `config`: command-line configuration
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::bind(ServerConfig::default()).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod broadcast;
pub mod config;
pub mod error;
pub mod network;
pub mod registry;
pub mod relay;
pub mod rooms;
pub mod router;
pub mod turn;
