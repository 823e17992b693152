//! Command-line configuration for the room coordinator

use crate::error::ServerError;
use clap::Parser;
use shared::{DEFAULT_MAX_FRAME_LEN, MAX_EXPLOSION_SECS, MIN_EXPLOSION_SECS, MIN_GAME_PLAYERS};
use std::ops::RangeInclusive;

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about)]
pub struct ServerConfig {
    /// Server IP address to bind to
    #[clap(short = 'H', long, default_value = "127.0.0.1")]
    pub host: String,
    /// Server port to listen on
    #[clap(short, long, default_value = "8080")]
    pub port: u16,
    /// Largest inbound frame accepted before the connection is closed
    #[clap(long, default_value_t = DEFAULT_MAX_FRAME_LEN)]
    pub max_frame_len: usize,
    /// Lower bound of the randomized explosion deadline, in seconds
    #[clap(long, default_value_t = MIN_EXPLOSION_SECS)]
    pub min_explosion_secs: u64,
    /// Upper bound of the randomized explosion deadline, in seconds
    #[clap(long, default_value_t = MAX_EXPLOSION_SECS)]
    pub max_explosion_secs: u64,
    /// Members required before a game can start
    #[clap(long, default_value_t = MIN_GAME_PLAYERS)]
    pub min_players: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            min_explosion_secs: MIN_EXPLOSION_SECS,
            max_explosion_secs: MAX_EXPLOSION_SECS,
            min_players: MIN_GAME_PLAYERS,
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn explosion_range(&self) -> RangeInclusive<u64> {
        self.min_explosion_secs..=self.max_explosion_secs
    }

    pub fn validate(&self) -> Result<(), ServerError> {
        if self.min_explosion_secs > self.max_explosion_secs {
            return Err(ServerError::Config(format!(
                "explosion range {}..={} is empty",
                self.min_explosion_secs, self.max_explosion_secs
            )));
        }
        if self.max_frame_len == 0 {
            return Err(ServerError::Config(
                "max frame length must be non-zero".to_string(),
            ));
        }
        if self.min_players < MIN_GAME_PLAYERS {
            return Err(ServerError::Config(format!(
                "a game needs at least {} players",
                MIN_GAME_PLAYERS
            )));
        }
        Ok(())
    }
}
