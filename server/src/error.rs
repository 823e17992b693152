use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    /// Fatal at startup; fix the arguments and restart.
    #[error("invalid configuration: {0}")]
    Config(String),
}
