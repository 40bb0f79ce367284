//! Common error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid extension identifier: {0}")]
    Identifier(#[from] protocol::ProtocolError),

    #[error("Request submission failed: {0}")]
    Submission(String),

    #[error("Unsupported platform: {0}")]
    Unsupported(String),

    #[error("Channel error: {0}")]
    Channel(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
