//! Protocol error types

use thiserror::Error;

/// Errors raised while building lifecycle requests
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// Identifier was empty
    #[error("Extension identifier is empty")]
    EmptyIdentifier,

    /// Identifier exceeds the bundle identifier length limit
    #[error("Extension identifier too long: {len} bytes (max: {max})")]
    IdentifierTooLong { len: usize, max: usize },

    /// Identifier contains a character outside `[A-Za-z0-9.-]`
    #[error("Invalid character {character:?} in extension identifier '{identifier}'")]
    InvalidCharacter { identifier: String, character: char },

    /// Identifier is not a dotted reverse-DNS name
    #[error("Extension identifier '{0}' must be a dotted reverse-DNS name")]
    MalformedIdentifier(String),
}

/// Type alias for protocol results
pub type Result<T> = std::result::Result<T, ProtocolError>;
