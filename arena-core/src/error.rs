//! Error types for the arena core

use thiserror::Error;

/// Result type for arena operations
pub type Result<T> = std::result::Result<T, Error>;

/// Arena errors
///
/// The first group are typed rejections of a wallet or match operation. A
/// rejected operation leaves the store exactly as it was before the call.
#[derive(Error, Debug)]
pub enum Error {
    /// No caller identity in the session
    #[error("Not authenticated")]
    Unauthenticated,

    /// Referenced entity missing
    #[error("{0} not found")]
    NotFound(String),

    /// Operation not valid for the current lifecycle state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Match capacity reached
    #[error("Match is full ({max_players} players)")]
    Full {
        /// Capacity of the match
        max_players: u32,
    },

    /// Balance check failed
    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientFunds {
        /// Coins needed
        required: String,
        /// Coins held
        available: String,
    },

    /// Caller already has a participant record for the match
    #[error("Already joined match {0}")]
    AlreadyJoined(String),

    /// Caller-supplied value out of domain
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Storage error (RocksDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Concurrency error (writer mailbox closed, etc.)
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Stable snake_case code for the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Unauthenticated => "unauthenticated",
            Error::NotFound(_) => "not_found",
            Error::InvalidState(_) => "invalid_state",
            Error::Full { .. } => "full",
            Error::InsufficientFunds { .. } => "insufficient_funds",
            Error::AlreadyJoined(_) => "already_joined",
            Error::InvalidArgument(_) => "invalid_argument",
            Error::Storage(_) => "storage",
            Error::Serialization(_) => "serialization",
            Error::Concurrency(_) => "concurrency",
            Error::Config(_) => "config",
            Error::Io(_) => "io",
        }
    }

    /// True for typed rejections the caller can act on
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Error::Unauthenticated
                | Error::NotFound(_)
                | Error::InvalidState(_)
                | Error::Full { .. }
                | Error::InsufficientFunds { .. }
                | Error::AlreadyJoined(_)
                | Error::InvalidArgument(_)
        )
    }
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}
