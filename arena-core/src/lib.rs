//! Arena Core
//!
//! Wallet and match-entry engine for a tournament platform: players hold a
//! coin balance, pay entry fees to join matches, and top up their wallet.
//!
//! # Architecture
//!
//! - **Single Writer**: One actor applies every mutation, so the read of a
//!   match's player count and its increment can never interleave
//! - **Atomic Batches**: Balance change, ledger entry, participant record and
//!   player count are committed in one RocksDB write batch
//! - **Append-only Ledger**: Transactions are never modified or deleted
//!
//! # Invariants
//!
//! - A user's balance equals the sum of that user's ledger entries
//! - At most one participant record per (match, user)
//! - A match's player count equals its participant records and never
//!   exceeds its capacity

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod actor;
pub mod api;
pub mod arena;
pub mod catalog;
pub mod config;
pub mod error;
pub mod leaderboard;
pub mod metrics;
pub mod storage;
pub mod types;

// Re-exports
pub use arena::Arena;
pub use catalog::{Catalog, SeedOutcome};
pub use config::Config;
pub use error::{Error, Result};
pub use storage::Storage;
pub use types::{
    Game, GameId, Match, MatchId, MatchStatus, NewUser, Participant, ProfileUpdate,
    Transaction, TransactionKind, User, UserId,
};
