//! Main arena orchestration layer
//!
//! Ties together storage, the single-writer actor and metrics into the API
//! the HTTP layer (or any other caller) uses. Caller identity is always an
//! explicit parameter; `None` means the session is not authenticated.
//!
//! # Example
//!
//! ```no_run
//! use arena_core::{Arena, Config};
//! use rust_decimal::Decimal;
//!
//! #[tokio::main]
//! async fn main() -> arena_core::Result<()> {
//!     let arena = Arena::open(Config::default()).await?;
//!     let user = arena.register_user(Default::default()).await?;
//!
//!     let receipt = arena.add_funds(Some(user.id), Decimal::from(500)).await?;
//!     assert_eq!(receipt.new_balance, Decimal::from(500));
//!
//!     arena.shutdown().await
//! }
//! ```

use crate::{
    actor::{spawn_arena_actor, ArenaHandle},
    catalog::{Catalog, SeedOutcome},
    leaderboard::rank_players,
    metrics::ArenaMetrics,
    storage::StorageStats,
    types::{
        coins_from_f64, to_coins, DepositReceipt, Game, GameId, JoinReceipt, LeaderboardEntry, Match, MatchId, NewUser,
        ParticipantView, Profile, ProfileUpdate, Transaction, User, UserId,
    },
    Config, Error, Result, Storage,
};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

/// Most recent ledger entries returned to a wallet view
pub const TRANSACTION_HISTORY_LIMIT: usize = 50;

/// Main arena interface
#[derive(Debug)]
pub struct Arena {
    /// Actor handle for mutations
    handle: ArenaHandle,

    /// Direct storage access (for reads)
    storage: Arc<Storage>,

    /// Metrics
    metrics: ArenaMetrics,

    /// Configuration
    config: Config,
}

impl Arena {
    /// Open arena with configuration
    pub async fn open(config: Config) -> Result<Self> {
        config.validate()?;

        let storage = Arc::new(Storage::open(&config)?);
        let handle = spawn_arena_actor(storage.clone(), config.actor.mailbox_capacity)?;
        let metrics = ArenaMetrics::new()
            .map_err(|e| Error::Config(format!("Failed to create metrics: {}", e)))?;

        Ok(Self {
            handle,
            storage,
            metrics,
            config,
        })
    }

    /// Configuration the arena was opened with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Metrics collector
    pub fn metrics(&self) -> &ArenaMetrics {
        &self.metrics
    }

    async fn timed<T>(&self, operation: &str, fut: impl Future<Output = Result<T>>) -> Result<T> {
        let started = Instant::now();
        let result = fut.await;
        self.metrics.record(operation, started.elapsed(), &result);
        if let Err(e) = &result {
            if !e.is_rejection() {
                tracing::error!(operation, error = %e, "Arena operation failed");
            }
        }
        result
    }

    // Users

    /// Create a user record on first sign-in
    pub async fn register_user(&self, user: NewUser) -> Result<User> {
        self.timed("register_user", self.handle.register_user(user))
            .await
    }

    /// Get user by ID
    pub fn get_user(&self, id: UserId) -> Result<Option<User>> {
        self.storage.get_user(id)
    }

    // Match entry

    /// Enroll the caller as a paying participant of a match.
    ///
    /// Checks run in order: authenticated, match exists, match upcoming,
    /// free slot, sufficient balance, not yet joined. On success the fee
    /// debit, ledger entry, participant record and player count are
    /// committed together.
    pub async fn join_match(&self, caller: Option<UserId>, match_id: MatchId) -> Result<JoinReceipt> {
        self.timed("join_match", async {
            let caller = caller.ok_or(Error::Unauthenticated)?;
            self.handle.join_match(caller, match_id).await
        })
        .await
    }

    // Wallet

    /// Credit the caller's wallet and return the new balance
    pub async fn add_funds(&self, caller: Option<UserId>, amount: Decimal) -> Result<DepositReceipt> {
        self.deposit(caller, || Ok(amount)).await
    }

    /// Credit the caller's wallet with an amount sent as a JSON number
    pub async fn add_funds_f64(&self, caller: Option<UserId>, amount: f64) -> Result<DepositReceipt> {
        self.deposit(caller, || coins_from_f64(amount)).await
    }

    async fn deposit(
        &self,
        caller: Option<UserId>,
        amount: impl FnOnce() -> Result<Decimal>,
    ) -> Result<DepositReceipt> {
        let (receipt, credited) = self
            .timed("add_funds", async {
                let caller = caller.ok_or(Error::Unauthenticated)?;
                let amount = amount()?;
                let receipt = self.handle.add_funds(caller, amount).await?;
                Ok((receipt, to_coins(amount)))
            })
            .await?;

        if let Some(coins) = credited.to_f64() {
            self.metrics.record_deposit(coins);
        }
        Ok(receipt)
    }

    /// Caller's balance; `None` without a session, 0 for an unknown record
    pub fn get_balance(&self, caller: Option<UserId>) -> Result<Option<Decimal>> {
        let Some(caller) = caller else {
            return Ok(None);
        };
        Ok(Some(
            self.storage
                .get_user(caller)?
                .map(|u| u.wallet_balance)
                .unwrap_or(Decimal::ZERO),
        ))
    }

    /// Caller's ledger entries, newest first, at most 50
    pub fn get_transactions(&self, caller: Option<UserId>) -> Result<Vec<Transaction>> {
        match caller {
            Some(caller) => self
                .storage
                .list_user_transactions(caller, TRANSACTION_HISTORY_LIMIT),
            None => Ok(Vec::new()),
        }
    }

    // Leaderboard & profile

    /// Top players by wins
    pub fn top_players(&self) -> Result<Vec<LeaderboardEntry>> {
        Ok(rank_players(self.storage.scan_users()?))
    }

    /// Caller's profile with the live count of matches joined
    pub fn get_profile(&self, caller: Option<UserId>) -> Result<Option<Profile>> {
        let Some(caller) = caller else {
            return Ok(None);
        };
        let Some(user) = self.storage.get_user(caller)? else {
            return Ok(None);
        };
        let match_history = self.storage.count_user_participations(caller)?;
        Ok(Some(Profile {
            user,
            match_history,
        }))
    }

    /// Patch the caller's display name and/or game alias
    pub async fn update_profile(&self, caller: Option<UserId>, update: ProfileUpdate) -> Result<User> {
        self.timed("update_profile", async {
            let caller = caller.ok_or(Error::Unauthenticated)?;
            self.handle.update_profile(caller, update).await
        })
        .await
    }

    // Catalog

    /// Active games in catalog order
    pub fn list_games(&self) -> Result<Vec<Game>> {
        Ok(self
            .storage
            .list_games()?
            .into_iter()
            .filter(|g| g.is_active)
            .collect())
    }

    /// Get game by ID
    pub fn get_game(&self, id: GameId) -> Result<Option<Game>> {
        self.storage.get_game(id)
    }

    /// Matches of a game, newest first
    pub fn list_matches_by_game(&self, game_id: GameId) -> Result<Vec<Match>> {
        self.storage.list_matches_by_game(game_id)
    }

    /// Get match by ID
    pub fn get_match(&self, id: MatchId) -> Result<Option<Match>> {
        self.storage.get_match(id)
    }

    /// Participants of a match together with their user records
    pub fn get_participants(&self, match_id: MatchId) -> Result<Vec<ParticipantView>> {
        self.storage
            .list_participants(match_id)?
            .into_iter()
            .map(|participant| {
                let user = self.storage.get_user(participant.user_id)?;
                Ok(ParticipantView { participant, user })
            })
            .collect()
    }

    /// Install `catalog` unless a game already exists
    pub async fn seed_catalog(&self, catalog: Catalog) -> Result<SeedOutcome> {
        self.timed("seed_catalog", self.handle.seed_catalog(catalog))
            .await
    }

    // Consistency checks

    /// Whether the stored balance equals the sum of the user's ledger entries
    pub fn check_balance_consistency(&self, user_id: UserId) -> Result<bool> {
        let user = self
            .storage
            .get_user(user_id)?
            .ok_or_else(|| Error::NotFound("User".to_string()))?;

        let ledger_total: Decimal = self
            .storage
            .list_user_transactions(user_id, usize::MAX)?
            .iter()
            .map(|tx| tx.amount)
            .sum();

        if ledger_total != user.wallet_balance {
            tracing::warn!(
                user_id = %user_id,
                balance = %user.wallet_balance,
                ledger_total = %ledger_total,
                "Balance does not match ledger"
            );
        }
        Ok(ledger_total == user.wallet_balance)
    }

    /// Whether the match's player count equals its participant records
    pub fn check_player_count(&self, match_id: MatchId) -> Result<bool> {
        let m = self
            .storage
            .get_match(match_id)?
            .ok_or_else(|| Error::NotFound("Match".to_string()))?;
        let participants = self.storage.list_participants(match_id)?.len();
        Ok(participants == m.current_players as usize)
    }

    /// Approximate record counts of the store
    pub fn stats(&self) -> Result<StorageStats> {
        self.storage.get_stats()
    }

    /// Shutdown arena
    pub async fn shutdown(self) -> Result<()> {
        self.handle.shutdown().await
    }
}
