//! Single-writer actor for every arena mutation
//!
//! All writes (user registration, match entry, deposit, profile edits and
//! catalog seeding) are executed by one Tokio task. Each message is handled
//! to completion before the next one is read:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │            HTTP handlers / library callers            │
//! └─────────────────────┬────────────────────────────────┘
//!                       │
//!                       ▼
//! ┌──────────────────────────────────────────────────────┐
//! │                ArenaHandle (Clone)                    │
//! │         Sends messages to actor mailbox               │
//! └─────────────────────┬────────────────────────────────┘
//!                       │ mpsc::channel (bounded)
//!                       ▼
//! ┌──────────────────────────────────────────────────────┐
//! │               ArenaActor (Single Task)                │
//! │   read current state → validate → StoreBatch          │
//! │                       │                               │
//! │                       ▼                               │
//! │            StoreBatch::commit() (atomic)              │
//! └───────────────────────────────────────────────────────┘
//! ```
//!
//! Because the read of a match's player count and the write that increments
//! it happen inside the same message, two entries racing for the last slot
//! are serialized and only the first one can succeed.

use crate::catalog::{Catalog, SeedOutcome};
use crate::types::{
    to_coins, DepositReceipt, JoinReceipt, MatchId, MatchStatus, NewUser, Participant,
    ProfileUpdate, Transaction, TransactionId, TransactionKind, TransactionStatus, User, UserId,
};
use crate::{Error, Result, Storage};
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// Message sent to the arena actor
#[derive(Debug)]
pub enum ArenaMessage {
    /// Create a user record
    RegisterUser {
        user: NewUser,
        response: oneshot::Sender<Result<User>>,
    },

    /// Enter a match as a paying participant
    JoinMatch {
        caller: UserId,
        match_id: MatchId,
        response: oneshot::Sender<Result<JoinReceipt>>,
    },

    /// Credit the wallet
    AddFunds {
        caller: UserId,
        amount: Decimal,
        response: oneshot::Sender<Result<DepositReceipt>>,
    },

    /// Patch display name / game alias
    UpdateProfile {
        caller: UserId,
        update: ProfileUpdate,
        response: oneshot::Sender<Result<User>>,
    },

    /// Install a catalog into an empty store
    SeedCatalog {
        catalog: Catalog,
        response: oneshot::Sender<Result<SeedOutcome>>,
    },

    /// Shutdown actor
    Shutdown,
}

/// Actor that processes arena messages
#[derive(Debug)]
pub struct ArenaActor {
    /// Storage backend
    storage: Arc<Storage>,

    /// Mailbox for incoming messages
    mailbox: mpsc::Receiver<ArenaMessage>,

    /// Last committed ledger sequence
    sequence: u64,
}

impl ArenaActor {
    /// Create new actor, resuming the ledger sequence from storage
    pub fn new(storage: Arc<Storage>, mailbox: mpsc::Receiver<ArenaMessage>) -> Result<Self> {
        let sequence = storage.last_sequence()?;
        Ok(Self {
            storage,
            mailbox,
            sequence,
        })
    }

    /// Run the actor event loop
    pub async fn run(mut self) {
        while let Some(msg) = self.mailbox.recv().await {
            match msg {
                ArenaMessage::Shutdown => break,
                msg => self.handle_message(msg),
            }
        }
        tracing::info!("Arena writer stopped");
    }

    /// Handle a single message
    fn handle_message(&mut self, msg: ArenaMessage) {
        match msg {
            ArenaMessage::RegisterUser { user, response } => {
                let _ = response.send(self.register_user(user));
            }

            ArenaMessage::JoinMatch {
                caller,
                match_id,
                response,
            } => {
                let _ = response.send(self.join_match(caller, match_id));
            }

            ArenaMessage::AddFunds {
                caller,
                amount,
                response,
            } => {
                let _ = response.send(self.add_funds(caller, amount));
            }

            ArenaMessage::UpdateProfile {
                caller,
                update,
                response,
            } => {
                let _ = response.send(self.update_profile(caller, update));
            }

            ArenaMessage::SeedCatalog { catalog, response } => {
                let _ = response.send(self.seed_catalog(catalog));
            }

            ArenaMessage::Shutdown => {
                // Handled in main loop
            }
        }
    }

    fn register_user(&mut self, new_user: NewUser) -> Result<User> {
        let user = new_user.into_user(UserId::new(), Utc::now());

        let mut batch = self.storage.batch();
        batch.put_user(&user)?;
        batch.commit()?;

        tracing::debug!(user_id = %user.id, anonymous = user.is_anonymous, "User registered");
        Ok(user)
    }

    fn join_match(&mut self, caller: UserId, match_id: MatchId) -> Result<JoinReceipt> {
        let mut m = self
            .storage
            .get_match(match_id)?
            .ok_or_else(|| Error::NotFound("Match".to_string()))?;

        if m.status != MatchStatus::Upcoming {
            return Err(Error::InvalidState(format!(
                "Cannot join a {} match",
                m.status
            )));
        }

        if m.is_full() {
            return Err(Error::Full {
                max_players: m.max_players,
            });
        }

        let mut user = self
            .storage
            .get_user(caller)?
            .ok_or_else(|| Error::NotFound("User".to_string()))?;

        if user.wallet_balance < m.entry_fee {
            return Err(Error::InsufficientFunds {
                required: m.entry_fee.to_string(),
                available: user.wallet_balance.to_string(),
            });
        }

        if self.storage.participant_exists(match_id, caller)? {
            return Err(Error::AlreadyJoined(match_id.to_string()));
        }

        user.wallet_balance = user
            .wallet_balance
            .checked_sub(m.entry_fee)
            .ok_or_else(|| Error::InvalidArgument("Entry fee out of range".to_string()))?;
        m.current_players += 1;

        let now = Utc::now();
        let sequence = self.sequence + 1;

        let tx = Transaction {
            id: TransactionId::new(),
            sequence,
            user_id: caller,
            kind: TransactionKind::MatchEntry,
            amount: -m.entry_fee,
            description: format!("Entry fee for {}", m.title),
            match_id: Some(match_id),
            status: TransactionStatus::Completed,
            created_at: now,
        };

        let mut batch = self.storage.batch();
        batch.put_user(&user)?;
        batch.append_transaction(&tx)?;
        batch.insert_participant(&Participant::new(match_id, caller, now))?;
        batch.put_match(&m)?;
        batch.commit()?;
        self.sequence = sequence;

        tracing::debug!(
            user_id = %caller,
            match_id = %match_id,
            fee = %m.entry_fee,
            players = m.current_players,
            "Match joined"
        );

        Ok(JoinReceipt {
            match_id,
            transaction_id: tx.id,
            new_balance: user.wallet_balance,
            current_players: m.current_players,
        })
    }

    fn add_funds(&mut self, caller: UserId, amount: Decimal) -> Result<DepositReceipt> {
        let amount = to_coins(amount);
        if amount <= Decimal::ZERO {
            return Err(Error::InvalidArgument("Amount must be positive".to_string()));
        }

        let mut user = self
            .storage
            .get_user(caller)?
            .ok_or_else(|| Error::NotFound("User".to_string()))?;

        user.wallet_balance = user.wallet_balance.checked_add(amount).ok_or_else(|| {
            Error::InvalidArgument(format!(
                "Deposit of {} exceeds the maximum wallet balance",
                amount
            ))
        })?;
        let sequence = self.sequence + 1;

        let tx = Transaction {
            id: TransactionId::new(),
            sequence,
            user_id: caller,
            kind: TransactionKind::Deposit,
            amount,
            description: "Wallet deposit".to_string(),
            match_id: None,
            status: TransactionStatus::Completed,
            created_at: Utc::now(),
        };

        let mut batch = self.storage.batch();
        batch.put_user(&user)?;
        batch.append_transaction(&tx)?;
        batch.commit()?;
        self.sequence = sequence;

        tracing::debug!(user_id = %caller, amount = %amount, "Deposit recorded");

        Ok(DepositReceipt {
            transaction_id: tx.id,
            new_balance: user.wallet_balance,
        })
    }

    fn update_profile(&mut self, caller: UserId, update: ProfileUpdate) -> Result<User> {
        let mut user = self
            .storage
            .get_user(caller)?
            .ok_or_else(|| Error::NotFound("User".to_string()))?;

        update.apply(&mut user);

        let mut batch = self.storage.batch();
        batch.put_user(&user)?;
        batch.commit()?;

        tracing::debug!(user_id = %caller, "Profile updated");
        Ok(user)
    }

    fn seed_catalog(&mut self, catalog: Catalog) -> Result<SeedOutcome> {
        if !self.storage.catalog_is_empty()? {
            return Ok(SeedOutcome::AlreadySeeded);
        }

        let mut batch = self.storage.batch();
        let mut position = 0u64;
        let (mut games, mut matches) = (0usize, 0usize);

        for (game, game_matches) in catalog.into_records() {
            position += 1;
            batch.insert_game(&game, position)?;
            games += 1;
            for m in &game_matches {
                position += 1;
                batch.insert_match(m, position)?;
                matches += 1;
            }
        }
        batch.commit()?;

        tracing::info!(games, matches, "Catalog seeded");
        Ok(SeedOutcome::Seeded { games, matches })
    }
}

/// Handle for sending messages to the actor
#[derive(Debug, Clone)]
pub struct ArenaHandle {
    sender: mpsc::Sender<ArenaMessage>,
}

impl ArenaHandle {
    /// Create new handle
    pub fn new(sender: mpsc::Sender<ArenaMessage>) -> Self {
        Self { sender }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<T>>) -> ArenaMessage,
    ) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(build(tx))
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Create a user record
    pub async fn register_user(&self, user: NewUser) -> Result<User> {
        self.request(|response| ArenaMessage::RegisterUser { user, response })
            .await
    }

    /// Enter a match
    pub async fn join_match(&self, caller: UserId, match_id: MatchId) -> Result<JoinReceipt> {
        self.request(|response| ArenaMessage::JoinMatch {
            caller,
            match_id,
            response,
        })
        .await
    }

    /// Credit the wallet
    pub async fn add_funds(&self, caller: UserId, amount: Decimal) -> Result<DepositReceipt> {
        self.request(|response| ArenaMessage::AddFunds {
            caller,
            amount,
            response,
        })
        .await
    }

    /// Patch the profile
    pub async fn update_profile(&self, caller: UserId, update: ProfileUpdate) -> Result<User> {
        self.request(|response| ArenaMessage::UpdateProfile {
            caller,
            update,
            response,
        })
        .await
    }

    /// Install a catalog if the store has none
    pub async fn seed_catalog(&self, catalog: Catalog) -> Result<SeedOutcome> {
        self.request(|response| ArenaMessage::SeedCatalog { catalog, response })
            .await
    }

    /// Shutdown actor
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(ArenaMessage::Shutdown)
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;
        Ok(())
    }
}

/// Spawn the arena actor
pub fn spawn_arena_actor(storage: Arc<Storage>, mailbox_capacity: usize) -> Result<ArenaHandle> {
    let (tx, rx) = mpsc::channel(mailbox_capacity);
    let actor = ArenaActor::new(storage, rx)?;

    tokio::spawn(async move {
        actor.run().await;
    });

    Ok(ArenaHandle::new(tx))
}
