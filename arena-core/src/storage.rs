//! Storage layer using RocksDB
//!
//! # Column Families
//!
//! - `users` - User records (key: user_id)
//! - `games` - Catalog entries (key: game_id)
//! - `matches` - Matches (key: match_id)
//! - `participants` - Join records (key: match_id || user_id)
//! - `transactions` - Append-only ledger entries (key: transaction_id)
//! - `indices` - Secondary indices, tagged by a leading byte
//! - `meta` - Counters (transaction sequence)
//!
//! Every mutation goes through a [`StoreBatch`] so that a balance change and
//! its ledger entry are committed together or not at all.

use crate::{
    error::{Error, Result},
    types::{Game, GameId, Match, MatchId, Participant, Transaction, TransactionId, User, UserId},
    Config,
};
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, Direction, IteratorMode, Options, WriteBatch,
    WriteOptions, DB,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

/// Column family names
const CF_USERS: &str = "users";
const CF_GAMES: &str = "games";
const CF_MATCHES: &str = "matches";
const CF_PARTICIPANTS: &str = "participants";
const CF_TRANSACTIONS: &str = "transactions";
const CF_INDICES: &str = "indices";
const CF_META: &str = "meta";

/// Index tags (first byte of every key in `indices`)
const IDX_GAME_ORDER: u8 = b'g';
const IDX_GAME_MATCH: u8 = b'm';
const IDX_USER_TX: u8 = b't';
const IDX_USER_MATCH: u8 = b'p';

/// Meta keys
const META_TX_SEQUENCE: &[u8] = b"tx_sequence";

/// Storage wrapper for RocksDB
pub struct Storage {
    db: Arc<DB>,
    sync_writes: bool,
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("path", &self.db.path())
            .field("sync_writes", &self.sync_writes)
            .finish()
    }
}

impl Storage {
    /// Open or create database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;

        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);

        if config.rocksdb.enable_statistics {
            db_opts.enable_statistics();
        }

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_USERS, Self::cf_options_records()),
            ColumnFamilyDescriptor::new(CF_GAMES, Self::cf_options_records()),
            ColumnFamilyDescriptor::new(CF_MATCHES, Self::cf_options_records()),
            ColumnFamilyDescriptor::new(CF_PARTICIPANTS, Self::cf_options_lookup()),
            ColumnFamilyDescriptor::new(CF_TRANSACTIONS, Self::cf_options_ledger()),
            ColumnFamilyDescriptor::new(CF_INDICES, Self::cf_options_lookup()),
            ColumnFamilyDescriptor::new(CF_META, Options::default()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        tracing::info!(path = ?path, "Opened arena store");

        Ok(Self {
            db: Arc::new(db),
            sync_writes: config.rocksdb.sync_writes,
        })
    }

    // Column family options

    fn cf_options_records() -> Options {
        let mut opts = Options::default();
        // Records are read on every operation, use LZ4 for speed
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn cf_options_ledger() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
        opts.set_bottommost_compression_type(rocksdb::DBCompressionType::Zstd);
        opts
    }

    fn cf_options_lookup() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        // Point lookups on (match, user) benefit from bloom filters
        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        opts.set_block_based_table_factory(&block_opts);
        opts
    }

    // Helpers

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", name)))
    }

    fn get_record<T: DeserializeOwned>(&self, cf: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf_handle(cf)?;
        match self.db.get_cf(cf, key)? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    fn scan_records<T: DeserializeOwned>(&self, cf: &str) -> Result<Vec<T>> {
        let cf = self.cf_handle(cf)?;
        let mut records = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_, value) = item?;
            records.push(bincode::deserialize(&value)?);
        }
        Ok(records)
    }

    /// Keys in `indices` starting with `prefix`, in key order or reversed
    fn index_keys(&self, prefix: &[u8], newest_first: bool, limit: usize) -> Result<Vec<Box<[u8]>>> {
        let cf = self.cf_handle(CF_INDICES)?;

        let upper = {
            let mut key = prefix.to_vec();
            key.extend_from_slice(&[0xFF; 32]);
            key
        };
        let mode = if newest_first {
            IteratorMode::From(upper.as_slice(), Direction::Reverse)
        } else {
            IteratorMode::From(prefix, Direction::Forward)
        };

        let mut keys = Vec::new();
        for item in self.db.iterator_cf(cf, mode) {
            let (key, _) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            keys.push(key);
            if keys.len() >= limit {
                break;
            }
        }
        Ok(keys)
    }

    // Users

    /// Get user by ID
    pub fn get_user(&self, id: UserId) -> Result<Option<User>> {
        self.get_record(CF_USERS, id.as_bytes())
    }

    /// All users in key order
    pub fn scan_users(&self) -> Result<Vec<User>> {
        self.scan_records(CF_USERS)
    }

    // Catalog

    /// Get game by ID
    pub fn get_game(&self, id: GameId) -> Result<Option<Game>> {
        self.get_record(CF_GAMES, id.as_bytes())
    }

    /// True when no game has ever been stored
    pub fn catalog_is_empty(&self) -> Result<bool> {
        let cf = self.cf_handle(CF_GAMES)?;
        match self.db.iterator_cf(cf, IteratorMode::Start).next() {
            Some(item) => {
                item?;
                Ok(false)
            }
            None => Ok(true),
        }
    }

    /// Games in insertion order
    pub fn list_games(&self) -> Result<Vec<Game>> {
        let keys = self.index_keys(&[IDX_GAME_ORDER], false, usize::MAX)?;
        let mut games = Vec::with_capacity(keys.len());
        for key in keys {
            let id = GameId::from_uuid(uuid_at(&key, 9)?);
            if let Some(game) = self.get_game(id)? {
                games.push(game);
            }
        }
        Ok(games)
    }

    /// Get match by ID
    pub fn get_match(&self, id: MatchId) -> Result<Option<Match>> {
        self.get_record(CF_MATCHES, id.as_bytes())
    }

    /// Matches of a game, newest first
    pub fn list_matches_by_game(&self, game_id: GameId) -> Result<Vec<Match>> {
        let prefix = index_key(IDX_GAME_MATCH, game_id.as_bytes(), &[]);
        let keys = self.index_keys(&prefix, true, usize::MAX)?;
        let mut matches = Vec::with_capacity(keys.len());
        for key in keys {
            // tag(1) || game_id(16) || sequence(8) || match_id(16)
            let id = MatchId::from_uuid(uuid_at(&key, 25)?);
            if let Some(m) = self.get_match(id)? {
                matches.push(m);
            }
        }
        Ok(matches)
    }

    // Participants

    /// Whether (match, user) already has a join record
    pub fn participant_exists(&self, match_id: MatchId, user_id: UserId) -> Result<bool> {
        let cf = self.cf_handle(CF_PARTICIPANTS)?;
        Ok(self
            .db
            .get_pinned_cf(cf, participant_key(match_id, user_id))?
            .is_some())
    }

    /// All join records of a match
    pub fn list_participants(&self, match_id: MatchId) -> Result<Vec<Participant>> {
        let cf = self.cf_handle(CF_PARTICIPANTS)?;
        let prefix = &match_id.as_bytes()[..];
        let mut participants = Vec::new();
        for item in self
            .db
            .iterator_cf(cf, IteratorMode::From(prefix, Direction::Forward))
        {
            let (key, value) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            participants.push(bincode::deserialize(&value)?);
        }
        Ok(participants)
    }

    /// Number of matches a user has joined
    pub fn count_user_participations(&self, user_id: UserId) -> Result<usize> {
        let prefix = index_key(IDX_USER_MATCH, user_id.as_bytes(), &[]);
        Ok(self.index_keys(&prefix, false, usize::MAX)?.len())
    }

    // Ledger

    /// Get ledger entry by ID
    pub fn get_transaction(&self, id: TransactionId) -> Result<Option<Transaction>> {
        self.get_record(CF_TRANSACTIONS, id.as_bytes())
    }

    /// A user's ledger entries, newest first
    pub fn list_user_transactions(&self, user_id: UserId, limit: usize) -> Result<Vec<Transaction>> {
        let prefix = index_key(IDX_USER_TX, user_id.as_bytes(), &[]);
        let keys = self.index_keys(&prefix, true, limit)?;
        let mut transactions = Vec::with_capacity(keys.len());
        for key in keys {
            // tag(1) || user_id(16) || sequence(8) || tx_id(16)
            let id = TransactionId::from_uuid(uuid_at(&key, 25)?);
            let tx = self
                .get_transaction(id)?
                .ok_or_else(|| Error::Storage(format!("Dangling ledger index for {}", id)))?;
            transactions.push(tx);
        }
        Ok(transactions)
    }

    /// Last committed transaction sequence (0 when the ledger is empty)
    pub fn last_sequence(&self) -> Result<u64> {
        let cf = self.cf_handle(CF_META)?;
        match self.db.get_cf(cf, META_TX_SEQUENCE)? {
            Some(value) => {
                let bytes: [u8; 8] = value
                    .as_slice()
                    .try_into()
                    .map_err(|_| Error::Storage("Corrupt transaction sequence".to_string()))?;
                Ok(u64::from_be_bytes(bytes))
            }
            None => Ok(0),
        }
    }

    // Batch operations (atomic)

    /// Start an atomic write set
    pub fn batch(&self) -> StoreBatch<'_> {
        StoreBatch {
            storage: self,
            batch: WriteBatch::default(),
        }
    }

    /// Get storage statistics
    pub fn get_stats(&self) -> Result<StorageStats> {
        Ok(StorageStats {
            total_users: self.approximate_count(CF_USERS)?,
            total_matches: self.approximate_count(CF_MATCHES)?,
            total_transactions: self.approximate_count(CF_TRANSACTIONS)?,
        })
    }

    fn approximate_count(&self, cf: &str) -> Result<u64> {
        let cf = self.cf_handle(cf)?;
        Ok(self
            .db
            .property_int_value_cf(cf, "rocksdb.estimate-num-keys")?
            .unwrap_or(0))
    }
}

/// Atomic write set over several column families
///
/// Nothing is visible to readers until [`StoreBatch::commit`] succeeds.
pub struct StoreBatch<'a> {
    storage: &'a Storage,
    batch: WriteBatch,
}

impl std::fmt::Debug for StoreBatch<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreBatch")
            .field("len", &self.batch.len())
            .finish()
    }
}

impl StoreBatch<'_> {
    fn put<T: Serialize>(&mut self, cf: &str, key: &[u8], record: &T) -> Result<()> {
        let cf = self.storage.cf_handle(cf)?;
        let value = bincode::serialize(record)?;
        self.batch.put_cf(cf, key, value);
        Ok(())
    }

    fn put_index(&mut self, key: &[u8]) -> Result<()> {
        let cf = self.storage.cf_handle(CF_INDICES)?;
        self.batch.put_cf(cf, key, b"");
        Ok(())
    }

    /// Insert or replace a user
    pub fn put_user(&mut self, user: &User) -> Result<()> {
        self.put(CF_USERS, user.id.as_bytes(), user)
    }

    /// Insert a game; `sequence` fixes its catalog position
    pub fn insert_game(&mut self, game: &Game, sequence: u64) -> Result<()> {
        self.put(CF_GAMES, game.id.as_bytes(), game)?;
        self.put_index(&index_key(
            IDX_GAME_ORDER,
            &sequence.to_be_bytes(),
            game.id.as_bytes(),
        ))
    }

    /// Insert a match; `sequence` fixes its position in the game's listing
    pub fn insert_match(&mut self, m: &Match, sequence: u64) -> Result<()> {
        self.put(CF_MATCHES, m.id.as_bytes(), m)?;
        let mut suffix = sequence.to_be_bytes().to_vec();
        suffix.extend_from_slice(m.id.as_bytes());
        self.put_index(&index_key(IDX_GAME_MATCH, m.game_id.as_bytes(), &suffix))
    }

    /// Replace an existing match
    pub fn put_match(&mut self, m: &Match) -> Result<()> {
        self.put(CF_MATCHES, m.id.as_bytes(), m)
    }

    /// Insert a join record
    pub fn insert_participant(&mut self, participant: &Participant) -> Result<()> {
        self.put(
            CF_PARTICIPANTS,
            &participant_key(participant.match_id, participant.user_id),
            participant,
        )?;
        self.put_index(&index_key(
            IDX_USER_MATCH,
            participant.user_id.as_bytes(),
            participant.match_id.as_bytes(),
        ))
    }

    /// Append a ledger entry and advance the stored sequence to its number
    pub fn append_transaction(&mut self, tx: &Transaction) -> Result<()> {
        self.put(CF_TRANSACTIONS, tx.id.as_bytes(), tx)?;

        let mut suffix = tx.sequence.to_be_bytes().to_vec();
        suffix.extend_from_slice(tx.id.as_bytes());
        self.put_index(&index_key(IDX_USER_TX, tx.user_id.as_bytes(), &suffix))?;

        let cf_meta = self.storage.cf_handle(CF_META)?;
        self.batch
            .put_cf(cf_meta, META_TX_SEQUENCE, tx.sequence.to_be_bytes());
        Ok(())
    }

    /// Atomic commit
    pub fn commit(self) -> Result<()> {
        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(self.storage.sync_writes);
        self.storage.db.write_opt(self.batch, &write_opts)?;
        Ok(())
    }
}

// Key helpers

fn index_key(tag: u8, head: &[u8], tail: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + head.len() + tail.len());
    key.push(tag);
    key.extend_from_slice(head);
    key.extend_from_slice(tail);
    key
}

fn participant_key(match_id: MatchId, user_id: UserId) -> [u8; 32] {
    let mut key = [0u8; 32];
    key[..16].copy_from_slice(match_id.as_bytes());
    key[16..].copy_from_slice(user_id.as_bytes());
    key
}

fn uuid_at(key: &[u8], offset: usize) -> Result<uuid::Uuid> {
    key.get(offset..offset + 16)
        .and_then(|bytes| uuid::Uuid::from_slice(bytes).ok())
        .ok_or_else(|| Error::Storage("Malformed index key".to_string()))
}

/// Storage statistics
#[derive(Debug, Clone)]
pub struct StorageStats {
    /// Estimated user count
    pub total_users: u64,
    /// Estimated match count
    pub total_matches: u64,
    /// Estimated ledger entries
    pub total_transactions: u64,
}
