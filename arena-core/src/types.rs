//! Core types for the arena
//!
//! All stored types are designed for:
//! - Deterministic serialization (bincode)
//! - Exact arithmetic (Decimal for coins)
//! - Defaults resolved once, when a record is created

use chrono::{DateTime, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Decimal places of the coin unit (smallest amount is 0.01)
pub const COIN_DECIMALS: u32 = 2;

/// Rank label of a user nobody has ranked yet
pub const UNRANKED: &str = "Unranked";

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a fresh time-ordered ID
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Wrap an existing UUID
            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// Underlying UUID
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            /// Raw key bytes
            pub fn as_bytes(&self) -> &[u8; 16] {
                self.0.as_bytes()
            }

            /// Parse from the hyphenated string form
            pub fn parse(s: &str) -> Option<Self> {
                Uuid::parse_str(s).ok().map(Self)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// User identifier
    UserId
);
id_type!(
    /// Game (catalog entry) identifier
    GameId
);
id_type!(
    /// Match identifier
    MatchId
);
id_type!(
    /// Ledger entry identifier
    TransactionId
);

/// Normalise a caller-supplied amount to the coin unit
pub fn to_coins(amount: Decimal) -> Decimal {
    amount.round_dp(COIN_DECIMALS)
}

/// Convert a floating-point amount (as sent by JSON clients) into coins
///
/// NaN and infinities have no coin representation and are rejected.
pub fn coins_from_f64(amount: f64) -> crate::Result<Decimal> {
    if !amount.is_finite() {
        return Err(crate::Error::InvalidArgument(format!(
            "Amount must be a finite number, got {}",
            amount
        )));
    }
    Decimal::from_f64(amount)
        .map(to_coins)
        .ok_or_else(|| crate::Error::InvalidArgument(format!("Amount {} is out of range", amount)))
}

/// Player account with wallet and counters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// User ID
    pub id: UserId,

    /// Name supplied by the auth provider
    pub name: Option<String>,

    /// Name chosen by the player
    pub display_name: Option<String>,

    /// In-game alias
    pub game_alias: Option<String>,

    /// Guest session without a real account
    pub is_anonymous: bool,

    /// Wallet balance in coins
    pub wallet_balance: Decimal,

    /// Matches won (maintained by settlement)
    pub total_wins: u32,

    /// Matches played (maintained by settlement)
    pub total_matches: u32,

    /// Rank label
    pub rank: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Label shown on public boards
    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .or(self.name.as_deref())
            .unwrap_or("Anonymous")
    }

    /// Win rate as a percentage, 0 when no matches are recorded
    pub fn win_rate(&self) -> f64 {
        if self.total_matches == 0 {
            0.0
        } else {
            f64::from(self.total_wins) / f64::from(self.total_matches) * 100.0
        }
    }
}

/// Data supplied when a user first signs in
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    /// Name supplied by the auth provider
    pub name: Option<String>,

    /// Guest session
    #[serde(default)]
    pub is_anonymous: bool,
}

impl NewUser {
    /// Build the stored record with every default resolved
    pub fn into_user(self, id: UserId, now: DateTime<Utc>) -> User {
        User {
            id,
            name: self.name,
            display_name: None,
            game_alias: None,
            is_anonymous: self.is_anonymous,
            wallet_balance: Decimal::ZERO,
            total_wins: 0,
            total_matches: 0,
            rank: UNRANKED.to_string(),
            created_at: now,
        }
    }
}

/// Partial profile edit; `None` leaves the field untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    /// New display name
    pub display_name: Option<String>,

    /// New in-game alias
    pub game_alias: Option<String>,
}

impl ProfileUpdate {
    /// Apply supplied fields to a user
    pub fn apply(self, user: &mut User) {
        if let Some(display_name) = self.display_name {
            user.display_name = Some(display_name);
        }
        if let Some(game_alias) = self.game_alias {
            user.game_alias = Some(game_alias);
        }
    }
}

/// Game mode in the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Game {
    /// Game ID
    pub id: GameId,
    /// Name
    pub name: String,
    /// Description
    pub description: String,
    /// Image reference
    pub image: String,
    /// Icon glyph
    pub icon: String,
    /// Listed in the catalog
    pub is_active: bool,
    /// Minimum players per match
    pub min_players: u32,
    /// Maximum players per match
    pub max_players: u32,
}

/// Match lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum MatchStatus {
    /// Open for entries
    Upcoming = 1,
    /// In progress
    Live = 2,
    /// Finished
    Completed = 3,
    /// Called off
    Cancelled = 4,
}

impl MatchStatus {
    /// Lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Upcoming => "upcoming",
            MatchStatus::Live => "live",
            MatchStatus::Completed => "completed",
            MatchStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Paid match of one game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    /// Match ID
    pub id: MatchId,
    /// Game this match belongs to
    pub game_id: GameId,
    /// Title
    pub title: String,
    /// Lifecycle status
    pub status: MatchStatus,
    /// Coins debited on entry
    pub entry_fee: Decimal,
    /// Coins paid out to winners
    pub prize_pool: Decimal,
    /// Capacity
    pub max_players: u32,
    /// Participants so far; only match entry changes it
    pub current_players: u32,
    /// Scheduled start
    pub start_time: DateTime<Utc>,
    /// Actual end
    pub end_time: Option<DateTime<Utc>>,
    /// Winner, once settled
    pub winner_id: Option<UserId>,
}

impl Match {
    /// Capacity reached
    pub fn is_full(&self) -> bool {
        self.current_players >= self.max_players
    }
}

/// Join record of a user in a match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    /// Match
    pub match_id: MatchId,
    /// User
    pub user_id: UserId,
    /// Final placement
    pub placement: Option<u32>,
    /// Kills
    pub kills: Option<u32>,
    /// Deaths
    pub deaths: Option<u32>,
    /// Score
    pub score: Option<i64>,
    /// Coins awarded
    pub reward: Option<Decimal>,
    /// Entry timestamp
    pub joined_at: DateTime<Utc>,
}

impl Participant {
    /// Fresh entry without post-match stats
    pub fn new(match_id: MatchId, user_id: UserId, joined_at: DateTime<Utc>) -> Self {
        Self {
            match_id,
            user_id,
            placement: None,
            kills: None,
            deaths: None,
            score: None,
            reward: None,
            joined_at,
        }
    }
}

/// Ledger entry kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum TransactionKind {
    /// Coins added to the wallet
    Deposit = 1,
    /// Coins taken out of the wallet
    Withdrawal = 2,
    /// Entry fee paid
    MatchEntry = 3,
    /// Prize received
    MatchReward = 4,
}

/// Ledger entry status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum TransactionStatus {
    /// Awaiting confirmation
    Pending = 1,
    /// Applied to the balance
    Completed = 2,
    /// Not applied
    Failed = 3,
}

/// Immutable ledger entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// Entry ID
    pub id: TransactionId,
    /// Global append order
    pub sequence: u64,
    /// Owner
    pub user_id: UserId,
    /// Kind
    pub kind: TransactionKind,
    /// Signed amount; negative for debits
    pub amount: Decimal,
    /// Human-readable description
    pub description: String,
    /// Related match
    pub match_id: Option<MatchId>,
    /// Status
    pub status: TransactionStatus,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Profile view returned to the owner
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    /// Stored user record
    #[serde(flatten)]
    pub user: User,

    /// Live count of participant records.
    ///
    /// Not the same as `user.total_matches`, which only settlement updates.
    pub match_history: usize,
}

/// Leaderboard row
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    /// User ID
    pub user_id: UserId,
    /// Public label
    pub display_name: String,
    /// In-game alias
    pub game_alias: Option<String>,
    /// Matches won
    pub total_wins: u32,
    /// Matches played
    pub total_matches: u32,
    /// Win percentage
    pub win_rate: f64,
    /// Rank label
    pub rank: String,
}

/// Participant together with its user record
#[derive(Debug, Clone, Serialize)]
pub struct ParticipantView {
    /// Join record
    #[serde(flatten)]
    pub participant: Participant,
    /// User, if the record still resolves
    pub user: Option<User>,
}

/// Outcome of a successful match entry
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinReceipt {
    /// Match joined
    pub match_id: MatchId,
    /// Ledger entry of the fee
    pub transaction_id: TransactionId,
    /// Balance after the fee
    pub new_balance: Decimal,
    /// Player count after joining
    pub current_players: u32,
}

/// Outcome of a successful deposit
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositReceipt {
    /// Ledger entry of the deposit
    pub transaction_id: TransactionId,
    /// Balance after the deposit
    pub new_balance: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(wins: u32, matches: u32) -> User {
        let mut user = NewUser::default().into_user(UserId::new(), Utc::now());
        user.total_wins = wins;
        user.total_matches = matches;
        user
    }

    #[test]
    fn test_new_user_defaults() {
        let user = NewUser {
            name: Some("Steve".into()),
            is_anonymous: false,
        }
        .into_user(UserId::new(), Utc::now());

        assert_eq!(user.wallet_balance, Decimal::ZERO);
        assert_eq!(user.total_wins, 0);
        assert_eq!(user.total_matches, 0);
        assert_eq!(user.rank, UNRANKED);
        assert_eq!(user.label(), "Steve");
    }

    #[test]
    fn test_label_fallbacks() {
        let mut user = user(0, 0);
        assert_eq!(user.label(), "Anonymous");

        user.name = Some("auth-name".into());
        assert_eq!(user.label(), "auth-name");

        user.display_name = Some("Builder".into());
        assert_eq!(user.label(), "Builder");
    }

    #[test]
    fn test_win_rate() {
        assert_eq!(user(0, 0).win_rate(), 0.0);
        assert_eq!(user(3, 4).win_rate(), 75.0);
        assert_eq!(user(10, 10).win_rate(), 100.0);
    }

    #[test]
    fn test_profile_update_is_partial() {
        let mut user = user(0, 0);
        user.display_name = Some("Old".into());
        user.game_alias = Some("old_alias".into());

        ProfileUpdate {
            display_name: None,
            game_alias: Some("new_alias".into()),
        }
        .apply(&mut user);

        assert_eq!(user.display_name.as_deref(), Some("Old"));
        assert_eq!(user.game_alias.as_deref(), Some("new_alias"));
    }

    #[test]
    fn test_coins_from_f64() {
        assert_eq!(coins_from_f64(0.01).unwrap(), Decimal::new(1, 2));
        assert_eq!(coins_from_f64(500.0).unwrap(), Decimal::from(500));
        assert!(coins_from_f64(f64::NAN).is_err());
        assert!(coins_from_f64(f64::INFINITY).is_err());
        assert!(coins_from_f64(f64::NEG_INFINITY).is_err());
    }

    #[test]
    fn test_id_parse() {
        let id = MatchId::new();
        assert_eq!(MatchId::parse(&id.to_string()), Some(id));
        assert_eq!(MatchId::parse("not-a-uuid"), None);
    }

    #[test]
    fn test_match_status_serde() {
        let json = serde_json::to_string(&MatchStatus::Upcoming).unwrap();
        assert_eq!(json, "\"upcoming\"");
        assert_eq!(MatchStatus::Cancelled.to_string(), "cancelled");
    }
}
