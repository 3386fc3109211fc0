//! Property-based tests for wallet invariants
//!
//! These tests use proptest to verify:
//! - Balance equals the sum of the user's ledger entries after any sequence
//!   of deposits and match entries
//! - A match never holds more participants than its capacity
//! - Non-positive and non-finite deposits are rejected without a write
//! - Deposits that would push a balance past `Decimal::MAX` are rejected
//!   with a typed error and leave the wallet usable

use arena_core::{
    catalog::{GameSeed, MatchSeed},
    types::coins_from_f64,
    Arena, Catalog, Config, Error, MatchId, MatchStatus, NewUser, UserId,
};
use proptest::prelude::*;
use rust_decimal::Decimal;

#[derive(Debug, Clone)]
enum Op {
    Deposit { player: usize, cents: i64 },
    Join { player: usize, slot: usize },
}

const PLAYERS: usize = 3;
const MATCHES: usize = 4;

/// Largest integer coin amount a `Decimal` can hold (2^96 - 1)
const MAX_MANTISSA: i128 = (1 << 96) - 1;

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..PLAYERS, 1i64..20_000).prop_map(|(player, cents)| Op::Deposit { player, cents }),
        (0..PLAYERS, 0..MATCHES).prop_map(|(player, slot)| Op::Join { player, slot }),
    ]
}

/// Whole-coin amounts spread over the full `Decimal` range
fn large_amount_strategy() -> impl Strategy<Value = Decimal> {
    prop_oneof![
        (1i128..=MAX_MANTISSA).prop_map(|n| Decimal::from_i128_with_scale(n, 0)),
        (MAX_MANTISSA / 2..=MAX_MANTISSA).prop_map(|n| Decimal::from_i128_with_scale(n, 0)),
    ]
}

async fn create_test_arena() -> (Arena, tempfile::TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.data_dir = temp_dir.path().to_path_buf();
    config.rocksdb.sync_writes = false; // Skip fsync for tests
    (Arena::open(config).await.unwrap(), temp_dir)
}

/// Seed matches with fees 25, 50, 75, 100 and capacities 1, 2, 3, 4
async fn seed_matches(arena: &Arena) -> Vec<MatchId> {
    let matches = (1..=MATCHES as u32)
        .map(|i| MatchSeed {
            title: format!("Round {}", i),
            status: MatchStatus::Upcoming,
            entry_fee: Decimal::from(25 * i),
            prize_pool: Decimal::from(250 * i),
            max_players: i,
            start_time: chrono::Utc::now(),
        })
        .collect();
    arena
        .seed_catalog(Catalog {
            games: vec![GameSeed {
                name: "Skywars".to_string(),
                description: String::new(),
                image: String::new(),
                icon: String::new(),
                is_active: true,
                min_players: 1,
                max_players: 12,
                matches,
            }],
        })
        .await
        .unwrap();

    let game = arena.list_games().unwrap().remove(0);
    let mut matches = arena.list_matches_by_game(game.id).unwrap();
    matches.sort_by_key(|m| m.max_players);
    matches.into_iter().map(|m| m.id).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Property: stored balance always equals the ledger sum and the model
    #[test]
    fn prop_balance_matches_ledger(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let (arena, _temp) = create_test_arena().await;
            let match_ids = seed_matches(&arena).await;

            let mut players: Vec<UserId> = Vec::new();
            for _ in 0..PLAYERS {
                players.push(arena.register_user(NewUser::default()).await.unwrap().id);
            }
            let mut expected = [Decimal::ZERO; PLAYERS];

            for op in ops {
                match op {
                    Op::Deposit { player, cents } => {
                        let amount = Decimal::new(cents, 2);
                        let receipt = arena.add_funds(Some(players[player]), amount).await.unwrap();
                        expected[player] += amount;
                        assert_eq!(receipt.new_balance, expected[player]);
                    }
                    Op::Join { player, slot } => {
                        let fee = Decimal::from(25 * (slot as u32 + 1));
                        match arena.join_match(Some(players[player]), match_ids[slot]).await {
                            Ok(receipt) => {
                                expected[player] -= fee;
                                assert_eq!(receipt.new_balance, expected[player]);
                            }
                            Err(Error::Full { .. })
                            | Err(Error::InsufficientFunds { .. })
                            | Err(Error::AlreadyJoined(_)) => {}
                            Err(e) => panic!("unexpected rejection: {}", e),
                        }
                    }
                }
            }

            for (i, player) in players.iter().enumerate() {
                assert!(arena.check_balance_consistency(*player).unwrap());
                assert_eq!(arena.get_balance(Some(*player)).unwrap(), Some(expected[i]));
                assert!(expected[i] >= Decimal::ZERO);
            }
            for id in &match_ids {
                assert!(arena.check_player_count(*id).unwrap());
                let m = arena.get_match(*id).unwrap().unwrap();
                assert!(m.current_players <= m.max_players);
            }

            arena.shutdown().await.unwrap();
        });
    }

    /// Property: every positive whole-cent amount is credited exactly
    #[test]
    fn prop_positive_amounts_accepted(cents in 1i64..100_000_000i64) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let (arena, _temp) = create_test_arena().await;
            let user = arena.register_user(NewUser::default()).await.unwrap();

            let amount = Decimal::new(cents, 2);
            let receipt = arena.add_funds(Some(user.id), amount).await.unwrap();
            assert_eq!(receipt.new_balance, amount);

            arena.shutdown().await.unwrap();
        });
    }

    /// Property: non-positive amounts are rejected and nothing is written
    #[test]
    fn prop_non_positive_amounts_rejected(cents in -100_000_000i64..=0i64) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let (arena, _temp) = create_test_arena().await;
            let user = arena.register_user(NewUser::default()).await.unwrap();

            let result = arena.add_funds(Some(user.id), Decimal::new(cents, 2)).await;
            assert!(matches!(result, Err(Error::InvalidArgument(_))));
            assert!(arena.get_transactions(Some(user.id)).unwrap().is_empty());
            assert_eq!(arena.get_balance(Some(user.id)).unwrap(), Some(Decimal::ZERO));

            arena.shutdown().await.unwrap();
        });
    }

    /// Property: deposits near the numeric ceiling never take the writer down
    #[test]
    fn prop_balance_ceiling_is_a_typed_rejection(
        amounts in prop::collection::vec(large_amount_strategy(), 1..8)
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let (arena, _temp) = create_test_arena().await;
            let user = arena.register_user(NewUser::default()).await.unwrap();
            let mut expected = Decimal::ZERO;

            for amount in amounts {
                let result = arena.add_funds(Some(user.id), amount).await;
                match expected.checked_add(amount) {
                    Some(total) => {
                        assert_eq!(result.unwrap().new_balance, total);
                        expected = total;
                    }
                    None => {
                        assert!(matches!(result, Err(Error::InvalidArgument(_))));
                        assert_eq!(arena.get_balance(Some(user.id)).unwrap(), Some(expected));
                    }
                }
            }

            // Writer still serves other callers
            let other = arena.register_user(NewUser::default()).await.unwrap();
            let receipt = arena.add_funds(Some(other.id), Decimal::ONE).await.unwrap();
            assert_eq!(receipt.new_balance, Decimal::ONE);
            assert!(arena.check_balance_consistency(user.id).unwrap());

            arena.shutdown().await.unwrap();
        });
    }

    /// Property: JSON amounts convert to at most two decimal places
    #[test]
    fn prop_float_amounts_rounded_to_cents(amount in -1.0e9f64..1.0e9f64) {
        let coins = coins_from_f64(amount).unwrap();
        assert!(coins.scale() <= 2);
    }
}

#[test]
fn test_non_finite_amounts_rejected() {
    for amount in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
        assert!(matches!(coins_from_f64(amount), Err(Error::InvalidArgument(_))));
    }
}
