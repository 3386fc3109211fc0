//! End-to-end wallet and match-entry flows against the standard catalog

use arena_core::{
    Arena, Catalog, Config, Error, Match, MatchStatus, NewUser, ProfileUpdate, SeedOutcome,
    TransactionKind, UserId,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::task::JoinSet;

async fn create_seeded_arena() -> (Arena, tempfile::TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.data_dir = temp_dir.path().to_path_buf();
    config.rocksdb.sync_writes = false;

    let arena = Arena::open(config).await.unwrap();
    let outcome = arena
        .seed_catalog(Catalog::standard(chrono::Utc::now()))
        .await
        .unwrap();
    assert_eq!(outcome, SeedOutcome::Seeded { games: 4, matches: 4 });
    (arena, temp_dir)
}

fn find_match(arena: &Arena, title: &str) -> Match {
    arena
        .list_games()
        .unwrap()
        .into_iter()
        .flat_map(|g| arena.list_matches_by_game(g.id).unwrap())
        .find(|m| m.title == title)
        .unwrap()
}

async fn player(arena: &Arena, name: &str, coins: i64) -> UserId {
    let user = arena
        .register_user(NewUser {
            name: Some(name.to_string()),
            is_anonymous: false,
        })
        .await
        .unwrap();
    if coins > 0 {
        arena
            .add_funds(Some(user.id), Decimal::from(coins))
            .await
            .unwrap();
    }
    user.id
}

#[tokio::test]
async fn test_standard_catalog_is_browsable() {
    let (arena, _temp) = create_seeded_arena().await;

    let games = arena.list_games().unwrap();
    let names: Vec<&str> = games.iter().map(|g| g.name.as_str()).collect();
    assert_eq!(names, vec!["Bedwars", "Skywars", "UHC", "Build Battle"]);

    let build_battle = &games[3];
    assert!(arena.list_matches_by_game(build_battle.id).unwrap().is_empty());
    assert_eq!(arena.get_game(build_battle.id).unwrap().as_ref(), Some(build_battle));

    let bedwars = arena.list_matches_by_game(games[0].id).unwrap();
    assert_eq!(bedwars.len(), 2);
    assert!(bedwars.iter().all(|m| m.current_players == 0));

    // Seeding twice is a no-op
    let again = arena
        .seed_catalog(Catalog::standard(chrono::Utc::now()))
        .await
        .unwrap();
    assert_eq!(again, SeedOutcome::AlreadySeeded);
    assert_eq!(arena.list_games().unwrap().len(), 4);

    arena.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_deposit_join_and_history() {
    let (arena, _temp) = create_seeded_arena().await;
    let solo = find_match(&arena, "Bedwars Solo Championship");
    let steve = player(&arena, "Steve", 0).await;

    let deposit = arena
        .add_funds(Some(steve), Decimal::from(500))
        .await
        .unwrap();
    assert_eq!(deposit.new_balance, Decimal::from(500));

    let receipt = arena.join_match(Some(steve), solo.id).await.unwrap();
    assert_eq!(receipt.new_balance, Decimal::from(400));
    assert_eq!(receipt.current_players, 1);

    let history = arena.get_transactions(Some(steve)).unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].kind, TransactionKind::MatchEntry);
    assert_eq!(history[0].amount, Decimal::from(-100));
    assert_eq!(history[1].kind, TransactionKind::Deposit);
    assert_eq!(history[1].id, deposit.transaction_id);

    let participants = arena.get_participants(solo.id).unwrap();
    assert_eq!(participants.len(), 1);
    assert_eq!(participants[0].participant.user_id, steve);
    assert_eq!(participants[0].user.as_ref().unwrap().label(), "Steve");

    assert!(arena.check_balance_consistency(steve).unwrap());
    assert!(arena.check_player_count(solo.id).unwrap());
    arena.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_double_join_charges_once() {
    let (arena, _temp) = create_seeded_arena().await;
    let uhc = find_match(&arena, "UHC Survival Challenge");
    let alex = player(&arena, "Alex", 1000).await;

    arena.join_match(Some(alex), uhc.id).await.unwrap();
    let err = arena.join_match(Some(alex), uhc.id).await.unwrap_err();
    assert!(matches!(err, Error::AlreadyJoined(_)));

    assert_eq!(arena.get_balance(Some(alex)).unwrap(), Some(Decimal::from(800)));
    assert_eq!(arena.get_transactions(Some(alex)).unwrap().len(), 2);
    assert_eq!(arena.get_match(uhc.id).unwrap().unwrap().current_players, 1);
    assert_eq!(arena.get_profile(Some(alex)).unwrap().unwrap().match_history, 1);
    arena.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_live_match_rejects_entry() {
    let (arena, _temp) = create_seeded_arena().await;
    let team = find_match(&arena, "Bedwars Team Battle");
    assert_eq!(team.status, MatchStatus::Live);
    let herobrine = player(&arena, "Herobrine", 100).await;

    let err = arena.join_match(Some(herobrine), team.id).await.unwrap_err();
    assert!(matches!(err, Error::InvalidState(_)));
    assert_eq!(
        arena.get_balance(Some(herobrine)).unwrap(),
        Some(Decimal::from(100))
    );
    arena.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_many_players_race_for_capacity() {
    let (arena, _temp) = create_seeded_arena().await;
    let skywars = find_match(&arena, "Skywars Mega Tournament");

    let mut players = Vec::new();
    for i in 0..20 {
        players.push(player(&arena, &format!("p{}", i), 75).await);
    }

    let arena = Arc::new(arena);
    let mut set = JoinSet::new();
    for p in players.iter().copied() {
        let arena = arena.clone();
        let match_id = skywars.id;
        set.spawn(async move { arena.join_match(Some(p), match_id).await });
    }
    let mut results = Vec::new();
    while let Some(joined) = set.join_next().await {
        results.push(joined.unwrap());
    }

    let joined = results.iter().filter(|r| r.is_ok()).count();
    let full = results
        .iter()
        .filter(|r| matches!(r, Err(Error::Full { .. })))
        .count();
    assert_eq!(joined, skywars.max_players as usize);
    assert_eq!(joined + full, players.len());

    assert_eq!(
        arena.get_match(skywars.id).unwrap().unwrap().current_players,
        skywars.max_players
    );
    assert!(arena.check_player_count(skywars.id).unwrap());
    for p in &players {
        assert!(arena.check_balance_consistency(*p).unwrap());
    }
    Arc::try_unwrap(arena).unwrap().shutdown().await.unwrap();
}

#[tokio::test]
async fn test_profile_and_leaderboard_views() {
    let (arena, _temp) = create_seeded_arena().await;
    let steve = player(&arena, "Steve", 0).await;

    arena
        .update_profile(
            Some(steve),
            ProfileUpdate {
                display_name: Some("Steve the Builder".to_string()),
                game_alias: None,
            },
        )
        .await
        .unwrap();

    let profile = arena.get_profile(Some(steve)).unwrap().unwrap();
    assert_eq!(profile.user.label(), "Steve the Builder");
    assert_eq!(profile.match_history, 0);

    // No recorded matches yet, so nobody is ranked
    assert!(arena.top_players().unwrap().is_empty());
    arena.shutdown().await.unwrap();
}
