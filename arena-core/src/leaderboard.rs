//! Leaderboard ranking

use crate::types::{LeaderboardEntry, User};

/// Maximum rows on the leaderboard
pub const LEADERBOARD_SIZE: usize = 100;

/// Rank users by total wins.
///
/// Anonymous users and users without a recorded match are left out. The sort
/// is stable, so equal win counts keep the order of `users`.
pub fn rank_players(users: impl IntoIterator<Item = User>) -> Vec<LeaderboardEntry> {
    let mut entries: Vec<LeaderboardEntry> = users
        .into_iter()
        .filter(|u| !u.is_anonymous && u.total_matches > 0)
        .map(|u| LeaderboardEntry {
            user_id: u.id,
            display_name: u.label().to_string(),
            win_rate: u.win_rate(),
            game_alias: u.game_alias,
            total_wins: u.total_wins,
            total_matches: u.total_matches,
            rank: u.rank,
        })
        .collect();

    entries.sort_by(|a, b| b.total_wins.cmp(&a.total_wins));
    entries.truncate(LEADERBOARD_SIZE);
    entries
}
