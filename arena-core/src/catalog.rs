//! Game catalog seeding
//!
//! Seeding is an explicit setup routine guarded by an emptiness check: it
//! populates games and matches only when the store holds no game at all.

use crate::types::{Game, GameId, Match, MatchId, MatchStatus};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Games and matches to install into an empty store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    /// Games, in listing order
    pub games: Vec<GameSeed>,
}

/// One game with its initial matches
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSeed {
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
    /// Matches of this game, oldest first
    pub matches: Vec<MatchSeed>,
}

/// Initial match of a seeded game
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchSeed {
    /// Title
    pub title: String,
    /// Lifecycle status
    pub status: MatchStatus,
    /// Coins debited on entry
    pub entry_fee: Decimal,
    /// Prize pool
    pub prize_pool: Decimal,
    /// Capacity
    pub max_players: u32,
    /// Scheduled start
    pub start_time: DateTime<Utc>,
}

/// Result of a seed request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SeedOutcome {
    /// Catalog installed
    Seeded {
        /// Games inserted
        games: usize,
        /// Matches inserted
        matches: usize,
    },
    /// A game already existed; nothing written
    AlreadySeeded,
}

impl Catalog {
    /// The standard block-game catalog, with start times relative to `now`
    pub fn standard(now: DateTime<Utc>) -> Self {
        let hour = Duration::hours(1);

        Self {
            games: vec![
                GameSeed {
                    name: "Bedwars".to_string(),
                    description: "Protect your bed and destroy enemy beds to win!".to_string(),
                    image: "https://images.unsplash.com/photo-1538481199705-c710c4e965fc?w=800&q=80"
                        .to_string(),
                    icon: "🛏️".to_string(),
                    is_active: true,
                    min_players: 2,
                    max_players: 16,
                    matches: vec![
                        MatchSeed {
                            title: "Bedwars Solo Championship".to_string(),
                            status: MatchStatus::Upcoming,
                            entry_fee: Decimal::from(100),
                            prize_pool: Decimal::from(1500),
                            max_players: 16,
                            start_time: now + hour,
                        },
                        MatchSeed {
                            title: "Bedwars Team Battle".to_string(),
                            status: MatchStatus::Live,
                            entry_fee: Decimal::from(50),
                            prize_pool: Decimal::from(800),
                            max_players: 16,
                            start_time: now - Duration::minutes(30),
                        },
                    ],
                },
                GameSeed {
                    name: "Skywars".to_string(),
                    description: "Battle on floating islands in the sky!".to_string(),
                    image: "https://images.unsplash.com/photo-1511512578047-dfb367046420?w=800&q=80"
                        .to_string(),
                    icon: "☁️".to_string(),
                    is_active: true,
                    min_players: 2,
                    max_players: 12,
                    matches: vec![MatchSeed {
                        title: "Skywars Mega Tournament".to_string(),
                        status: MatchStatus::Upcoming,
                        entry_fee: Decimal::from(75),
                        prize_pool: Decimal::from(1000),
                        max_players: 12,
                        start_time: now + hour * 2,
                    }],
                },
                GameSeed {
                    name: "UHC".to_string(),
                    description: "Ultra Hardcore survival mode - no regeneration!".to_string(),
                    image: "https://images.unsplash.com/photo-1542751371-adc38448a05e?w=800&q=80"
                        .to_string(),
                    icon: "⚔️".to_string(),
                    is_active: true,
                    min_players: 2,
                    max_players: 100,
                    matches: vec![MatchSeed {
                        title: "UHC Survival Challenge".to_string(),
                        status: MatchStatus::Upcoming,
                        entry_fee: Decimal::from(200),
                        prize_pool: Decimal::from(5000),
                        max_players: 100,
                        start_time: now + hour * 3,
                    }],
                },
                GameSeed {
                    name: "Build Battle".to_string(),
                    description: "Show off your building skills!".to_string(),
                    image: "https://images.unsplash.com/photo-1493711662062-fa541adb3fc8?w=800&q=80"
                        .to_string(),
                    icon: "🏗️".to_string(),
                    is_active: true,
                    min_players: 2,
                    max_players: 8,
                    matches: vec![],
                },
            ],
        }
    }

    /// Number of matches across all games
    pub fn match_count(&self) -> usize {
        self.games.iter().map(|g| g.matches.len()).sum()
    }

    /// Materialise stored records, assigning fresh IDs.
    ///
    /// Matches start with no players; entries only come from match entry.
    pub fn into_records(self) -> Vec<(Game, Vec<Match>)> {
        self.games
            .into_iter()
            .map(|seed| {
                let game = Game {
                    id: GameId::new(),
                    name: seed.name,
                    description: seed.description,
                    image: seed.image,
                    icon: seed.icon,
                    is_active: seed.is_active,
                    min_players: seed.min_players,
                    max_players: seed.max_players,
                };
                let matches = seed
                    .matches
                    .into_iter()
                    .map(|m| Match {
                        id: MatchId::new(),
                        game_id: game.id,
                        title: m.title,
                        status: m.status,
                        entry_fee: m.entry_fee,
                        prize_pool: m.prize_pool,
                        max_players: m.max_players,
                        current_players: 0,
                        start_time: m.start_time,
                        end_time: None,
                        winner_id: None,
                    })
                    .collect();
                (game, matches)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_catalog_shape() {
        let catalog = Catalog::standard(Utc::now());
        let names: Vec<&str> = catalog.games.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["Bedwars", "Skywars", "UHC", "Build Battle"]);
        assert_eq!(catalog.match_count(), 4);
    }

    #[test]
    fn test_records_link_matches_to_games() {
        let records = Catalog::standard(Utc::now()).into_records();
        for (game, matches) in &records {
            assert!(matches.iter().all(|m| m.game_id == game.id));
            assert!(matches.iter().all(|m| m.current_players == 0));
        }
        let live = records
            .iter()
            .flat_map(|(_, matches)| matches)
            .filter(|m| m.status == MatchStatus::Live)
            .count();
        assert_eq!(live, 1);
    }
}
