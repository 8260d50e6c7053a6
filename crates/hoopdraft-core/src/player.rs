// Player catalog entity and the fantasy point formula.

use serde::{Deserialize, Serialize};

/// Catalog identifier of a player.
pub type PlayerId = u64;

/// Per-game statistical averages for a player.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PlayerStats {
    pub ppg: f64,
    pub rpg: f64,
    pub apg: f64,
    pub spg: f64,
    pub bpg: f64,
    pub topg: f64,
}

impl PlayerStats {
    /// Fantasy points for these averages.
    ///
    /// Points 1x, rebounds 1.2x, assists 1.5x, steals 3x, blocks 3x,
    /// turnovers -1x.
    pub fn fantasy_points(&self) -> f64 {
        self.ppg + self.rpg * 1.2 + self.apg * 1.5 + self.spg * 3.0 + self.bpg * 3.0
            - self.topg
    }

    /// Whether every average is a finite number.
    pub fn is_finite(&self) -> bool {
        [self.ppg, self.rpg, self.apg, self.spg, self.bpg, self.topg]
            .iter()
            .all(|v| v.is_finite())
    }
}

/// An immutable catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub first_name: String,
    pub last_name: String,
    pub games_played: u32,
    pub stats: PlayerStats,
    /// The single value used for tiering, ranking and scoring.
    pub fantasy_points: f64,
}

impl Player {
    /// Build a player whose `fantasy_points` is derived from `stats`,
    /// rounded to two decimals.
    pub fn from_stats(
        id: PlayerId,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        games_played: u32,
        stats: PlayerStats,
    ) -> Self {
        Player {
            id,
            first_name: first_name.into(),
            last_name: last_name.into(),
            games_played,
            fantasy_points: round2(stats.fantasy_points()),
            stats,
        }
    }

    /// "First Last" display name.
    pub fn full_name(&self) -> String {
        match (self.first_name.is_empty(), self.last_name.is_empty()) {
            (false, false) => format!("{} {}", self.first_name, self.last_name),
            (true, _) => self.last_name.clone(),
            (_, true) => self.first_name.clone(),
        }
    }
}

/// Round to two decimal places.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fantasy_points_formula() {
        let stats = PlayerStats {
            ppg: 20.0,
            rpg: 10.0,
            apg: 4.0,
            spg: 1.0,
            bpg: 2.0,
            topg: 3.0,
        };
        // 20 + 12 + 6 + 3 + 6 - 3
        assert!((stats.fantasy_points() - 44.0).abs() < 1e-9);
    }

    #[test]
    fn from_stats_rounds_to_two_decimals() {
        let stats = PlayerStats {
            ppg: 10.333,
            ..Default::default()
        };
        let p = Player::from_stats(7, "Ann", "Lee", 40, stats);
        assert_eq!(p.fantasy_points, 10.33);
    }

    #[test]
    fn full_name_handles_missing_parts() {
        let mut p = Player::from_stats(1, "Ann", "Lee", 10, PlayerStats::default());
        assert_eq!(p.full_name(), "Ann Lee");
        p.first_name.clear();
        assert_eq!(p.full_name(), "Lee");
    }

    #[test]
    fn non_finite_stats_detected() {
        let stats = PlayerStats {
            apg: f64::NAN,
            ..Default::default()
        };
        assert!(!stats.is_finite());
        assert!(PlayerStats::default().is_finite());
    }
}
