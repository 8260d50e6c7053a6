// Player catalog loading.
//
// Reads season-total CSV exports (one row per player), derives per-game
// averages and fantasy points, and wraps the result in a shared read-only
// catalog that any number of concurrent games can sample from.

use std::collections::HashSet;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{info, warn};

use crate::player::{round2, Player, PlayerStats};

/// Players with fewer games than this are dropped on import.
pub const DEFAULT_MIN_GAMES: u32 = 10;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to read file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: String, source: csv::Error },

    #[error("duplicate player id {0} in catalog")]
    DuplicateId(u64),
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Immutable, cheaply cloneable list of players.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    players: Arc<[Player]>,
}

impl Catalog {
    /// Build a catalog, rejecting duplicate ids.
    pub fn new(players: Vec<Player>) -> Result<Self, CatalogError> {
        let mut seen = HashSet::with_capacity(players.len());
        for p in &players {
            if !seen.insert(p.id) {
                return Err(CatalogError::DuplicateId(p.id));
            }
        }
        Ok(Catalog {
            players: players.into(),
        })
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Raw CSV row (season totals)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSeasonRow {
    person_id: u64,
    #[serde(default)]
    first_name: String,
    #[serde(default)]
    last_name: String,
    games_played: f64,
    points: f64,
    rebounds_total: f64,
    assists: f64,
    steals: f64,
    blocks: f64,
    turnovers: f64,
}

/// Convert a season-total row into a catalog player. Returns `None` when the
/// row is below `min_games` or carries non-finite values.
fn player_from_row(raw: RawSeasonRow, min_games: u32) -> Option<Player> {
    if !raw.games_played.is_finite() || raw.games_played < f64::from(min_games.max(1)) {
        return None;
    }
    let gp = raw.games_played;
    let stats = PlayerStats {
        ppg: round2(raw.points / gp),
        rpg: round2(raw.rebounds_total / gp),
        apg: round2(raw.assists / gp),
        spg: round2(raw.steals / gp),
        bpg: round2(raw.blocks / gp),
        topg: round2(raw.turnovers / gp),
    };
    if !stats.is_finite() {
        warn!(
            "skipping player {} ({} {}): non-finite averages",
            raw.person_id, raw.first_name, raw.last_name
        );
        return None;
    }
    Some(Player::from_stats(
        raw.person_id,
        raw.first_name.trim(),
        raw.last_name.trim(),
        gp.round() as u32,
        stats,
    ))
}

fn load_players_from_reader<R: Read>(rdr: R, min_games: u32) -> Vec<Player> {
    let mut reader = csv::Reader::from_reader(rdr);
    let mut players = Vec::new();
    for result in reader.deserialize::<RawSeasonRow>() {
        match result {
            Ok(raw) => {
                if let Some(p) = player_from_row(raw, min_games) {
                    players.push(p);
                }
            }
            Err(e) => warn!("skipping malformed catalog row: {}", e),
        }
    }
    players
}

/// Load a catalog from any reader producing season-total CSV.
pub fn load_catalog_from_reader<R: Read>(rdr: R, min_games: u32) -> Result<Catalog, CatalogError> {
    Catalog::new(load_players_from_reader(rdr, min_games))
}

/// Load a catalog from a CSV file on disk.
pub fn load_catalog(path: &Path, min_games: u32) -> Result<Catalog, CatalogError> {
    let file = std::fs::File::open(path).map_err(|e| CatalogError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let catalog = load_catalog_from_reader(file, min_games)?;
    info!(
        "Loaded {} players from {} (games_played >= {})",
        catalog.len(),
        path.display(),
        min_games
    );
    Ok(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str =
        "personId,firstName,lastName,gamesPlayed,numMinutes,points,reboundsTotal,assists,steals,blocks,turnovers\n";

    #[test]
    fn computes_averages_and_fantasy_points() {
        let csv = format!("{HEADER}1,Ann,Lee,20,600,400,200,80,20,40,60\n");
        let catalog = load_catalog_from_reader(csv.as_bytes(), DEFAULT_MIN_GAMES).unwrap();
        assert_eq!(catalog.len(), 1);
        let p = &catalog.players()[0];
        assert_eq!(p.stats.ppg, 20.0);
        assert_eq!(p.stats.rpg, 10.0);
        assert_eq!(p.stats.apg, 4.0);
        assert_eq!(p.stats.spg, 1.0);
        assert_eq!(p.stats.bpg, 2.0);
        assert_eq!(p.stats.topg, 3.0);
        assert_eq!(p.fantasy_points, 44.0);
        assert_eq!(p.games_played, 20);
    }

    #[test]
    fn drops_players_below_min_games() {
        let csv = format!(
            "{HEADER}1,Ann,Lee,9,100,90,10,10,1,1,1\n2,Bo,Kim,10,100,100,10,10,1,1,1\n"
        );
        let catalog = load_catalog_from_reader(csv.as_bytes(), 10).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.players()[0].id, 2);
    }

    #[test]
    fn skips_malformed_rows() {
        let csv = format!("{HEADER}x,Ann,Lee,20,1,1,1,1,1,1,1\n3,Cy,Ng,20,1,20,20,20,2,2,2\n");
        let catalog = load_catalog_from_reader(csv.as_bytes(), 10).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.players()[0].id, 3);
    }

    #[test]
    fn rejects_duplicate_ids() {
        let csv = format!("{HEADER}5,A,B,20,1,20,20,20,2,2,2\n5,C,D,20,1,20,20,20,2,2,2\n");
        let err = load_catalog_from_reader(csv.as_bytes(), 10).unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateId(5)));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_catalog(Path::new("/nonexistent/players.csv"), 10).unwrap_err();
        assert!(matches!(err, CatalogError::Io { .. }));
    }
}
