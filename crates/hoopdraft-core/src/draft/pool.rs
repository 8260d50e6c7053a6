// Contested player pool and its stratified sampler.
//
// The catalog is ranked by fantasy points, cut into four tiers at fixed
// percentile boundaries, and a fixed quota is drawn from each tier without
// replacement. The drawn players are shuffled into presentation order.

use std::collections::HashSet;
use std::fmt;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::state::Seat;
use super::InvariantViolation;
use crate::player::{Player, PlayerId};
use crate::rules::{TierFractions, TierQuotas};

/// Number of players contested in one game.
pub const POOL_SIZE: usize = 12;

// ---------------------------------------------------------------------------
// Tier
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Elite,
    Good,
    Mid,
    Role,
}

impl Tier {
    /// Tiers from best to worst.
    pub const ALL: [Tier; 4] = [Tier::Elite, Tier::Good, Tier::Mid, Tier::Role];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Elite => "elite",
            Tier::Good => "good",
            Tier::Mid => "mid",
            Tier::Role => "role",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SamplingError {
    #[error("insufficient catalog: {available} candidates for {}, need {required}", scope_label(.tier))]
    InsufficientCatalog {
        /// `None` when the catalog as a whole is too small.
        tier: Option<Tier>,
        available: usize,
        required: usize,
    },

    #[error("invalid pool: {0}")]
    InvalidPool(String),
}

fn scope_label(tier: &Option<Tier>) -> String {
    match tier {
        Some(t) => format!("tier {t}"),
        None => "the pool".to_string(),
    }
}

// ---------------------------------------------------------------------------
// Pool
// ---------------------------------------------------------------------------

/// A pool entry: the player, its tier, and who drafted it (if anyone).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolEntry {
    pub player: Player,
    pub tier: Tier,
    pub drafted_by: Option<Seat>,
}

impl PoolEntry {
    pub fn is_drafted(&self) -> bool {
        self.drafted_by.is_some()
    }
}

/// Exactly [`POOL_SIZE`] distinct players in presentation order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerPool {
    entries: Vec<PoolEntry>,
}

impl PlayerPool {
    /// Build a pool from explicit entries (replays, fixed test pools).
    /// All entries start undrafted.
    pub fn from_entries(entries: Vec<(Player, Tier)>) -> Result<Self, SamplingError> {
        if entries.len() != POOL_SIZE {
            return Err(SamplingError::InvalidPool(format!(
                "expected {POOL_SIZE} players, got {}",
                entries.len()
            )));
        }
        let mut seen = HashSet::new();
        for (p, _) in &entries {
            if !seen.insert(p.id) {
                return Err(SamplingError::InvalidPool(format!(
                    "player {} appears twice",
                    p.id
                )));
            }
        }
        Ok(PlayerPool {
            entries: entries
                .into_iter()
                .map(|(player, tier)| PoolEntry {
                    player,
                    tier,
                    drafted_by: None,
                })
                .collect(),
        })
    }

    pub fn entries(&self) -> &[PoolEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&PoolEntry> {
        self.entries.get(idx)
    }

    /// Index of the entry for `player_id`, if it is in the pool.
    pub fn index_of(&self, player_id: PlayerId) -> Option<usize> {
        self.entries.iter().position(|e| e.player.id == player_id)
    }

    /// Undrafted entries with their pool index, in presentation order.
    pub fn undrafted(&self) -> impl Iterator<Item = (usize, &PoolEntry)> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| !e.is_drafted())
    }

    /// The lowest-indexed undrafted entry.
    pub fn first_undrafted(&self) -> Option<usize> {
        self.undrafted().next().map(|(idx, _)| idx)
    }

    pub fn remaining(&self) -> usize {
        self.undrafted().count()
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    /// Mark the entry at `idx` as drafted by `seat`.
    pub fn mark_drafted(&mut self, idx: usize, seat: Seat) -> Result<&Player, InvariantViolation> {
        let entry = self
            .entries
            .get_mut(idx)
            .ok_or(InvariantViolation::UnknownPoolEntry(idx))?;
        if let Some(by) = entry.drafted_by {
            return Err(InvariantViolation::DoubleDraft {
                player_id: entry.player.id,
                by,
            });
        }
        entry.drafted_by = Some(seat);
        Ok(&entry.player)
    }
}

// ---------------------------------------------------------------------------
// Sampler
// ---------------------------------------------------------------------------

/// Split `ranked` (sorted best-first) into four contiguous tier slices.
fn tier_bounds(len: usize, fractions: &TierFractions) -> [(usize, usize); 4] {
    let mut bounds = [(0, 0); 4];
    let mut start = 0;
    let mut cumulative = 0.0;
    for (i, tier) in Tier::ALL.iter().enumerate() {
        cumulative += fractions.get(*tier);
        let end = if i == Tier::ALL.len() - 1 {
            len
        } else {
            ((len as f64 * cumulative).round() as usize).clamp(start, len)
        };
        bounds[i] = (start, end);
        start = end;
    }
    bounds
}

/// Draw a pool from `catalog`.
///
/// The same `seed` and catalog always give the same pool. Without a seed the
/// generator is seeded from OS entropy.
pub fn sample_pool(
    catalog: &[Player],
    quotas: &TierQuotas,
    fractions: &TierFractions,
    seed: Option<u64>,
) -> Result<PlayerPool, SamplingError> {
    if catalog.len() < POOL_SIZE {
        return Err(SamplingError::InsufficientCatalog {
            tier: None,
            available: catalog.len(),
            required: POOL_SIZE,
        });
    }

    // Rank best-first; ties broken by id so the ranking is total.
    let mut ranked: Vec<&Player> = catalog.iter().collect();
    ranked.sort_by(|a, b| {
        b.fantasy_points
            .total_cmp(&a.fantasy_points)
            .then_with(|| a.id.cmp(&b.id))
    });

    let mut rng = match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };

    let bounds = tier_bounds(ranked.len(), fractions);
    let mut drawn: Vec<(Player, Tier)> = Vec::with_capacity(quotas.total());
    for (tier, (start, end)) in Tier::ALL.iter().zip(bounds) {
        let candidates = &ranked[start..end];
        let quota = quotas.get(*tier);
        if candidates.len() < quota {
            return Err(SamplingError::InsufficientCatalog {
                tier: Some(*tier),
                available: candidates.len(),
                required: quota,
            });
        }
        debug!(
            "tier {}: drawing {} of {} candidates",
            tier,
            quota,
            candidates.len()
        );
        drawn.extend(
            candidates
                .choose_multiple(&mut rng, quota)
                .map(|p| ((*p).clone(), *tier)),
        );
    }

    drawn.shuffle(&mut rng);
    PlayerPool::from_entries(drawn)
}
