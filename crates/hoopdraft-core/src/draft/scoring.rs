// Roster scoring.
//
// A roster's score is the sum of fantasy points over its best `depth` picks.
// Extra picks (blocking drafts) never count.

use serde::{Deserialize, Serialize};

use super::pick::DraftedPick;
use super::state::Seat;

/// The `depth` best picks, ranked by fantasy points descending. Ties go to
/// the pick with the earlier `order_index`.
pub fn top_picks(roster: &[DraftedPick], depth: usize) -> Vec<&DraftedPick> {
    let mut ranked: Vec<&DraftedPick> = roster.iter().collect();
    ranked.sort_by(|a, b| {
        b.fantasy_points
            .total_cmp(&a.fantasy_points)
            .then_with(|| a.order_index.cmp(&b.order_index))
    });
    ranked.truncate(depth);
    ranked
}

/// Sum of fantasy points over the `depth` best picks.
pub fn score(roster: &[DraftedPick], depth: usize) -> f64 {
    top_picks(roster, depth)
        .iter()
        .map(|p| p.fantasy_points)
        .sum()
}

/// Final scores for both seats.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scoreboard {
    pub bot1: f64,
    pub bot2: f64,
}

impl Scoreboard {
    pub fn get(&self, seat: Seat) -> f64 {
        match seat {
            Seat::Bot1 => self.bot1,
            Seat::Bot2 => self.bot2,
        }
    }

    /// The seat with the strictly higher score; `None` on a tie.
    pub fn winner(&self) -> Option<Seat> {
        if self.bot1 > self.bot2 {
            Some(Seat::Bot1)
        } else if self.bot2 > self.bot1 {
            Some(Seat::Bot2)
        } else {
            None
        }
    }

    /// The higher score and its seat, bot1 on a tie.
    pub fn best(&self) -> (Seat, f64) {
        if self.bot2 > self.bot1 {
            (Seat::Bot2, self.bot2)
        } else {
            (Seat::Bot1, self.bot1)
        }
    }
}
