// A drafted player on a bot's roster.

use serde::{Deserialize, Serialize};

use crate::player::{Player, PlayerId};

/// A single concluded auction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftedPick {
    pub player_id: PlayerId,
    pub player_name: String,
    pub fantasy_points: f64,
    /// Final leading bid paid for the player.
    pub price: u32,
    /// Game-wide draft order, 1-indexed. Shared by both rosters.
    pub order_index: u32,
}

impl DraftedPick {
    pub fn new(player: &Player, price: u32, order_index: u32) -> Self {
        DraftedPick {
            player_id: player.id,
            player_name: player.full_name(),
            fantasy_points: player.fantasy_points,
            price,
            order_index,
        }
    }
}
