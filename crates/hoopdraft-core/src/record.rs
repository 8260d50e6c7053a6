// Finished-game record and the collaborator traits the engine's callers
// persist through.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::draft::pick::DraftedPick;
use crate::draft::pool::PoolEntry;
use crate::draft::scoring::Scoreboard;
use crate::draft::state::{BotProfile, GameStatus, Seat};
use crate::events::GameEvent;

/// One seat's outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotResult {
    pub seat: Seat,
    pub bot: BotProfile,
    pub final_balance: u32,
    pub roster: Vec<DraftedPick>,
    /// Present only for completed games.
    pub score: Option<f64>,
}

/// Immutable record of one game, handed to the persistence sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    pub seed: Option<u64>,
    pub status: GameStatus,
    pub bot1: BotResult,
    pub bot2: BotResult,
    pub winner: Option<Seat>,
    pub pool: Vec<PoolEntry>,
    pub events: Vec<GameEvent>,
    pub log: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl GameRecord {
    pub fn bot(&self, seat: Seat) -> &BotResult {
        match seat {
            Seat::Bot1 => &self.bot1,
            Seat::Bot2 => &self.bot2,
        }
    }

    /// Final scores, if the game completed.
    pub fn scoreboard(&self) -> Option<Scoreboard> {
        Some(Scoreboard {
            bot1: self.bot1.score?,
            bot2: self.bot2.score?,
        })
    }

    /// The leaderboard candidate for this game: the higher-scoring bot,
    /// bot1 on a tie. `None` unless the game completed.
    pub fn leaderboard_entry(&self) -> Option<LeaderboardEntry> {
        if self.status != GameStatus::Complete {
            return None;
        }
        let (seat, score) = self.scoreboard()?.best();
        let bot = &self.bot(seat).bot;
        Some(LeaderboardEntry {
            bot_id: bot.id.clone(),
            bot_name: bot.name.clone(),
            score,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub bot_id: String,
    pub bot_name: String,
    pub score: f64,
}

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// Read-only bot lookup.
pub trait BotDirectory {
    fn bot(&self, id: &str) -> anyhow::Result<Option<BotProfile>>;
}

/// Storage for finished games and the global leaderboard.
pub trait GameRecordSink {
    /// Store a finished record. Returns the stored game's id.
    fn save_game(&self, record: &GameRecord) -> anyhow::Result<i64>;

    /// Insert a leaderboard row and trim the board to its configured size.
    fn record_leaderboard(&self, game_id: i64, entry: &LeaderboardEntry) -> anyhow::Result<()>;
}
