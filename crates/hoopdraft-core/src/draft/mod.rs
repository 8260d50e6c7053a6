// Draft domain: pool, ledger, picks, per-game state and scoring.

pub mod ledger;
pub mod pick;
pub mod pool;
pub mod scoring;
pub mod state;

use thiserror::Error;

use crate::player::PlayerId;

use self::ledger::LedgerError;
use self::state::Seat;

/// A broken engine invariant. Bad advisor input never produces one of
/// these; it is turned into a fallback first. Seeing one aborts the game.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum InvariantViolation {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("player {player_id} already drafted by {by}")]
    DoubleDraft { player_id: PlayerId, by: Seat },

    #[error("pool has no entry at index {0}")]
    UnknownPoolEntry(usize),

    #[error("nomination requested with no undrafted player left")]
    NothingToNominate,
}
