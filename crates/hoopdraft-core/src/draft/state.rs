// Per-game state: seats, sessions, the active negotiation, the aggregate root.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::ledger::BudgetLedger;
use super::pick::DraftedPick;
use super::pool::PlayerPool;
use super::scoring;
use crate::player::PlayerId;

/// One of the two bidding seats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Seat {
    Bot1,
    Bot2,
}

impl Seat {
    pub fn other(self) -> Seat {
        match self {
            Seat::Bot1 => Seat::Bot2,
            Seat::Bot2 => Seat::Bot1,
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Seat::Bot1 => 0,
            Seat::Bot2 => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Seat::Bot1 => "bot1",
            Seat::Bot2 => "bot2",
        }
    }
}

impl fmt::Display for Seat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A bot as stored by the bot record provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotProfile {
    pub id: String,
    pub name: String,
    /// Free-text strategy. Passed to the advisor untouched.
    pub strategy: String,
}

/// One bidding participant for the duration of a game. The balance lives in
/// the [`BudgetLedger`]; the session carries identity and roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotSession {
    pub bot: BotProfile,
    pub roster: Vec<DraftedPick>,
}

impl BotSession {
    pub fn new(bot: BotProfile) -> Self {
        BotSession {
            bot,
            roster: Vec::new(),
        }
    }

    /// Score of this roster counting only the `depth` best picks.
    pub fn score(&self, depth: usize) -> f64 {
        scoring::score(&self.roster, depth)
    }
}

/// The round in progress for one nominated player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NegotiationState {
    /// Index into the pool.
    pub pool_index: usize,
    pub player_id: PlayerId,
    pub nominator: Seat,
    pub leading_bid: u32,
    pub leading_bidder: Seat,
    /// Seat whose turn it is to respond.
    pub responder: Seat,
}

impl NegotiationState {
    pub(crate) fn open(pool_index: usize, player_id: PlayerId, nominator: Seat, bid: u32) -> Self {
        NegotiationState {
            pool_index,
            player_id,
            nominator,
            leading_bid: bid,
            leading_bidder: nominator,
            responder: nominator.other(),
        }
    }

    /// The responder raises: it leads and the other seat responds next.
    pub(crate) fn counter(&mut self, amount: u32) {
        self.leading_bid = amount;
        self.leading_bidder = self.responder;
        self.responder = self.responder.other();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    InProgress,
    Complete,
    Cancelled,
    Error,
}

impl GameStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, GameStatus::InProgress)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GameStatus::InProgress => "in_progress",
            GameStatus::Complete => "complete",
            GameStatus::Cancelled => "cancelled",
            GameStatus::Error => "error",
        }
    }
}

/// The aggregate root, owned by exactly one engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    pub pool: PlayerPool,
    pub ledger: BudgetLedger,
    sessions: [BotSession; 2],
    pub negotiation: Option<NegotiationState>,
    pub status: GameStatus,
    /// Picks concluded so far across both seats.
    pub picks_made: u32,
}

impl GameState {
    pub fn new(pool: PlayerPool, bot1: BotProfile, bot2: BotProfile, starting_budget: u32) -> Self {
        GameState {
            pool,
            ledger: BudgetLedger::new(starting_budget),
            sessions: [BotSession::new(bot1), BotSession::new(bot2)],
            negotiation: None,
            status: GameStatus::InProgress,
            picks_made: 0,
        }
    }

    pub fn session(&self, seat: Seat) -> &BotSession {
        &self.sessions[seat.index()]
    }

    pub(crate) fn session_mut(&mut self, seat: Seat) -> &mut BotSession {
        &mut self.sessions[seat.index()]
    }

    pub fn balance(&self, seat: Seat) -> u32 {
        self.ledger.balance(seat)
    }

    pub fn name(&self, seat: Seat) -> &str {
        &self.session(seat).bot.name
    }

    pub fn into_sessions(self) -> [BotSession; 2] {
        self.sessions
    }
}
