// Auction negotiation engine.
//
// One engine owns one game. The loop is strictly sequential: each round a
// seat nominates, the seats trade counters until one concedes, the winner
// is charged and the player moves to its roster. Nomination rights flip
// after every round and every skip. The only suspension point is the
// advisor call, which races the cancellation signal.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::advisor::{
    AdvisorClient, DecisionKind, DecisionRequest, FallbackRule, Nomination, PoolView, Response,
    SeatView, StrategyAdvisor, Verdict,
};
use crate::catalog::Catalog;
use crate::draft::ledger::LedgerError;
use crate::draft::pick::DraftedPick;
use crate::draft::pool::{sample_pool, PlayerPool, SamplingError};
use crate::draft::scoring::Scoreboard;
use crate::draft::state::{BotProfile, BotSession, GameState, GameStatus, NegotiationState, Seat};
use crate::draft::InvariantViolation;
use crate::events::{Concession, EventHub, EventKind, EventPublisher, SkipReason};
use crate::record::{BotResult, GameRecord};
use crate::rules::{RulesConfig, RulesError};

/// Consecutive skips after which no further progress is possible.
const MAX_CONSECUTIVE_SKIPS: u8 = 2;

const ROUND_SEPARATOR: &str = "---";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Game creation failures. Nothing has been mutated when one is returned.
#[derive(Debug, Error, PartialEq)]
pub enum SetupError {
    #[error(transparent)]
    Rules(#[from] RulesError),

    #[error(transparent)]
    Sampling(#[from] SamplingError),

    #[error("invalid strategy for {seat}: {reason}")]
    InvalidStrategy { seat: Seat, reason: String },
}

/// Why the negotiation loop stopped early.
enum Halt {
    Cancelled(String),
    Violation(InvariantViolation),
}

impl From<InvariantViolation> for Halt {
    fn from(v: InvariantViolation) -> Self {
        Halt::Violation(v)
    }
}

impl From<LedgerError> for Halt {
    fn from(e: LedgerError) -> Self {
        Halt::Violation(e.into())
    }
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

/// Cancels a running game from outside the engine. The first reason wins.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<Option<String>>>,
}

impl CancelHandle {
    pub fn cancel(&self, reason: impl Into<String>) {
        let reason = reason.into();
        self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(reason);
            true
        });
    }

    pub fn is_cancelled(&self) -> bool {
        self.tx.borrow().is_some()
    }
}

/// Resolves with the cancellation reason. Never resolves if the handle is
/// gone without cancelling.
async fn cancelled(rx: &mut watch::Receiver<Option<String>>) -> String {
    let reason = match rx.wait_for(|r| r.is_some()).await {
        Ok(r) => Some((*r).clone().unwrap_or_default()),
        Err(_) => None,
    };
    match reason {
        Some(reason) => reason,
        None => std::future::pending().await,
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct AuctionEngine<A> {
    state: GameState,
    rules: RulesConfig,
    advisor: AdvisorClient<A>,
    publisher: EventPublisher,
    cancel: CancelHandle,
    cancel_rx: watch::Receiver<Option<String>>,
    seed: Option<u64>,
    /// Seat holding nomination rights for the next round.
    nominator: Seat,
    consecutive_skips: u8,
    scores: Option<Scoreboard>,
    started_at: DateTime<Utc>,
}

fn check_strategy(seat: Seat, bot: &BotProfile, rules: &RulesConfig) -> Result<(), SetupError> {
    let reason = if bot.strategy.trim().is_empty() {
        "strategy text is empty".to_string()
    } else if bot.strategy.chars().count() > rules.max_strategy_chars {
        format!("strategy text exceeds {} characters", rules.max_strategy_chars)
    } else {
        return Ok(());
    };
    Err(SetupError::InvalidStrategy { seat, reason })
}

impl<A: StrategyAdvisor> AuctionEngine<A> {
    /// Create a game, sampling its pool from `catalog`.
    pub fn new(
        catalog: &Catalog,
        bot1: BotProfile,
        bot2: BotProfile,
        advisor: A,
        rules: RulesConfig,
        seed: Option<u64>,
    ) -> Result<Self, SetupError> {
        rules.validate()?;
        check_strategy(Seat::Bot1, &bot1, &rules)?;
        check_strategy(Seat::Bot2, &bot2, &rules)?;
        let pool = sample_pool(catalog.players(), &rules.quotas, &rules.tier_fractions, seed)?;
        Ok(Self::assemble(pool, bot1, bot2, advisor, rules, seed))
    }

    /// Create a game over an explicit pool.
    pub fn with_pool(
        pool: PlayerPool,
        bot1: BotProfile,
        bot2: BotProfile,
        advisor: A,
        rules: RulesConfig,
    ) -> Result<Self, SetupError> {
        rules.validate()?;
        check_strategy(Seat::Bot1, &bot1, &rules)?;
        check_strategy(Seat::Bot2, &bot2, &rules)?;
        Ok(Self::assemble(pool, bot1, bot2, advisor, rules, None))
    }

    fn assemble(
        pool: PlayerPool,
        bot1: BotProfile,
        bot2: BotProfile,
        advisor: A,
        rules: RulesConfig,
        seed: Option<u64>,
    ) -> Self {
        let (tx, cancel_rx) = watch::channel(None);
        AuctionEngine {
            state: GameState::new(pool, bot1, bot2, rules.starting_budget),
            advisor: AdvisorClient::new(advisor, &rules.advisor),
            publisher: EventPublisher::new(rules.event_buffer),
            rules,
            cancel: CancelHandle { tx: Arc::new(tx) },
            cancel_rx,
            seed,
            nominator: Seat::Bot1,
            consecutive_skips: 0,
            scores: None,
            started_at: Utc::now(),
        }
    }

    /// Attach point for live consumers.
    pub fn hub(&self) -> EventHub {
        self.publisher.hub()
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// Play the game to a terminal status and return its record.
    pub async fn run(mut self) -> GameRecord {
        self.started_at = Utc::now();
        info!(
            "game started: {} ({}) vs {} ({}), seed {:?}",
            self.state.name(Seat::Bot1),
            self.state.session(Seat::Bot1).bot.id,
            self.state.name(Seat::Bot2),
            self.state.session(Seat::Bot2).bot.id,
            self.seed
        );
        self.publisher.log(format!(
            "Game started! {} goes first.",
            self.state.name(self.nominator)
        ));
        self.publisher.log(ROUND_SEPARATOR);

        match self.drive().await {
            Ok(()) => self.finish_complete(),
            Err(Halt::Cancelled(reason)) => self.finish_cancelled(reason),
            Err(Halt::Violation(violation)) => self.finish_error(violation),
        }
        self.into_record()
    }

    async fn drive(&mut self) -> Result<(), Halt> {
        loop {
            let pending_cancel = self.cancel_rx.borrow().clone();
            if let Some(reason) = pending_cancel {
                return Err(Halt::Cancelled(reason));
            }
            if self.state.pool.is_exhausted() {
                debug!("pool exhausted after {} picks", self.state.picks_made);
                return Ok(());
            }
            if self.consecutive_skips >= MAX_CONSECUTIVE_SKIPS {
                self.publisher
                    .log("Neither bot can nominate. The draft ends early.");
                return Ok(());
            }

            let seat = self.nominator;
            self.play_round(seat).await?;
            self.nominator = seat.other();
        }
    }

    async fn play_round(&mut self, seat: Seat) -> Result<(), Halt> {
        let name = self.state.name(seat).to_string();
        if self.state.balance(seat) == 0 && !self.rules.allow_free_nominations {
            debug!("{} skips: no credits", seat);
            self.publisher
                .log(format!("{name} has no credits and passes the nomination."));
            self.publisher.publish(EventKind::Skip {
                bot: seat,
                reason: SkipReason::NoCredits,
            });
            self.consecutive_skips += 1;
            return Ok(());
        }
        self.consecutive_skips = 0;

        let nomination = self.nominate(seat).await?;
        let mut negotiation =
            NegotiationState::open(nomination.pool_index, nomination.player_id, seat, nomination.bid);
        self.state.negotiation = Some(negotiation.clone());

        let concession = loop {
            let responder = negotiation.responder;
            if self.state.balance(responder) <= negotiation.leading_bid {
                break Concession::NoFunds;
            }
            match self.respond(responder).await? {
                Response::Accept => break Concession::Accepted,
                Response::Fold => break Concession::Folded,
                Response::Counter(amount) => {
                    negotiation.counter(amount);
                    self.state.negotiation = Some(negotiation.clone());
                }
            }
        };

        self.conclude(negotiation, concession)
    }

    /// Ask `seat` to open a round, falling back when the advisor fails.
    async fn nominate(&mut self, seat: Seat) -> Result<Nomination, Halt> {
        let request = self.request(seat, DecisionKind::Nominate);
        let verdict = {
            let mut rx = self.cancel_rx.clone();
            tokio::select! {
                biased;
                reason = cancelled(&mut rx) => return Err(Halt::Cancelled(reason)),
                verdict = self.advisor.nominate(&request) => verdict,
            }
        };

        let name = self.state.name(seat).to_string();
        let (nomination, reasoning) = match verdict {
            Verdict::Decided {
                value, reasoning, ..
            } => (value, reasoning),
            Verdict::Failed { cause, attempts } => {
                let pool_index = self
                    .state
                    .pool
                    .first_undrafted()
                    .ok_or(InvariantViolation::NothingToNominate)?;
                let player_id = request.pool[pool_index].player.id;
                let bid = request.min_bid;
                warn!(
                    "{} nomination fell back after {} attempt(s): {}",
                    seat, attempts, cause
                );
                self.publisher
                    .log(format!("{name} could not decide ({cause}). Using the default nomination."));
                self.publisher.publish(EventKind::Fallback {
                    bot: seat,
                    decision: DecisionKind::Nominate,
                    rule: FallbackRule::LowestUndrafted { player_id, bid },
                    cause,
                });
                (
                    Nomination {
                        pool_index,
                        player_id,
                        bid,
                    },
                    None,
                )
            }
        };

        let player = &request.pool[nomination.pool_index].player;
        self.publisher.log(format!(
            "{name} bids {} credits for {} (Fantasy: {})",
            nomination.bid,
            player.full_name(),
            player.fantasy_points
        ));
        self.narrate_reasoning(&name, reasoning);
        Ok(nomination)
    }

    /// Ask `seat` to answer the leading bid. Falls back to a fold.
    async fn respond(&mut self, seat: Seat) -> Result<Response, Halt> {
        let request = self.request(seat, DecisionKind::Respond);
        let verdict = {
            let mut rx = self.cancel_rx.clone();
            tokio::select! {
                biased;
                reason = cancelled(&mut rx) => return Err(Halt::Cancelled(reason)),
                verdict = self.advisor.respond(&request) => verdict,
            }
        };

        let name = self.state.name(seat).to_string();
        match verdict {
            Verdict::Decided {
                value, reasoning, ..
            } => {
                if let Response::Counter(amount) = value {
                    self.publisher
                        .log(format!("{name} counters with {amount} credits"));
                }
                self.narrate_reasoning(&name, reasoning);
                Ok(value)
            }
            Verdict::Failed { cause, attempts } => {
                warn!(
                    "{} response fell back to fold after {} attempt(s): {}",
                    seat, attempts, cause
                );
                self.publisher
                    .log(format!("{name} could not decide ({cause}). Auto-folding."));
                self.publisher.publish(EventKind::Fallback {
                    bot: seat,
                    decision: DecisionKind::Respond,
                    rule: FallbackRule::Fold,
                    cause,
                });
                Ok(Response::Fold)
            }
        }
    }

    fn narrate_reasoning(&mut self, name: &str, reasoning: Option<String>) {
        if let Some(text) = reasoning.filter(|t| !t.trim().is_empty()) {
            self.publisher.log(format!("  {name} thinking: {}", text.trim()));
        }
    }

    /// Concede the round to the leading bidder.
    fn conclude(
        &mut self,
        negotiation: NegotiationState,
        concession: Concession,
    ) -> Result<(), Halt> {
        let winner = negotiation.leading_bidder;
        let price = negotiation.leading_bid;

        self.state.ledger.charge(winner, price)?;
        let player = self
            .state
            .pool
            .mark_drafted(negotiation.pool_index, winner)?
            .clone();
        self.state.picks_made += 1;
        let pick = DraftedPick::new(&player, price, self.state.picks_made);
        self.state.session_mut(winner).roster.push(pick.clone());
        self.state.negotiation = None;

        let responder = self.state.name(negotiation.responder).to_string();
        let winner_name = self.state.name(winner).to_string();
        let verb = match concession {
            Concession::Accepted => "accepts",
            Concession::Folded => "folds",
            Concession::NoFunds => "has no credits",
        };
        self.publisher.log(format!(
            "{responder} {verb}. {winner_name} wins {} for {price}!",
            player.full_name()
        ));

        let bot1_balance = self.state.balance(Seat::Bot1);
        let bot2_balance = self.state.balance(Seat::Bot2);
        debug!(
            "pick {}: {} to {} for {} ({:?})",
            self.state.picks_made, player.id, winner, price, concession
        );
        self.publisher.publish(EventKind::Draft {
            bot: winner,
            pick,
            concession,
            bot1_balance,
            bot2_balance,
        });
        self.publisher.log(format!(
            "  Balances: {}={}, {}={}",
            self.state.name(Seat::Bot1),
            bot1_balance,
            self.state.name(Seat::Bot2),
            bot2_balance
        ));
        self.publisher.log(ROUND_SEPARATOR);
        Ok(())
    }

    fn request(&self, seat: Seat, kind: DecisionKind) -> DecisionRequest {
        let negotiation = match kind {
            DecisionKind::Respond => self.state.negotiation.clone(),
            DecisionKind::Nominate => None,
        };
        let min_bid = match &negotiation {
            Some(n) => n.leading_bid + 1,
            None if self.state.balance(seat) == 0 => 0,
            None => 1,
        };
        DecisionRequest {
            kind,
            strategy: self.state.session(seat).bot.strategy.clone(),
            me: self.seat_view(seat),
            opponent: self.seat_view(seat.other()),
            pool: self
                .state
                .pool
                .entries()
                .iter()
                .map(|e| PoolView {
                    player: e.player.clone(),
                    tier: e.tier,
                    drafted: e.is_drafted(),
                })
                .collect(),
            negotiation,
            min_bid,
            scored_roster_size: self.rules.scored_roster_size,
        }
    }

    fn seat_view(&self, seat: Seat) -> SeatView {
        let session = self.state.session(seat);
        SeatView {
            seat,
            name: session.bot.name.clone(),
            balance: self.state.balance(seat),
            roster: session.roster.clone(),
        }
    }

    // -- terminal transitions --

    fn finish_complete(&mut self) {
        let depth = self.rules.scored_roster_size;
        let board = Scoreboard {
            bot1: self.state.session(Seat::Bot1).score(depth),
            bot2: self.state.session(Seat::Bot2).score(depth),
        };
        self.state.status = GameStatus::Complete;
        self.scores = Some(board);

        self.publisher.log("=== GAME COMPLETE ===");
        for seat in [Seat::Bot1, Seat::Bot2] {
            let line = format!(
                "{}: {} players drafted, Top {} score: {:.1}",
                self.state.name(seat),
                self.state.session(seat).roster.len(),
                depth,
                board.get(seat)
            );
            self.publisher.log(line);
        }
        let winner = board.winner();
        let line = match winner {
            Some(seat) => format!("Winner: {}", self.state.name(seat)),
            None => "Winner: Tie!".to_string(),
        };
        self.publisher.log(line);

        info!(
            "game complete: {:.1} vs {:.1}, winner {:?}",
            board.bot1, board.bot2, winner
        );
        let log = self.publisher.narration().to_vec();
        self.publisher.publish(EventKind::GameComplete {
            bot1_score: board.bot1,
            bot2_score: board.bot2,
            winner,
            bot1_roster: self.state.session(Seat::Bot1).roster.clone(),
            bot2_roster: self.state.session(Seat::Bot2).roster.clone(),
            log,
        });
    }

    fn finish_cancelled(&mut self, reason: String) {
        info!("game cancelled after {} picks: {}", self.state.picks_made, reason);
        self.state.status = GameStatus::Cancelled;
        self.state.negotiation = None;
        self.publisher.log(format!("Game cancelled: {reason}"));
        self.publisher.publish(EventKind::Cancelled { reason });
    }

    fn finish_error(&mut self, violation: InvariantViolation) {
        error!("game aborted on invariant violation: {}", violation);
        self.state.status = GameStatus::Error;
        self.state.negotiation = None;
        self.publisher.log(format!("Game aborted: {violation}"));
        self.publisher.publish(EventKind::Error {
            message: violation.to_string(),
        });
    }

    fn into_record(self) -> GameRecord {
        let AuctionEngine {
            state,
            publisher,
            seed,
            scores,
            started_at,
            ..
        } = self;
        let status = state.status;
        let ledger = state.ledger.clone();
        let pool = state.pool.entries().to_vec();
        let [s1, s2] = state.into_sessions();
        let result = |seat: Seat, session: BotSession| BotResult {
            seat,
            bot: session.bot,
            final_balance: ledger.balance(seat),
            roster: session.roster,
            score: scores.map(|b| b.get(seat)),
        };
        let (events, log) = publisher.into_parts();
        GameRecord {
            seed,
            status,
            bot1: result(Seat::Bot1, s1),
            bot2: result(Seat::Bot2, s2),
            winner: scores.and_then(|b| b.winner()),
            pool,
            events,
            log,
            started_at,
            finished_at: Utc::now(),
        }
    }
}
