// Strategy Advisor contract and client.
//
// The advisor is the external decision maker (an LLM in production). The
// engine never trusts its output: every reply is validated against the
// current state, each attempt is bounded by a timeout, and a failed
// attempt is retried at most once. When no usable decision comes back the
// client reports why, and the engine applies a deterministic fallback.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::draft::pick::DraftedPick;
use crate::draft::pool::Tier;
use crate::draft::state::{NegotiationState, Seat};
use crate::player::{Player, PlayerId};
use crate::rules::AdvisorRules;

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    /// Open a round: pick an undrafted player and an opening bid.
    Nominate,
    /// Answer the current leading bid.
    Respond,
}

/// Publicly observable state of one seat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeatView {
    pub seat: Seat,
    pub name: String,
    pub balance: u32,
    pub roster: Vec<DraftedPick>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolView {
    pub player: Player,
    pub tier: Tier,
    pub drafted: bool,
}

/// Everything the advisor may see for one decision. The opponent's
/// strategy text is never included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRequest {
    pub kind: DecisionKind,
    /// The requesting bot's own strategy text.
    pub strategy: String,
    pub me: SeatView,
    pub opponent: SeatView,
    pub pool: Vec<PoolView>,
    /// Present when responding.
    pub negotiation: Option<NegotiationState>,
    /// Lowest legal opening bid (1, or 0 for a free nomination).
    pub min_bid: u32,
    /// How many best picks count toward the score.
    pub scored_roster_size: usize,
}

impl DecisionRequest {
    /// The player under contest, when responding.
    pub fn contested_player(&self) -> Option<&Player> {
        let neg = self.negotiation.as_ref()?;
        self.pool.get(neg.pool_index).map(|e| &e.player)
    }

    pub fn available_players(&self) -> impl Iterator<Item = &PoolView> {
        self.pool.iter().filter(|e| !e.drafted)
    }
}

// ---------------------------------------------------------------------------
// Reply
// ---------------------------------------------------------------------------

/// A decision as proposed by the advisor, before validation. Amounts are
/// signed so that nonsense values survive until they can be rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Decision {
    Nominate { player_id: PlayerId, bid: i64 },
    Accept,
    Counter { amount: i64 },
    Fold,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvisorReply {
    pub decision: Decision,
    /// Free-text "thinking" shown as narration.
    pub reasoning: Option<String>,
}

impl AdvisorReply {
    pub fn new(decision: Decision) -> Self {
        AdvisorReply {
            decision,
            reasoning: None,
        }
    }

    pub fn with_reasoning(decision: Decision, reasoning: impl Into<String>) -> Self {
        AdvisorReply {
            decision,
            reasoning: Some(reasoning.into()),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AdvisorError {
    #[error("advisor timed out after {0:?}")]
    Timeout(Duration),

    #[error("advisor unavailable: {0}")]
    Unavailable(String),

    #[error("malformed advisor reply: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait StrategyAdvisor: Send + Sync {
    async fn decide(&self, request: &DecisionRequest) -> Result<AdvisorReply, AdvisorError>;
}

#[async_trait]
impl<A: StrategyAdvisor + ?Sized> StrategyAdvisor for Arc<A> {
    async fn decide(&self, request: &DecisionRequest) -> Result<AdvisorReply, AdvisorError> {
        (**self).decide(request).await
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// A nomination that passed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Nomination {
    pub pool_index: usize,
    pub player_id: PlayerId,
    pub bid: u32,
}

/// A response that passed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    Accept,
    Counter(u32),
    Fold,
}

/// Check a proposed nomination: the player must be in the pool and
/// undrafted, and the bid within `[min_bid, own balance]`.
pub fn validate_nomination(decision: &Decision, request: &DecisionRequest) -> Result<Nomination, String> {
    let Decision::Nominate { player_id, bid } = decision else {
        return Err(format!("expected a nomination, got {decision:?}"));
    };
    let pool_index = request
        .pool
        .iter()
        .position(|e| e.player.id == *player_id)
        .ok_or_else(|| format!("player {player_id} is not in the pool"))?;
    if request.pool[pool_index].drafted {
        return Err(format!("player {player_id} is already drafted"));
    }
    let balance = i64::from(request.me.balance);
    let min_bid = i64::from(request.min_bid);
    if *bid < min_bid || *bid > balance {
        return Err(format!(
            "opening bid {bid} outside [{min_bid}, {balance}]"
        ));
    }
    Ok(Nomination {
        pool_index,
        player_id: *player_id,
        bid: *bid as u32,
    })
}

/// Check a proposed response against the active negotiation: a counter
/// must strictly raise the leading bid and stay within own balance.
pub fn validate_response(decision: &Decision, request: &DecisionRequest) -> Result<Response, String> {
    let leading_bid = request
        .negotiation
        .as_ref()
        .map(|n| n.leading_bid)
        .ok_or_else(|| "no active negotiation".to_string())?;
    match decision {
        Decision::Accept => Ok(Response::Accept),
        Decision::Fold => Ok(Response::Fold),
        Decision::Counter { amount } => {
            let balance = i64::from(request.me.balance);
            if *amount <= i64::from(leading_bid) {
                Err(format!("counter {amount} does not exceed leading bid {leading_bid}"))
            } else if *amount > balance {
                Err(format!("counter {amount} exceeds balance {balance}"))
            } else {
                Ok(Response::Counter(*amount as u32))
            }
        }
        Decision::Nominate { .. } => Err("expected a response, got a nomination".to_string()),
    }
}

// ---------------------------------------------------------------------------
// Fallback vocabulary
// ---------------------------------------------------------------------------

/// Why the advisor's answer was not used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FallbackCause {
    Timeout,
    AdvisorFailure { message: String },
    InvalidDecision { reason: String },
}

impl fmt::Display for FallbackCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackCause::Timeout => f.write_str("timed out"),
            FallbackCause::AdvisorFailure { message } => write!(f, "advisor error: {message}"),
            FallbackCause::InvalidDecision { reason } => write!(f, "invalid decision: {reason}"),
        }
    }
}

impl FallbackCause {
    fn from_error(err: AdvisorError) -> Self {
        match err {
            AdvisorError::Timeout(_) => FallbackCause::Timeout,
            AdvisorError::Unavailable(message) | AdvisorError::Malformed(message) => {
                FallbackCause::AdvisorFailure { message }
            }
        }
    }
}

/// Which deterministic rule replaced the advisor's answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum FallbackRule {
    /// Nominate the lowest-indexed undrafted player at the minimum bid.
    LowestUndrafted { player_id: PlayerId, bid: u32 },
    /// Concede the round to the leading bidder.
    Fold,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Result of asking the advisor for one decision.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict<T> {
    Decided {
        value: T,
        reasoning: Option<String>,
        attempts: u8,
    },
    /// No attempt produced a usable decision; the last failure is reported.
    Failed { cause: FallbackCause, attempts: u8 },
}

/// Wraps an advisor with the timeout, retry and validation policy.
pub struct AdvisorClient<A> {
    inner: A,
    timeout: Duration,
    max_retries: u8,
}

impl<A: StrategyAdvisor> AdvisorClient<A> {
    pub fn new(inner: A, rules: &AdvisorRules) -> Self {
        AdvisorClient {
            inner,
            timeout: rules.timeout(),
            // Never more than one retry per decision point.
            max_retries: rules.max_retries.min(1),
        }
    }

    pub async fn nominate(&self, request: &DecisionRequest) -> Verdict<Nomination> {
        self.ask(request, validate_nomination).await
    }

    pub async fn respond(&self, request: &DecisionRequest) -> Verdict<Response> {
        self.ask(request, validate_response).await
    }

    async fn ask<T>(
        &self,
        request: &DecisionRequest,
        validate: fn(&Decision, &DecisionRequest) -> Result<T, String>,
    ) -> Verdict<T> {
        let max_attempts = self.max_retries + 1;
        let mut attempts = 0;
        loop {
            attempts += 1;
            let cause = match tokio::time::timeout(self.timeout, self.inner.decide(request)).await {
                Err(_) => FallbackCause::from_error(AdvisorError::Timeout(self.timeout)),
                Ok(Err(e)) => FallbackCause::from_error(e),
                Ok(Ok(reply)) => match validate(&reply.decision, request) {
                    Ok(value) => {
                        debug!(
                            seat = %request.me.seat,
                            kind = ?request.kind,
                            attempts,
                            "advisor decided {:?}",
                            reply.decision
                        );
                        return Verdict::Decided {
                            value,
                            reasoning: reply.reasoning,
                            attempts,
                        };
                    }
                    Err(reason) => FallbackCause::InvalidDecision { reason },
                },
            };

            warn!(
                "advisor attempt {}/{} for {} ({:?}) failed: {:?}",
                attempts, max_attempts, request.me.seat, request.kind, cause
            );
            if attempts >= max_attempts {
                return Verdict::Failed { cause, attempts };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::PlayerStats;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    enum Step {
        Reply(Decision),
        Fail(AdvisorError),
        Hang,
    }

    struct Scripted {
        steps: Mutex<VecDeque<Step>>,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(steps: Vec<Step>) -> Self {
            Scripted {
                steps: Mutex::new(steps.into()),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl StrategyAdvisor for Scripted {
        async fn decide(&self, _request: &DecisionRequest) -> Result<AdvisorReply, AdvisorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let step = self.steps.lock().unwrap().pop_front();
            match step {
                Some(Step::Reply(d)) => Ok(AdvisorReply::with_reasoning(d, "because")),
                Some(Step::Fail(e)) => Err(e),
                Some(Step::Hang) | None => {
                    std::future::pending::<()>().await;
                    unreachable!()
                }
            }
        }
    }

    fn player(id: u64) -> Player {
        Player::from_stats(id, "P", id.to_string(), 50, PlayerStats::default())
    }

    fn request(kind: DecisionKind, balance: u32) -> DecisionRequest {
        let pool = (1..=12)
            .map(|id| PoolView {
                player: player(id),
                tier: Tier::Mid,
                drafted: id == 2,
            })
            .collect();
        let negotiation = match kind {
            DecisionKind::Respond => Some(NegotiationState::open(0, 1, Seat::Bot2, 30)),
            DecisionKind::Nominate => None,
        };
        DecisionRequest {
            kind,
            strategy: "value hunter".into(),
            me: SeatView {
                seat: Seat::Bot1,
                name: "Alpha".into(),
                balance,
                roster: vec![],
            },
            opponent: SeatView {
                seat: Seat::Bot2,
                name: "Beta".into(),
                balance: 100,
                roster: vec![],
            },
            pool,
            negotiation,
            min_bid: 1,
            scored_roster_size: 5,
        }
    }

    fn rules(max_retries: u8) -> AdvisorRules {
        AdvisorRules {
            timeout_ms: 1_000,
            max_retries,
        }
    }

    // -- validation --

    #[test]
    fn nomination_in_bounds_accepted() {
        let req = request(DecisionKind::Nominate, 100);
        let nom = validate_nomination(&Decision::Nominate { player_id: 5, bid: 20 }, &req).unwrap();
        assert_eq!(
            nom,
            Nomination {
                pool_index: 4,
                player_id: 5,
                bid: 20
            }
        );
    }

    #[test]
    fn nomination_bid_bounds_enforced() {
        let req = request(DecisionKind::Nominate, 40);
        for bid in [0, -3, 41] {
            assert!(
                validate_nomination(&Decision::Nominate { player_id: 5, bid }, &req).is_err(),
                "bid {bid} should be rejected"
            );
        }
        assert!(validate_nomination(&Decision::Nominate { player_id: 5, bid: 40 }, &req).is_ok());
    }

    #[test]
    fn nomination_of_drafted_or_unknown_player_rejected() {
        let req = request(DecisionKind::Nominate, 100);
        assert!(validate_nomination(&Decision::Nominate { player_id: 2, bid: 5 }, &req).is_err());
        assert!(validate_nomination(&Decision::Nominate { player_id: 99, bid: 5 }, &req).is_err());
        assert!(validate_nomination(&Decision::Fold, &req).is_err());
    }

    #[test]
    fn free_nomination_requires_zero_bid() {
        let mut req = request(DecisionKind::Nominate, 0);
        req.min_bid = 0;
        assert!(validate_nomination(&Decision::Nominate { player_id: 5, bid: 0 }, &req).is_ok());
        assert!(validate_nomination(&Decision::Nominate { player_id: 5, bid: 1 }, &req).is_err());
    }

    #[test]
    fn counter_must_strictly_raise_within_balance() {
        let req = request(DecisionKind::Respond, 50);
        assert_eq!(
            validate_response(&Decision::Counter { amount: 31 }, &req),
            Ok(Response::Counter(31))
        );
        assert!(validate_response(&Decision::Counter { amount: 30 }, &req).is_err());
        assert!(validate_response(&Decision::Counter { amount: 51 }, &req).is_err());
        assert!(validate_response(&Decision::Counter { amount: -1 }, &req).is_err());
        assert_eq!(validate_response(&Decision::Accept, &req), Ok(Response::Accept));
        assert_eq!(validate_response(&Decision::Fold, &req), Ok(Response::Fold));
        assert!(
            validate_response(&Decision::Nominate { player_id: 1, bid: 40 }, &req).is_err()
        );
    }

    #[test]
    fn contested_player_resolves_from_pool() {
        let req = request(DecisionKind::Respond, 50);
        assert_eq!(req.contested_player().map(|p| p.id), Some(1));
        assert_eq!(req.available_players().count(), 11);
    }

    // -- client policy --

    #[tokio::test]
    async fn valid_reply_on_first_attempt() {
        let advisor = Scripted::new(vec![Step::Reply(Decision::Nominate { player_id: 3, bid: 10 })]);
        let client = AdvisorClient::new(advisor, &rules(1));
        let verdict = client.nominate(&request(DecisionKind::Nominate, 100)).await;
        match verdict {
            Verdict::Decided {
                value,
                reasoning,
                attempts,
            } => {
                assert_eq!(value.player_id, 3);
                assert_eq!(reasoning.as_deref(), Some("because"));
                assert_eq!(attempts, 1);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn one_retry_after_invalid_reply() {
        let advisor = Scripted::new(vec![
            Step::Reply(Decision::Counter { amount: 10 }),
            Step::Reply(Decision::Counter { amount: 45 }),
        ]);
        let client = AdvisorClient::new(advisor, &rules(1));
        let verdict = client.respond(&request(DecisionKind::Respond, 50)).await;
        assert!(matches!(
            verdict,
            Verdict::Decided {
                value: Response::Counter(45),
                attempts: 2,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn gives_up_after_single_retry() {
        let advisor = Scripted::new(vec![
            Step::Fail(AdvisorError::Unavailable("503".into())),
            Step::Fail(AdvisorError::Malformed("not json".into())),
            Step::Reply(Decision::Fold),
        ]);
        let client = AdvisorClient::new(advisor, &rules(1));
        let verdict = client.respond(&request(DecisionKind::Respond, 50)).await;
        assert_eq!(
            verdict,
            Verdict::Failed {
                cause: FallbackCause::AdvisorFailure {
                    message: "not json".into()
                },
                attempts: 2,
            }
        );
        assert_eq!(client.inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn no_retry_when_disabled() {
        let advisor = Scripted::new(vec![
            Step::Reply(Decision::Nominate { player_id: 2, bid: 5 }),
            Step::Reply(Decision::Nominate { player_id: 3, bid: 5 }),
        ]);
        let client = AdvisorClient::new(advisor, &rules(0));
        let verdict = client.nominate(&request(DecisionKind::Nominate, 100)).await;
        assert!(matches!(
            verdict,
            Verdict::Failed {
                cause: FallbackCause::InvalidDecision { .. },
                attempts: 1
            }
        ));
    }

    #[tokio::test]
    async fn retry_setting_is_capped_at_one() {
        let advisor = Scripted::new(vec![]);
        let client = AdvisorClient::new(advisor, &rules(5));
        assert_eq!(client.max_retries, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn timeouts_become_timeout_cause() {
        let advisor = Scripted::new(vec![Step::Hang, Step::Hang]);
        let client = AdvisorClient::new(advisor, &rules(1));
        let started = tokio::time::Instant::now();
        let verdict = client.respond(&request(DecisionKind::Respond, 50)).await;
        assert_eq!(
            verdict,
            Verdict::Failed {
                cause: FallbackCause::Timeout,
                attempts: 2
            }
        );
        assert_eq!(started.elapsed(), Duration::from_millis(2_000));
    }
}
