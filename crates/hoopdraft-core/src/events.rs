// Event stream publisher.
//
// Every engine transition becomes one `GameEvent` with a strictly increasing
// sequence number. Events are appended to the game's history and fanned out
// to live subscribers over a tokio broadcast channel. Publishing never
// waits on subscribers: a subscriber that falls more than the channel
// capacity behind loses the oldest events and is told how many it missed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;

use crate::advisor::{DecisionKind, FallbackCause, FallbackRule};
use crate::draft::pick::DraftedPick;
use crate::draft::state::Seat;

// ---------------------------------------------------------------------------
// Vocabulary
// ---------------------------------------------------------------------------

/// How a negotiation round was conceded to the leading bidder. All three
/// have the same effect on state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Concession {
    Accepted,
    Folded,
    /// The responder could not afford any counter and was not consulted.
    NoFunds,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The nominator has no credits and free nominations are off.
    NoCredits,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    /// Human-readable narration.
    Log { message: String },
    /// A round concluded and a player changed hands.
    Draft {
        bot: Seat,
        pick: DraftedPick,
        concession: Concession,
        bot1_balance: u32,
        bot2_balance: u32,
    },
    /// A nomination turn was passed.
    Skip { bot: Seat, reason: SkipReason },
    /// An advisor reply was unusable and a deterministic rule replaced it.
    Fallback {
        bot: Seat,
        decision: DecisionKind,
        rule: FallbackRule,
        cause: FallbackCause,
    },
    GameComplete {
        bot1_score: f64,
        bot2_score: f64,
        winner: Option<Seat>,
        bot1_roster: Vec<DraftedPick>,
        bot2_roster: Vec<DraftedPick>,
        log: Vec<String>,
    },
    Cancelled { reason: String },
    Error { message: String },
}

impl EventKind {
    /// Wire name of the event kind.
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Log { .. } => "log",
            EventKind::Draft { .. } => "draft",
            EventKind::Skip { .. } => "skip",
            EventKind::Fallback { .. } => "fallback",
            EventKind::GameComplete { .. } => "game_complete",
            EventKind::Cancelled { .. } => "cancelled",
            EventKind::Error { .. } => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            EventKind::GameComplete { .. } | EventKind::Cancelled { .. } | EventKind::Error { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameEvent {
    pub seq: u64,
    #[serde(flatten)]
    pub kind: EventKind,
}

// ---------------------------------------------------------------------------
// Publisher
// ---------------------------------------------------------------------------

/// Owned by the engine. Appends to history and broadcasts.
pub struct EventPublisher {
    hub: EventHub,
    history: Vec<GameEvent>,
    narration: Vec<String>,
    next_seq: u64,
}

impl EventPublisher {
    pub fn new(buffer: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer.max(1));
        EventPublisher {
            hub: EventHub {
                tx,
                closed: Arc::new(AtomicBool::new(false)),
            },
            history: Vec::new(),
            narration: Vec::new(),
            next_seq: 1,
        }
    }

    /// A cloneable handle for attaching subscribers at any time.
    pub fn hub(&self) -> EventHub {
        self.hub.clone()
    }

    /// Publish one event. Returns its sequence number.
    pub fn publish(&mut self, kind: EventKind) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        if kind.is_terminal() {
            self.hub.closed.store(true, Ordering::SeqCst);
        }
        let event = GameEvent { seq, kind };
        debug!(seq, kind = event.kind.name(), "publish");
        // No subscribers is not an error.
        let _ = self.hub.tx.send(event.clone());
        self.history.push(event);
        seq
    }

    /// Publish a `log` event and remember the line for the game log.
    pub fn log(&mut self, message: impl Into<String>) -> u64 {
        let message = message.into();
        self.narration.push(message.clone());
        self.publish(EventKind::Log { message })
    }

    pub fn history(&self) -> &[GameEvent] {
        &self.history
    }

    /// Narration lines in emission order.
    pub fn narration(&self) -> &[String] {
        &self.narration
    }

    pub fn into_parts(self) -> (Vec<GameEvent>, Vec<String>) {
        (self.history, self.narration)
    }
}

/// Subscription point for live consumers.
#[derive(Clone)]
pub struct EventHub {
    tx: broadcast::Sender<GameEvent>,
    closed: Arc<AtomicBool>,
}

impl EventHub {
    /// Attach a consumer. It sees events published from now on; a consumer
    /// attaching after the terminal event sees nothing.
    pub fn subscribe(&self) -> EventStream {
        EventStream {
            rx: self.tx.subscribe(),
            finished: self.closed.load(Ordering::SeqCst),
        }
    }
}

/// One item read from a live stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamItem {
    Event(GameEvent),
    /// The consumer fell behind and `missed` events were dropped for it.
    Lagged { missed: u64 },
}

/// A live consumer's view of the stream.
pub struct EventStream {
    rx: broadcast::Receiver<GameEvent>,
    finished: bool,
}

impl EventStream {
    /// Next item, or `None` once the terminal event has been delivered or
    /// the game has gone away.
    pub async fn next(&mut self) -> Option<StreamItem> {
        if self.finished {
            return None;
        }
        match self.rx.recv().await {
            Ok(event) => {
                if event.kind.is_terminal() {
                    self.finished = true;
                }
                Some(StreamItem::Event(event))
            }
            Err(RecvError::Lagged(missed)) => Some(StreamItem::Lagged { missed }),
            Err(RecvError::Closed) => {
                self.finished = true;
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log(msg: &str) -> EventKind {
        EventKind::Log {
            message: msg.to_string(),
        }
    }

    #[test]
    fn sequence_numbers_strictly_increase() {
        let mut publisher = EventPublisher::new(8);
        let a = publisher.log("one");
        let b = publisher.publish(EventKind::Skip {
            bot: Seat::Bot1,
            reason: SkipReason::NoCredits,
        });
        let c = publisher.log("two");
        assert!(a < b && b < c);
        let seqs: Vec<u64> = publisher.history().iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![1, 2, 3]);
        assert_eq!(publisher.narration(), ["one", "two"]);
    }

    #[tokio::test]
    async fn subscriber_sees_only_events_after_attach() {
        let mut publisher = EventPublisher::new(8);
        publisher.log("before");
        let mut stream = publisher.hub().subscribe();
        publisher.log("after");

        match stream.next().await {
            Some(StreamItem::Event(e)) => assert_eq!(e.kind, log("after")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn stream_ends_after_terminal_event() {
        let mut publisher = EventPublisher::new(8);
        let mut stream = publisher.hub().subscribe();
        publisher.publish(EventKind::Cancelled {
            reason: "client went away".into(),
        });

        assert!(matches!(stream.next().await, Some(StreamItem::Event(_))));
        assert_eq!(stream.next().await, None);

        // Late subscribers get an already-finished stream.
        let mut late = publisher.hub().subscribe();
        assert_eq!(late.next().await, None);
    }

    #[tokio::test]
    async fn slow_subscriber_gets_lag_signal_without_blocking_publisher() {
        let mut publisher = EventPublisher::new(2);
        let mut stream = publisher.hub().subscribe();
        for i in 0..5 {
            publisher.log(format!("line {i}"));
        }
        assert_eq!(publisher.history().len(), 5);

        assert_eq!(stream.next().await, Some(StreamItem::Lagged { missed: 3 }));
        match stream.next().await {
            Some(StreamItem::Event(e)) => assert_eq!(e.seq, 4),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn dropped_publisher_closes_stream() {
        let publisher = EventPublisher::new(4);
        let hub = publisher.hub();
        let mut stream = hub.subscribe();
        drop(publisher);
        drop(hub);
        assert_eq!(stream.next().await, None);
    }

    #[test]
    fn event_serializes_with_type_tag_and_seq() {
        let event = GameEvent {
            seq: 9,
            kind: EventKind::Skip {
                bot: Seat::Bot2,
                reason: SkipReason::NoCredits,
            },
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "skip");
        assert_eq!(json["seq"], 9);
        assert_eq!(json["bot"], "bot2");
        assert_eq!(json["reason"], "no_credits");
        assert_eq!(event.kind.name(), "skip");
    }
}
