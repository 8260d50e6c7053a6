// Match runner: drives one game from bot lookup to stored record.
//
// The engine runs on its own task. This side reads the live stream,
// writes every event as an SSE frame, turns the shutdown signal into a
// cancellation, and stores the record once the engine returns.

use std::future::Future;
use std::io::Write;

use anyhow::{anyhow, Context, Result};
use tracing::{info, warn};

use hoopdraft_core::advisor::StrategyAdvisor;
use hoopdraft_core::catalog::Catalog;
use hoopdraft_core::draft::state::BotProfile;
use hoopdraft_core::engine::AuctionEngine;
use hoopdraft_core::events::StreamItem;
use hoopdraft_core::record::{BotDirectory, GameRecord, GameRecordSink};
use hoopdraft_core::rules::RulesConfig;

use crate::sse;

/// Reason recorded when the shutdown signal fires mid-game.
pub const INTERRUPTED: &str = "interrupted by user";
/// Reason recorded when writing to the client fails.
pub const DISCONNECTED: &str = "client disconnected";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchRequest {
    pub bot1_id: String,
    pub bot2_id: String,
    pub seed: Option<u64>,
}

#[derive(Debug)]
pub struct MatchOutcome {
    pub game_id: i64,
    pub record: GameRecord,
}

/// Play one match and persist it.
///
/// Frames go to `out` as they happen. When `shutdown` resolves before the
/// game ends the game is cancelled; the cancelled record is still stored.
/// A failed write to `out` cancels the game the same way, and the write
/// error is returned once the record is stored.
pub async fn play_match<S, A, W, F>(
    store: &S,
    catalog: &Catalog,
    rules: &RulesConfig,
    advisor: A,
    request: &MatchRequest,
    out: &mut W,
    shutdown: F,
) -> Result<MatchOutcome>
where
    S: BotDirectory + GameRecordSink,
    A: StrategyAdvisor + 'static,
    W: Write,
    F: Future<Output = ()>,
{
    let bot1 = lookup(store, &request.bot1_id)?;
    let bot2 = lookup(store, &request.bot2_id)?;

    let engine = AuctionEngine::new(catalog, bot1, bot2, advisor, rules.clone(), request.seed)
        .context("failed to set up game")?;
    let mut stream = engine.hub().subscribe();
    let cancel = engine.cancel_handle();
    let game = tokio::spawn(engine.run());

    tokio::pin!(shutdown);
    let mut interrupted = false;
    // Set once `out` fails. The game is cancelled and the stream drained
    // so the record is still stored before the error is returned.
    let mut disconnected: Option<anyhow::Error> = None;
    loop {
        tokio::select! {
            item = stream.next() => {
                let frame = match item {
                    Some(StreamItem::Event(event)) => sse::event_frame(&event),
                    Some(StreamItem::Lagged { missed }) => {
                        warn!("event stream lagged, {} event(s) dropped", missed);
                        sse::lagged_frame(missed)
                    }
                    None => break,
                };
                if disconnected.is_none() {
                    if let Err(e) = frame.and_then(|f| write_frame(out, &f)) {
                        warn!("client disconnected, cancelling game: {:#}", e);
                        cancel.cancel(DISCONNECTED);
                        disconnected = Some(e);
                    }
                }
            },
            () = &mut shutdown, if !interrupted => {
                info!("shutdown requested, cancelling game");
                interrupted = true;
                cancel.cancel(INTERRUPTED);
            }
        }
    }

    let record = game.await.context("game task failed")?;
    let game_id = store.save_game(&record).context("failed to save game")?;
    if let Some(entry) = record.leaderboard_entry() {
        store
            .record_leaderboard(game_id, &entry)
            .context("failed to record leaderboard entry")?;
        info!("leaderboard entry: {} with {:.1}", entry.bot_name, entry.score);
    }
    if let Some(e) = disconnected {
        return Err(e.context(format!("game {game_id} stored after client disconnect")));
    }
    write_frame(out, &sse::saved_frame(game_id, record.status.as_str())?)?;

    Ok(MatchOutcome { game_id, record })
}

fn lookup<S: BotDirectory>(store: &S, id: &str) -> Result<BotProfile> {
    store
        .bot(id)?
        .ok_or_else(|| anyhow!("no bot with id `{id}`"))
}

fn write_frame<W: Write>(out: &mut W, frame: &str) -> Result<()> {
    out.write_all(frame.as_bytes())
        .and_then(|()| out.flush())
        .context("failed to write event frame")
}
