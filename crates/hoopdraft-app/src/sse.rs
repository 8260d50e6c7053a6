// Server-sent-events framing for the live game stream.
//
// One frame per event: `event: <kind>` then `data: <json>` and a blank
// line. The JSON payload is the full event including its `seq`.

use anyhow::{Context, Result};
use serde::Serialize;

use hoopdraft_core::events::GameEvent;

/// Frame name used when a consumer fell behind.
pub const LAGGED: &str = "lagged";
/// Frame name of the closing frame written once the record is stored.
pub const SAVED: &str = "saved";

/// Format an arbitrary named frame.
pub fn frame<T: Serialize>(name: &str, payload: &T) -> Result<String> {
    let data = serde_json::to_string(payload)
        .with_context(|| format!("failed to serialize {name} frame"))?;
    Ok(format!("event: {name}\ndata: {data}\n\n"))
}

/// Frame for one engine event.
pub fn event_frame(event: &GameEvent) -> Result<String> {
    frame(event.kind.name(), event)
}

#[derive(Serialize)]
struct LaggedPayload {
    missed: u64,
}

pub fn lagged_frame(missed: u64) -> Result<String> {
    frame(LAGGED, &LaggedPayload { missed })
}

#[derive(Serialize)]
struct SavedPayload<'a> {
    game_id: i64,
    status: &'a str,
}

pub fn saved_frame(game_id: i64, status: &str) -> Result<String> {
    frame(SAVED, &SavedPayload { game_id, status })
}
