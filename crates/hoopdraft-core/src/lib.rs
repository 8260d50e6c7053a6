// Library root for the auction draft engine.
//
// Everything with real state-machine logic lives here: pool sampling, the
// budget ledger, the advisor contract, the negotiation engine, scoring and
// the event stream. Storage and LLM integrations live in sibling crates.

pub mod advisor;
pub mod catalog;
pub mod draft;
pub mod engine;
pub mod events;
pub mod player;
pub mod record;
pub mod rules;
