// LLM-backed strategy advisor.
//
// Turns a decision request into a prompt, streams the completion from the
// Anthropic Messages API and parses the JSON decision out of the reply.

pub mod advisor;
pub mod client;
pub mod prompt;

pub use advisor::{LlmAdvisor, LlmSettings};
