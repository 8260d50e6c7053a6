// StrategyAdvisor backed by Claude.
//
// The model is asked for one JSON object. Replies often wrap it in prose
// or a code fence, so the first balanced `{...}` in the text is parsed.
// Range checks are left to the engine's validator.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use hoopdraft_core::advisor::{
    AdvisorError, AdvisorReply, Decision, DecisionKind, DecisionRequest, StrategyAdvisor,
};
use hoopdraft_core::player::PlayerId;

use crate::client::ClaudeClient;
use crate::prompt::{build_prompt, system_prompt};

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub model: String,
    pub max_tokens: u32,
}

impl Default for LlmSettings {
    fn default() -> Self {
        LlmSettings {
            model: "claude-sonnet-4-5-20250929".to_string(),
            max_tokens: 400,
        }
    }
}

// ---------------------------------------------------------------------------
// Advisor
// ---------------------------------------------------------------------------

/// Either a live Claude-backed advisor or a disabled one.
pub enum LlmAdvisor {
    Active { client: ClaudeClient, max_tokens: u32 },
    /// No API key: every decision reports `Unavailable`.
    Disabled,
}

impl LlmAdvisor {
    /// `Active` if an API key is present, otherwise `Disabled`.
    pub fn from_settings(settings: &LlmSettings, api_key: Option<&str>) -> Self {
        match api_key {
            Some(key) if !key.is_empty() => LlmAdvisor::Active {
                client: ClaudeClient::new(key.to_string(), settings.model.clone()),
                max_tokens: settings.max_tokens,
            },
            _ => LlmAdvisor::Disabled,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, LlmAdvisor::Active { .. })
    }
}

#[async_trait]
impl StrategyAdvisor for LlmAdvisor {
    async fn decide(&self, request: &DecisionRequest) -> Result<AdvisorReply, AdvisorError> {
        let (client, max_tokens) = match self {
            LlmAdvisor::Active { client, max_tokens } => (client, *max_tokens),
            LlmAdvisor::Disabled => {
                return Err(AdvisorError::Unavailable("LLM not configured".to_string()))
            }
        };

        let prompt = build_prompt(request);
        debug!(
            seat = %request.me.seat,
            kind = ?request.kind,
            prompt_len = prompt.len(),
            "requesting decision from {}",
            client.model()
        );
        let completion = client
            .complete(&system_prompt(), &prompt, max_tokens)
            .await
            .map_err(|e| AdvisorError::Unavailable(e.to_string()))?;
        debug!(
            input_tokens = completion.input_tokens,
            output_tokens = completion.output_tokens,
            "decision received"
        );

        parse_reply(request.kind, &completion.text).inspect_err(|e| {
            warn!("unparseable reply for {}: {}", request.me.seat, e);
        })
    }
}

// ---------------------------------------------------------------------------
// Reply parsing
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawNomination {
    player_id: PlayerId,
    amount: i64,
    #[serde(default)]
    reasoning: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawResponse {
    action: String,
    #[serde(default)]
    amount: Option<i64>,
    #[serde(default)]
    reasoning: Option<String>,
}

/// Parse the model's reply text into a decision of the requested kind.
pub fn parse_reply(kind: DecisionKind, text: &str) -> Result<AdvisorReply, AdvisorError> {
    let json = extract_json_object(text)
        .ok_or_else(|| AdvisorError::Malformed("no JSON object in reply".to_string()))?;
    let malformed = |e: serde_json::Error| AdvisorError::Malformed(e.to_string());

    match kind {
        DecisionKind::Nominate => {
            let raw: RawNomination = serde_json::from_str(json).map_err(malformed)?;
            Ok(AdvisorReply {
                decision: Decision::Nominate {
                    player_id: raw.player_id,
                    bid: raw.amount,
                },
                reasoning: raw.reasoning,
            })
        }
        DecisionKind::Respond => {
            let raw: RawResponse = serde_json::from_str(json).map_err(malformed)?;
            let decision = match raw.action.trim().to_ascii_lowercase().as_str() {
                "accept" => Decision::Accept,
                "fold" => Decision::Fold,
                "counter" => Decision::Counter {
                    amount: raw.amount.ok_or_else(|| {
                        AdvisorError::Malformed("counter without amount".to_string())
                    })?,
                },
                other => {
                    return Err(AdvisorError::Malformed(format!("unknown action `{other}`")))
                }
            };
            Ok(AdvisorReply {
                decision,
                reasoning: raw.reasoning,
            })
        }
    }
}

/// The first balanced top-level `{...}` in `text`, honouring string
/// literals and escapes.
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_object_from_fenced_prose() {
        let text = "Sure!\n```json\n{\"action\": \"fold\", \"reasoning\": \"too {rich}\"}\n```\nDone.";
        assert_eq!(
            extract_json_object(text),
            Some("{\"action\": \"fold\", \"reasoning\": \"too {rich}\"}")
        );
    }

    #[test]
    fn extracts_nested_object_and_escaped_quotes() {
        let text = r#"{"a": {"b": 1}, "c": "say \"}\""} trailing {"x": 2}"#;
        assert_eq!(
            extract_json_object(text),
            Some(r#"{"a": {"b": 1}, "c": "say \"}\""}"#)
        );
        assert_eq!(extract_json_object("no braces here"), None);
        assert_eq!(extract_json_object("{ unterminated"), None);
    }

    #[test]
    fn parses_nomination() {
        let reply = parse_reply(
            DecisionKind::Nominate,
            r#"{"player_id": 2544, "amount": 27, "reasoning": "Best rebounder left."}"#,
        )
        .unwrap();
        assert_eq!(
            reply.decision,
            Decision::Nominate {
                player_id: 2544,
                bid: 27
            }
        );
        assert_eq!(reply.reasoning.as_deref(), Some("Best rebounder left."));
    }

    #[test]
    fn negative_amount_survives_parsing() {
        // Range checks belong to the engine.
        let reply = parse_reply(DecisionKind::Nominate, r#"{"player_id": 1, "amount": -5}"#).unwrap();
        assert_eq!(reply.decision, Decision::Nominate { player_id: 1, bid: -5 });
        assert_eq!(reply.reasoning, None);
    }

    #[test]
    fn parses_responses() {
        let counter =
            parse_reply(DecisionKind::Respond, r#"{"action": "Counter", "amount": 41}"#).unwrap();
        assert_eq!(counter.decision, Decision::Counter { amount: 41 });

        let accept =
            parse_reply(DecisionKind::Respond, r#"{"action": "accept", "amount": 0}"#).unwrap();
        assert_eq!(accept.decision, Decision::Accept);

        let fold = parse_reply(DecisionKind::Respond, r#"{"action": "fold"}"#).unwrap();
        assert_eq!(fold.decision, Decision::Fold);
    }

    #[test]
    fn malformed_replies_rejected() {
        for (kind, text) in [
            (DecisionKind::Respond, "I fold."),
            (DecisionKind::Respond, r#"{"action": "counter"}"#),
            (DecisionKind::Respond, r#"{"action": "pass"}"#),
            (DecisionKind::Nominate, r#"{"player_id": "abc", "amount": 3}"#),
            (DecisionKind::Nominate, r#"{"amount": 3}"#),
        ] {
            assert!(
                matches!(parse_reply(kind, text), Err(AdvisorError::Malformed(_))),
                "{text} should be malformed"
            );
        }
    }

    #[test]
    fn from_settings_requires_api_key() {
        let settings = LlmSettings::default();
        assert!(LlmAdvisor::from_settings(&settings, Some("sk-test")).is_active());
        assert!(!LlmAdvisor::from_settings(&settings, Some("")).is_active());
        assert!(!LlmAdvisor::from_settings(&settings, None).is_active());
    }
}
