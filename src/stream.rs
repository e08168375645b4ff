//! Server-push event wire protocol.
//!
//! Every event travels as one newline-delimited `data: <json>` record whose
//! JSON object carries an `event` tag. The relay forwards agent events in
//! production order; a run terminates with exactly one `error` or one `final`
//! record.

use serde::{Deserialize, Serialize};

use crate::agent::AgentEvent;
use crate::error::Result;
use crate::types::AgentReply;

/// Wire event pushed to stream consumers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Incremental fragment of the assistant's answer
    Token { token: String },
    /// Embedded JSON with structured agent output
    StructuredOutput { data: serde_json::Value },
    /// Plain text appended to the in-progress message
    Message { data: String },
    /// Terminal error; no further events follow
    Error { data: String },
    /// Normal end of stream
    Final { data: String },
}

impl StreamEvent {
    pub fn token(token: impl Into<String>) -> Self {
        StreamEvent::Token {
            token: token.into(),
        }
    }

    pub fn message(data: impl Into<String>) -> Self {
        StreamEvent::Message { data: data.into() }
    }

    pub fn error(data: impl Into<String>) -> Self {
        StreamEvent::Error { data: data.into() }
    }

    pub fn final_event() -> Self {
        StreamEvent::Final {
            data: "done".to_string(),
        }
    }

    pub fn structured(reply: &AgentReply) -> Result<Self> {
        Ok(StreamEvent::StructuredOutput {
            data: serde_json::to_value(reply)?,
        })
    }

    /// Encode as one server-sent-event record
    pub fn to_sse_record(&self) -> Result<String> {
        Ok(format!("data: {}\n\n", serde_json::to_string(self)?))
    }
}

/// Which event kinds a streaming endpoint forwards
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamVariant {
    /// Answer tokens and terminal events only
    Tokens,
    /// Adds thinking deltas and tool separators
    Thinking,
    /// Adds a structured_output snapshot before `final`
    Structured,
    /// Structured snapshot including the conversation summary
    Full,
}

impl StreamVariant {
    fn forwards_thinking(&self) -> bool {
        !matches!(self, StreamVariant::Tokens)
    }

    fn forwards_structured(&self) -> bool {
        matches!(self, StreamVariant::Structured | StreamVariant::Full)
    }

    fn keeps_summary(&self) -> bool {
        matches!(self, StreamVariant::Full)
    }

    /// Map one agent event to the wire events this variant forwards.
    /// `Completed` and `Failed` yield the terminal record(s).
    pub fn wire_events(&self, event: &AgentEvent) -> Vec<StreamEvent> {
        match event {
            AgentEvent::Token { text } => vec![StreamEvent::token(text.clone())],
            AgentEvent::Thinking { text } => {
                if self.forwards_thinking() {
                    vec![StreamEvent::StructuredOutput {
                        data: serde_json::json!({ "thinking": text }),
                    }]
                } else {
                    vec![]
                }
            }
            AgentEvent::ToolStarted { name, .. } => {
                if self.forwards_thinking() {
                    vec![StreamEvent::message(format!("\n---Using {name}---\n"))]
                } else {
                    vec![]
                }
            }
            AgentEvent::ToolFinished { .. } => {
                if self.forwards_thinking() {
                    vec![StreamEvent::message("\n---Tool Complete---\n")]
                } else {
                    vec![]
                }
            }
            AgentEvent::SummaryUpdated { summary } => {
                if self.keeps_summary() {
                    vec![StreamEvent::StructuredOutput {
                        data: serde_json::json!({ "conversation_summary": summary }),
                    }]
                } else {
                    vec![]
                }
            }
            AgentEvent::Completed { reply } => {
                let mut events = Vec::new();
                if self.forwards_structured() {
                    let mut reply = reply.clone();
                    if !self.keeps_summary() {
                        reply.conversation_summary = None;
                    }
                    if let Ok(event) = StreamEvent::structured(&reply) {
                        events.push(event);
                    }
                }
                events.push(StreamEvent::final_event());
                events
            }
            AgentEvent::Failed { error } => vec![StreamEvent::error(error.clone())],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FunctionCall;

    #[test]
    fn test_wire_format_matches_protocol() {
        let record = StreamEvent::token("Hel").to_sse_record().unwrap();
        assert_eq!(record, "data: {\"event\":\"token\",\"token\":\"Hel\"}\n\n");

        let parsed: StreamEvent =
            serde_json::from_str("{\"event\":\"error\",\"data\":\"boom\"}").unwrap();
        assert_eq!(parsed, StreamEvent::error("boom"));
    }

    #[test]
    fn test_tokens_variant_drops_auxiliary_events() {
        let variant = StreamVariant::Tokens;

        assert!(variant
            .wire_events(&AgentEvent::Thinking {
                text: "pondering".to_string()
            })
            .is_empty());
        assert!(variant
            .wire_events(&AgentEvent::ToolStarted {
                name: "weather".to_string(),
                input: "Paris".to_string()
            })
            .is_empty());

        let terminal = variant.wire_events(&AgentEvent::Completed {
            reply: AgentReply::default(),
        });
        assert_eq!(terminal, vec![StreamEvent::final_event()]);
    }

    #[test]
    fn test_structured_variant_emits_snapshot_before_final() {
        let variant = StreamVariant::Structured;
        let reply = AgentReply {
            response: "Paris is lovely.".to_string(),
            thinking: "look up facts".to_string(),
            function_calls: vec![FunctionCall {
                tool: "city_facts".to_string(),
                parameters: serde_json::json!({"city": "Paris"}),
            }],
            conversation_summary: Some("chat about Paris".to_string()),
        };

        let events = variant.wire_events(&AgentEvent::Completed { reply });
        assert_eq!(events.len(), 2);
        match &events[0] {
            StreamEvent::StructuredOutput { data } => {
                assert_eq!(data["response"], "Paris is lovely.");
                // Structured variant strips the summary; only Full keeps it
                assert!(data.get("conversation_summary").is_none());
            }
            other => panic!("expected structured_output, got {other:?}"),
        }
        assert_eq!(events[1], StreamEvent::final_event());
    }

    #[test]
    fn test_full_variant_keeps_summary() {
        let variant = StreamVariant::Full;
        let reply = AgentReply {
            response: "answer".to_string(),
            conversation_summary: Some("the summary".to_string()),
            ..AgentReply::default()
        };

        let events = variant.wire_events(&AgentEvent::Completed { reply });
        match &events[0] {
            StreamEvent::StructuredOutput { data } => {
                assert_eq!(data["conversation_summary"], "the summary");
            }
            other => panic!("expected structured_output, got {other:?}"),
        }
    }

    #[test]
    fn test_failure_maps_to_single_error_event() {
        let events = StreamVariant::Full.wire_events(&AgentEvent::Failed {
            error: "LLM unreachable".to_string(),
        });
        assert_eq!(events, vec![StreamEvent::error("LLM unreachable")]);
    }
}
