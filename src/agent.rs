//! Travel agent orchestration: a bounded tool-calling loop over the LLM seam
//! with conversation memory woven around each turn.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::StreamExt;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::llm::{ChatRequest, LlmClient, Message, ToolCall, ToolCallDelta};
use crate::memory::SessionMemories;
use crate::prompts;
use crate::tools::{ToolRegistry, ToolSchema};
use crate::types::{AgentReply, ChatMessage, ChatRole, FunctionCall};

/// Reasoning line used when the model gives none
const DEFAULT_THINKING: &str =
    "To help you with your request, I'll gather some relevant information.";

/// Reply used when the model produced neither an answer nor observations
const EMPTY_REPLY: &str = "I couldn't process your request.";

/// Agent loop limits
#[derive(Debug, Clone, Copy)]
pub struct AgentConfig {
    /// Max LLM turns per chat request
    pub max_iterations: usize,
    /// Sampling temperature
    pub temperature: f32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            temperature: 0.7,
        }
    }
}

/// Progress event emitted during a streaming run, in production order
#[derive(Debug, Clone)]
pub enum AgentEvent {
    /// Fragment of the final answer
    Token { text: String },
    /// Reasoning text accompanying a tool-call turn
    Thinking { text: String },
    /// A tool invocation is starting
    ToolStarted { name: String, input: String },
    /// A tool invocation finished
    ToolFinished { name: String },
    /// The conversation summary was rebuilt during this turn
    SummaryUpdated { summary: String },
    /// The run finished; carries the structured reply
    Completed { reply: AgentReply },
    /// The run failed; no further events follow
    Failed { error: String },
}

// ─── Tool call reassembly ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
struct ToolCallBuilder {
    id: String,
    name: String,
    arguments_json: String,
}

/// Reassembles streamed tool-call fragments into complete calls
#[derive(Debug, Default)]
pub struct ToolCallAccumulator {
    builders: BTreeMap<usize, ToolCallBuilder>,
}

impl ToolCallAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accumulate(&mut self, delta: &ToolCallDelta) {
        let builder = self.builders.entry(delta.index).or_default();

        if let Some(id) = &delta.id {
            if builder.id.is_empty() {
                builder.id = id.clone();
            }
        }
        if let Some(name) = &delta.name {
            if builder.name.is_empty() {
                builder.name = name.clone();
            }
        }
        if let Some(args) = &delta.arguments {
            builder.arguments_json.push_str(args);
        }
    }

    pub fn finalize(self) -> Vec<ToolCall> {
        self.builders
            .into_values()
            .map(|builder| ToolCall {
                id: builder.id,
                name: builder.name,
                arguments: parse_arguments(&builder.arguments_json),
            })
            .collect()
    }
}

fn parse_arguments(json: &str) -> Value {
    if json.trim().is_empty() {
        return Value::Null;
    }
    match serde_json::from_str(json) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(
                json_len = json.len(),
                error = %e,
                "failed to parse streamed tool call arguments"
            );
            Value::Object(serde_json::Map::new())
        }
    }
}

// ─── Agent ────────────────────────────────────────────────────────────────────

/// The travel assistant: LLM, tools, and per-session memory
pub struct TravelAgent {
    llm: Arc<dyn LlmClient>,
    tools: Arc<ToolRegistry>,
    memory: Arc<SessionMemories>,
    config: AgentConfig,
}

impl TravelAgent {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        tools: Arc<ToolRegistry>,
        memory: Arc<SessionMemories>,
    ) -> Self {
        Self {
            llm,
            tools,
            memory,
            config: AgentConfig::default(),
        }
    }

    pub fn with_config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    /// Run one chat turn and return the structured reply
    pub async fn chat(&self, session_id: &str, user_input: &str) -> Result<AgentReply> {
        self.run(session_id, user_input, None).await
    }

    /// Run one chat turn, emitting progress events on `tx`.
    ///
    /// Always terminates the event stream with `Completed` or `Failed`.
    pub async fn chat_streaming(
        &self,
        session_id: &str,
        user_input: &str,
        tx: mpsc::Sender<AgentEvent>,
    ) {
        match self.run(session_id, user_input, Some(&tx)).await {
            Ok(reply) => {
                let _ = tx.send(AgentEvent::Completed { reply }).await;
            }
            Err(e) => {
                tracing::error!(error = %e, session_id, "agent run failed");
                let _ = tx
                    .send(AgentEvent::Failed {
                        error: e.to_string(),
                    })
                    .await;
            }
        }
    }

    async fn run(
        &self,
        session_id: &str,
        user_input: &str,
        emitter: Option<&mpsc::Sender<AgentEvent>>,
    ) -> Result<AgentReply> {
        // Buffer the user turn first; a failed fold must not block the chat
        if let Err(e) = self
            .memory
            .append(session_id, ChatMessage::user(user_input))
            .await
        {
            tracing::warn!(error = %e, session_id, "summarization failed on user turn");
        }

        let view = self.memory.view(session_id).await;
        let mut messages =
            vec![Message::system(prompts::system_prompt_with_summary(&view.summary))];
        for message in &view.buffered_messages {
            match message.role {
                ChatRole::User => messages.push(Message::user(message.content.clone())),
                ChatRole::Assistant => messages.push(Message::assistant(message.content.clone())),
                // Operational and transient turns stay out of the prompt
                ChatRole::System | ChatRole::Thinking => {}
            }
        }

        let schemas = self.tools.schemas();
        let mut thinking = String::new();
        let mut function_calls: Vec<FunctionCall> = Vec::new();
        let mut observations: Vec<String> = Vec::new();
        let mut response: Option<String> = None;

        for _ in 0..self.config.max_iterations {
            let (text_parts, calls) = self.llm_turn(&messages, &schemas, emitter).await?;
            let text = text_parts.concat();

            if calls.is_empty() {
                if let Some(tx) = emitter {
                    for part in &text_parts {
                        let _ = tx.send(AgentEvent::Token { text: part.clone() }).await;
                    }
                }
                response = Some(text);
                break;
            }

            if !text.trim().is_empty() {
                if let Some(tx) = emitter {
                    let _ = tx
                        .send(AgentEvent::Thinking {
                            text: text.trim().to_string(),
                        })
                        .await;
                }
                if !thinking.is_empty() {
                    thinking.push('\n');
                }
                thinking.push_str(text.trim());
            }

            messages.push(Message::assistant_with_tool_calls(
                if text.is_empty() { None } else { Some(text.clone()) },
                calls.clone(),
            ));

            for call in calls {
                let city = call_city(&call.arguments);
                function_calls.push(FunctionCall {
                    tool: call.name.clone(),
                    parameters: call.arguments.clone(),
                });

                if let Some(tx) = emitter {
                    let _ = tx
                        .send(AgentEvent::ToolStarted {
                            name: call.name.clone(),
                            input: city.clone(),
                        })
                        .await;
                }

                let observation = match self.tools.call(&call.name, &city).await {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!(tool = %call.name, error = %e, "tool call failed");
                        format!("Tool {} failed: {}", call.name, e)
                    }
                };

                if let Some(tx) = emitter {
                    let _ = tx
                        .send(AgentEvent::ToolFinished {
                            name: call.name.clone(),
                        })
                        .await;
                }

                observations.push(observation.clone());
                messages.push(Message::tool_result(call.id, observation));
            }
        }

        let response = match response {
            Some(r) if !r.trim().is_empty() => r,
            // Iteration cap or an empty answer: degrade to the raw observations
            _ => {
                if observations.is_empty() {
                    EMPTY_REPLY.to_string()
                } else {
                    observations.join("\n\n")
                }
            }
        };

        if thinking.is_empty() {
            thinking = DEFAULT_THINKING.to_string();
        }

        match self
            .memory
            .append(session_id, ChatMessage::assistant(response.clone()))
            .await
        {
            Ok(true) => {
                let summary = self.memory.view(session_id).await.summary;
                if let Some(tx) = emitter {
                    let _ = tx
                        .send(AgentEvent::SummaryUpdated {
                            summary: summary.clone(),
                        })
                        .await;
                }
            }
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(error = %e, session_id, "summarization failed on assistant turn");
            }
        }

        let summary = self.memory.view(session_id).await.summary;
        Ok(AgentReply {
            response,
            thinking,
            function_calls,
            conversation_summary: if summary.is_empty() {
                None
            } else {
                Some(summary)
            },
        })
    }

    /// One LLM turn. Streaming runs consume the token stream and reassemble
    /// any tool calls; non-streaming runs use a single completion call.
    async fn llm_turn(
        &self,
        messages: &[Message],
        schemas: &[ToolSchema],
        emitter: Option<&mpsc::Sender<AgentEvent>>,
    ) -> Result<(Vec<String>, Vec<ToolCall>)> {
        let request = ChatRequest::new(messages.to_vec())
            .with_tools(schemas.to_vec())
            .with_temperature(self.config.temperature);

        if emitter.is_none() {
            let completion = self.llm.complete(request).await?;
            let parts = match completion.content {
                Some(content) if !content.is_empty() => vec![content],
                _ => vec![],
            };
            return Ok((parts, completion.tool_calls));
        }

        let mut stream = self.llm.complete_stream(request);
        let mut parts: Vec<String> = Vec::new();
        let mut accumulator = ToolCallAccumulator::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if !chunk.text.is_empty() {
                parts.push(chunk.text);
            }
            if let Some(delta) = chunk.tool_call_delta {
                accumulator.accumulate(&delta);
            }
        }

        Ok((parts, accumulator.finalize()))
    }
}

/// Pull the city argument out of a tool call
fn call_city(arguments: &Value) -> String {
    if let Some(city) = arguments.get("city").and_then(Value::as_str) {
        return city.to_string();
    }
    arguments.as_str().unwrap_or_default().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{MockLlm, MockStep};
    use crate::memory::{MemoryConfig, SessionMemories};
    use crate::tools::travel_toolkit;

    fn agent_with(llm: MockLlm) -> TravelAgent {
        let llm: Arc<dyn LlmClient> = Arc::new(llm);
        let tools = Arc::new(travel_toolkit(reqwest::Client::new()));
        let memory = Arc::new(SessionMemories::new(Arc::clone(&llm)));
        TravelAgent::new(llm, tools, memory)
    }

    #[test]
    fn test_tool_call_accumulator_reassembles_fragments() {
        let mut acc = ToolCallAccumulator::new();
        acc.accumulate(&ToolCallDelta {
            index: 0,
            id: Some("call_1".to_string()),
            name: Some("time".to_string()),
            arguments: Some("{\"city\":".to_string()),
        });
        acc.accumulate(&ToolCallDelta {
            index: 0,
            id: None,
            name: None,
            arguments: Some("\"Tokyo\"}".to_string()),
        });

        let calls = acc.finalize();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "call_1");
        assert_eq!(calls[0].name, "time");
        assert_eq!(calls[0].arguments, serde_json::json!({"city": "Tokyo"}));
    }

    #[test]
    fn test_tool_call_accumulator_orders_by_index() {
        let mut acc = ToolCallAccumulator::new();
        acc.accumulate(&ToolCallDelta {
            index: 1,
            id: Some("call_2".to_string()),
            name: Some("weather".to_string()),
            arguments: Some("{}".to_string()),
        });
        acc.accumulate(&ToolCallDelta {
            index: 0,
            id: Some("call_1".to_string()),
            name: Some("time".to_string()),
            arguments: Some("{}".to_string()),
        });

        let calls = acc.finalize();
        assert_eq!(calls[0].name, "time");
        assert_eq!(calls[1].name, "weather");
    }

    #[tokio::test]
    async fn test_chat_records_tool_calls_and_memory() {
        let agent = agent_with(MockLlm::from_steps(vec![
            MockStep::tool_call("call_1", "time", serde_json::json!({"city": "Tokyo"})),
            MockStep::text("It is a fine hour in Tokyo."),
        ]));

        let reply = agent.chat("default", "What time is it in Tokyo?").await.unwrap();

        assert_eq!(reply.response, "It is a fine hour in Tokyo.");
        assert_eq!(reply.thinking, DEFAULT_THINKING);
        assert_eq!(reply.function_calls.len(), 1);
        assert_eq!(reply.function_calls[0].tool, "time");
        assert_eq!(
            reply.function_calls[0].parameters,
            serde_json::json!({"city": "Tokyo"})
        );

        let view = agent.memory.view("default").await;
        assert_eq!(view.buffered_messages.len(), 2);
        assert_eq!(view.buffered_messages[0].role, ChatRole::User);
        assert_eq!(view.buffered_messages[1].role, ChatRole::Assistant);
    }

    #[tokio::test]
    async fn test_iteration_cap_degrades_to_observations() {
        // The model never stops asking for tools; the agent composes the
        // answer from what the tools returned
        let steps: Vec<MockStep> = (0..6)
            .map(|i| {
                MockStep::tool_call(
                    format!("call_{i}"),
                    "time",
                    serde_json::json!({"city": "Tokyo"}),
                )
            })
            .collect();
        let agent = agent_with(MockLlm::from_steps(steps));

        let reply = agent.chat("default", "time in Tokyo?").await.unwrap();
        assert!(reply.response.contains("Tokyo"));
        assert_eq!(reply.function_calls.len(), 5);
    }

    #[tokio::test]
    async fn test_streaming_event_order() {
        let agent = agent_with(MockLlm::from_steps(vec![
            MockStep::tool_call("call_1", "time", serde_json::json!({"city": "Paris"})),
            MockStep::text("All quiet in Paris."),
        ]));

        let (tx, mut rx) = mpsc::channel(64);
        agent.chat_streaming("default", "how is Paris?", tx).await;

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }

        assert!(matches!(events[0], AgentEvent::ToolStarted { .. }));
        assert!(matches!(events[1], AgentEvent::ToolFinished { .. }));

        let tokens: String = events
            .iter()
            .filter_map(|e| match e {
                AgentEvent::Token { text } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(tokens, "All quiet in Paris.");

        match events.last().unwrap() {
            AgentEvent::Completed { reply } => {
                assert_eq!(reply.response, "All quiet in Paris.");
            }
            other => panic!("expected Completed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_streaming_failure_emits_failed() {
        let agent = agent_with(MockLlm::from_steps(vec![MockStep::error(
            "provider unreachable",
        )]));

        let (tx, mut rx) = mpsc::channel(64);
        agent.chat_streaming("default", "hello", tx).await;

        let mut last = None;
        while let Some(event) = rx.recv().await {
            last = Some(event);
        }
        match last.unwrap() {
            AgentEvent::Failed { error } => assert!(error.contains("provider unreachable")),
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_summary_surfaces_in_reply_after_fold() {
        let llm: Arc<dyn LlmClient> = Arc::new(MockLlm::from_steps(vec![
            MockStep::text("First answer."),
            MockStep::text("a running summary"),
            MockStep::text("Second answer."),
        ]));
        let tools = Arc::new(travel_toolkit(reqwest::Client::new()));
        let memory = Arc::new(SessionMemories::with_config(
            Arc::clone(&llm),
            MemoryConfig {
                buffer_size: 4,
                summarization_threshold: 3,
                keep_recent: 1,
            },
        ));
        let agent = TravelAgent::new(llm, tools, memory);

        let first = agent.chat("default", "hi").await.unwrap();
        assert!(first.conversation_summary.is_none());

        // Third append (user turn of second chat) crosses the threshold
        let second = agent.chat("default", "more").await.unwrap();
        assert_eq!(
            second.conversation_summary.as_deref(),
            Some("a running summary")
        );
    }
}
