//! # Wayfarer - Travel-Assistant Agent with Summarizing Conversation Memory
//!
//! A chat agent that answers travel questions using weather, local-time, and
//! city-facts tools, keeps per-session conversation memory as a bounded buffer
//! plus a running summary, and streams progress over a line-oriented event
//! protocol consumed by the bundled CLI and `wayfarer-server`.

pub mod agent;
pub mod consumer;
pub mod error;
pub mod llm;
pub mod memory;
pub mod prompts;
pub mod stream;
pub mod tools;
pub mod types;

pub use agent::{AgentConfig, AgentEvent, TravelAgent};
pub use consumer::{consume_response, StreamConsumer, Transcript};
pub use error::{AgentError, Result};
pub use llm::{
    provider_from_env, ChatCompletion, ChatRequest, LlmClient, Message, MockLlm, MockStep,
    OpenAiCompatClient,
};
pub use memory::{ConversationMemory, MemoryConfig, MemoryView, SessionMemories};
pub use stream::{StreamEvent, StreamVariant};
pub use tools::{
    travel_toolkit, CityFactsTool, TimeTool, Tool, ToolRegistry, ToolSchema, WeatherTool,
};
pub use types::{
    AgentReply, ChatMessage, ChatRole, FunctionCall, MemoryStats, SessionId, DEFAULT_SESSION,
};

use std::sync::Arc;

use tokio::sync::mpsc;

/// Main entry point owning the LLM client, toolkit, and session memory
pub struct Assistant {
    memory: Arc<SessionMemories>,
    agent: TravelAgent,
}

impl Assistant {
    /// Create an assistant with the default toolkit and limits
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        let tools = Arc::new(travel_toolkit(reqwest::Client::new()));
        Self::with_parts(llm, tools, MemoryConfig::default(), AgentConfig::default())
    }

    /// Create an assistant with explicit toolkit and limits
    pub fn with_parts(
        llm: Arc<dyn LlmClient>,
        tools: Arc<ToolRegistry>,
        memory_config: MemoryConfig,
        agent_config: AgentConfig,
    ) -> Self {
        let memory = Arc::new(SessionMemories::with_config(Arc::clone(&llm), memory_config));
        let agent = TravelAgent::new(llm, tools, Arc::clone(&memory)).with_config(agent_config);
        Self { memory, agent }
    }

    /// Run one chat turn and return the structured reply
    pub async fn chat(&self, session_id: Option<&str>, message: &str) -> Result<AgentReply> {
        self.agent.chat(session_or_default(session_id), message).await
    }

    /// Run one chat turn, emitting progress events on `tx`
    pub async fn chat_streaming(
        &self,
        session_id: Option<&str>,
        message: &str,
        tx: mpsc::Sender<AgentEvent>,
    ) {
        self.agent
            .chat_streaming(session_or_default(session_id), message, tx)
            .await
    }

    /// Snapshot of a session's memory
    pub async fn memory_view(&self, session_id: Option<&str>) -> MemoryView {
        self.memory.view(session_or_default(session_id)).await
    }

    /// Clear a session's memory; idempotent
    pub async fn clear_memory(&self, session_id: Option<&str>) {
        self.memory.clear(session_or_default(session_id)).await
    }

    /// Force a summary rebuild for a session
    pub async fn update_summary(&self, session_id: Option<&str>) -> Result<String> {
        self.memory
            .update_summary(session_or_default(session_id))
            .await
    }

    /// Adjust a session's memory limits
    pub async fn set_memory_limits(
        &self,
        session_id: Option<&str>,
        buffer_size: Option<usize>,
        summarization_threshold: Option<usize>,
    ) -> MemoryConfig {
        self.memory
            .set_limits(
                session_or_default(session_id),
                buffer_size,
                summarization_threshold,
            )
            .await
    }
}

fn session_or_default(session_id: Option<&str>) -> &str {
    match session_id {
        Some(id) if !id.trim().is_empty() => id,
        _ => DEFAULT_SESSION,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_assistant_chat_and_memory_roundtrip() {
        let llm = Arc::new(MockLlm::from_steps(vec![MockStep::text("Hello traveler!")]));
        let assistant = Assistant::new(llm);

        let reply = assistant.chat(None, "hi").await.unwrap();
        assert_eq!(reply.response, "Hello traveler!");

        let view = assistant.memory_view(None).await;
        assert_eq!(view.stats.total_messages, 2);

        assistant.clear_memory(None).await;
        let view = assistant.memory_view(None).await;
        assert_eq!(view.stats.total_messages, 0);
        assert!(view.buffered_messages.is_empty());
        assert_eq!(view.summary, "");
    }

    #[tokio::test]
    async fn test_blank_session_id_maps_to_default() {
        let llm = Arc::new(MockLlm::from_steps(vec![MockStep::text("noted")]));
        let assistant = Assistant::new(llm);

        assistant.chat(Some("  "), "hi").await.unwrap();
        let view = assistant.memory_view(Some(DEFAULT_SESSION)).await;
        assert_eq!(view.buffered_messages.len(), 2);
    }
}
