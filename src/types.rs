//! Conversation message types and structured agent output

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for chat sessions
pub type SessionId = String;

/// Session used when a request carries no session id
pub const DEFAULT_SESSION: &str = "default";

/// Who produced a message
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    /// End-user input
    User,
    /// Agent reply shown to the user
    Assistant,
    /// Operational notices (errors, separators)
    System,
    /// Transient reasoning text, never part of the durable transcript
    Thinking,
}

impl std::fmt::Display for ChatRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChatRole::User => write!(f, "user"),
            ChatRole::Assistant => write!(f, "assistant"),
            ChatRole::System => write!(f, "system"),
            ChatRole::Thinking => write!(f, "thinking"),
        }
    }
}

/// One conversation turn
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    /// Unique identifier
    pub id: Uuid,
    /// Who produced the message
    pub role: ChatRole,
    /// Message text
    pub content: String,
    /// When the message was created
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    /// Create a new message with a fresh id and timestamp
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(ChatRole::User, content)
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(ChatRole::Assistant, content)
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(ChatRole::System, content)
    }

    /// Create a thinking message
    pub fn thinking(content: impl Into<String>) -> Self {
        Self::new(ChatRole::Thinking, content)
    }
}

/// Structured record of one tool invocation made by the agent
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionCall {
    /// Name of the tool that was called
    pub tool: String,
    /// Arguments the tool was called with
    pub parameters: serde_json::Value,
}

/// Structured agent output for one chat turn
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentReply {
    /// Final response to the user
    pub response: String,
    /// Reasoning text gathered while deciding which tools to use
    pub thinking: String,
    /// Tool invocations made during the turn, in order
    #[serde(default)]
    pub function_calls: Vec<FunctionCall>,
    /// Running conversation summary, when one exists
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_summary: Option<String>,
}

/// Counters describing a session's memory state
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MemoryStats {
    /// Messages appended over the session's lifetime
    pub total_messages: u64,
    /// Messages currently in the un-summarized buffer
    pub buffered_messages: usize,
    /// How many times the summary has been rebuilt
    pub summarization_count: u64,
    /// When the summary was last rebuilt
    pub last_summarization: Option<DateTime<Utc>>,
    /// Whether a non-empty summary exists
    pub has_summary: bool,
}
