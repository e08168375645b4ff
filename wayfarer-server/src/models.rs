use serde::{Deserialize, Serialize};
use wayfarer::{AgentReply, ChatMessage, MemoryStats};

#[derive(Debug, Deserialize)]
pub struct ChatRequestBody {
    pub message: String,
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponseBody {
    pub response: String,
    pub reasoning: String,
    pub history: Vec<ChatMessage>,
    pub agent_response: AgentReply,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub message: String,
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct MemoryQuery {
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MemoryViewResponse {
    pub summary: String,
    pub recent_messages: Vec<ChatMessage>,
    pub stats: MemoryStats,
}

#[derive(Debug, Deserialize)]
pub struct SessionBody {
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub summary: String,
}

#[derive(Debug, Deserialize)]
pub struct LimitRequestBody {
    pub session_id: Option<String>,
    pub buffer_size: Option<usize>,
    pub summarization_threshold: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct LimitResponse {
    pub buffer_size: usize,
    pub summarization_threshold: usize,
    pub keep_recent: usize,
}
