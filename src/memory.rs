//! Conversation memory: a bounded buffer of recent turns plus a running
//! summary that older turns are folded into.
//!
//! Appends past the summarization threshold trigger one LLM call that merges
//! the evicted prefix with the prior summary. A failed summarization leaves
//! the buffer untouched; the next append past threshold re-attempts. The
//! buffer-size cap always holds: if summarization keeps failing, overflow
//! messages are folded into the summary verbatim instead of being dropped.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};

use crate::error::{AgentError, Result};
use crate::llm::{ChatRequest, LlmClient, Message};
use crate::prompts;
use crate::types::{ChatMessage, ChatRole, MemoryStats, SessionId};

/// Token budget for generated summaries
const SUMMARY_MAX_TOKENS: u32 = 512;

/// Limits for the message buffer
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Hard cap on buffered messages
    pub buffer_size: usize,
    /// Buffer length at which summarization is triggered
    pub summarization_threshold: usize,
    /// Messages kept un-summarized after a fold
    pub keep_recent: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            buffer_size: 24,
            summarization_threshold: 12,
            keep_recent: 6,
        }
    }
}

impl MemoryConfig {
    /// Clamp the limits into a consistent shape:
    /// `keep_recent < summarization_threshold <= buffer_size`, all >= 1.
    fn normalize(&mut self) {
        self.buffer_size = self.buffer_size.max(1);
        self.summarization_threshold = self.summarization_threshold.clamp(1, self.buffer_size);
        self.keep_recent = self
            .keep_recent
            .min(self.summarization_threshold.saturating_sub(1));
    }
}

/// Read-only snapshot of a session's memory
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryView {
    /// Accumulated summary of evicted turns, possibly empty
    pub summary: String,
    /// Un-summarized tail of the conversation, oldest first
    pub buffered_messages: Vec<ChatMessage>,
    /// Lifetime counters
    pub stats: MemoryStats,
}

/// Summary-buffer memory for one session
pub struct ConversationMemory {
    summary: String,
    buffer: VecDeque<ChatMessage>,
    config: MemoryConfig,
    total_messages: u64,
    summarization_count: u64,
    last_summarization: Option<DateTime<Utc>>,
    llm: Arc<dyn LlmClient>,
}

impl ConversationMemory {
    /// Create a memory with default limits
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self::with_config(llm, MemoryConfig::default())
    }

    /// Create a memory with explicit limits
    pub fn with_config(llm: Arc<dyn LlmClient>, mut config: MemoryConfig) -> Self {
        config.normalize();
        Self {
            summary: String::new(),
            buffer: VecDeque::with_capacity(config.buffer_size),
            config,
            total_messages: 0,
            summarization_count: 0,
            last_summarization: None,
            llm,
        }
    }

    /// Append a message, summarizing past the threshold.
    ///
    /// Returns `true` when a summarization ran. The message is buffered even
    /// when summarization fails; the error only reports the failed fold.
    pub async fn append(&mut self, message: ChatMessage) -> Result<bool> {
        self.buffer.push_back(message);
        self.total_messages += 1;

        if self.buffer.len() < self.config.summarization_threshold {
            return Ok(false);
        }

        let result = self.summarize_prefix().await;
        self.enforce_cap();
        result.map(|_| true)
    }

    /// Fold the oldest `len - keep_recent` messages into the summary.
    /// The buffer is only mutated after the LLM call succeeds.
    async fn summarize_prefix(&mut self) -> Result<()> {
        let evict_count = self.buffer.len() - self.config.keep_recent;
        let transcript = transcript_of(self.buffer.iter().take(evict_count));

        let new_summary = self.generate_summary(&transcript).await?;

        self.buffer.drain(..evict_count);
        self.summary = new_summary;
        self.summarization_count += 1;
        self.last_summarization = Some(Utc::now());
        tracing::debug!(
            evicted = evict_count,
            buffered = self.buffer.len(),
            "folded conversation prefix into summary"
        );
        Ok(())
    }

    /// Rebuild the summary from the prior summary and the full buffer,
    /// without evicting anything.
    pub async fn update_summary(&mut self) -> Result<String> {
        let transcript = transcript_of(self.buffer.iter());
        let new_summary = self.generate_summary(&transcript).await?;

        self.summary = new_summary.clone();
        self.summarization_count += 1;
        self.last_summarization = Some(Utc::now());
        Ok(new_summary)
    }

    async fn generate_summary(&self, transcript: &str) -> Result<String> {
        let input = prompts::summarization_input(&self.summary, transcript);
        let request = ChatRequest::new(vec![Message::user(input)])
            .with_max_tokens(SUMMARY_MAX_TOKENS);

        let completion = self
            .llm
            .complete(request)
            .await
            .map_err(|e| AgentError::Summarization(e.to_string()))?;

        let summary = completion.content.unwrap_or_default();
        if summary.trim().is_empty() {
            return Err(AgentError::Summarization(
                "summarizer returned empty text".to_string(),
            ));
        }
        Ok(summary)
    }

    /// Keep the buffer-size cap without dropping content: overflow messages
    /// are folded into the summary as verbatim transcript lines.
    fn enforce_cap(&mut self) {
        while self.buffer.len() > self.config.buffer_size {
            if let Some(message) = self.buffer.pop_front() {
                if !self.summary.is_empty() {
                    self.summary.push('\n');
                }
                self.summary.push_str(&transcript_line(&message));
                tracing::warn!(
                    role = %message.role,
                    "buffer over capacity with summarization unavailable, folded message verbatim"
                );
            }
        }
    }

    /// Snapshot of the current state; performs no I/O
    pub fn view(&self) -> MemoryView {
        MemoryView {
            summary: self.summary.clone(),
            buffered_messages: self.buffer.iter().cloned().collect(),
            stats: self.stats(),
        }
    }

    /// Current counters
    pub fn stats(&self) -> MemoryStats {
        MemoryStats {
            total_messages: self.total_messages,
            buffered_messages: self.buffer.len(),
            summarization_count: self.summarization_count,
            last_summarization: self.last_summarization,
            has_summary: !self.summary.is_empty(),
        }
    }

    /// Reset to the empty state; idempotent
    pub fn clear(&mut self) {
        self.summary.clear();
        self.buffer.clear();
        self.total_messages = 0;
        self.summarization_count = 0;
        self.last_summarization = None;
    }

    /// Set the hard buffer cap; effective on the next append
    pub fn set_buffer_size(&mut self, buffer_size: usize) {
        self.config.buffer_size = buffer_size;
        self.config.normalize();
    }

    /// Set the summarization trigger; effective on the next append
    pub fn set_summarization_threshold(&mut self, threshold: usize) {
        self.config.summarization_threshold = threshold;
        self.config.normalize();
    }

    /// Current limits
    pub fn config(&self) -> MemoryConfig {
        self.config
    }
}

fn transcript_line(message: &ChatMessage) -> String {
    let speaker = match message.role {
        ChatRole::User => "User",
        ChatRole::Assistant => "Assistant",
        ChatRole::System => "System",
        ChatRole::Thinking => "Thinking",
    };
    format!("{}: {}", speaker, message.content)
}

fn transcript_of<'a>(messages: impl Iterator<Item = &'a ChatMessage>) -> String {
    let mut output = String::new();
    for message in messages {
        output.push_str(&transcript_line(message));
        output.push('\n');
    }
    output
}

// ─── Session map ──────────────────────────────────────────────────────────────

struct SessionEntry {
    memory: Mutex<ConversationMemory>,
    snapshot: RwLock<MemoryView>,
}

/// Process-wide conversation memory, keyed by session id.
///
/// Mutations are serialized per session through a `Mutex`; reads go through a
/// cached snapshot refreshed after every mutation, so `view` never waits on a
/// summarization call in flight.
pub struct SessionMemories {
    llm: Arc<dyn LlmClient>,
    config: MemoryConfig,
    sessions: RwLock<HashMap<SessionId, Arc<SessionEntry>>>,
}

impl SessionMemories {
    /// Create a session map with default limits
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self::with_config(llm, MemoryConfig::default())
    }

    /// Create a session map with explicit limits for new sessions
    pub fn with_config(llm: Arc<dyn LlmClient>, mut config: MemoryConfig) -> Self {
        config.normalize();
        Self {
            llm,
            config,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    async fn entry(&self, session_id: &str) -> Arc<SessionEntry> {
        {
            let sessions = self.sessions.read().await;
            if let Some(entry) = sessions.get(session_id) {
                return Arc::clone(entry);
            }
        }

        let mut sessions = self.sessions.write().await;
        Arc::clone(sessions.entry(session_id.to_string()).or_insert_with(|| {
            Arc::new(SessionEntry {
                memory: Mutex::new(ConversationMemory::with_config(
                    Arc::clone(&self.llm),
                    self.config,
                )),
                snapshot: RwLock::new(MemoryView::default()),
            })
        }))
    }

    async fn refresh_snapshot(entry: &SessionEntry, memory: &ConversationMemory) {
        *entry.snapshot.write().await = memory.view();
    }

    /// Append a message to a session, creating the session on first use
    pub async fn append(&self, session_id: &str, message: ChatMessage) -> Result<bool> {
        let entry = self.entry(session_id).await;
        let mut memory = entry.memory.lock().await;
        let result = memory.append(message).await;
        Self::refresh_snapshot(&entry, &memory).await;
        result
    }

    /// Snapshot of a session's memory; an unknown session reads as empty
    pub async fn view(&self, session_id: &str) -> MemoryView {
        let sessions = self.sessions.read().await;
        match sessions.get(session_id) {
            Some(entry) => entry.snapshot.read().await.clone(),
            None => MemoryView::default(),
        }
    }

    /// Clear a session; unknown sessions are a no-op
    pub async fn clear(&self, session_id: &str) {
        let sessions = self.sessions.read().await;
        if let Some(entry) = sessions.get(session_id) {
            let mut memory = entry.memory.lock().await;
            memory.clear();
            Self::refresh_snapshot(entry, &memory).await;
        }
    }

    /// Force a summary rebuild for a session
    pub async fn update_summary(&self, session_id: &str) -> Result<String> {
        let entry = self.entry(session_id).await;
        let mut memory = entry.memory.lock().await;
        let result = memory.update_summary().await;
        Self::refresh_snapshot(&entry, &memory).await;
        result
    }

    /// Adjust a session's limits; effective on its next append
    pub async fn set_limits(
        &self,
        session_id: &str,
        buffer_size: Option<usize>,
        summarization_threshold: Option<usize>,
    ) -> MemoryConfig {
        let entry = self.entry(session_id).await;
        let mut memory = entry.memory.lock().await;
        if let Some(size) = buffer_size {
            memory.set_buffer_size(size);
        }
        if let Some(threshold) = summarization_threshold {
            memory.set_summarization_threshold(threshold);
        }
        let config = memory.config();
        Self::refresh_snapshot(&entry, &memory).await;
        config
    }
}
