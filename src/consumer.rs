//! Client half of the event stream: incremental line parsing and transcript
//! reconstruction.
//!
//! Bytes are buffered and split on newlines; a partial trailing line waits for
//! the next read. Each complete `data: `-prefixed line is decoded as one
//! tagged event and dispatched to the transcript channels.

use futures::StreamExt;
use once_cell::sync::Lazy;
use regex::Regex;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::stream::StreamEvent;
use crate::types::FunctionCall;

/// Marker some models prepend to the final answer
const FINAL_ANSWER_MARKER: &str = "Final Answer:";

// Best-effort extraction of LLM output quoted inside provider error messages.
// The patterns are tried in order and the first match wins. This is a
// compatibility shim for observed error formats, not a guaranteed contract.
static ERROR_PATTERNS: Lazy<[Regex; 3]> = Lazy::new(|| {
    [
        Regex::new(r"(?s)Could not parse LLM output: `(.*?)`").expect("backtick pattern"),
        Regex::new(r#"(?s)Could not parse LLM output: "(.*?)""#).expect("quote pattern"),
        Regex::new(r"(?s)Could not parse LLM output: (.*?)(?:\nFor troubleshooting|$)")
            .expect("bare pattern"),
    ]
});

static THINK_TAGS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<think>(.*?)</think>\s*(.*)").expect("think pattern"));

/// Reconstructed view of one streamed chat turn
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    /// In-progress assistant message
    pub response: String,
    /// Transient reasoning channel; cleared when the stream finishes
    pub thinking: String,
    /// System notices (errors that resisted extraction, transport problems)
    pub notices: Vec<String>,
    /// Structured tool invocations reported by the backend
    pub function_calls: Vec<FunctionCall>,
    /// Conversation summary reported by the backend
    pub summary: Option<String>,
    /// Whether the stream reached its terminal event
    pub done: bool,
}

/// Incremental parser for the server's event stream
#[derive(Debug, Default)]
pub struct StreamConsumer {
    buffer: String,
    pub transcript: Transcript,
}

impl StreamConsumer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes; complete lines are consumed, the rest is buffered
    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.buffer.push_str(&String::from_utf8_lossy(bytes));

        while let Some(pos) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=pos).collect();
            self.handle_line(line.trim_end_matches(['\n', '\r']));
        }
    }

    /// Flush a trailing line that never received its newline
    pub fn finish(&mut self) {
        if !self.buffer.is_empty() {
            let line = std::mem::take(&mut self.buffer);
            self.handle_line(line.trim_end_matches('\r'));
        }
    }

    fn handle_line(&mut self, line: &str) {
        let payload = match line.strip_prefix("data: ") {
            Some(p) => p,
            None => return,
        };
        // Unknown kinds and malformed payloads are skipped, not fatal
        match serde_json::from_str::<StreamEvent>(payload) {
            Ok(event) => self.apply(event),
            Err(e) => {
                tracing::debug!(error = %e, "skipping unparseable stream record");
            }
        }
    }

    /// Apply one decoded event to the transcript
    pub fn apply(&mut self, event: StreamEvent) {
        match event {
            StreamEvent::Token { token } => self.apply_token(&token),
            StreamEvent::StructuredOutput { data } => self.apply_structured(data),
            StreamEvent::Message { data } => self.transcript.response.push_str(&data),
            StreamEvent::Error { data } => self.apply_error(&data),
            StreamEvent::Final { .. } => {
                self.transcript.thinking.clear();
                self.transcript.done = true;
            }
        }
    }

    fn apply_token(&mut self, token: &str) {
        // Some providers push whole-message snapshots instead of deltas
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(token) {
            if let Some(response) = value.get("response").and_then(|v| v.as_str()) {
                self.transcript.response = strip_final_answer(response);
                return;
            }
        }
        self.transcript.response.push_str(token);
    }

    fn apply_structured(&mut self, data: serde_json::Value) {
        // Payload arrives either as embedded JSON text or as an object
        let data = match data {
            serde_json::Value::String(text) => match serde_json::from_str(&text) {
                Ok(value) => value,
                Err(e) => {
                    tracing::debug!(error = %e, "structured_output payload is not JSON");
                    return;
                }
            },
            other => other,
        };

        if let Some(response) = data.get("response").and_then(|v| v.as_str()) {
            self.transcript.response = strip_final_answer(response);
        }
        if let Some(thinking) = data.get("thinking").and_then(|v| v.as_str()) {
            self.transcript.thinking.push_str(thinking);
        }
        if let Some(calls) = data.get("function_calls") {
            if let Ok(calls) = serde_json::from_value::<Vec<FunctionCall>>(calls.clone()) {
                self.transcript.function_calls = calls;
            }
        }
        if let Some(summary) = data.get("conversation_summary").and_then(|v| v.as_str()) {
            self.transcript.summary = Some(summary.to_string());
        }
    }

    fn apply_error(&mut self, raw: &str) {
        match extract_llm_output(raw) {
            Some(embedded) => {
                let (thinking, response) = split_think_tags(&embedded);
                if let Some(thinking) = thinking {
                    self.transcript.thinking = thinking;
                }
                self.transcript.response = strip_final_answer(&response);
            }
            None => self.transcript.notices.push(raw.to_string()),
        }
    }
}

/// Strip the leading final-answer marker, if present
fn strip_final_answer(text: &str) -> String {
    let trimmed = text.trim_start();
    match trimmed.strip_prefix(FINAL_ANSWER_MARKER) {
        Some(rest) => rest.trim_start().to_string(),
        None => text.to_string(),
    }
}

/// Try the known error-message patterns in order; first match wins
fn extract_llm_output(error_text: &str) -> Option<String> {
    for pattern in ERROR_PATTERNS.iter() {
        if let Some(captures) = pattern.captures(error_text) {
            let extracted = captures.get(1)?.as_str().trim();
            if !extracted.is_empty() {
                return Some(extracted.to_string());
            }
        }
    }
    None
}

/// Split a `<think>...</think>` section from the remaining response text
fn split_think_tags(text: &str) -> (Option<String>, String) {
    match THINK_TAGS.captures(text) {
        Some(captures) => {
            let thinking = captures
                .get(1)
                .map(|m| m.as_str().trim().to_string())
                .filter(|s| !s.is_empty());
            let response = captures
                .get(2)
                .map(|m| m.as_str().trim().to_string())
                .unwrap_or_default();
            (thinking, response)
        }
        None => (None, text.trim().to_string()),
    }
}

/// Drive a consumer from an HTTP response until the stream ends or the token
/// is cancelled. Cancellation aborts the read without further transcript
/// updates; transport errors degrade to a notice.
pub async fn consume_response(
    response: reqwest::Response,
    consumer: &mut StreamConsumer,
    cancel: &CancellationToken,
) -> Result<()> {
    let mut byte_stream = response.bytes_stream();

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(()),
            chunk = byte_stream.next() => match chunk {
                Some(Ok(bytes)) => consumer.push_bytes(&bytes),
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "event stream read failed");
                    consumer
                        .transcript
                        .notices
                        .push(format!("Connection lost: {e}"));
                    return Ok(());
                }
                None => {
                    consumer.finish();
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_tokens_append_to_in_progress_message() {
        let mut consumer = StreamConsumer::new();
        consumer.push_bytes(b"data: {\"event\":\"token\",\"token\":\"Hel\"}\n");
        consumer.push_bytes(b"data: {\"event\":\"token\",\"token\":\"lo\"}\n");
        assert_eq!(consumer.transcript.response, "Hello");
        assert!(!consumer.transcript.done);
    }

    #[test]
    fn test_mid_line_split_reconstructs_identical_transcript() {
        let full = b"data: {\"event\":\"token\",\"token\":\"Hel\"}\ndata: {\"event\":\"token\",\"token\":\"lo\"}\ndata: {\"event\":\"final\",\"data\":\"done\"}\n";

        let mut whole = StreamConsumer::new();
        whole.push_bytes(full);

        for split_at in 1..full.len() {
            let mut split = StreamConsumer::new();
            split.push_bytes(&full[..split_at]);
            split.push_bytes(&full[split_at..]);
            assert_eq!(split.transcript.response, whole.transcript.response);
            assert_eq!(split.transcript.done, whole.transcript.done);
        }
    }

    #[test]
    fn test_token_snapshot_replaces_and_strips_marker() {
        let mut consumer = StreamConsumer::new();
        consumer.apply(StreamEvent::token("partial"));
        consumer.apply(StreamEvent::token(
            "{\"response\": \"Final Answer: Visit in spring.\"}",
        ));
        assert_eq!(consumer.transcript.response, "Visit in spring.");
    }

    #[test]
    fn test_message_appends_directly() {
        let mut consumer = StreamConsumer::new();
        consumer.apply(StreamEvent::token("Checking"));
        consumer.apply(StreamEvent::message("\n---Using weather---\n"));
        assert_eq!(consumer.transcript.response, "Checking\n---Using weather---\n");
    }

    #[test]
    fn test_structured_output_object_payload() {
        let mut consumer = StreamConsumer::new();
        consumer.apply(StreamEvent::StructuredOutput {
            data: serde_json::json!({
                "response": "Paris is lovely in June.",
                "thinking": "check the season",
                "function_calls": [{"tool": "weather", "parameters": {"city": "Paris"}}],
                "conversation_summary": "planning a Paris trip"
            }),
        });

        let t = &consumer.transcript;
        assert_eq!(t.response, "Paris is lovely in June.");
        assert_eq!(t.thinking, "check the season");
        assert_eq!(t.function_calls.len(), 1);
        assert_eq!(t.function_calls[0].tool, "weather");
        assert_eq!(t.summary.as_deref(), Some("planning a Paris trip"));
    }

    #[test]
    fn test_structured_output_string_payload() {
        let mut consumer = StreamConsumer::new();
        consumer.apply(StreamEvent::StructuredOutput {
            data: serde_json::Value::String(
                "{\"response\": \"From string payload.\"}".to_string(),
            ),
        });
        assert_eq!(consumer.transcript.response, "From string payload.");
    }

    #[test]
    fn test_error_extraction_with_think_tags() {
        let mut consumer = StreamConsumer::new();
        consumer.push_bytes(
            b"data: {\"event\":\"error\",\"data\":\"Could not parse LLM output: `<think>ponder</think>answer`\"}\n",
        );
        assert_eq!(consumer.transcript.thinking, "ponder");
        assert_eq!(consumer.transcript.response, "answer");
        assert!(consumer.transcript.notices.is_empty());
    }

    #[test]
    fn test_error_extraction_quote_pattern() {
        let mut consumer = StreamConsumer::new();
        consumer.apply(StreamEvent::error(
            "Could not parse LLM output: \"a quoted answer\"",
        ));
        assert_eq!(consumer.transcript.response, "a quoted answer");
    }

    #[test]
    fn test_error_extraction_bare_pattern_stops_at_trailer() {
        let mut consumer = StreamConsumer::new();
        consumer.apply(StreamEvent::error(
            "Could not parse LLM output: a bare answer\nFor troubleshooting, visit the docs",
        ));
        assert_eq!(consumer.transcript.response, "a bare answer");
    }

    #[test]
    fn test_unextractable_error_becomes_notice() {
        let mut consumer = StreamConsumer::new();
        consumer.apply(StreamEvent::error("connection reset by peer"));
        assert!(consumer.transcript.response.is_empty());
        assert_eq!(consumer.transcript.notices, vec!["connection reset by peer"]);
    }

    #[test]
    fn test_final_clears_thinking_and_marks_done() {
        let mut consumer = StreamConsumer::new();
        consumer.apply(StreamEvent::StructuredOutput {
            data: serde_json::json!({"thinking": "step one"}),
        });
        consumer.apply(StreamEvent::final_event());
        assert!(consumer.transcript.thinking.is_empty());
        assert!(consumer.transcript.done);
    }

    #[test]
    fn test_unknown_records_are_ignored() {
        let mut consumer = StreamConsumer::new();
        consumer.push_bytes(b"data: {\"event\":\"heartbeat\"}\n");
        consumer.push_bytes(b": comment line\n");
        consumer.push_bytes(b"data: not json at all\n");
        consumer.push_bytes(b"data: {\"event\":\"token\",\"token\":\"ok\"}\n");
        assert_eq!(consumer.transcript.response, "ok");
    }

    #[test]
    fn test_finish_flushes_trailing_line() {
        let mut consumer = StreamConsumer::new();
        consumer.push_bytes(b"data: {\"event\":\"token\",\"token\":\"tail\"}");
        assert_eq!(consumer.transcript.response, "");
        consumer.finish();
        assert_eq!(consumer.transcript.response, "tail");
    }

    #[tokio::test]
    async fn test_consume_response_end_to_end() {
        let server = MockServer::start().await;
        let body = "data: {\"event\":\"token\",\"token\":\"Hi\"}\n\
                    data: {\"event\":\"final\",\"data\":\"done\"}\n";
        Mock::given(method("GET"))
            .and(path("/stream"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(body),
            )
            .mount(&server)
            .await;

        let response = reqwest::get(format!("{}/stream", server.uri())).await.unwrap();
        let mut consumer = StreamConsumer::new();
        let cancel = CancellationToken::new();
        consume_response(response, &mut consumer, &cancel).await.unwrap();

        assert_eq!(consumer.transcript.response, "Hi");
        assert!(consumer.transcript.done);
    }

    #[tokio::test]
    async fn test_cancelled_token_stops_updates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/stream"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("data: {\"event\":\"token\",\"token\":\"never\"}\n"),
            )
            .mount(&server)
            .await;

        let response = reqwest::get(format!("{}/stream", server.uri())).await.unwrap();
        let mut consumer = StreamConsumer::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        consume_response(response, &mut consumer, &cancel).await.unwrap();

        assert_eq!(consumer.transcript.response, "");
        assert!(!consumer.transcript.done);
    }
}
