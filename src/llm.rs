//! LLM client seam: chat-completion trait, an OpenAI-compatible provider, and
//! a scripted mock for tests.
//!
//! The provider speaks the `/chat/completions` protocol with native tool
//! calling, which covers both OpenAI and Groq through `base_url`.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::error::{AgentError, Result};
use crate::tools::ToolSchema;

/// Provider-facing message role
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// Provider-facing chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Tool calls made by the assistant (for assistant messages)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

impl Message {
    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            tool_call_id: None,
            tool_calls: None,
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool_call_id: None,
            tool_calls: None,
        }
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_call_id: None,
            tool_calls: None,
        }
    }

    /// Create an assistant message carrying tool calls
    pub fn assistant_with_tool_calls(content: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.unwrap_or_default(),
            tool_call_id: None,
            tool_calls: Some(tool_calls),
        }
    }

    /// Create a tool result message
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_call_id: Some(tool_call_id.into()),
            tool_calls: None,
        }
    }
}

/// Tool call requested by the LLM
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// Reason a completion finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    ToolCalls,
    MaxTokens,
    Error,
}

/// Full (non-streaming) completion response
#[derive(Debug, Clone)]
pub struct ChatCompletion {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub finish_reason: FinishReason,
}

/// Incremental fragment of a tool call emitted during streaming
#[derive(Debug, Clone)]
pub struct ToolCallDelta {
    pub index: usize,
    pub id: Option<String>,
    pub name: Option<String>,
    pub arguments: Option<String>,
}

/// One streamed fragment of a completion
#[derive(Debug, Clone, Default)]
pub struct StreamChunk {
    /// Text delta, possibly empty
    pub text: String,
    /// Tool call fragment, when the model is building a call
    pub tool_call_delta: Option<ToolCallDelta>,
    /// Set on the terminal chunk
    pub finish_reason: Option<FinishReason>,
}

impl StreamChunk {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn finished(reason: FinishReason) -> Self {
        Self {
            finish_reason: Some(reason),
            ..Self::default()
        }
    }
}

/// Boxed stream of completion chunks
pub type StreamResult = Pin<Box<dyn Stream<Item = Result<StreamChunk>> + Send>>;

/// Chat-completion request
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    pub tools: Vec<ToolSchema>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl ChatRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            tools: vec![],
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolSchema>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Chat-completion client seam
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Provider name, e.g. "openai"
    fn provider(&self) -> &str;

    /// Model identifier
    fn model(&self) -> &str;

    /// Complete a chat request in one round trip
    async fn complete(&self, request: ChatRequest) -> Result<ChatCompletion>;

    /// Complete a chat request as a token stream
    fn complete_stream(&self, request: ChatRequest) -> StreamResult;
}

// ─── OpenAI-compatible provider ───────────────────────────────────────────────

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";

const OPENAI_DEFAULT_MODEL: &str = "gpt-4o-mini";
const GROQ_DEFAULT_MODEL: &str = "deepseek-r1-distill-llama-70b";

/// Client for OpenAI-compatible chat-completion APIs (OpenAI, Groq)
pub struct OpenAiCompatClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    provider: String,
}

impl OpenAiCompatClient {
    /// Create a client against the OpenAI API
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            model: OPENAI_DEFAULT_MODEL.to_string(),
            base_url: OPENAI_BASE_URL.to_string(),
            provider: "openai".to_string(),
        }
    }

    /// Create a client against the Groq API
    pub fn groq(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            model: GROQ_DEFAULT_MODEL.to_string(),
            base_url: GROQ_BASE_URL.to_string(),
            provider: "groq".to_string(),
        }
    }

    /// Set the model to use
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set a custom base URL (API-compatible services, tests)
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn request_body(&self, request: &ChatRequest, stream: bool) -> Value {
        let messages: Vec<WireMessage> = request.messages.iter().map(WireMessage::from).collect();

        let tools: Option<Vec<WireTool>> = if request.tools.is_empty() {
            None
        } else {
            Some(
                request
                    .tools
                    .iter()
                    .map(|t| WireTool {
                        r#type: "function".to_string(),
                        function: WireFunction {
                            name: t.name.clone(),
                            description: t.description.clone(),
                            parameters: t.parameters.clone(),
                        },
                    })
                    .collect(),
            )
        };

        serde_json::json!({
            "model": self.model,
            "messages": messages,
            "tools": tools,
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
            "stream": stream,
        })
    }
}

#[derive(Serialize)]
struct WireMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireMessageToolCall>>,
}

impl From<&Message> for WireMessage {
    fn from(m: &Message) -> Self {
        let role = match m.role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
        .to_string();

        let tool_calls = m.tool_calls.as_ref().map(|tcs| {
            tcs.iter()
                .map(|tc| WireMessageToolCall {
                    id: tc.id.clone(),
                    r#type: "function".to_string(),
                    function: WireFunctionCall {
                        name: tc.name.clone(),
                        arguments: serde_json::to_string(&tc.arguments).unwrap_or_default(),
                    },
                })
                .collect()
        });

        // Assistant messages that only carry tool calls have null content
        let content = if m.tool_calls.is_some() && m.content.is_empty() {
            None
        } else {
            Some(m.content.clone())
        };

        WireMessage {
            role,
            content,
            tool_call_id: m.tool_call_id.clone(),
            tool_calls,
        }
    }
}

#[derive(Serialize)]
struct WireMessageToolCall {
    id: String,
    r#type: String,
    function: WireFunctionCall,
}

#[derive(Serialize)]
struct WireFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Serialize)]
struct WireTool {
    r#type: String,
    function: WireFunction,
}

#[derive(Serialize)]
struct WireFunction {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireResponseMessage,
    finish_reason: String,
}

#[derive(Deserialize)]
struct WireResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<WireResponseToolCall>>,
}

#[derive(Deserialize)]
struct WireResponseToolCall {
    id: String,
    function: WireResponseFunction,
}

#[derive(Deserialize)]
struct WireResponseFunction {
    name: String,
    arguments: String,
}

#[derive(Deserialize)]
struct WireStreamResponse {
    choices: Vec<WireStreamChoice>,
}

#[derive(Deserialize)]
struct WireStreamChoice {
    delta: WireStreamDelta,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct WireStreamDelta {
    content: Option<String>,
    tool_calls: Option<Vec<WireStreamToolCall>>,
}

#[derive(Deserialize)]
struct WireStreamToolCall {
    index: usize,
    id: Option<String>,
    function: Option<WireStreamFunction>,
}

#[derive(Deserialize)]
struct WireStreamFunction {
    name: Option<String>,
    arguments: Option<String>,
}

fn parse_finish_reason(reason: &str) -> FinishReason {
    match reason {
        "stop" => FinishReason::Stop,
        "tool_calls" => FinishReason::ToolCalls,
        "length" => FinishReason::MaxTokens,
        _ => FinishReason::Error,
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatClient {
    fn provider(&self) -> &str {
        &self.provider
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: ChatRequest) -> Result<ChatCompletion> {
        let body = self.request_body(&request, false);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AgentError::Llm(format!(
                "{} returned {status}: {text}",
                self.provider
            )));
        }

        let data: WireResponse = response.json().await?;
        let choice = data
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AgentError::Llm(format!("no choices from {}", self.provider)))?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| ToolCall {
                id: tc.id,
                name: tc.function.name,
                arguments: serde_json::from_str(&tc.function.arguments).unwrap_or(Value::Null),
            })
            .collect();

        Ok(ChatCompletion {
            content: choice.message.content,
            tool_calls,
            finish_reason: parse_finish_reason(&choice.finish_reason),
        })
    }

    fn complete_stream(&self, request: ChatRequest) -> StreamResult {
        let client = self.client.clone();
        let api_key = self.api_key.clone();
        let base_url = self.base_url.clone();
        let provider = self.provider.clone();
        let body = self.request_body(&request, true);

        Box::pin(async_stream::stream! {
            let response = match client
                .post(format!("{base_url}/chat/completions"))
                .header("Authorization", format!("Bearer {api_key}"))
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(e) => {
                    yield Err(AgentError::Llm(format!("request failed: {e}")));
                    return;
                }
            };

            if !response.status().is_success() {
                let status = response.status();
                let text = response.text().await.unwrap_or_default();
                yield Err(AgentError::Llm(format!("{provider} returned {status}: {text}")));
                return;
            }

            let mut byte_stream = response.bytes_stream();
            let mut buffer = String::new();
            // id/name arrive once per call index, argument fragments repeat
            let mut call_ids: HashMap<usize, String> = HashMap::new();
            let mut call_names: HashMap<usize, String> = HashMap::new();

            while let Some(chunk_result) = byte_stream.next().await {
                let chunk = match chunk_result {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        yield Err(AgentError::Llm(format!("stream error: {e}")));
                        return;
                    }
                };

                buffer.push_str(&String::from_utf8_lossy(&chunk));

                // Process complete SSE events, keeping any partial tail
                while let Some(pos) = buffer.find("\n\n") {
                    let event_str = buffer[..pos].to_string();
                    buffer = buffer[pos + 2..].to_string();

                    for line in event_str.lines() {
                        let data = match line.strip_prefix("data: ") {
                            Some(d) => d,
                            None => continue,
                        };
                        if data.trim() == "[DONE]" {
                            continue;
                        }

                        let parsed: WireStreamResponse = match serde_json::from_str(data) {
                            Ok(p) => p,
                            Err(_) => continue,
                        };

                        for choice in parsed.choices {
                            if let Some(reason) = choice.finish_reason {
                                yield Ok(StreamChunk::finished(parse_finish_reason(&reason)));
                                continue;
                            }

                            if let Some(content) = choice.delta.content {
                                if !content.is_empty() {
                                    yield Ok(StreamChunk::text(content));
                                }
                            }

                            for tc in choice.delta.tool_calls.unwrap_or_default() {
                                if let Some(id) = &tc.id {
                                    call_ids.insert(tc.index, id.clone());
                                }
                                if let Some(name) =
                                    tc.function.as_ref().and_then(|f| f.name.clone())
                                {
                                    call_names.insert(tc.index, name);
                                }
                                let arguments =
                                    tc.function.as_ref().and_then(|f| f.arguments.clone());

                                yield Ok(StreamChunk {
                                    text: String::new(),
                                    tool_call_delta: Some(ToolCallDelta {
                                        index: tc.index,
                                        id: call_ids.get(&tc.index).cloned(),
                                        name: call_names.get(&tc.index).cloned(),
                                        arguments,
                                    }),
                                    finish_reason: None,
                                });
                            }
                        }
                    }
                }
            }
        })
    }
}

/// Build an LLM client from the environment.
///
/// `WAYFARER_PROVIDER` selects `openai` (default) or `groq`;
/// `WAYFARER_MODEL` overrides the provider default; the matching
/// `OPENAI_API_KEY` / `GROQ_API_KEY` must be set.
pub fn provider_from_env() -> Result<Arc<dyn LlmClient>> {
    let provider = std::env::var("WAYFARER_PROVIDER").unwrap_or_else(|_| "openai".to_string());
    let model = std::env::var("WAYFARER_MODEL").ok();

    let client = match provider.to_lowercase().as_str() {
        "openai" => {
            let key = std::env::var("OPENAI_API_KEY").map_err(|_| {
                AgentError::InvalidOperation("OPENAI_API_KEY is not set".to_string())
            })?;
            OpenAiCompatClient::openai(key)
        }
        "groq" => {
            let key = std::env::var("GROQ_API_KEY").map_err(|_| {
                AgentError::InvalidOperation("GROQ_API_KEY is not set".to_string())
            })?;
            OpenAiCompatClient::groq(key)
        }
        other => {
            return Err(AgentError::InvalidOperation(format!(
                "unsupported LLM provider: {other}"
            )))
        }
    };

    let client = match model {
        Some(m) => client.with_model(m),
        None => client,
    };

    Ok(Arc::new(client))
}

// ─── Mock client ──────────────────────────────────────────────────────────────

/// Scripted step for the mock client
#[derive(Debug, Clone)]
pub enum MockStep {
    /// Return a plain assistant message
    Text(String),
    /// Return a tool call
    ToolCall {
        id: String,
        name: String,
        arguments: Value,
    },
    /// Return an error
    Error(String),
}

impl MockStep {
    pub fn text(content: impl Into<String>) -> Self {
        MockStep::Text(content.into())
    }

    pub fn tool_call(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        MockStep::ToolCall {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        MockStep::Error(message.into())
    }
}

/// Deterministic scripted LLM client for tests and demos.
///
/// Steps are consumed front to back; an exhausted script returns an error.
#[derive(Debug, Clone, Default)]
pub struct MockLlm {
    script: Arc<Mutex<VecDeque<MockStep>>>,
}

impl MockLlm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_steps(steps: Vec<MockStep>) -> Self {
        Self {
            script: Arc::new(Mutex::new(VecDeque::from(steps))),
        }
    }

    /// Mock that answers every completion with the same text
    pub fn always(text: impl Into<String>) -> Self {
        let text = text.into();
        let steps: VecDeque<MockStep> =
            (0..1024).map(|_| MockStep::Text(text.clone())).collect();
        Self {
            script: Arc::new(Mutex::new(steps)),
        }
    }

    pub async fn push_step(&self, step: MockStep) {
        self.script.lock().await.push_back(step);
    }

    async fn next_step(&self) -> MockStep {
        self.script
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| MockStep::Error("mock script exhausted".to_string()))
    }
}

#[async_trait]
impl LlmClient for MockLlm {
    fn provider(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    async fn complete(&self, _request: ChatRequest) -> Result<ChatCompletion> {
        match self.next_step().await {
            MockStep::Text(content) => Ok(ChatCompletion {
                content: Some(content),
                tool_calls: vec![],
                finish_reason: FinishReason::Stop,
            }),
            MockStep::ToolCall {
                id,
                name,
                arguments,
            } => Ok(ChatCompletion {
                content: None,
                tool_calls: vec![ToolCall {
                    id,
                    name,
                    arguments,
                }],
                finish_reason: FinishReason::ToolCalls,
            }),
            MockStep::Error(message) => Err(AgentError::Llm(message)),
        }
    }

    fn complete_stream(&self, _request: ChatRequest) -> StreamResult {
        let this = self.clone();
        Box::pin(async_stream::stream! {
            match this.next_step().await {
                MockStep::Text(content) => {
                    // Emit word-sized deltas to exercise reassembly
                    for word in content.split_inclusive(' ') {
                        yield Ok(StreamChunk::text(word));
                    }
                    yield Ok(StreamChunk::finished(FinishReason::Stop));
                }
                MockStep::ToolCall { id, name, arguments } => {
                    let args = arguments.to_string();
                    let mut mid = args.len() / 2;
                    while !args.is_char_boundary(mid) {
                        mid -= 1;
                    }
                    let (head, tail) = args.split_at(mid);
                    yield Ok(StreamChunk {
                        text: String::new(),
                        tool_call_delta: Some(ToolCallDelta {
                            index: 0,
                            id: Some(id.clone()),
                            name: Some(name.clone()),
                            arguments: Some(head.to_string()),
                        }),
                        finish_reason: None,
                    });
                    yield Ok(StreamChunk {
                        text: String::new(),
                        tool_call_delta: Some(ToolCallDelta {
                            index: 0,
                            id: Some(id),
                            name: Some(name),
                            arguments: Some(tail.to_string()),
                        }),
                        finish_reason: None,
                    });
                    yield Ok(StreamChunk::finished(FinishReason::ToolCalls));
                }
                MockStep::Error(message) => {
                    yield Err(AgentError::Llm(message));
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_complete_parses_tool_calls() {
        let server = MockServer::start().await;
        let body = serde_json::json!({
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "weather", "arguments": "{\"city\":\"Paris\"}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        });
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let client = OpenAiCompatClient::openai("test-key").with_base_url(server.uri());
        let completion = client
            .complete(ChatRequest::new(vec![Message::user("weather in Paris?")]))
            .await
            .unwrap();

        assert_eq!(completion.finish_reason, FinishReason::ToolCalls);
        assert_eq!(completion.tool_calls.len(), 1);
        assert_eq!(completion.tool_calls[0].name, "weather");
        assert_eq!(
            completion.tool_calls[0].arguments,
            serde_json::json!({"city": "Paris"})
        );
    }

    #[tokio::test]
    async fn test_complete_surfaces_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let client = OpenAiCompatClient::openai("wrong").with_base_url(server.uri());
        let err = client
            .complete(ChatRequest::new(vec![Message::user("hi")]))
            .await
            .unwrap_err();

        assert!(matches!(err, AgentError::Llm(_)));
        assert!(err.to_string().contains("401"));
    }

    #[tokio::test]
    async fn test_stream_parses_sse_token_events() {
        let server = MockServer::start().await;
        let sse = concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"},\"finish_reason\":null}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"},\"finish_reason\":null}]}\n\n",
            "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
            "data: [DONE]\n\n",
        );
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(sse),
            )
            .mount(&server)
            .await;

        let client = OpenAiCompatClient::groq("test-key").with_base_url(server.uri());
        let mut stream = client.complete_stream(ChatRequest::new(vec![Message::user("hi")]));

        let mut text = String::new();
        let mut finished = false;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.unwrap();
            text.push_str(&chunk.text);
            if chunk.finish_reason == Some(FinishReason::Stop) {
                finished = true;
            }
        }

        assert_eq!(text, "Hello");
        assert!(finished);
    }

    #[tokio::test]
    async fn test_mock_script_order() {
        let mock = MockLlm::from_steps(vec![
            MockStep::tool_call("call_1", "time", serde_json::json!({"city": "Tokyo"})),
            MockStep::text("It is noon in Tokyo."),
        ]);

        let first = mock
            .complete(ChatRequest::new(vec![Message::user("time?")]))
            .await
            .unwrap();
        assert_eq!(first.tool_calls[0].name, "time");

        let second = mock
            .complete(ChatRequest::new(vec![Message::user("time?")]))
            .await
            .unwrap();
        assert_eq!(second.content.as_deref(), Some("It is noon in Tokyo."));

        let exhausted = mock
            .complete(ChatRequest::new(vec![Message::user("time?")]))
            .await;
        assert!(exhausted.is_err());
    }
}
