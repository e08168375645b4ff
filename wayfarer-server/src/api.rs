use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures::Stream;
use tokio::sync::mpsc;
use wayfarer::{AgentEvent, StreamVariant};

use crate::models::{
    ChatRequestBody, ChatResponseBody, ClearResponse, ErrorResponse, HealthResponse,
    LimitRequestBody, LimitResponse, MemoryQuery, MemoryViewResponse, SessionBody,
    SummaryResponse,
};
use crate::state::AppState;

type ApiError = (StatusCode, Json<ErrorResponse>);

fn bad_request(message: impl Into<String>) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            message: message.into(),
            status: "error".to_string(),
        }),
    )
}

fn internal_error(message: impl Into<String>) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            message: message.into(),
            status: "error".to_string(),
        }),
    )
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        message: "Wayfarer travel assistant is running".to_string(),
    })
}

pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ChatRequestBody>,
) -> Result<Json<ChatResponseBody>, ApiError> {
    if payload.message.trim().is_empty() {
        return Err(bad_request("Message cannot be empty"));
    }

    let session = payload.session_id.as_deref();
    let reply = state
        .assistant
        .chat(session, &payload.message)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "chat failed");
            internal_error(format!("Internal server error: {e}"))
        })?;

    let view = state.assistant.memory_view(session).await;

    Ok(Json(ChatResponseBody {
        response: reply.response.clone(),
        reasoning: reply.thinking.clone(),
        history: view.buffered_messages,
        agent_response: reply,
    }))
}

// ─── Streaming variants ───────────────────────────────────────────────────────

pub async fn chat_stream(
    state: State<Arc<AppState>>,
    payload: Json<ChatRequestBody>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    stream_chat(state, payload, StreamVariant::Tokens)
}

pub async fn chat_stream_thinking(
    state: State<Arc<AppState>>,
    payload: Json<ChatRequestBody>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    stream_chat(state, payload, StreamVariant::Thinking)
}

pub async fn chat_stream_structured(
    state: State<Arc<AppState>>,
    payload: Json<ChatRequestBody>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    stream_chat(state, payload, StreamVariant::Structured)
}

pub async fn chat_stream_full(
    state: State<Arc<AppState>>,
    payload: Json<ChatRequestBody>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    stream_chat(state, payload, StreamVariant::Full)
}

/// Relay one agent run as an SSE stream. Events are forwarded in production
/// order; the stream ends right after the terminal `error` or `final` record.
fn stream_chat(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ChatRequestBody>,
    variant: StreamVariant,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    if payload.message.trim().is_empty() {
        return Err(bad_request("Message cannot be empty"));
    }

    // Bounded channel: a slow or stalled client applies back-pressure to the
    // agent instead of buffering unboundedly
    let (tx, mut rx) = mpsc::channel::<AgentEvent>(64);
    let assistant = Arc::clone(&state.assistant);
    let session = payload.session_id.clone();
    let message = payload.message.clone();

    tokio::spawn(async move {
        assistant
            .chat_streaming(session.as_deref(), &message, tx)
            .await;
    });

    let stream = async_stream::stream! {
        while let Some(agent_event) = rx.recv().await {
            let terminal = matches!(
                agent_event,
                AgentEvent::Completed { .. } | AgentEvent::Failed { .. }
            );

            for wire_event in variant.wire_events(&agent_event) {
                match Event::default().json_data(&wire_event) {
                    Ok(event) => yield Ok(event),
                    Err(e) => {
                        tracing::error!(error = %e, "failed to encode stream event");
                    }
                }
            }

            if terminal {
                break;
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

// ─── Memory endpoints ─────────────────────────────────────────────────────────

pub async fn get_memory(
    State(state): State<Arc<AppState>>,
    Query(params): Query<MemoryQuery>,
) -> Json<MemoryViewResponse> {
    let view = state.assistant.memory_view(params.session_id.as_deref()).await;
    Json(MemoryViewResponse {
        summary: view.summary,
        recent_messages: view.buffered_messages,
        stats: view.stats,
    })
}

pub async fn clear_memory(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SessionBody>,
) -> Json<ClearResponse> {
    state
        .assistant
        .clear_memory(payload.session_id.as_deref())
        .await;
    Json(ClearResponse {
        status: "cleared".to_string(),
    })
}

pub async fn update_summary(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SessionBody>,
) -> Result<Json<SummaryResponse>, ApiError> {
    let summary = state
        .assistant
        .update_summary(payload.session_id.as_deref())
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "summary refresh failed");
            internal_error(format!("Error updating summary: {e}"))
        })?;

    Ok(Json(SummaryResponse { summary }))
}

pub async fn set_memory_limit(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LimitRequestBody>,
) -> Json<LimitResponse> {
    let config = state
        .assistant
        .set_memory_limits(
            payload.session_id.as_deref(),
            payload.buffer_size,
            payload.summarization_threshold,
        )
        .await;

    Json(LimitResponse {
        buffer_size: config.buffer_size,
        summarization_threshold: config.summarization_threshold,
        keep_recent: config.keep_recent,
    })
}
