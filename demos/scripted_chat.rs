//! Scripted chat walk-through: a mock LLM drives one tool-calling turn.
//!
//! Run with: cargo run --example scripted_chat

use std::sync::Arc;

use wayfarer::{Assistant, MockLlm, MockStep};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let llm = Arc::new(MockLlm::from_steps(vec![
        MockStep::tool_call("call_1", "time", serde_json::json!({"city": "Tokyo"})),
        MockStep::text("It's a great time to wander Tokyo — the evening markets are open."),
    ]));

    let assistant = Assistant::new(llm);
    let reply = assistant
        .chat(None, "What should I do in Tokyo right now?")
        .await?;

    println!("response: {}", reply.response);
    println!("thinking: {}", reply.thinking);
    for call in &reply.function_calls {
        println!("tool call: {} {}", call.tool, call.parameters);
    }

    let view = assistant.memory_view(None).await;
    println!("\nbuffered messages: {}", view.buffered_messages.len());
    for message in &view.buffered_messages {
        println!("  [{}] {}", message.role, message.content);
    }

    Ok(())
}
