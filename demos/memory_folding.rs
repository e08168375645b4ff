//! Memory folding walk-through: watch the buffer fold into the summary as the
//! summarization threshold is crossed.
//!
//! Run with: cargo run --example memory_folding

use std::sync::Arc;

use wayfarer::{ChatMessage, ConversationMemory, MemoryConfig, MockLlm};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let llm = Arc::new(MockLlm::always(
        "The traveler compared weather and food across several cities.",
    ));
    let mut memory = ConversationMemory::with_config(
        llm,
        MemoryConfig {
            buffer_size: 6,
            summarization_threshold: 4,
            keep_recent: 2,
        },
    );

    let turns = [
        "Tell me about Lisbon.",
        "How warm is it there in May?",
        "And what about the food scene?",
        "Compare it with Barcelona.",
        "Which one is cheaper?",
        "Book-worthy neighborhoods?",
    ];

    for (i, turn) in turns.iter().enumerate() {
        let folded = memory.append(ChatMessage::user(*turn)).await?;
        let stats = memory.stats();
        println!(
            "turn {:>2}: buffered={} summaries={} folded={}",
            i + 1,
            stats.buffered_messages,
            stats.summarization_count,
            folded
        );
    }

    let view = memory.view();
    println!("\nsummary: {}", view.summary);
    println!("tail:");
    for message in &view.buffered_messages {
        println!("  [{}] {}", message.role, message.content);
    }

    Ok(())
}
