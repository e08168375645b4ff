//! Wayfarer CLI - terminal chat client for the Wayfarer server
//!
//! Usage:
//!   wayfarer chat                          Interactive streaming chat
//!   wayfarer ask "message"                 One-shot question
//!   wayfarer memory show                   Show summary, buffer, and stats
//!   wayfarer memory clear                  Clear session memory
//!   wayfarer memory summarize              Force a summary refresh
//!   wayfarer memory limit --buffer-size N  Adjust memory limits

use clap::{Parser, Subcommand};
use colored::*;
use futures::StreamExt;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use wayfarer::StreamConsumer;

#[derive(Parser)]
#[command(name = "wayfarer")]
#[command(about = "Wayfarer - travel-assistant chat client")]
#[command(version)]
struct Cli {
    /// Base URL of the wayfarer server
    #[arg(short = 'u', long, default_value = "http://localhost:3000", env = "WAYFARER_SERVER")]
    server: String,

    /// Chat session id
    #[arg(short, long)]
    session: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive streaming chat
    Chat,

    /// Ask a single question without streaming
    Ask {
        /// The message to send
        message: String,
    },

    /// Inspect or manage conversation memory
    Memory {
        #[command(subcommand)]
        action: MemoryAction,
    },
}

#[derive(Subcommand)]
enum MemoryAction {
    /// Show the summary, buffered messages, and stats
    Show,
    /// Clear the session's memory
    Clear,
    /// Force a summary refresh
    Summarize,
    /// Adjust buffer limits
    Limit {
        /// Hard cap on buffered messages
        #[arg(long)]
        buffer_size: Option<usize>,
        /// Buffer length that triggers summarization
        #[arg(long)]
        threshold: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.server.trim_end_matches('/').to_string();
    let session = cli.session.clone();

    match cli.command {
        Commands::Chat => run_chat_repl(&client, &base, session.as_deref()).await,
        Commands::Ask { message } => ask_once(&client, &base, session.as_deref(), &message).await,
        Commands::Memory { action } => run_memory(&client, &base, session.as_deref(), action).await,
    }
}

fn chat_body(session: Option<&str>, message: &str) -> serde_json::Value {
    serde_json::json!({
        "message": message,
        "session_id": session,
    })
}

async fn run_chat_repl(
    client: &reqwest::Client,
    base: &str,
    session: Option<&str>,
) -> anyhow::Result<()> {
    println!(
        "{}",
        "Wayfarer travel assistant. Type a question, or 'quit' to exit.".bold()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{} ", "you>".green().bold());
        use std::io::Write;
        std::io::stdout().flush()?;

        let line = match lines.next_line().await? {
            Some(line) => line,
            None => break,
        };
        let message = line.trim();
        if message.is_empty() {
            continue;
        }
        if message == "quit" || message == "exit" {
            break;
        }

        if let Err(e) = stream_one_turn(client, base, session, message).await {
            eprintln!("{} {}", "error:".red().bold(), e);
        }
    }

    Ok(())
}

/// Send one message on the full streaming endpoint and render events live.
/// Ctrl-C cancels the in-flight request without touching what was printed.
async fn stream_one_turn(
    client: &reqwest::Client,
    base: &str,
    session: Option<&str>,
    message: &str,
) -> anyhow::Result<()> {
    let response = client
        .post(format!("{base}/api/v1/chat/stream/full"))
        .json(&chat_body(session, message))
        .send()
        .await?;

    if !response.status().is_success() {
        anyhow::bail!("server returned {}", response.status());
    }

    let cancel = CancellationToken::new();
    let mut consumer = StreamConsumer::new();
    let mut byte_stream = response.bytes_stream();
    let mut shown_response = 0;
    let mut shown_thinking = 0;

    loop {
        tokio::select! {
            biased;
            _ = tokio::signal::ctrl_c() => {
                cancel.cancel();
                println!("\n{}", "[interrupted]".yellow());
                break;
            }
            chunk = byte_stream.next() => match chunk {
                Some(Ok(bytes)) => {
                    consumer.push_bytes(&bytes);
                    render_progress(&consumer, &mut shown_response, &mut shown_thinking);
                }
                Some(Err(e)) => {
                    println!("\n{} {}", "connection lost:".yellow(), e);
                    break;
                }
                None => {
                    consumer.finish();
                    render_progress(&consumer, &mut shown_response, &mut shown_thinking);
                    break;
                }
            }
        }
    }

    if cancel.is_cancelled() {
        return Ok(());
    }

    println!();
    let transcript = &consumer.transcript;
    for notice in &transcript.notices {
        println!("{} {}", "notice:".yellow().bold(), notice);
    }
    if !transcript.function_calls.is_empty() {
        let names: Vec<&str> = transcript
            .function_calls
            .iter()
            .map(|c| c.tool.as_str())
            .collect();
        println!("{} {}", "tools used:".dimmed(), names.join(", ").dimmed());
    }
    if let Some(summary) = &transcript.summary {
        println!("{} {}", "memory summary:".dimmed(), summary.dimmed());
    }

    Ok(())
}

/// Print whatever grew since the last call: thinking dimmed, answer plain
fn render_progress(consumer: &StreamConsumer, shown_response: &mut usize, shown_thinking: &mut usize) {
    use std::io::Write;
    let transcript = &consumer.transcript;

    if transcript.thinking.len() > *shown_thinking {
        print!("{}", transcript.thinking[*shown_thinking..].dimmed());
        *shown_thinking = transcript.thinking.len();
    }
    if transcript.response.len() > *shown_response {
        print!("{}", &transcript.response[*shown_response..]);
        *shown_response = transcript.response.len();
    }
    let _ = std::io::stdout().flush();
}

async fn ask_once(
    client: &reqwest::Client,
    base: &str,
    session: Option<&str>,
    message: &str,
) -> anyhow::Result<()> {
    let response = client
        .post(format!("{base}/api/v1/chat"))
        .json(&chat_body(session, message))
        .send()
        .await?;

    if !response.status().is_success() {
        anyhow::bail!("server returned {}", response.status());
    }

    let body: serde_json::Value = response.json().await?;
    if let Some(answer) = body.get("response").and_then(|v| v.as_str()) {
        println!("{answer}");
    }
    if let Some(reasoning) = body.get("reasoning").and_then(|v| v.as_str()) {
        println!("{} {}", "reasoning:".dimmed(), reasoning.dimmed());
    }

    Ok(())
}

async fn run_memory(
    client: &reqwest::Client,
    base: &str,
    session: Option<&str>,
    action: MemoryAction,
) -> anyhow::Result<()> {
    match action {
        MemoryAction::Show => {
            // An unreachable backend degrades to an empty view instead of failing
            let view = fetch_memory_view(client, base, session).await;
            let summary = view
                .get("summary")
                .and_then(|v| v.as_str())
                .unwrap_or_default();
            if summary.is_empty() {
                println!("{}", "No summary yet.".dimmed());
            } else {
                println!("{}\n{}", "Summary:".bold(), summary);
            }

            println!("{}", "Recent messages:".bold());
            let empty = Vec::new();
            let messages = view
                .get("recent_messages")
                .and_then(|v| v.as_array())
                .unwrap_or(&empty);
            if messages.is_empty() {
                println!("{}", "  (none)".dimmed());
            }
            for message in messages {
                let role = message.get("role").and_then(|v| v.as_str()).unwrap_or("?");
                let content = message.get("content").and_then(|v| v.as_str()).unwrap_or("");
                println!("  [{}] {}", role.cyan(), content);
            }

            if let Some(stats) = view.get("stats") {
                println!("{} {}", "Stats:".bold(), stats);
            }
        }
        MemoryAction::Clear => {
            client
                .post(format!("{base}/api/v1/memory/clear"))
                .json(&serde_json::json!({ "session_id": session }))
                .send()
                .await?
                .error_for_status()?;
            println!("Memory cleared.");
        }
        MemoryAction::Summarize => {
            let response = client
                .post(format!("{base}/api/v1/memory/summary"))
                .json(&serde_json::json!({ "session_id": session }))
                .send()
                .await?
                .error_for_status()?;
            let body: serde_json::Value = response.json().await?;
            let summary = body.get("summary").and_then(|v| v.as_str()).unwrap_or("");
            println!("{}\n{}", "New summary:".bold(), summary);
        }
        MemoryAction::Limit {
            buffer_size,
            threshold,
        } => {
            let response = client
                .post(format!("{base}/api/v1/memory/limit"))
                .json(&serde_json::json!({
                    "session_id": session,
                    "buffer_size": buffer_size,
                    "summarization_threshold": threshold,
                }))
                .send()
                .await?
                .error_for_status()?;
            let body: serde_json::Value = response.json().await?;
            println!("Limits now: {body}");
        }
    }

    Ok(())
}

async fn fetch_memory_view(
    client: &reqwest::Client,
    base: &str,
    session: Option<&str>,
) -> serde_json::Value {
    let mut request = client.get(format!("{base}/api/v1/memory"));
    if let Some(session) = session {
        request = request.query(&[("session_id", session)]);
    }

    match request.send().await {
        Ok(response) if response.status().is_success() => {
            response.json().await.unwrap_or_else(|_| empty_view())
        }
        Ok(response) => {
            eprintln!(
                "{} server returned {}, showing empty memory",
                "warning:".yellow(),
                response.status()
            );
            empty_view()
        }
        Err(e) => {
            eprintln!(
                "{} backend unavailable ({e}), showing empty memory",
                "warning:".yellow()
            );
            empty_view()
        }
    }
}

fn empty_view() -> serde_json::Value {
    serde_json::json!({
        "summary": "",
        "recent_messages": [],
        "stats": {
            "total_messages": 0,
            "buffered_messages": 0,
            "summarization_count": 0,
            "has_summary": false,
        }
    })
}
