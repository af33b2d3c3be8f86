// Terminal chat surface
// Reads questions, shows answers and a debug panel of the retrieved chunks


use anyhow::Result;
use console::style;
use dialoguer::Input;
use tracing::debug;

use crate::config::Settings;
use crate::query::{FailureCategory, QueryFailure, QueryResponse};
use crate::rag::{RagChain, RetrievalParams, RetrievedChunk};
use crate::session::{ChatSession, ConversationTurn, TurnRole};

/// Allowed values for `k`
pub const K_RANGE: std::ops::RangeInclusive<usize> = 1..=10;
/// Upper bound for `fetch_k`; the lower bound is the current `k`
pub const MAX_FETCH_K: usize = 20;

const DEBUG_PREVIEW_CHARS: usize = 300;

/// One line of user input, interpreted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    Ask(String),
    SetK(usize),
    SetFetchK(usize),
    History,
    Clear,
    Help,
    Quit,
    /// A malformed slash command, with the reason
    Invalid(String),
}

/// Interpret a line of input. Blank lines yield `None`.
#[inline]
pub fn parse_input(line: &str) -> Option<ChatCommand> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    if !line.starts_with('/') {
        return Some(ChatCommand::Ask(line.to_string()));
    }

    let mut parts = line.split_whitespace();
    let command = parts.next().unwrap_or_default();
    let argument = parts.next();

    let parsed = match command {
        "/k" => match parse_number(argument) {
            Some(k) if K_RANGE.contains(&k) => ChatCommand::SetK(k),
            _ => ChatCommand::Invalid(format!(
                "Usage: /k N (N between {} and {})",
                K_RANGE.start(),
                K_RANGE.end()
            )),
        },
        "/fetch-k" => match parse_number(argument) {
            Some(n) if (1..=MAX_FETCH_K).contains(&n) => ChatCommand::SetFetchK(n),
            _ => ChatCommand::Invalid(format!(
                "Usage: /fetch-k N (N between k and {})",
                MAX_FETCH_K
            )),
        },
        "/history" => ChatCommand::History,
        "/clear" => ChatCommand::Clear,
        "/help" => ChatCommand::Help,
        "/quit" | "/exit" => ChatCommand::Quit,
        other => ChatCommand::Invalid(format!("Unknown command: {} (try /help)", other)),
    };
    Some(parsed)
}

fn parse_number(argument: Option<&str>) -> Option<usize> {
    argument.and_then(|a| a.parse().ok())
}

/// First `max_chars` characters of `text`, followed by "..."
#[inline]
pub fn preview(text: &str, max_chars: usize) -> String {
    let mut out: String = text.chars().take(max_chars).collect();
    out.push_str("...");
    out
}

fn format_score(score: Option<f32>) -> String {
    score.map_or_else(|| "N/A".to_string(), |s| format!("{:.4}", s))
}

fn render_chunk(index: usize, chunk: &RetrievedChunk, score: Option<f32>) -> Vec<String> {
    let mut lines = vec![
        style(format!(
            "Chunk {} (Similarity: {})",
            index,
            format_score(score)
        ))
        .bold()
        .to_string(),
        "```".to_string(),
        preview(&chunk.content, DEBUG_PREVIEW_CHARS),
        "```".to_string(),
    ];
    if let Some(json) = chunk
        .metadata
        .as_ref()
        .and_then(|m| serde_json::to_string_pretty(m).ok())
    {
        lines.push(style(json).dim().to_string());
    }
    lines.push(style("─".repeat(40)).dim().to_string());
    lines
}

/// The retrieval debug panel shown under each answer
#[inline]
pub fn render_debug_panel(response: &QueryResponse) -> String {
    let mut lines = vec![
        style("🔍 RAG Debug Information").bold().cyan().to_string(),
        style("Retrieved Context Analysis").bold().to_string(),
    ];

    if response.has_context {
        lines.push(format!(
            "Number of chunks retrieved: {}",
            response.source_documents.len()
        ));
        for (i, (chunk, score)) in response
            .debug_chunks
            .iter()
            .zip(&response.similarity_scores)
            .enumerate()
        {
            lines.extend(render_chunk(i + 1, chunk, *score));
        }
    } else {
        lines.push(
            style("⚠️ No context was retrieved from the document!")
                .yellow()
                .to_string(),
        );
        lines.push("This means the response was generated without RAG support.".to_string());
    }

    lines.join("\n")
}

#[inline]
pub fn render_failure(failure: &QueryFailure) -> String {
    let label = match failure.category {
        FailureCategory::MissingIndex => "Index missing",
        FailureCategory::ServiceFailure => "Service error",
        FailureCategory::Unknown => "RAG Error",
    };
    style(format!("{}: {}", label, failure.message))
        .red()
        .to_string()
}

#[inline]
pub fn render_history(history: &[ConversationTurn]) -> String {
    if history.is_empty() {
        return style("No messages yet.").dim().to_string();
    }
    history
        .iter()
        .map(|turn| match turn.role {
            TurnRole::User => format!("{} {}", style("You:").bold().green(), turn.text),
            TurnRole::Assistant => format!("{} {}", style("Assistant:").bold().cyan(), turn.text),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_params(params: RetrievalParams) -> String {
    format!(
        "Retrieving {} chunks from {} candidates",
        style(params.k).cyan(),
        style(params.fetch_k).cyan()
    )
}

fn print_help() {
    eprintln!("Commands:");
    eprintln!(
        "  /k N          number of chunks to retrieve ({}-{})",
        K_RANGE.start(),
        K_RANGE.end()
    );
    eprintln!(
        "  /fetch-k N    number of candidates to consider (k-{})",
        MAX_FETCH_K
    );
    eprintln!("  /history      show the conversation so far");
    eprintln!("  /clear        clear chat history");
    eprintln!("  /quit         leave the chat");
}

/// Interactive question-answering loop over the configured index
#[inline]
pub async fn run_chat(settings: &Settings, params: RetrievalParams) -> Result<()> {
    let mut session = ChatSession::new(params);

    eprintln!("{}", style("🎓 Thesis Research Assistant").bold().cyan());
    eprintln!("Ask questions about your thesis. Type /help for commands.");
    eprintln!("{}", render_params(session.params()));
    eprintln!();

    loop {
        let line: String = Input::new()
            .with_prompt("What would you like to know about your thesis?")
            .allow_empty(true)
            .interact_text()?;

        let Some(command) = parse_input(&line) else {
            continue;
        };
        debug!("Chat command: {:?}", command);

        match command {
            ChatCommand::Ask(question) => {
                eprintln!("{}", style("Researching...").dim());
                let result = session
                    .ask(&question, || RagChain::from_settings(settings))
                    .await;
                match result {
                    Ok(response) => {
                        println!("{}", response.answer);
                        println!();
                        println!("{}", render_debug_panel(&response));
                    }
                    Err(failure) => {
                        eprintln!("{}", render_failure(&failure));
                        let response = failure.fallback_response();
                        println!("{}", response.answer);
                        println!();
                        println!("{}", render_debug_panel(&response));
                    }
                }
                println!();
            }
            ChatCommand::SetK(k) => {
                eprintln!("{}", render_params(session.set_k(k)));
            }
            ChatCommand::SetFetchK(fetch_k) => {
                let params = session.set_fetch_k(fetch_k);
                if params.fetch_k != fetch_k {
                    eprintln!(
                        "{}",
                        style(format!("fetch_k cannot be below k ({})", params.k)).yellow()
                    );
                }
                eprintln!("{}", render_params(params));
            }
            ChatCommand::History => {
                eprintln!("{}", render_history(session.history()));
            }
            ChatCommand::Clear => {
                session.clear_history();
                eprintln!("{}", style("Chat history cleared.").green());
            }
            ChatCommand::Help => print_help(),
            ChatCommand::Quit => break,
            ChatCommand::Invalid(message) => {
                eprintln!("{}", style(message).yellow());
            }
        }
    }

    Ok(())
}
