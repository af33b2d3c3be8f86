use anyhow::{Context, Result, bail};
use console::style;
use dialoguer::Input;
use tracing::{error, info};

use crate::RagError;
use crate::chat::{K_RANGE, MAX_FETCH_K, preview, run_chat};
use crate::config::Settings;
use crate::processor::{DocumentProcessor, ProcessingStats};
use crate::rag::{ChainOutput, RagChain};

const SOURCE_PREVIEW_CHARS: usize = 200;

/// Build the vector index for `PDF_PATH` at `VECTOR_DB_PATH`
#[inline]
pub async fn process_document() -> Result<ProcessingStats> {
    let settings = Settings::load().context("Failed to load configuration")?;
    let pdf_path = settings.require_pdf_path()?;
    let index_path = settings.require_vector_db_path()?;

    println!("📄 Processing {}", pdf_path.display());

    let result = match DocumentProcessor::from_settings(&settings) {
        Ok(processor) => processor.process(pdf_path, index_path).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(stats) => {
            println!("{}", style("Vector store created successfully!").green());
            println!("  Pages: {}", stats.pages);
            println!("  Chunks: {}", stats.chunks);
            println!("  Embedding dimension: {}", stats.embedding_dimension);
            println!("  Duration: {:?}", stats.duration);
            println!("  Location: {}", index_path.display());
            Ok(stats)
        }
        Err(e) => {
            error!("Processing failed: {}", e);
            bail!(processing_failure_message(&e))
        }
    }
}

/// User-facing message for a failed processing run, by failure category
fn processing_failure_message(err: &RagError) -> String {
    match err {
        RagError::DocumentNotFound(path) => format!(
            "❌ Source document not found: {}. Check PDF_PATH.",
            path.display()
        ),
        other => format!("❌ Error processing document: {}", other),
    }
}

/// Start the interactive chat, optionally overriding the configured retrieval sizes
#[inline]
pub async fn chat(k: Option<usize>, fetch_k: Option<usize>) -> Result<()> {
    let settings = Settings::load().context("Failed to load configuration")?;
    let mut params = settings.config.retrieval;

    if let Some(k) = k {
        if !K_RANGE.contains(&k) {
            bail!(
                "k must be between {} and {}",
                K_RANGE.start(),
                K_RANGE.end()
            );
        }
        params = params.with_k(k);
    }
    if let Some(fetch_k) = fetch_k {
        if fetch_k > MAX_FETCH_K {
            bail!("fetch_k must be at most {}", MAX_FETCH_K);
        }
        params = params.with_fetch_k(fetch_k);
    }

    info!(
        "Starting chat with k={}, fetch_k={}",
        params.k, params.fetch_k
    );
    run_chat(&settings, params).await
}

/// Run a single question through a fresh chain, as a setup check
#[inline]
pub async fn ask(question: Option<String>) -> Result<()> {
    let settings = Settings::load().context("Failed to load configuration")?;

    eprintln!("🔍 Testing RAG Setup...");
    let question = match question {
        Some(question) => question,
        None => Input::new()
            .with_prompt("📝 Enter a test question")
            .interact_text()?,
    };

    let chain = match RagChain::from_settings(&settings).await {
        Ok(chain) => chain,
        Err(RagError::MissingIndex(_)) => {
            bail!("❌ Vector store not found. Run document processing first.")
        }
        Err(e) => bail!("❌ Error during test: {}", e),
    };

    let output = chain
        .call(&question, &[])
        .await
        .map_err(|e| anyhow::anyhow!("❌ Error during test: {}", e))?;

    println!("{}", render_test_result(&output));
    Ok(())
}

fn render_test_result(output: &ChainOutput) -> String {
    let mut lines = vec![
        style("✅ RAG Setup Test Successful!").green().to_string(),
        String::new(),
        format!("🤖 Response: {}", output.answer),
    ];

    if !output.source_documents.is_empty() {
        lines.push(String::new());
        lines.push("📚 Sources Found:".to_string());
        for (idx, source) in output.source_documents.iter().enumerate() {
            lines.push(String::new());
            lines.push(format!("Source {}:", idx + 1));
            lines.push(preview(&source.content, SOURCE_PREVIEW_CHARS));
        }
    }

    lines.join("\n")
}
