
use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input};

use super::{Config, ConfigError, OpenAiConfig, Settings, get_config_dir};
use crate::embeddings::chunking::ChunkingConfig;
use crate::rag::RetrievalParams;

#[inline]
pub fn run_interactive_config() -> Result<()> {
    eprintln!("{}", style("🔧 Thesis RAG Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config()?;

    eprintln!("{}", style("OpenAI Configuration").bold().yellow());
    eprintln!("The API key and chat model are read from OPENAI_API_KEY and GPT_MODEL.");
    eprintln!();
    configure_openai(&mut config.openai)?;

    eprintln!();
    eprintln!("{}", style("Chunking").bold().yellow());
    configure_chunking(&mut config.chunking)?;

    eprintln!();
    eprintln!("{}", style("Retrieval").bold().yellow());
    configure_retrieval(&mut config.retrieval)?;

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config() -> Result<()> {
    let settings = Settings::load().context("Failed to load configuration")?;
    eprint!("{}", render_settings(&settings));
    Ok(())
}

/// Human-readable summary of the effective settings
pub(crate) fn render_settings(settings: &Settings) -> String {
    let not_set = || style("<not set>").red().to_string();
    let path_or_unset = |path: Option<&std::path::Path>| {
        path.map_or_else(not_set, |p| style(p.display()).cyan().to_string())
    };
    let config = &settings.config;

    let lines = [
        style("📋 Current Configuration").bold().cyan().to_string(),
        String::new(),
        style("Environment:").bold().yellow().to_string(),
        format!("  PDF_PATH: {}", path_or_unset(settings.pdf_path.as_deref())),
        format!(
            "  VECTOR_DB_PATH: {}",
            path_or_unset(settings.vector_db_path.as_deref())
        ),
        format!(
            "  OPENAI_API_KEY: {}",
            settings
                .masked_api_key()
                .map_or_else(not_set, |k| style(k).cyan().to_string())
        ),
        format!("  GPT_MODEL: {}", style(&settings.gpt_model).cyan()),
        String::new(),
        style("OpenAI:").bold().yellow().to_string(),
        format!("  Base URL: {}", style(&config.openai.base_url).cyan()),
        format!(
            "  Embedding Model: {}",
            style(&config.openai.embedding_model).cyan()
        ),
        format!("  Batch Size: {}", style(config.openai.batch_size).cyan()),
        String::new(),
        style("Chunking:").bold().yellow().to_string(),
        format!(
            "  Chunk Size: {} chars, Overlap: {} chars",
            style(config.chunking.chunk_size).cyan(),
            style(config.chunking.chunk_overlap).cyan()
        ),
        String::new(),
        style("Retrieval:").bold().yellow().to_string(),
        format!(
            "  k: {}, fetch_k: {}",
            style(config.retrieval.k).cyan(),
            style(config.retrieval.fetch_k).cyan()
        ),
        String::new(),
        format!(
            "Config file: {}",
            style(config.config_file_path().display()).dim()
        ),
    ];

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

fn load_existing_config() -> Result<Config> {
    let config_dir = get_config_dir()?;
    Config::load(&config_dir).map_or_else(
        |_| {
            eprintln!(
                "{}",
                style("No valid configuration found. Using defaults.").yellow()
            );
            Ok(Config {
                base_dir: config_dir.clone(),
                ..Config::default()
            })
        },
        |config| {
            eprintln!("{}", style("Found existing configuration.").green());
            Ok(config)
        },
    )
}

fn configure_openai(openai: &mut OpenAiConfig) -> Result<()> {
    let base_url: String = Input::new()
        .with_prompt("API base URL")
        .default(openai.base_url.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            let temp_config = OpenAiConfig {
                base_url: input.clone(),
                ..OpenAiConfig::default()
            };
            temp_config.api_url()?;
            Ok(())
        })
        .interact_text()?;

    let model: String = Input::new()
        .with_prompt("Embedding model")
        .default(openai.embedding_model.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Model name cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let batch_size: u32 = Input::new()
        .with_prompt("Batch size for embedding requests")
        .default(openai.batch_size)
        .validate_with(|input: &u32| -> Result<(), &str> {
            if *input == 0 {
                Err("Batch size must be greater than 0")
            } else if *input > 2048 {
                Err("Batch size must be 2048 or less")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    openai.set_base_url(base_url)?;
    openai.set_embedding_model(model)?;
    openai.set_batch_size(batch_size)?;

    Ok(())
}

fn configure_chunking(chunking: &mut ChunkingConfig) -> Result<()> {
    let chunk_size: usize = Input::new()
        .with_prompt("Chunk size (characters)")
        .default(chunking.chunk_size)
        .validate_with(|input: &usize| -> Result<(), &str> {
            if *input == 0 {
                Err("Chunk size must be greater than 0")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let chunk_overlap: usize = Input::new()
        .with_prompt("Chunk overlap (characters)")
        .default(chunking.chunk_overlap.min(chunk_size.saturating_sub(1)))
        .validate_with(|input: &usize| -> Result<(), &str> {
            if *input >= chunk_size {
                Err("Overlap must be smaller than the chunk size")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    chunking.chunk_size = chunk_size;
    chunking.chunk_overlap = chunk_overlap;
    Ok(())
}

fn configure_retrieval(retrieval: &mut RetrievalParams) -> Result<()> {
    let k: usize = Input::new()
        .with_prompt("Number of chunks to retrieve (k)")
        .default(retrieval.k)
        .validate_with(|input: &usize| -> Result<(), &str> {
            if *input == 0 {
                Err("k must be at least 1")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let fetch_k: usize = Input::new()
        .with_prompt("Number of candidates to consider (fetch_k)")
        .default(retrieval.fetch_k.max(k))
        .validate_with(|input: &usize| -> Result<(), String> {
            if *input < k {
                Err(format!("fetch_k must be at least k ({})", k))
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    *retrieval = RetrievalParams::new(k, fetch_k)?;
    Ok(())
}
