use anyhow::Result;
use clap::{Parser, Subcommand};
use thesis_rag::commands::{ask, chat, process_document};
use thesis_rag::config::{run_interactive_config, show_config};

#[derive(Parser)]
#[command(name = "thesis-rag")]
#[command(about = "Ask questions about a PDF, answered from its own text")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure the embedding service, chunking and retrieval settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Build the vector index from PDF_PATH into VECTOR_DB_PATH
    Process,
    /// Start an interactive chat over the indexed document
    Chat {
        /// Number of chunks to retrieve (1-10)
        #[arg(long)]
        k: Option<usize>,
        /// Number of candidates to consider (k-20)
        #[arg(long)]
        fetch_k: Option<usize>,
    },
    /// Ask a single question to check the setup
    Ask {
        /// Question to ask; prompted for when omitted
        question: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config()?;
            } else {
                run_interactive_config()?;
            }
        }
        Commands::Process => {
            process_document().await?;
        }
        Commands::Chat { k, fetch_k } => {
            chat(k, fetch_k).await?;
        }
        Commands::Ask { question } => {
            ask(question).await?;
        }
    }

    Ok(())
}
