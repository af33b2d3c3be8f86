use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Source document not found: {}", .0.display())]
    DocumentNotFound(PathBuf),

    #[error("PDF error: {0}")]
    Pdf(String),

    #[error(
        "Vector store not found at {}. Please run document processing first.",
        .0.display()
    )]
    MissingIndex(PathBuf),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Completion error: {0}")]
    Completion(String),

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod chat;
pub mod commands;
pub mod config;
pub mod database;
pub mod document;
pub mod embeddings;
pub mod http;
pub mod llm;
pub mod processor;
pub mod query;
pub mod rag;
pub mod session;

#[cfg(test)]
mod test_support;
