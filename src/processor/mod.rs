// Document processor
// One-shot batch job: PDF -> pages -> chunks -> embeddings -> persisted index


use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use crate::config::Settings;
use crate::database::{EmbeddingRecord, VectorStore};
use crate::document::load_pdf;
use crate::embeddings::{
    ChunkingConfig, DocumentChunk, Embedder, OpenAiEmbeddings, RecursiveCharacterSplitter,
};
use crate::{RagError, Result};

/// Summary of a completed processing run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingStats {
    pub pages: usize,
    pub chunks: usize,
    pub embedding_dimension: usize,
    pub duration: Duration,
}

pub struct DocumentProcessor {
    embedder: Arc<dyn Embedder>,
    splitter: RecursiveCharacterSplitter,
    batch_size: usize,
    show_progress: bool,
}

impl DocumentProcessor {
    #[inline]
    pub fn new(embedder: Arc<dyn Embedder>, chunking: &ChunkingConfig, batch_size: usize) -> Self {
        Self {
            embedder,
            splitter: RecursiveCharacterSplitter::new(chunking),
            batch_size: batch_size.max(1),
            show_progress: console::user_attended_stderr(),
        }
    }

    /// Processor wired to the OpenAI embedding service named in `settings`
    #[inline]
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let api_key = settings.require_api_key()?;
        let openai = &settings.config.openai;
        let embedder = OpenAiEmbeddings::new(openai, api_key)?;

        Ok(Self::new(
            Arc::new(embedder),
            &settings.config.chunking,
            openai.batch_size as usize,
        ))
    }

    #[inline]
    #[must_use]
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Build the index for `pdf_path` at `index_path`, replacing any previous one.
    ///
    /// Any failure aborts the run and leaves the previous index in place.
    #[inline]
    pub async fn process(&self, pdf_path: &Path, index_path: &Path) -> Result<ProcessingStats> {
        let start = Instant::now();
        info!("Processing {}", pdf_path.display());

        let pages = load_pdf(pdf_path)?;
        let chunks = self.splitter.split_pages(&pages);
        info!("Split {} pages into {} chunks", pages.len(), chunks.len());

        if chunks.is_empty() {
            return Err(RagError::Pdf(format!(
                "No extractable text found in {}",
                pdf_path.display()
            )));
        }

        let vectors = self.embed_chunks(&chunks).await?;
        let embedding_dimension = vectors.first().map_or(0, Vec::len);
        debug!("Embedding dimension: {}", embedding_dimension);

        let records: Vec<EmbeddingRecord> = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| EmbeddingRecord::from_chunk(chunk, vector))
            .collect();
        let chunk_count = records.len();

        VectorStore::build(index_path, embedding_dimension, records).await?;

        let stats = ProcessingStats {
            pages: pages.len(),
            chunks: chunk_count,
            embedding_dimension,
            duration: start.elapsed(),
        };
        info!(
            "Indexed {} chunks from {} pages in {:?}",
            stats.chunks, stats.pages, stats.duration
        );
        Ok(stats)
    }

    async fn embed_chunks(&self, chunks: &[DocumentChunk]) -> Result<Vec<Vec<f32>>> {
        let bar = if self.show_progress {
            ProgressBar::new(chunks.len() as u64).with_style(
                ProgressStyle::with_template("{bar:40} [{pos}/{len}] Embedding chunks")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            )
        } else {
            ProgressBar::hidden()
        };

        let mut vectors = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            let embedded = self.embedder.embed_documents(&texts).await?;

            if embedded.len() != texts.len() {
                bar.abandon();
                return Err(RagError::Embedding(format!(
                    "Expected {} embeddings, got {}",
                    texts.len(),
                    embedded.len()
                )));
            }

            vectors.extend(embedded);
            bar.inc(batch.len() as u64);
        }

        bar.finish_and_clear();
        Ok(vectors)
    }
}
