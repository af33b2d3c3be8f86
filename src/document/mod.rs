// Document loading
// Extracts page-level text units from a PDF


use std::path::Path;

use lopdf::Document;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{RagError, Result};

/// Text extracted from a single PDF page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    /// 1-based page number
    pub page: u32,
    /// Path of the source document
    pub source: String,
    pub text: String,
}

/// Provenance of a chunk, stored alongside its embedding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Path of the source document
    pub source: String,
    /// 1-based page number the chunk was cut from
    pub page: u32,
    /// Position of the chunk within its page
    pub chunk_index: u32,
}

/// Load a PDF and return one text unit per page, in page order.
///
/// Pages without extractable text (scans, figures) come back with empty
/// text rather than being dropped, so page numbering stays intact.
#[inline]
pub fn load_pdf(path: &Path) -> Result<Vec<PageText>> {
    if !path.is_file() {
        return Err(RagError::DocumentNotFound(path.to_path_buf()));
    }

    debug!("Loading PDF from {}", path.display());

    let mut document = Document::load(path)
        .map_err(|e| RagError::Pdf(format!("Failed to load {}: {}", path.display(), e)))?;

    // Owner-password-only documents open with an empty user password
    if document.is_encrypted() {
        debug!("{} is encrypted, trying the empty user password", path.display());
        document.decrypt("").map_err(|e| {
            RagError::Pdf(format!(
                "{} is encrypted and cannot be read: {}",
                path.display(),
                e
            ))
        })?;
    }

    let source = path.display().to_string();
    let mut pages = Vec::new();

    for page_number in document.get_pages().keys() {
        let text = match document.extract_text(&[*page_number]) {
            Ok(text) => clean_page_text(&text),
            Err(e) => {
                warn!("Could not extract text from page {}: {}", page_number, e);
                String::new()
            }
        };

        pages.push(PageText {
            page: *page_number,
            source: source.clone(),
            text,
        });
    }

    info!(
        "Loaded {} pages ({} with text) from {}",
        pages.len(),
        pages.iter().filter(|p| !p.text.is_empty()).count(),
        path.display()
    );

    Ok(pages)
}

/// Strip NUL bytes and trailing whitespace that PDF text extraction leaves behind
fn clean_page_text(text: &str) -> String {
    text.replace('\0', "")
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}
