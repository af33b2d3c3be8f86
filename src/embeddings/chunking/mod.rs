
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::document::{ChunkMetadata, PageText};

/// Separators tried in order: paragraph, line, word, then a hard character cut
const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// A chunk of page text ready for embedding
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentChunk {
    /// The chunk text
    pub content: String,
    /// Where the chunk came from
    pub metadata: ChunkMetadata,
}

/// Configuration for content chunking. Sizes are measured in characters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Target maximum chunk length
    pub chunk_size: usize,
    /// Characters carried over from the end of one chunk into the next
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 2500,
            chunk_overlap: 600,
        }
    }
}

/// Splits text recursively on a ladder of separators, merging the pieces
/// back into overlapping chunks of at most `chunk_size` characters.
#[derive(Debug, Clone)]
pub struct RecursiveCharacterSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl RecursiveCharacterSplitter {
    #[inline]
    pub fn new(config: &ChunkingConfig) -> Self {
        Self {
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
            separators: DEFAULT_SEPARATORS.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    /// Split every page and carry its metadata onto each resulting chunk
    #[inline]
    pub fn split_pages(&self, pages: &[PageText]) -> Vec<DocumentChunk> {
        let mut chunks = Vec::new();

        for page in pages {
            for (chunk_index, content) in self.split_text(&page.text).into_iter().enumerate() {
                chunks.push(DocumentChunk {
                    content,
                    metadata: ChunkMetadata {
                        source: page.source.clone(),
                        page: page.page,
                        chunk_index: chunk_index as u32,
                    },
                });
            }
        }

        debug!(
            "Split {} pages into {} chunks (avg {} chars)",
            pages.len(),
            chunks.len(),
            chunks
                .iter()
                .map(|c| char_len(&c.content))
                .sum::<usize>()
                / chunks.len().max(1)
        );

        chunks
    }

    /// Split a single text into chunks
    #[inline]
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &self.separators)
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let mut final_chunks = Vec::new();

        // Pick the first separator that occurs in the text; "" always matches
        let mut separator = separators.last().map_or("", String::as_str);
        let mut remaining_separators: &[String] = &[];
        for (i, candidate) in separators.iter().enumerate() {
            if candidate.is_empty() {
                separator = "";
                break;
            }
            if text.contains(candidate.as_str()) {
                separator = candidate;
                remaining_separators = &separators[i + 1..];
                break;
            }
        }

        let splits = split_keeping_separator(text, separator);

        let mut good_splits: Vec<String> = Vec::new();
        for split in splits {
            if char_len(&split) < self.chunk_size {
                good_splits.push(split);
                continue;
            }

            if !good_splits.is_empty() {
                final_chunks.extend(self.merge_splits(&good_splits));
                good_splits.clear();
            }

            if remaining_separators.is_empty() {
                final_chunks.push(split);
            } else {
                final_chunks.extend(self.split_recursive(&split, remaining_separators));
            }
        }

        if !good_splits.is_empty() {
            final_chunks.extend(self.merge_splits(&good_splits));
        }

        final_chunks
    }

    /// Greedily join pieces into chunks, keeping a tail of at most
    /// `chunk_overlap` characters as the start of the next chunk
    fn merge_splits(&self, splits: &[String]) -> Vec<String> {
        let mut docs = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        let mut total = 0;

        for split in splits {
            let len = char_len(split);

            if total + len > self.chunk_size {
                if total > self.chunk_size {
                    warn!(
                        "Created a chunk of size {}, which is longer than the specified {}",
                        total, self.chunk_size
                    );
                }

                if !current.is_empty() {
                    if let Some(doc) = join_pieces(&current) {
                        docs.push(doc);
                    }

                    while total > self.chunk_overlap
                        || (total + len > self.chunk_size && total > 0)
                    {
                        let Some(first) = current.first() else {
                            break;
                        };
                        total -= char_len(first);
                        current.remove(0);
                    }
                }
            }

            current.push(split.as_str());
            total += len;
        }

        if let Some(doc) = join_pieces(&current) {
            docs.push(doc);
        }

        docs
    }
}

/// Split on `separator`, attaching each separator to the start of the piece
/// that follows it. An empty separator splits into single characters.
fn split_keeping_separator(text: &str, separator: &str) -> Vec<String> {
    if separator.is_empty() {
        return text.chars().map(String::from).collect();
    }

    let mut pieces = Vec::new();
    for (i, part) in text.split(separator).enumerate() {
        if i == 0 {
            pieces.push(part.to_string());
        } else {
            pieces.push(format!("{}{}", separator, part));
        }
    }

    pieces.retain(|p| !p.is_empty());
    pieces
}

fn join_pieces(pieces: &[&str]) -> Option<String> {
    let text = pieces.concat();
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Length in characters, the unit every chunking size is expressed in
#[inline]
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}
