// Deterministic in-process models for exercising the pipeline without a network

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use lopdf::content::{Content, Operation};
use lopdf::encryption::{decrypt_object, get_encryption_key};
use lopdf::{Document, Object, Stream, StringFormat, dictionary};

use crate::database::{EmbeddingRecord, VectorStore};
use crate::document::ChunkMetadata;
use crate::embeddings::{DocumentChunk, Embedder};
use crate::llm::{ChatMessage, ChatModel};
use crate::{RagError, Result};

pub(crate) const TEST_DIMENSION: usize = 64;

/// Bag-of-words embedder: each lowercase word bumps one hashed bucket
pub(crate) struct KeywordEmbedder;

pub(crate) fn keyword_vector(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0; TEST_DIMENSION];
    // Keeps empty text away from the zero vector
    vector[TEST_DIMENSION - 1] = 0.01;
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let hash = word
            .to_lowercase()
            .bytes()
            .fold(0xcbf2_9ce4_8422_2325_u64, |h, b| {
                (h ^ u64::from(b)).wrapping_mul(0x0100_0000_01b3)
            });
        vector[(hash % (TEST_DIMENSION as u64 - 1)) as usize] += 1.0;
    }
    vector
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| keyword_vector(t)).collect())
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        Ok(keyword_vector(text))
    }
}

/// Embedder that always fails, as an unreachable service would
pub(crate) struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    async fn embed_documents(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(RagError::Embedding("service unavailable".to_string()))
    }

    async fn embed_query(&self, _text: &str) -> Result<Vec<f32>> {
        Err(RagError::Embedding("service unavailable".to_string()))
    }
}

/// Chat model that replies with a fixed answer and records every request
pub(crate) struct ScriptedChat {
    answer: String,
    pub(crate) requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedChat {
    pub(crate) fn new(answer: &str) -> Self {
        Self {
            answer: answer.to_string(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests.lock().expect("lock should not be poisoned").clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedChat {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        self.requests
            .lock()
            .expect("lock should not be poisoned")
            .push(messages.to_vec());
        Ok(self.answer.clone())
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// Index one chunk per entry in `pages`, page numbers starting at 1
pub(crate) async fn build_keyword_index(dir: &Path, pages: &[&str]) -> VectorStore {
    let records = pages
        .iter()
        .zip(1..)
        .map(|(text, page)| {
            let chunk = DocumentChunk {
                content: (*text).to_string(),
                metadata: ChunkMetadata {
                    source: "thesis.pdf".to_string(),
                    page,
                    chunk_index: 0,
                },
            };
            EmbeddingRecord::from_chunk(chunk, keyword_vector(text))
        })
        .collect();
    VectorStore::build(dir, TEST_DIMENSION, records)
        .await
        .expect("should build index")
}

fn text_pdf_document(pages: &[&str]) -> Document {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut kids: Vec<Object> = Vec::new();
    for page_text in pages {
        let mut operations = Vec::new();
        for (i, line) in page_text.lines().enumerate() {
            operations.push(Operation::new("BT", vec![]));
            operations.push(Operation::new("Tf", vec!["F1".into(), 10.into()]));
            operations.push(Operation::new(
                "Td",
                vec![50.into(), (800 - 12 * i as i64).into()],
            ));
            operations.push(Operation::new("Tj", vec![Object::string_literal(line)]));
            operations.push(Operation::new("ET", vec![]));
        }
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().expect("content should encode"),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(page_id.into());
    }

    let page_count = kids.len() as i64;
    let pages_dict = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => page_count,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc
}

/// Write a PDF with one page per entry, each line drawn in its own text block
pub(crate) fn write_text_pdf(path: &Path, pages: &[&str]) {
    text_pdf_document(pages)
        .save(path)
        .expect("test pdf should save");
}

/// Write a PDF encrypted with the standard RC4 handler (V1, R2) under an
/// owner password only. `user_entry` becomes the `/U` check value; without
/// one any user password is accepted, the empty one included.
pub(crate) fn write_encrypted_pdf(path: &Path, pages: &[&str], user_entry: Option<&[u8]>) {
    let mut doc = text_pdf_document(pages);

    let file_id = Object::String(b"thesis-rag-fixed".to_vec(), StringFormat::Hexadecimal);
    doc.trailer.set("ID", vec![file_id.clone(), file_id]);

    let mut encrypt = dictionary! {
        "Filter" => "Standard",
        "V" => 1,
        "R" => 2,
        "Length" => 40,
        "O" => Object::String(vec![0x4f; 32], StringFormat::Hexadecimal),
        "P" => -4,
    };
    if let Some(user_entry) = user_entry {
        encrypt.set(
            "U",
            Object::String(user_entry.to_vec(), StringFormat::Hexadecimal),
        );
    }
    let encrypt_id = doc.add_object(encrypt);
    doc.trailer.set("Encrypt", encrypt_id);

    // RC4 is symmetric, so the per-object decryption doubles as encryption
    let key = get_encryption_key(&doc, "", false).expect("should derive encryption key");
    for (&id, object) in &mut doc.objects {
        if id == encrypt_id {
            continue;
        }
        let Ok(cipher) = decrypt_object(&key, id, object) else {
            continue;
        };
        match object {
            Object::Stream(stream) => stream.set_content(cipher),
            Object::String(content, _) => *content = cipher,
            _ => {}
        }
    }

    doc.save(path).expect("encrypted test pdf should save");
}
