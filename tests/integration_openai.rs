#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// The full pipeline against a mock OpenAI-compatible server

mod common;

use std::collections::HashMap;

use serde_json::{Value, json};
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use common::{keyword_vector, write_text_pdf};
use thesis_rag::config::{Config, OpenAiConfig, Settings};
use thesis_rag::processor::DocumentProcessor;
use thesis_rag::query::answer;
use thesis_rag::rag::RagChain;

/// Answers `/embeddings` with keyword vectors for whatever input it is sent
struct KeywordEmbeddings;

impl Respond for KeywordEmbeddings {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = serde_json::from_slice(&request.body).expect("request should be JSON");
        let data: Vec<Value> = body["input"]
            .as_array()
            .expect("input should be an array")
            .iter()
            .enumerate()
            .map(|(index, text)| {
                json!({
                    "index": index,
                    "embedding": keyword_vector(text.as_str().unwrap_or_default()),
                })
            })
            .collect();
        ResponseTemplate::new(200).set_body_json(json!({ "data": data }))
    }
}

fn settings_for(server: &MockServer, temp_dir: &TempDir) -> Settings {
    let vars = HashMap::from([
        (
            "PDF_PATH",
            temp_dir.path().join("thesis.pdf").display().to_string(),
        ),
        (
            "VECTOR_DB_PATH",
            temp_dir.path().join("vector_db").display().to_string(),
        ),
        ("OPENAI_API_KEY", "sk-test".to_string()),
    ]);
    let config = Config {
        openai: OpenAiConfig {
            base_url: format!("{}/v1/", server.uri()),
            batch_size: 2,
            ..OpenAiConfig::default()
        },
        ..Config::default()
    };
    Settings::from_lookup(|key| vars.get(key).cloned(), config)
}

#[tokio::test]
async fn process_and_answer_through_openai_api() {
    let server = MockServer::start().await;
    let temp_dir = TempDir::new().expect("should create temp dir");
    let settings = settings_for(&server, &temp_dir);

    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(KeywordEmbeddings)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({ "model": "gpt-4o-mini", "temperature": 0.0 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [ { "message": { "role": "assistant", "content": "Three samples." } } ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let pdf = settings.require_pdf_path().expect("PDF_PATH is set");
    let index = settings.require_vector_db_path().expect("VECTOR_DB_PATH is set");
    write_text_pdf(
        pdf,
        &[
            "Background on sampling theory",
            "We collected three samples per site",
            "Conclusions",
        ],
    );

    let stats = DocumentProcessor::from_settings(&settings)
        .expect("processor should build")
        .with_progress(false)
        .process(pdf, index)
        .await
        .expect("processing should succeed");
    assert_eq!(stats.chunks, 3);
    assert_eq!(stats.embedding_dimension, common::DIMENSION);

    let mut chain = RagChain::from_settings(&settings)
        .await
        .expect("chain should build");
    let response = answer(&mut chain, "How many samples per site?", &[], 1, 4)
        .await
        .expect("query should succeed");

    assert_eq!(response.answer, "Three samples.");
    assert_eq!(response.source_documents.len(), 1);
    assert!(response.source_documents[0].content.contains("three samples"));
}

#[tokio::test]
async fn missing_api_key_is_reported_before_any_request() {
    let server = MockServer::start().await;
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut settings = settings_for(&server, &temp_dir);
    settings.openai_api_key = None;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    assert!(DocumentProcessor::from_settings(&settings).is_err());
    assert!(RagChain::from_settings(&settings).await.is_err());
}
