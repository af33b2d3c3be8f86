use super::*;
use std::collections::HashMap;
use tempfile::TempDir;

fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn default_config() {
    let config = Config::default();
    assert_eq!(config.openai.base_url, "https://api.openai.com/v1/");
    assert_eq!(config.openai.embedding_model, "text-embedding-ada-002");
    assert_eq!(config.chunking.chunk_size, 2500);
    assert_eq!(config.chunking.chunk_overlap, 600);
    assert_eq!(config.retrieval.k, 4);
    assert_eq!(config.retrieval.fetch_k, 8);
    assert!(config.validate().is_ok());
}

#[test]
fn settings_from_environment() {
    let settings = Settings::from_lookup(
        lookup_from(&[
            ("PDF_PATH", "/data/thesis.pdf"),
            ("VECTOR_DB_PATH", "/data/index"),
            ("OPENAI_API_KEY", "sk-test-1234"),
            ("GPT_MODEL", "gpt-4"),
        ]),
        Config::default(),
    );

    assert_eq!(settings.pdf_path, Some(PathBuf::from("/data/thesis.pdf")));
    assert_eq!(settings.vector_db_path, Some(PathBuf::from("/data/index")));
    assert_eq!(settings.openai_api_key.as_deref(), Some("sk-test-1234"));
    assert_eq!(settings.gpt_model, "gpt-4");
}

#[test]
fn missing_values_are_absent_not_errors() {
    let settings = Settings::from_lookup(lookup_from(&[]), Config::default());

    assert_eq!(settings.pdf_path, None);
    assert_eq!(settings.vector_db_path, None);
    assert_eq!(settings.openai_api_key, None);
    assert_eq!(settings.gpt_model, DEFAULT_GPT_MODEL);

    assert!(matches!(
        settings.require_pdf_path(),
        Err(ConfigError::Missing("PDF_PATH"))
    ));
    assert!(matches!(
        settings.require_vector_db_path(),
        Err(ConfigError::Missing("VECTOR_DB_PATH"))
    ));
    assert!(matches!(
        settings.require_api_key(),
        Err(ConfigError::Missing("OPENAI_API_KEY"))
    ));
}

#[test]
fn empty_values_count_as_unset() {
    let settings = Settings::from_lookup(
        lookup_from(&[("GPT_MODEL", ""), ("OPENAI_API_KEY", "  ")]),
        Config::default(),
    );
    assert_eq!(settings.gpt_model, DEFAULT_GPT_MODEL);
    assert_eq!(settings.openai_api_key, None);
}

#[test]
fn masked_api_key() {
    let settings = Settings::from_lookup(
        lookup_from(&[("OPENAI_API_KEY", "sk-abcdefgh")]),
        Config::default(),
    );
    assert_eq!(settings.masked_api_key().as_deref(), Some("****efgh"));

    let settings = Settings::from_lookup(lookup_from(&[]), Config::default());
    assert_eq!(settings.masked_api_key(), None);
}

#[test]
fn short_api_key_is_fully_masked() {
    for key in ["abcd", "sk-abcd"] {
        let settings = Settings::from_lookup(
            lookup_from(&[("OPENAI_API_KEY", key)]),
            Config::default(),
        );
        let masked = settings.masked_api_key().expect("key should be present");
        assert_eq!(masked, "********");
        assert!(!masked.contains("abcd"));
    }
}

#[test]
fn config_validation() {
    let config = Config::default();
    assert!(config.validate().is_ok());

    let mut invalid_config = config.clone();
    invalid_config.openai.base_url = "ftp://example.com".to_string();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.openai.embedding_model = String::new();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.openai.batch_size = 0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.chunking.chunk_overlap = invalid_config.chunking.chunk_size;
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::InvalidChunkOverlap(2500, 2500))
    ));

    let mut invalid_config = config;
    invalid_config.retrieval.fetch_k = 2;
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::InvalidRetrieval { k: 4, fetch_k: 2 })
    ));
}

#[test]
fn api_url_gets_trailing_slash() {
    let config = OpenAiConfig {
        base_url: "http://localhost:8080/v1".to_string(),
        ..OpenAiConfig::default()
    };
    let url = config.api_url().expect("should parse api url");
    assert_eq!(url.as_str(), "http://localhost:8080/v1/");
    assert_eq!(
        url.join("embeddings").expect("should join").as_str(),
        "http://localhost:8080/v1/embeddings"
    );
}

#[test]
fn setter_validation() {
    let mut config = OpenAiConfig::default();

    assert!(config.set_base_url("https://proxy.example.com/v1/".to_string()).is_ok());
    assert!(config.set_embedding_model("text-embedding-3-small".to_string()).is_ok());
    assert!(config.set_batch_size(64).is_ok());

    assert!(config.set_base_url("not a url".to_string()).is_err());
    assert!(config.set_embedding_model(String::new()).is_err());
    assert!(config.set_batch_size(0).is_err());
    assert!(config.set_batch_size(4096).is_err());

    assert_eq!(config.base_url, "https://proxy.example.com/v1/");
    assert_eq!(config.batch_size, 64);
}

#[test]
fn load_missing_config_returns_defaults() {
    let temp_dir = TempDir::new().expect("should create temp dir");

    let config = Config::load(temp_dir.path()).expect("should load defaults");
    assert_eq!(config.get_base_dir(), temp_dir.path());
    assert_eq!(config.openai, OpenAiConfig::default());
}

#[test]
fn save_and_load_round_trip() {
    let temp_dir = TempDir::new().expect("should create temp dir");

    let mut config = Config::load(temp_dir.path()).expect("should load defaults");
    config.chunking.chunk_size = 1000;
    config.chunking.chunk_overlap = 200;
    config.retrieval.k = 3;
    config.save().expect("should save config");

    let loaded = Config::load(temp_dir.path()).expect("should load saved config");
    assert_eq!(loaded, config);
}

#[test]
fn load_rejects_invalid_file() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    fs::write(
        temp_dir.path().join("config.toml"),
        "[retrieval]\nk = 10\nfetch_k = 5\n",
    )
    .expect("should write config file");

    assert!(Config::load(temp_dir.path()).is_err());
}
