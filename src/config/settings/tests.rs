use super::*;
use tempfile::TempDir;

#[test]
fn default_config() {
    let config = Config::default();
    assert_eq!(config.ollama.protocol, "http");
    assert_eq!(config.ollama.host, "localhost");
    assert_eq!(config.ollama.port, 11434);
    assert_eq!(config.ollama.embedding_model, "nomic-embed-text:latest");
    assert_eq!(config.ollama.batch_size, 16);
    assert_eq!(config.generation.model, "mistral:7b");
    assert_eq!(config.generation.max_tokens, 2000);
    assert_eq!(config.retrieval.context_size, 5);
    assert_eq!(config.retrieval.index_batch_size, 1000);
    assert!(config.vault.path.is_none());
    assert!(config.vault.homebrew_folders.is_empty());
}

#[test]
fn config_validation() {
    let config = Config::default();
    assert!(config.validate().is_ok());

    let mut invalid_config = config.clone();
    invalid_config.ollama.protocol = "ftp".to_string();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.ollama.port = 0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.ollama.embedding_model = String::new();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.ollama.batch_size = 1001;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.generation.temperature = 3.5;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.generation.max_tokens = 0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.retrieval.score_threshold = 1.5;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.retrieval.context_size = 0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config;
    invalid_config.vault.homebrew_folders = vec!["Party/Notes".to_string()];
    assert!(invalid_config.validate().is_err());
}

#[test]
fn ollama_url_generation() {
    let config = Config::default();
    let url = config
        .ollama_url()
        .expect("should generate ollama_url successfully");
    assert_eq!(url.as_str(), "http://localhost:11434/");
}

#[test]
fn toml_serialization() {
    let config = Config {
        vault: VaultConfig {
            path: Some(PathBuf::from("/vaults/campaign")),
            homebrew_folders: vec!["1-Party".to_string(), "2-World".to_string()],
        },
        ..Config::default()
    };
    let toml_str = toml::to_string(&config).expect("should serialize toml correctly");
    let parsed_config: Config = toml::from_str(&toml_str).expect("should parse toml correctly");
    assert_eq!(config, parsed_config);
}

#[test]
fn partial_toml_uses_defaults() {
    let parsed: Config = toml::from_str(
        r#"
        [vault]
        path = "/vaults/campaign"

        [generation]
        temperature = 0.7
        "#,
    )
    .expect("should parse partial toml");

    assert_eq!(parsed.vault.path, Some(PathBuf::from("/vaults/campaign")));
    assert_eq!(parsed.generation.temperature, 0.7);
    assert_eq!(parsed.generation.model, "mistral:7b");
    assert_eq!(parsed.ollama, OllamaConfig::default());
    assert_eq!(parsed.retrieval, RetrievalConfig::default());
}

#[test]
fn setter_validation() {
    let mut ollama = OllamaConfig::default();

    assert!(ollama.set_protocol("https".to_string()).is_ok());
    assert!(ollama.set_host("example.com".to_string()).is_ok());
    assert!(ollama.set_port(8080).is_ok());
    assert!(ollama.set_embedding_model("new-model".to_string()).is_ok());
    assert!(ollama.set_batch_size(128).is_ok());
    assert!(ollama.set_embedding_dimension(1024).is_ok());

    assert!(ollama.set_protocol("ftp".to_string()).is_err());
    assert!(ollama.set_port(0).is_err());
    assert!(ollama.set_embedding_model(String::new()).is_err());
    assert!(ollama.set_batch_size(0).is_err());
    assert!(ollama.set_embedding_dimension(8).is_err());

    let mut generation = GenerationConfig::default();
    assert!(generation.set_model("llama3".to_string()).is_ok());
    assert!(generation.set_temperature(0.0).is_ok());
    assert!(generation.set_max_tokens(512).is_ok());
    assert!(generation.set_temperature(-0.1).is_err());
    assert!(generation.set_max_tokens(0).is_err());

    let mut retrieval = RetrievalConfig::default();
    assert!(retrieval.set_context_size(10).is_ok());
    assert!(retrieval.set_score_threshold(0.0).is_ok());
    assert!(retrieval.set_score_threshold(1.0).is_ok());
    assert!(retrieval.set_score_threshold(1.01).is_err());
    assert!(retrieval.set_context_size(0).is_err());

    let mut vault = VaultConfig::default();
    assert!(vault.set_homebrew_folders(vec!["Party".to_string()]).is_ok());
    assert!(vault.set_homebrew_folders(vec![" ".to_string()]).is_err());
    assert_eq!(vault.homebrew_folders, vec!["Party".to_string()]);
}

#[test]
fn load_missing_file_returns_defaults() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = Config::load(temp_dir.path()).expect("should load defaults");

    assert_eq!(config.base_dir, temp_dir.path());
    assert_eq!(config.ollama, OllamaConfig::default());
}

#[test]
fn save_and_load_round_trip() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut config = Config::load(temp_dir.path()).expect("should load defaults");
    config.vault.path = Some(PathBuf::from("/vaults/campaign"));
    config.vault.homebrew_folders = vec!["Party".to_string()];
    config.generation.max_tokens = 800;

    config.save().expect("should save config");
    let loaded = Config::load(temp_dir.path()).expect("should load saved config");

    assert_eq!(loaded, config);
}

#[test]
fn load_rejects_invalid_values() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    std::fs::write(
        temp_dir.path().join("config.toml"),
        "[retrieval]\nscore_threshold = 4.0\n",
    )
    .expect("should write config");

    assert!(Config::load(temp_dir.path()).is_err());
}

#[test]
fn derived_paths() {
    let config = Config {
        base_dir: PathBuf::from("/data/lorekeeper"),
        ..Config::default()
    };

    assert_eq!(
        config.config_file_path(),
        PathBuf::from("/data/lorekeeper/config.toml")
    );
    assert_eq!(
        config.database_path(),
        PathBuf::from("/data/lorekeeper/ledger.db")
    );
    assert_eq!(
        config.vector_database_path(),
        PathBuf::from("/data/lorekeeper/vectors")
    );
    assert_eq!(
        config.build_lock_path(),
        PathBuf::from("/data/lorekeeper/.build.lock")
    );
}
