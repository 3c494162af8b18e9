use super::data::{path_display, BackendOverride, Config};
use super::io::ConfigError;
use crate::core::personality::PersonalityConfig;
use std::collections::HashMap;
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
fn test_load_nonexistent_config() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config_path = temp_dir.path().join("nonexistent_config.toml");

    let config = Config::load_from_path(&config_path).expect("Failed to load config");

    assert_eq!(config, Config::default());
    assert!(!config.starts_encrypted());
}

#[test]
fn test_config_persistence_lifecycle() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config_path = temp_dir.path().join("nested").join("config.toml");

    // Phase 1: Initial save and load
    let config = Config {
        default_personality: Some("ghost".to_string()),
        encrypted: Some(true),
        ..Default::default()
    };
    config
        .save_to_path(&config_path)
        .expect("Failed to save config");
    let loaded = Config::load_from_path(&config_path).expect("Failed to load config");
    assert_eq!(loaded.default_personality.as_deref(), Some("ghost"));
    assert!(loaded.starts_encrypted());

    // Phase 2: Modify and verify persistence of changes
    let mut config = loaded;
    config.default_personality = Some("oracle".to_string());
    config.backends.insert(
        "lmstudio".to_string(),
        BackendOverride {
            base_url: Some("http://10.0.0.5:1234".to_string()),
            ..Default::default()
        },
    );
    config
        .save_to_path(&config_path)
        .expect("Failed to save config");
    let loaded = Config::load_from_path(&config_path).expect("Failed to load config");
    assert_eq!(loaded.default_personality.as_deref(), Some("oracle"));
    assert_eq!(
        loaded
            .backend("LMStudio")
            .and_then(|b| b.base_url.as_deref()),
        Some("http://10.0.0.5:1234")
    );

    // Phase 3: Unset values and verify
    let mut config = loaded;
    config.default_personality = None;
    config.encrypted = None;
    config
        .save_to_path(&config_path)
        .expect("Failed to save config");
    let loaded = Config::load_from_path(&config_path).expect("Failed to load config");
    assert_eq!(loaded.default_personality, None);
    assert!(!loaded.starts_encrypted());
}

#[test]
fn test_parse_full_config() {
    let config: Config = toml::from_str(
        r##"
default_personality = "ghost"
encrypted = false
sessions_dir = "/tmp/obsidian-sessions"

[backends.gemini]
api_key = "g-123"
model = "gemini-1.5-pro"

[backends.ollama]
base_url = "http://gpu-box:11434"

[[personalities]]
id = "poet"
display_name = "Poet"
system_prompt = "Answer in verse."
backend = "ollama"
temperature = 0.9
"##,
    )
    .expect("parse config");

    assert_eq!(config.sessions_dir, Some(PathBuf::from("/tmp/obsidian-sessions")));
    assert_eq!(
        config.backend("gemini"),
        Some(&BackendOverride {
            api_key: Some("g-123".to_string()),
            base_url: None,
            model: Some("gemini-1.5-pro".to_string()),
        })
    );
    assert_eq!(config.personalities.len(), 1);
    assert_eq!(config.personalities[0].backend, "ollama");
    assert!(config.backend("deepseek").is_none());
}

#[test]
fn test_invalid_toml_reports_parse_error_with_path() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config_path = temp_dir.path().join("config.toml");
    std::fs::write(&config_path, "default_personality = [unterminated").expect("write");

    let err = Config::load_from_path(&config_path).expect_err("invalid TOML");
    assert!(matches!(err, ConfigError::Parse { .. }));
    assert!(err.to_string().starts_with("Failed to parse config at "));
}

#[test]
fn test_custom_personalities_round_trip() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config_path = temp_dir.path().join("config.toml");

    let config = Config {
        personalities: vec![PersonalityConfig {
            id: "scribe".to_string(),
            display_name: "Scribe".to_string(),
            description: "Takes notes".to_string(),
            system_prompt: "Summarize.".to_string(),
            color: "#ffffff".to_string(),
            backend: "deepseek".to_string(),
            temperature: 0.25,
            max_tokens: Some(300),
        }],
        backends: HashMap::new(),
        ..Default::default()
    };
    config.save_to_path(&config_path).expect("save");

    let loaded = Config::load_from_path(&config_path).expect("load");
    assert_eq!(loaded.personalities, config.personalities);
}

#[test]
fn test_path_display() {
    let path = PathBuf::from("/some/absolute/path");
    let display = path_display(&path);
    assert!(!display.is_empty());

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(&home);
            let subpath = home_path.join("test/path");
            let display = path_display(&subpath);
            assert!(
                display.starts_with("~/"),
                "Expected path to start with ~/, got: {}",
                display
            );
            assert!(display.contains("test/path"));
        }
    }
}
