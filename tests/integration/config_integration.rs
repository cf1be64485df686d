//! Integration tests for the layered configuration system

use crate::integration::test_utils::with_isolated_env;
use cardwright::cli::RunContext;
use cardwright::config::{ConfigLoader, GenerationMode, ProviderType, StorageBackend};
use cardwright::error::ApiError;
use tempfile::TempDir;

fn write(path: std::path::PathBuf, contents: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
}

#[test]
fn defaults_apply_without_any_files() {
    let temp = TempDir::new().unwrap();
    with_isolated_env(&temp, || {
        let config = ConfigLoader::load(temp.path()).unwrap();
        assert_eq!(config.storage.backend, StorageBackend::Sled);
        assert_eq!(config.generation.mode, GenerationMode::Mock);
        assert_eq!(config.generation.max_attempts, 3);
        assert_eq!(config.generation.base_delay_ms, 250);
        assert!(config.generation.concurrency.is_none());
        assert!(config.validate().is_ok());
    });
}

#[test]
fn layers_override_in_order() {
    let temp = TempDir::new().unwrap();
    let workspace = temp.path().join("ws");
    with_isolated_env(&temp, || {
        write(
            temp.path().join("xdg/cardwright/config.toml"),
            r#"
owner = "global-owner"

[generation]
concurrency = 3
max_attempts = 5
"#,
        );
        write(
            workspace.join("config/config.toml"),
            r#"
[generation]
mode = "live"
max_attempts = 4

[provider]
provider_type = "ollama"
model = "llama3"
"#,
        );
        write(
            workspace.join("config/staging.toml"),
            r#"
[provider]
provider_type = "ollama"
model = "qwen2"
"#,
        );
        std::env::set_var("CARDWRIGHT_ENV", "staging");
        std::env::set_var("CARDWRIGHT__GENERATION__CONCURRENCY", "6");

        let config = ConfigLoader::load(&workspace).unwrap();
        assert_eq!(config.owner.as_deref(), Some("global-owner"));
        assert_eq!(config.generation.mode, GenerationMode::Live);
        assert_eq!(config.generation.max_attempts, 4);
        assert_eq!(config.generation.concurrency.as_deref(), Some("6"));
        let provider = config.provider.as_ref().unwrap();
        assert_eq!(provider.provider_type, ProviderType::Ollama);
        assert_eq!(provider.model, "qwen2");
        assert!(config.validate().is_ok());
    });
}

#[test]
fn live_mode_without_provider_is_rejected() {
    let temp = TempDir::new().unwrap();
    let workspace = temp.path().join("ws");
    with_isolated_env(&temp, || {
        write(
            workspace.join("config/config.toml"),
            "[generation]\nmode = \"live\"\n",
        );
        let config = ConfigLoader::load(&workspace).unwrap();
        assert!(config.validate().is_err());

        let err = RunContext::new(workspace.clone(), None, None).err().unwrap();
        assert!(matches!(err, ApiError::ConfigError(_)));
    });
}

#[test]
fn run_context_opens_sled_store_under_workspace() {
    let temp = TempDir::new().unwrap();
    let workspace = temp.path().join("ws");
    std::fs::create_dir_all(&workspace).unwrap();
    with_isolated_env(&temp, || {
        let ctx = RunContext::new(workspace.clone(), None, Some("ada".to_string())).unwrap();
        assert_eq!(ctx.owner(), "ada");
        ctx.api().create_course("Persisted").unwrap();
    });
    assert!(workspace.join(".cardwright/store").exists());
}

#[test]
fn explicit_file_replaces_workspace_layers() {
    let temp = TempDir::new().unwrap();
    let workspace = temp.path().join("ws");
    with_isolated_env(&temp, || {
        write(
            workspace.join("config/config.toml"),
            "[storage]\nbackend = \"memory\"\n",
        );
        let explicit = temp.path().join("explicit.toml");
        write(explicit.clone(), "[generation]\nmax_jitter_ms = 0\n");

        let config = ConfigLoader::load_from_file(&explicit).unwrap();
        assert_eq!(config.storage.backend, StorageBackend::Sled);
        assert_eq!(config.generation.retry_policy().max_jitter.as_millis(), 0);
    });
}
