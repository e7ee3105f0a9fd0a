use trellis_core::config::{AppConfig, DEFAULT_FAILURE_MESSAGE};
use trellis_core::error::TrellisError;
use trellis_test_utils::temp_config;

#[test]
fn test_load_full_config_from_file() {
    let tmp = temp_config(
        r#"
workspace = "/tmp/trellis-test"

[model]
provider = "openai"
model_id = "gpt-4o-mini"
api_key = "sk-test-key"
base_url = "http://localhost:11434/v1/chat/completions"
max_tokens = 2048
temperature = 0.2

[model.retry]
max_retries = 5
initial_backoff_ms = 200
max_backoff_ms = 5000

[[fallback_models]]
provider = "anthropic"
model_id = "claude-sonnet-4-20250514"
api_key = "sk-ant-test"

[pev]
max_planning_attempts = 2
max_plan_steps = 3
short_circuit_search_errors = false
failure_message = "Gave up."

[search]
provider = "tavily"
api_key = "tvly-test"
max_results = 3
timeout_secs = 10
fail_on = ["weather"]

[log]
enabled = true
log_dir = "/tmp/trellis-test/runs"
level = 1
"#,
    );

    let config = AppConfig::load(tmp.path()).expect("load config");

    assert_eq!(config.workspace, "/tmp/trellis-test");
    assert_eq!(config.model.model_id, "gpt-4o-mini");
    assert_eq!(config.model.max_tokens, 2048);
    assert_eq!(config.model.retry.as_ref().unwrap().max_retries, 5);
    assert_eq!(config.fallback_models.len(), 1);
    assert_eq!(config.fallback_models[0].provider, "anthropic");

    assert_eq!(config.pev.max_planning_attempts, 2);
    assert_eq!(config.pev.max_plan_steps, 3);
    assert!(!config.pev.short_circuit_search_errors);
    assert_eq!(config.pev.failure_message, "Gave up.");

    let search = config.search.as_ref().expect("search present");
    assert_eq!(search.api_key.as_deref(), Some("tvly-test"));
    assert_eq!(search.fail_on, vec!["weather"]);

    assert_eq!(
        config.log_dir(),
        Some(std::path::PathBuf::from("/tmp/trellis-test/runs"))
    );
    assert_eq!(config.log.as_ref().unwrap().level, 1);
}

#[test]
fn test_env_var_expansion_in_config() {
    std::env::set_var("TRELLIS_TEST_SEARCH_KEY", "expanded-key-value");

    let tmp = temp_config(
        r#"
[model]
model_id = "test-model"

[search]
api_key = "${TRELLIS_TEST_SEARCH_KEY}"
"#,
    );

    let config = AppConfig::load(tmp.path()).expect("load config");
    assert_eq!(
        config.search.unwrap().api_key,
        Some("expanded-key-value".to_string())
    );

    std::env::remove_var("TRELLIS_TEST_SEARCH_KEY");
}

#[test]
fn test_minimal_config_uses_defaults() {
    let tmp = temp_config(
        r#"
[model]
model_id = "llama3.2"
"#,
    );

    let config = AppConfig::load(tmp.path()).expect("load config");

    assert_eq!(config.model.provider, "openai");
    assert!(config.model.retry.is_none());
    assert!(config.fallback_models.is_empty());
    assert_eq!(config.pev.max_planning_attempts, 4);
    assert_eq!(config.pev.max_plan_steps, 5);
    assert!(config.pev.short_circuit_search_errors);
    assert_eq!(config.pev.failure_message, DEFAULT_FAILURE_MESSAGE);
    assert!(config.search.is_none());
    assert!(config.log.is_none());
    assert!(config.log_dir().is_none());
}

#[test]
fn test_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = AppConfig::load(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, TrellisError::ConfigNotFound(_)));
}

#[test]
fn test_invalid_pev_section_rejected() {
    let tmp = temp_config(
        r#"
[model]
model_id = "m"

[pev]
max_plan_steps = 0
"#,
    );
    assert!(matches!(
        AppConfig::load(tmp.path()),
        Err(TrellisError::Config(_))
    ));
}
