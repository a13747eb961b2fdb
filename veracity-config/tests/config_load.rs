use serial_test::serial;
use std::{fs, path::PathBuf};
use tempfile::TempDir;
use veracity_config::{LlmConfig, VeracityConfigLoader};

/// Helper to write a YAML file in a temp dir and return its path.
fn write_yaml(tmp: &TempDir, name: &str, yaml: &str) -> PathBuf {
    let p = tmp.path().join(name);
    fs::write(&p, yaml).expect("write yaml");
    p
}

const FILE_YAML: &str = r#"
version: "0.1"
llm:
  provider: openai
  model: "gpt-4o-mini"
  auth_token: "${VERACITY_TEST_OPENAI_KEY}"
  temperature: 0.2
  max_tokens: 512
pipeline:
  max_concurrent_verifications: 3
  max_attempts: 2
sources:
  fetch_metadata: true
logging:
  format: json
store:
  database_url: "sqlite://veracity-test.db"
"#;

#[test]
#[serial]
fn loads_file_and_expands_env() {
    let tmp = TempDir::new().unwrap();
    let p = write_yaml(&tmp, "veracity.yaml", FILE_YAML);

    temp_env::with_var("VERACITY_TEST_OPENAI_KEY", Some("sk-test"), || {
        let config = VeracityConfigLoader::new()
            .with_file(&p)
            .load()
            .expect("load system config");

        assert_eq!(config.version.as_deref(), Some("0.1"));
        match &config.llm {
            LlmConfig::Openai {
                model,
                auth_token,
                endpoint,
                timeout_secs,
                ..
            } => {
                assert_eq!(model, "gpt-4o-mini");
                assert_eq!(auth_token, "sk-test");
                assert_eq!(endpoint, "https://api.openai.com/v1");
                assert_eq!(*timeout_secs, 60);
            }
            other => panic!("expected openai config, got {other:?}"),
        }
        assert_eq!(config.pipeline.concurrency(), 3);
        assert_eq!(config.pipeline.max_attempts, 2);
        assert_eq!(config.pipeline.initial_backoff_ms, 500);
        assert!(config.sources.fetch_metadata);
        assert_eq!(config.logging.format, "json");
        assert_eq!(
            config.store.database_url.as_deref(),
            Some("sqlite://veracity-test.db")
        );
    });
}

#[test]
#[serial]
fn env_overrides_file_values() {
    let tmp = TempDir::new().unwrap();
    let p = write_yaml(&tmp, "veracity.yaml", FILE_YAML);

    temp_env::with_vars(
        [
            ("VERACITY_TEST_OPENAI_KEY", Some("sk-test")),
            ("VERACITY__PIPELINE__MAX_ATTEMPTS", Some("5")),
        ],
        || {
            let config = VeracityConfigLoader::new().with_file(&p).load().unwrap();
            assert_eq!(config.pipeline.max_attempts, 5);
            assert_eq!(config.pipeline.concurrency(), 3);
        },
    );
}

#[test]
#[serial]
fn missing_optional_file_yields_defaults() {
    let tmp = TempDir::new().unwrap();
    let config = VeracityConfigLoader::new()
        .without_env()
        .with_optional_file(tmp.path().join("absent.yaml"))
        .load()
        .unwrap();

    assert!(matches!(config.llm, LlmConfig::None));
    assert_eq!(config.pipeline.concurrency(), 4);
    assert_eq!(config.logging.filter, "info");
    assert!(config.store.database_url.is_none());
}

#[test]
#[serial]
fn missing_required_file_is_an_error() {
    let tmp = TempDir::new().unwrap();
    let res = VeracityConfigLoader::new()
        .without_env()
        .with_file(tmp.path().join("absent.yaml"))
        .load();
    assert!(res.is_err());
}
