//! Loader for workspace configuration with YAML + environment overlays.
//!
//! Precedence, lowest first: built-in defaults, YAML sources in the order
//! they were added, then `VERACITY__SECTION__KEY` environment variables.
//! After merging, every string value has `${VAR}` placeholders expanded
//! (recursively, up to a fixed depth) before typed deserialization.
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;
const MAX_CONCURRENT_VERIFICATIONS: usize = 8;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VeracityConfig {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum LlmConfig {
    Openai {
        model: String,
        auth_token: String,
        #[serde(default)]
        temperature: Option<f32>,
        #[serde(default)]
        max_tokens: Option<u32>,
        #[serde(default = "default_openai_endpoint")]
        endpoint: String,
        #[serde(default = "default_llm_timeout_secs")]
        timeout_secs: u64,
    },
    Ollama {
        model: String,
        #[serde(default = "default_ollama_endpoint")]
        endpoint: String,
        #[serde(default)]
        temperature: Option<f32>,
        #[serde(default)]
        max_tokens: Option<u32>,
        #[serde(default = "default_llm_timeout_secs")]
        timeout_secs: u64,
    },
    #[default]
    None,
}

/// Knobs for one `run()` of the fact-check pipeline.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub max_concurrent_verifications: usize,
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub requests_per_second: f64,
    pub burst: u32,
    pub max_payload_bytes: usize,
    pub run_timeout_secs: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_verifications: 4,
            max_attempts: 3,
            initial_backoff_ms: 500,
            max_backoff_ms: 8_000,
            requests_per_second: 2.0,
            burst: 4,
            max_payload_bytes: 50 * 1024 * 1024,
            run_timeout_secs: Some(300),
        }
    }
}

impl PipelineConfig {
    /// Worker-pool size for per-claim verification, kept within `1..=8`.
    pub fn concurrency(&self) -> usize {
        self.max_concurrent_verifications
            .clamp(1, MAX_CONCURRENT_VERIFICATIONS)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    /// YAML file replacing the built-in trusted/problematic registry.
    pub registry_path: Option<PathBuf>,
    /// Download cited pages to derive heuristic signals.
    pub fetch_metadata: bool,
    pub fetch_timeout_secs: u64,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            registry_path: None,
            fetch_metadata: false,
            fetch_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: String,
    pub filter: String,
    pub dir: Option<PathBuf>,
    pub stderr: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: "text".into(),
            filter: "info".into(),
            dir: None,
            stderr: false,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// e.g. `sqlite://veracity.db`; unset keeps reports in memory.
    pub database_url: Option<String>,
}

fn default_openai_endpoint() -> String {
    "https://api.openai.com/v1".into()
}
fn default_ollama_endpoint() -> String {
    "http://localhost:11434".into()
}
fn default_llm_timeout_secs() -> u64 {
    60
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => cur.clone(),
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Builder hiding the `config` crate wiring (YAML + env overrides).
pub struct VeracityConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
    env: bool,
}

impl Default for VeracityConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl VeracityConfigLoader {
    /// Start with `VERACITY__` env overrides and no files.
    ///
    /// ```
    /// use veracity_config::{LlmConfig, VeracityConfigLoader};
    ///
    /// let config = VeracityConfigLoader::new()
    ///     .with_yaml_str("version: '1'\npipeline:\n  max_concurrent_verifications: 6")
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(config.version.as_deref(), Some("1"));
    /// assert_eq!(config.pipeline.concurrency(), 6);
    /// assert!(matches!(config.llm, LlmConfig::None));
    /// ```
    pub fn new() -> Self {
        Self {
            builder: Config::builder(),
            env: true,
        }
    }

    /// Ignore process environment overrides (tests, embedded use).
    pub fn without_env(mut self) -> Self {
        self.env = false;
        self
    }

    /// Attach a required YAML/TOML/JSON file; the format follows the suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Attach a file that may be absent, so deployments can rely purely on
    /// environment variables.
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    /// Merge an inline YAML snippet.
    ///
    /// ```
    /// use veracity_config::{LlmConfig, VeracityConfigLoader};
    ///
    /// let cfg = VeracityConfigLoader::new()
    ///     .without_env()
    ///     .with_yaml_str(
    ///         r#"
    /// llm:
    ///   provider: ollama
    ///   model: "llama3.2:3b"
    /// "#,
    ///     )
    ///     .load()
    ///     .unwrap();
    ///
    /// match cfg.llm {
    ///     LlmConfig::Ollama { endpoint, .. } => assert_eq!(endpoint, "http://localhost:11434"),
    ///     other => panic!("unexpected {other:?}"),
    /// }
    /// ```
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, config::FileFormat::Yaml));
        self
    }

    /// Merge all sources, expand `${VAR}` placeholders and deserialize.
    pub fn load(self) -> Result<VeracityConfig, ConfigError> {
        let mut builder = self.builder;
        if self.env {
            builder = builder.add_source(
                Environment::with_prefix("VERACITY")
                    .separator("__")
                    .try_parsing(true),
            );
        }
        let cfg = builder.build()?;

        let mut v: Value = cfg.try_deserialize()?;
        if v.is_null() {
            v = Value::Object(Default::default());
        }
        expand_env_in_value(&mut v);

        serde_json::from_value(v).map_err(|e| ConfigError::Message(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn expands_simple_string() {
        temp_env::with_var("FOO", Some("bar"), || {
            let mut v = json!("prefix-${FOO}-suffix");
            expand_env_in_value(&mut v);
            assert_eq!(v, json!("prefix-bar-suffix"));
        });
    }

    #[test]
    fn expands_in_array_and_object() {
        temp_env::with_vars([("CITY", Some("Brno")), ("REGION", Some("JMK"))], || {
            let mut v = json!(["hello-$CITY", { "loc": "${CITY}-${REGION}" }, 42, true, null]);
            expand_env_in_value(&mut v);
            assert_eq!(v, json!(["hello-Brno", { "loc": "Brno-JMK" }, 42, true, null]));
        });
    }

    #[test]
    fn expands_recursively_across_env_values() {
        temp_env::with_vars(
            [
                ("BAZ", Some("qux")),
                ("BAR", Some("mid-${BAZ}")),
                ("FOO", Some("start-${BAR}-end")),
            ],
            || {
                let mut v = json!("X=${FOO}");
                expand_env_in_value(&mut v);
                assert_eq!(v, json!("X=start-mid-qux-end"));
            },
        );
    }

    #[test]
    fn stops_on_cycles() {
        temp_env::with_vars([("A", Some("${B}")), ("B", Some("${A}"))], || {
            let mut v = json!("x=${A}-y");
            expand_env_in_value(&mut v);
            let s = v.as_str().unwrap();
            assert!(s.starts_with("x=") && s.ends_with("-y"));
            assert!(s.contains("${"));
        });
    }

    #[test]
    fn unknown_vars_are_left_as_is() {
        let mut v = json!("hi-${VERACITY_DOES_NOT_EXIST}");
        expand_env_in_value(&mut v);
        assert_eq!(v, json!("hi-${VERACITY_DOES_NOT_EXIST}"));
    }

    #[test]
    fn concurrency_is_clamped() {
        let mut p = PipelineConfig::default();
        assert_eq!(p.concurrency(), 4);
        p.max_concurrent_verifications = 0;
        assert_eq!(p.concurrency(), 1);
        p.max_concurrent_verifications = 64;
        assert_eq!(p.concurrency(), 8);
    }
}
