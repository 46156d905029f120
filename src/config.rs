//! # Configuration
//!
//! System-wide configuration loaded from JSON. Every field carries a serde
//! default so an empty object (or a missing file section) yields a working
//! configuration. Secrets live in a separate [`SecretConfig`] so the system
//! configuration can be logged or echoed back without leaking credentials.

use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fs::File, io::BufReader, path::Path, time::Duration};

use crate::{Error, InternalResult};

/// Top-level system configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    #[serde(default)]
    pub executor: ExecutorConfig,

    #[serde(default)]
    pub chat: ChatConfig,

    #[serde(default)]
    pub generation: GenerationConfig,

    /// Capacity of the execution record store. Oldest records are evicted
    /// once the limit is reached.
    #[serde(default = "default_max_execution_records")]
    pub max_execution_records: usize,

    /// Capacity of the session store.
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            executor: ExecutorConfig::default(),
            chat: ChatConfig::default(),
            generation: GenerationConfig::default(),
            max_execution_records: default_max_execution_records(),
            max_sessions: default_max_sessions(),
        }
    }
}

/// Configuration for the compile-and-run engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Compiler binary, invoked as `<compiler> -o <binary> <source>`.
    #[serde(default = "default_compiler")]
    pub compiler: String,

    /// Extension of the source file written into the workspace.
    #[serde(default = "default_source_extension")]
    pub source_extension: String,

    /// Hard wall-clock cap on the run step.
    #[serde(default = "default_run_timeout", with = "duration_secs")]
    pub run_timeout: Duration,

    /// Wall-clock cap on the compile step.
    #[serde(default = "default_compile_timeout", with = "duration_secs")]
    pub compile_timeout: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            compiler: default_compiler(),
            source_extension: default_source_extension(),
            run_timeout: default_run_timeout(),
            compile_timeout: default_compile_timeout(),
        }
    }
}

/// Configuration for the chat intent router.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// The single language the engine compiles and runs.
    #[serde(default = "default_target_language")]
    pub target_language: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            target_language: default_target_language(),
        }
    }
}

/// Configuration shared by the generation provider's operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

/// Secret configuration (secret.json).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretConfig {
    pub providers: HashMap<String, ProviderSecretConfig>,
}

impl Default for SecretConfig {
    fn default() -> Self {
        Self {
            providers: {
                let mut map = HashMap::new();
                map.insert(default_provider_name(), ProviderSecretConfig::default());
                map
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProviderSecretConfig {
    pub api_key: String,
    #[serde(default = "HashMap::new")]
    pub additional_auth: HashMap<String, String>,
}

pub fn from_file<T: for<'de> Deserialize<'de>, P: AsRef<Path>>(path: P) -> InternalResult<T> {
    let file = File::open(path)
        .map_err(|e| Error::Config(format!("Failed to open config file: {}", e)))?;
    let reader = BufReader::new(file);
    let config = serde_json::from_reader(reader)
        .map_err(|e| Error::Config(format!("Failed to parse config file: {}", e)))?;
    Ok(config)
}

pub fn from_str<T: for<'de> Deserialize<'de>>(s: &str) -> InternalResult<T> {
    let config = serde_json::from_str(s)
        .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
    Ok(config)
}

fn default_compiler() -> String {
    "gcc".to_string()
}
fn default_source_extension() -> String {
    "c".to_string()
}
fn default_target_language() -> String {
    "c".to_string()
}
fn default_run_timeout() -> Duration {
    Duration::from_secs(10)
}
fn default_compile_timeout() -> Duration {
    Duration::from_secs(30)
}
fn default_model() -> String {
    "gpt-4o".to_string()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> usize {
    4096
}
fn default_max_execution_records() -> usize {
    1024
}
fn default_max_sessions() -> usize {
    256
}
fn default_provider_name() -> String {
    "openai".to_string()
}

pub mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = SystemConfig::default();
        assert_eq!(config.executor.compiler, "gcc");
        assert_eq!(config.executor.run_timeout, Duration::from_secs(10));
        assert_eq!(config.chat.target_language, "c");
        assert_eq!(config.generation.model, "gpt-4o");
        assert_eq!(config.max_execution_records, 1024);
    }

    #[test]
    fn test_empty_json_yields_defaults() {
        let config: SystemConfig = from_str("{}").unwrap();
        assert_eq!(config.executor.compiler, "gcc");
        assert_eq!(config.max_sessions, 256);
    }

    #[test]
    fn test_partial_override() {
        let config: SystemConfig = from_str(
            r#"{"executor": {"compiler": "cc", "run_timeout": 2}, "chat": {"target_language": "c"}}"#,
        )
        .unwrap();
        assert_eq!(config.executor.compiler, "cc");
        assert_eq!(config.executor.run_timeout, Duration::from_secs(2));
        // untouched sections keep their defaults
        assert_eq!(config.executor.compile_timeout, Duration::from_secs(30));
        assert_eq!(config.generation.temperature, 0.7);
    }

    #[test]
    fn test_secret_config_default() {
        let secret = SecretConfig::default();
        assert!(secret.providers.contains_key("openai"));
    }
}
