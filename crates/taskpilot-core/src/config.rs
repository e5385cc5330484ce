//! Configuration management for taskpilot.toml

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::AgentError;

pub const CONFIG_FILE_NAME: &str = "taskpilot.toml";
pub const FALLBACK_KEY_ENV: &str = "TASKPILOT_FALLBACK_API_KEY";

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_TEMPERATURE: f32 = 0.9;
pub const DEFAULT_MAX_TOKENS: u32 = 750;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub agent: AgentSettings,
}

/// Where and how to reach the chat completion API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Shared key used when the user supplies none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_api_key: Option<String>,
    #[serde(default = "default_model")]
    pub default_model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Loop behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    /// Name the agent calls itself in prompts
    #[serde(default = "default_agent_name")]
    pub name: String,
    /// Language the model is asked to answer in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default = "default_fallback_ceiling")]
    pub fallback_loop_ceiling: u32,
    #[serde(default = "default_user_ceiling")]
    pub user_loop_ceiling: u32,
    #[serde(default = "default_task_pacing_ms")]
    pub task_pacing_ms: u64,
    #[serde(default = "default_step_pacing_ms")]
    pub step_pacing_ms: u64,
    /// Drop "No tasks needed" style entries before they reach the queue
    #[serde(default)]
    pub filter_degenerate_tasks: bool,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_agent_name() -> String {
    "TaskPilot".to_string()
}

fn default_fallback_ceiling() -> u32 {
    4
}

fn default_user_ceiling() -> u32 {
    50
}

fn default_task_pacing_ms() -> u64 {
    800
}

fn default_step_pacing_ms() -> u64 {
    1000
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            fallback_api_key: None,
            default_model: default_model(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            language: None,
            fallback_loop_ceiling: default_fallback_ceiling(),
            user_loop_ceiling: default_user_ceiling(),
            task_pacing_ms: default_task_pacing_ms(),
            step_pacing_ms: default_step_pacing_ms(),
            filter_degenerate_tasks: false,
        }
    }
}

impl AgentSettings {
    pub fn task_pacing(&self) -> Duration {
        Duration::from_millis(self.task_pacing_ms)
    }

    pub fn step_pacing(&self) -> Duration {
        Duration::from_millis(self.step_pacing_ms)
    }
}

impl Config {
    /// Load configuration from the nearest taskpilot.toml, the user config
    /// directory, or defaults, then apply environment overrides
    pub fn load() -> Result<Self> {
        let config = match Self::find_config_path() {
            Some(path) => Self::load_from(path)?,
            None => Self::default(),
        };
        Ok(config.with_env_overrides())
    }

    /// Load configuration from a specific path
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read {}", path.as_ref().display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.as_ref().display()))
    }

    /// Find taskpilot.toml in the current directory or parents, then in the
    /// user config directory
    pub fn find_config_path() -> Option<PathBuf> {
        if let Ok(mut current) = std::env::current_dir() {
            for _ in 0..10 {
                let candidate = current.join(CONFIG_FILE_NAME);
                if candidate.exists() {
                    return Some(candidate);
                }
                if !current.pop() {
                    break;
                }
            }
        }

        Self::user_config_path().filter(|p| p.exists())
    }

    /// ~/.config/taskpilot/config.toml (or platform equivalent)
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("taskpilot").join("config.toml"))
    }

    /// Environment takes precedence over the file for the fallback key
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(key) = std::env::var(FALLBACK_KEY_ENV) {
            if !key.trim().is_empty() {
                self.provider.fallback_api_key = Some(key);
            }
        }
        self
    }

    /// Write a commented default configuration file
    pub fn create_default(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("Config file already exists: {}", path.display());
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, DEFAULT_CONFIG_TEMPLATE)
            .with_context(|| format!("Failed to write {}", path.display()))
    }
}

const DEFAULT_CONFIG_TEMPLATE: &str = r#"# taskpilot configuration

[provider]
# OpenAI-compatible API root
base_url = "https://api.openai.com/v1"

# Shared key used when no personal key is given (or set TASKPILOT_FALLBACK_API_KEY)
# fallback_api_key = "sk-..."

default_model = "gpt-3.5-turbo"
max_tokens = 750
timeout_secs = 60

[agent]
name = "TaskPilot"

# Ask the model to answer in a specific language
# language = "English"

# Loop ceilings for the shared key and for a personal key
fallback_loop_ceiling = 4
user_loop_ceiling = 50

# Delays between emitted events
task_pacing_ms = 800
step_pacing_ms = 1000

# Drop "No tasks needed" style entries from generated task lists
filter_degenerate_tasks = false
"#;

/// Model settings supplied by the user for one run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelSettings {
    /// Empty means "use the fallback key"
    pub api_key: String,
    /// Empty means the configured default model
    pub model_name: String,
    pub temperature: Option<f32>,
}

/// Which credential a run is using
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// The user's own key, sent directly
    User,
    /// The configured shared key
    Fallback,
}

/// Settings actually sent to the provider, resolved once per run
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveSettings {
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub credential: CredentialSource,
}

impl EffectiveSettings {
    pub fn resolve(settings: &ModelSettings, provider: &ProviderConfig) -> Result<Self, AgentError> {
        let (api_key, credential) = if settings.api_key.is_empty() {
            let key = provider
                .fallback_api_key
                .as_deref()
                .filter(|k| !k.is_empty())
                .ok_or(AgentError::MissingCredential)?;
            (key.to_string(), CredentialSource::Fallback)
        } else {
            (settings.api_key.clone(), CredentialSource::User)
        };

        let model = if settings.model_name.is_empty() {
            provider.default_model.clone()
        } else {
            settings.model_name.clone()
        };

        Ok(Self {
            api_key,
            model,
            temperature: settings.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            max_tokens: provider.max_tokens,
            credential,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider_with_fallback() -> ProviderConfig {
        ProviderConfig {
            fallback_api_key: Some("sk-shared".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[provider]
base_url = "http://localhost:8080/v1"
fallback_api_key = "sk-shared"

[agent]
name = "Planner"
language = "Traditional Chinese"
user_loop_ceiling = 20
filter_degenerate_tasks = true
"#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.provider.base_url, "http://localhost:8080/v1");
        assert_eq!(config.provider.default_model, DEFAULT_MODEL);
        assert_eq!(config.agent.name, "Planner");
        assert_eq!(config.agent.language.as_deref(), Some("Traditional Chinese"));
        assert_eq!(config.agent.user_loop_ceiling, 20);
        assert_eq!(config.agent.fallback_loop_ceiling, 4);
        assert!(config.agent.filter_degenerate_tasks);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.provider.max_tokens, 750);
        assert_eq!(config.agent.task_pacing(), Duration::from_millis(800));
        assert_eq!(config.agent.step_pacing(), Duration::from_secs(1));
        assert!(config.provider.fallback_api_key.is_none());
    }

    #[test]
    fn test_default_template_parses() {
        let config: Config = toml::from_str(DEFAULT_CONFIG_TEMPLATE).unwrap();
        assert_eq!(config.agent.user_loop_ceiling, 50);
        assert!(!config.agent.filter_degenerate_tasks);
    }

    #[test]
    fn test_create_and_load_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);

        Config::create_default(&path).unwrap();
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.provider.base_url, DEFAULT_BASE_URL);

        assert!(Config::create_default(&path).is_err());
    }

    #[test]
    fn test_resolve_empty_key_uses_fallback() {
        let settings = ModelSettings::default();
        let effective = EffectiveSettings::resolve(&settings, &provider_with_fallback()).unwrap();

        assert_eq!(effective.api_key, "sk-shared");
        assert_eq!(effective.credential, CredentialSource::Fallback);
        assert_eq!(effective.model, DEFAULT_MODEL);
        assert_eq!(effective.temperature, DEFAULT_TEMPERATURE);
    }

    #[test]
    fn test_resolve_user_key_passes_through() {
        let settings = ModelSettings {
            api_key: "sk-mine".to_string(),
            model_name: "gpt-4".to_string(),
            temperature: Some(0.2),
        };
        let effective = EffectiveSettings::resolve(&settings, &provider_with_fallback()).unwrap();

        assert_eq!(effective.api_key, "sk-mine");
        assert_eq!(effective.credential, CredentialSource::User);
        assert_eq!(effective.model, "gpt-4");
        assert_eq!(effective.temperature, 0.2);
    }

    #[test]
    fn test_resolve_whitespace_key_is_a_user_key() {
        let settings = ModelSettings {
            api_key: "  ".to_string(),
            model_name: " ".to_string(),
            temperature: None,
        };
        let effective = EffectiveSettings::resolve(&settings, &provider_with_fallback()).unwrap();

        assert_eq!(effective.api_key, "  ");
        assert_eq!(effective.credential, CredentialSource::User);
        assert_eq!(effective.model, " ");
    }

    #[test]
    fn test_resolve_without_any_key_fails() {
        let err = EffectiveSettings::resolve(&ModelSettings::default(), &ProviderConfig::default())
            .unwrap_err();
        assert!(matches!(err, AgentError::MissingCredential));
    }
}
