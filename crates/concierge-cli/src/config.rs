//! Configuration file support

use anyhow::Context as _;
use concierge_agent::FailurePolicy;
use concierge_ai::Provider;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Default knowledge base location, relative to the working directory
pub const DEFAULT_KNOWLEDGE_BASE: &str = "faq.json";

/// Default customer store
pub const DEFAULT_DATABASE_URL: &str = "sqlite://customers.db";

/// Configuration for concierge
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Provider id (groq, openai, openrouter, ollama, custom)
    pub provider: Option<String>,
    /// Model id
    pub model: Option<String>,
    /// Endpoint override, required for `custom`
    pub base_url: Option<String>,
    /// Path to the FAQ JSON file
    pub knowledge_base: Option<PathBuf>,
    /// sqlx connection string for the customer directory
    pub database_url: Option<String>,
    /// Per-call deadline for the model, in seconds
    pub timeout_secs: Option<u64>,
    /// Retries on transient model errors
    pub max_retries: Option<u32>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    /// What to record when generation fails
    pub on_generation_error: Option<FailurePolicy>,
    /// Whether to use TUI mode by default
    pub tui: Option<bool>,
    /// TUI color theme (dark, light)
    pub theme: Option<String>,
    /// API keys (environment variables take precedence)
    #[serde(default)]
    pub api_keys: ApiKeys,
}

/// API key configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ApiKeys {
    pub groq: Option<String>,
    pub openai: Option<String>,
    pub openrouter: Option<String>,
}

/// Where a resolved API key came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    Env,
    ConfigFile,
}

/// A resolved API key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiKey {
    pub value: String,
    pub source: KeySource,
}

impl Config {
    /// Get the config directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("concierge")
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("CONCIERGE_CONFIG_PATH") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }

    /// Load config from the default location
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load config from `path`. A missing file yields the defaults; a file
    /// that cannot be read or parsed is an error.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        if let Some(theme) = &config.theme {
            if concierge_tui::Theme::by_name(theme).is_none() {
                anyhow::bail!("unknown theme '{}' (expected dark or light)", theme);
            }
        }
        Ok(config)
    }

    /// Write the commented example config if no file exists yet
    pub fn init() -> std::io::Result<PathBuf> {
        Self::init_at(&Self::config_path())
    }

    pub fn init_at(path: &Path) -> std::io::Result<PathBuf> {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(path, example_config())?;
        Ok(path.to_path_buf())
    }

    fn file_api_key(&self, provider: Provider) -> Option<String> {
        match provider {
            Provider::Groq => self.api_keys.groq.clone(),
            Provider::OpenAI => self.api_keys.openai.clone(),
            Provider::OpenRouter => self.api_keys.openrouter.clone(),
            Provider::Ollama | Provider::Custom => None,
        }
    }

    /// Get the API key for a provider, checking env then config
    pub fn api_key(&self, provider: Provider) -> Option<ApiKey> {
        let from_env = provider
            .api_key_env_var()
            .and_then(|var| std::env::var(var).ok());
        pick_api_key(from_env, self.file_api_key(provider))
    }
}

fn pick_api_key(from_env: Option<String>, from_file: Option<String>) -> Option<ApiKey> {
    let non_empty = |key: Option<String>| key.filter(|k| !k.trim().is_empty());

    if let Some(value) = non_empty(from_env) {
        return Some(ApiKey {
            value,
            source: KeySource::Env,
        });
    }
    non_empty(from_file).map(|value| ApiKey {
        value,
        source: KeySource::ConfigFile,
    })
}

/// Example config file content
pub fn example_config() -> &'static str {
    r#"# concierge configuration
# Location: ~/.config/concierge/config.toml (override with CONCIERGE_CONFIG_PATH)

# Provider: groq, openai, openrouter, ollama, custom
provider = "groq"

# Model id
model = "gemma2-9b-it"

# Endpoint override (required for provider = "custom")
# base_url = "http://localhost:8080/v1"

# FAQ file: a JSON array of { "question": ..., "answer": ... } objects
knowledge_base = "faq.json"

# Customer directory (sqlx connection string); sqlite::memory: keeps nothing
database_url = "sqlite://customers.db"

# Seconds to wait for a reply before giving up
timeout_secs = 60

# Retries on rate limits and server errors
max_retries = 0

# temperature = 0.3
# max_tokens = 1024

# When the model fails: append_error_turn or leave_dangling
on_generation_error = "append_error_turn"

# Use TUI mode by default
tui = true

# TUI color theme: dark or light
theme = "dark"

# API keys: prefer environment variables (GROQ_API_KEY, OPENAI_API_KEY,
# OPENROUTER_API_KEY). Keys here are accepted with a warning.
[api_keys]
# groq = ""
# openai = ""
# openrouter = ""
"#
}
