//! Configuration
//!
//! Loaded from `~/.config/vigil/config.toml`. Every section and field has a
//! default, so a missing or partial file is fine; API keys are never stored
//! here, only the names of the environment variables that hold them.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub agent: AgentConfig,
    pub scanner: ScannerConfig,
    pub backends: BackendsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Retries per model call, on top of the initial attempt.
    pub max_retries: u32,
    pub log_file: PathBuf,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            log_file: PathBuf::from("/tmp/vigil.log"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Reasoning step budget per request.
    pub max_steps: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self { max_steps: 5 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Estimated-token ceiling checked before dispatching a scan.
    pub max_prompt_tokens: usize,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            max_prompt_tokens: 500,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackendsConfig {
    pub primary: BackendConfig,
    pub secondary: BackendConfig,
}

impl Default for BackendsConfig {
    fn default() -> Self {
        Self {
            primary: BackendConfig {
                provider: Provider::Anthropic,
                model: "claude-3-5-sonnet-latest".to_string(),
                base_url: None,
                api_key_env: "ANTHROPIC_API_KEY".to_string(),
                max_tokens: 4096,
            },
            secondary: BackendConfig {
                provider: Provider::Openai,
                model: "gpt-4o".to_string(),
                base_url: None,
                api_key_env: "OPENAI_API_KEY".to_string(),
                max_tokens: 4096,
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    pub provider: Provider,
    pub model: String,
    /// Override for self-hosted or proxied endpoints.
    pub base_url: Option<String>,
    pub api_key_env: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_max_tokens() -> u32 {
    4096
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Anthropic,
    Openai,
}

impl Config {
    /// Load from the given path, or the default location when `None`.
    /// A missing file yields the defaults; a malformed file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::default_path() {
                Some(p) => p,
                None => return Ok(Self::default()),
            },
        };
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("Failed to parse {}", path.display()))
    }

    fn parse(raw: &str) -> Result<Self> {
        toml::from_str(raw).context("Invalid config format")
    }

    fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("vigil").join("config.toml"))
    }
}
