use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Config file name inside the local state directory.
pub(crate) const CONFIG_FILE: &str = "sandbox.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub sandbox: SandboxConfig,
    #[serde(default)]
    pub state: StateConfig,
}

/// Agent identity
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Agent name, also used as the sandbox name
    /// - Empty: "automaton"
    #[serde(default)]
    pub name: String,
}

/// Which control plane hosts the sandbox
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Backend {
    #[default]
    Conway,
    Docker,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// Control plane backend: "conway" or "docker"
    #[serde(default)]
    pub backend: Backend,

    /// Conway API base URL
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Container image for the docker backend
    #[serde(default = "default_image")]
    pub image: String,

    /// HTTP request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            api_url: default_api_url(),
            image: default_image(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    /// Local state directory that gets synced
    #[serde(default = "default_local_dir")]
    pub local_dir: String,

    /// State repository inside the sandbox
    /// - Unset: `$HOME/.automaton`
    #[serde(default)]
    pub repo_dir: Option<String>,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            local_dir: default_local_dir(),
            repo_dir: None,
        }
    }
}

// Default value functions
fn default_api_url() -> String {
    "https://api.conway.tech".to_string()
}

fn default_image() -> String {
    "ubuntu:24.04".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_local_dir() -> String {
    "~/.automaton".to_string()
}

impl Config {
    /// Load configuration from file, using defaults if not found
    pub fn load(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        Ok(config)
    }

    /// Default config location: `~/.automaton/sandbox.toml`
    pub fn default_path() -> Result<PathBuf> {
        Ok(expand_path(&default_local_dir())?.join(CONFIG_FILE))
    }

    /// Local state directory with `~` expanded
    pub fn local_state_dir(&self) -> Result<PathBuf> {
        expand_path(&self.state.local_dir)
    }
}

/// Expand ~ to home directory
pub(crate) fn expand_path(path: &str) -> Result<PathBuf> {
    if path == "~" {
        return dirs::home_dir().context("Could not determine home directory");
    }
    if let Some(rest) = path.strip_prefix("~/") {
        let home = dirs::home_dir().context("Could not determine home directory")?;
        Ok(home.join(rest))
    } else {
        Ok(PathBuf::from(path))
    }
}
