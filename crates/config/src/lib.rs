//! Session configuration for neoneo.
//!
//! Loaded once at startup, overridden by command-line flags, then treated as
//! an immutable snapshot for the rest of the session.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

pub mod paths;

pub use paths::{config_dir, config_path};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no home directory; pass --config explicitly")]
    NoHomeDir,
}

pub type Result<T> = std::result::Result<T, ConfigError>;

pub const DEFAULT_MODEL: &str = "llama3";
pub const DEFAULT_HOST: &str = "http://localhost:11434";

pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You are a helpful assistant with access to tools. When working on a problem:

1. Plan first: decide which tools you need and in what order before calling any.
2. Use several tools when a task needs them, one step at a time.
3. Explain what you are doing and why a tool is being used.
4. Give context: tell the user what each tool result means.
5. Summarize your findings once the tools have run.

Only call tools that are listed as available. Never assume a tool call succeeded; \
read its result and report errors honestly.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    /// Stream responses; `false` asks the server for one document per turn.
    #[serde(default = "default_true")]
    pub stream: bool,
    #[serde(default)]
    pub debug_mode: bool,

    #[serde(default)]
    pub enable_tools: bool,
    #[serde(default)]
    pub enable_shell: bool,
    #[serde(default)]
    pub enable_model_list: bool,
    #[serde(default)]
    pub enable_file_ops: bool,

    #[serde(default)]
    pub auto_confirm_shell: bool,
    #[serde(default)]
    pub auto_confirm_file_ops: bool,
    #[serde(default = "default_true")]
    pub auto_confirm_calc: bool,

    #[serde(default)]
    pub ignore_calc_safety: bool,
    #[serde(default)]
    pub ignore_shell_safety: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: default_model(),
            host: default_host(),
            system_prompt: default_system_prompt(),
            stream: true,
            debug_mode: false,
            enable_tools: false,
            enable_shell: false,
            enable_model_list: false,
            enable_file_ops: false,
            auto_confirm_shell: false,
            auto_confirm_file_ops: false,
            auto_confirm_calc: true,
            ignore_calc_safety: false,
            ignore_shell_safety: false,
        }
    }
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load from the default location
    pub async fn load() -> Result<Self> {
        let path = config_path().ok_or(ConfigError::NoHomeDir)?;
        Self::load_from(&path).await
    }

    /// Load from a specific file; a missing file yields the defaults.
    pub async fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("no config at {:?}, using defaults", path);
            return Ok(Config::default());
        }

        debug!("loading config from {:?}", path);
        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save to the default location
    pub async fn save(&self) -> Result<PathBuf> {
        let path = config_path().ok_or(ConfigError::NoHomeDir)?;
        self.save_to(&path).await?;
        Ok(path)
    }

    pub async fn save_to(&self, path: &Path) -> Result<()> {
        debug!("saving config to {:?}", path);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    /// Any tool family switched on.
    pub fn tools_enabled(&self) -> bool {
        self.enable_tools || self.enable_shell || self.enable_model_list || self.enable_file_ops
    }
}
