#![deny(missing_docs)]
//! Persistent configuration for murmur.
//!
//! One JSON object at `~/.config/ollama-chat/config.json`. Missing keys
//! take their defaults. Keys murmur does not know (window geometry, theme,
//! system prompt written by other front ends) are kept in
//! [`ChatConfig::extra`] and written back unchanged on save.
//!
//! ```json
//! {
//!   "base_url": "http://localhost:11434",
//!   "selected_model": "llama3.2:1b",
//!   "ollama_context_size": 2048,
//!   "temperature": 0.8,
//!   "top_p": 0.9,
//!   "top_k": 40,
//!   "seed": 0,
//!   "web_search_enabled": true
//! }
//! ```

mod error;

use std::path::{Path, PathBuf};
use std::time::Duration;

use murmur_types::{EngineSettings, InferenceOptions};
use serde::{Deserialize, Serialize};

pub use error::ConfigError;

/// Directory under the home directory holding the config file.
pub const CONFIG_DIR: &str = ".config/ollama-chat";
/// Config file name.
pub const CONFIG_FILE: &str = "config.json";

/// Everything murmur reads from the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Server root, e.g. `http://localhost:11434`.
    pub base_url: String,
    /// Ceiling for a whole chat exchange, in seconds.
    pub request_timeout_secs: u64,
    /// Ceiling for the model list request, in seconds.
    pub catalog_timeout_secs: u64,
    /// Line buffer capacity for streamed replies, in bytes.
    pub line_buffer_capacity: usize,
    /// Model chosen last time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_model: Option<String>,
    /// Context window in tokens.
    #[serde(rename = "ollama_context_size")]
    pub context_size: u32,
    /// Sampling temperature.
    pub temperature: f64,
    /// Nucleus sampling threshold.
    pub top_p: f64,
    /// Top-k sampling limit.
    pub top_k: u32,
    /// RNG seed.
    pub seed: i64,
    /// Inline the first URL of a message before sending.
    pub web_search_enabled: bool,
    /// Keys owned by other front ends, preserved across load and save.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        let options = InferenceOptions::default();
        let settings = EngineSettings::default();
        Self {
            base_url: settings.base_url,
            request_timeout_secs: settings.request_timeout.as_secs(),
            catalog_timeout_secs: settings.catalog_timeout.as_secs(),
            line_buffer_capacity: settings.line_capacity,
            selected_model: None,
            context_size: options.context_size,
            temperature: options.temperature,
            top_p: options.top_p,
            top_k: options.top_k,
            seed: options.seed,
            web_search_enabled: true,
            extra: serde_json::Map::new(),
        }
    }
}

impl ChatConfig {
    /// The `options` object sent with chat requests.
    pub fn inference_options(&self) -> InferenceOptions {
        InferenceOptions {
            temperature: self.temperature,
            top_p: self.top_p,
            top_k: self.top_k,
            seed: self.seed,
            context_size: self.context_size,
        }
    }

    /// Server location and limits.
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            base_url: self.base_url.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            catalog_timeout: Duration::from_secs(self.catalog_timeout_secs),
            line_capacity: self.line_buffer_capacity,
        }
    }
}

/// Reads and writes a [`ChatConfig`] at a fixed path.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    /// Store for the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `~/.config/ollama-chat/config.json`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::NoHome`] if the home directory cannot be determined.
    pub fn default_location() -> Result<Self, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::NoHome)?;
        Ok(Self::new(home.join(CONFIG_DIR).join(CONFIG_FILE)))
    }

    /// The file this store reads and writes.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the config.
    ///
    /// A missing file yields the defaults, which are written out so the
    /// user has something to edit.
    ///
    /// # Errors
    ///
    /// I/O failures, or a file that is not a JSON object of the right shape.
    pub async fn load(&self) -> Result<ChatConfig, ConfigError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => {
                let config = serde_json::from_slice(&bytes).map_err(|source| ConfigError::Parse {
                    path: self.path.clone(),
                    source,
                })?;
                tracing::debug!(path = %self.path.display(), "config loaded");
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = ChatConfig::default();
                tracing::info!(path = %self.path.display(), "no config file, writing defaults");
                self.save(&config).await?;
                Ok(config)
            }
            Err(source) => Err(ConfigError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }

    /// Write `config` as pretty JSON, creating parent directories.
    ///
    /// # Errors
    ///
    /// I/O or serialization failures.
    pub async fn save(&self, config: &ChatConfig) -> Result<(), ConfigError> {
        if let Some(dir) = self.path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|source| ConfigError::Io {
                    path: dir.to_path_buf(),
                    source,
                })?;
        }
        let contents = serde_json::to_string_pretty(config)?;
        tokio::fs::write(&self.path, contents)
            .await
            .map_err(|source| ConfigError::Io {
                path: self.path.clone(),
                source,
            })?;
        tracing::debug!(path = %self.path.display(), "config saved");
        Ok(())
    }
}
