use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the per-workspace hidden directory
pub const WORKSPACE_DIR: &str = ".cmdseek";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Gates whether summarisation runs at all
    #[serde(default = "default_summarise_enabled")]
    pub summarise_enabled: bool,

    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,

    /// Chat model used to summarise commands
    #[serde(default = "default_summary_model")]
    pub summary_model: String,

    /// The model server may still be starting; selection retries this many times.
    #[serde(default = "default_model_select_attempts")]
    pub model_select_attempts: u32,

    #[serde(default = "default_model_select_delay_ms")]
    pub model_select_delay_ms: u64,

    /// Script content beyond this many characters is cut before prompting
    #[serde(default = "default_max_content_chars")]
    pub max_content_chars: usize,

    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: usize,

    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Minimum cosine similarity for a search hit
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

fn default_summarise_enabled() -> bool {
    true
}
fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_summary_model() -> String {
    "llama3.2".to_string()
}
fn default_model_select_attempts() -> u32 {
    10
}
fn default_model_select_delay_ms() -> u64 {
    2000
}
fn default_max_content_chars() -> usize {
    4000
}
fn default_max_consecutive_failures() -> usize {
    3
}
fn default_top_k() -> usize {
    20
}
fn default_threshold() -> f64 {
    0.3
}

impl Default for Config {
    fn default() -> Self {
        Self {
            summarise_enabled: default_summarise_enabled(),
            ollama_url: default_ollama_url(),
            summary_model: default_summary_model(),
            model_select_attempts: default_model_select_attempts(),
            model_select_delay_ms: default_model_select_delay_ms(),
            max_content_chars: default_max_content_chars(),
            max_consecutive_failures: default_max_consecutive_failures(),
            top_k: default_top_k(),
            threshold: default_threshold(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = config_path();
        if path.exists() {
            let content = std::fs::read_to_string(&path).context("Failed to read config file")?;
            let config: Config = toml::from_str(&content).context("Failed to parse config")?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = config_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&path, content).context("Failed to write config file")?;
        Ok(())
    }

    pub fn model_select_delay(&self) -> Duration {
        Duration::from_millis(self.model_select_delay_ms)
    }
}

/// User-level directory holding config and the model cache
pub fn cmdseek_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(WORKSPACE_DIR)
}

pub fn config_path() -> PathBuf {
    cmdseek_dir().join("config.toml")
}

pub fn models_dir() -> PathBuf {
    cmdseek_dir().join("models")
}

/// Database file for a workspace
pub fn db_path(root: &Path) -> PathBuf {
    root.join(WORKSPACE_DIR).join("commands.db")
}

/// Flat JSON file written by older versions
pub fn legacy_path(root: &Path) -> PathBuf {
    root.join(WORKSPACE_DIR).join("summaries.json")
}
