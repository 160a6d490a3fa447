//! Configuration management for Redacta
//!
//! Defaults, overlaid by a JSON config file, overlaid by environment variables.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::backend::gemini::DEFAULT_BASE_URL;
use crate::error::{RedactaError, Result};
use crate::options::GenerationOptions;
use crate::pipeline::{HumanizePolicy, PipelineSettings};

const CONFIG_FILE: &str = "config.json";

/// Checked in order, first non-empty value wins
const API_KEY_VARS: [&str; 3] = ["REDACTA_API_KEY", "GEMINI_API_KEY", "API_KEY"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub api_key: Option<String>,
  #[serde(default = "default_base_url")]
  pub base_url: String,
  /// Per-request timeout; for streams, the longest allowed gap between chunks
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
  #[serde(default = "default_data_dir")]
  pub data_dir: PathBuf,
  #[serde(default)]
  pub humanize_policy: HumanizePolicy,
  #[serde(default = "default_critic_report")]
  pub critic_report: bool,
  #[serde(default)]
  pub defaults: GenerationOptions,
}

fn default_base_url() -> String {
  DEFAULT_BASE_URL.to_string()
}
fn default_timeout_secs() -> u64 {
  300
}
fn default_critic_report() -> bool {
  true
}

/// `~/.redacta`, or `REDACTA_HOME` when set
pub fn default_data_dir() -> PathBuf {
  if let Ok(custom_root) = std::env::var("REDACTA_HOME") {
    return PathBuf::from(custom_root);
  }

  dirs::home_dir().map(|home| home.join(".redacta")).unwrap_or_else(|| PathBuf::from(".redacta"))
}

impl Default for Config {
  fn default() -> Self {
    Self {
      api_key: None,
      base_url: default_base_url(),
      timeout_secs: default_timeout_secs(),
      data_dir: default_data_dir(),
      humanize_policy: HumanizePolicy::default(),
      critic_report: default_critic_report(),
      defaults: GenerationOptions::default(),
    }
  }
}

impl Config {
  /// Load configuration from a file
  pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = serde_json::from_str(&content)?;
    Ok(config)
  }

  /// Load from `explicit` (which must exist) or `<data_dir>/config.json` when
  /// present, then apply environment overrides
  pub fn load(explicit: Option<&Path>) -> Result<Self> {
    let mut config = match explicit {
      Some(path) if !path.exists() => {
        return Err(RedactaError::not_found("Config file", path.display().to_string()))
      }
      Some(path) => Self::load_from_file(path)?,
      None => {
        let path = default_data_dir().join(CONFIG_FILE);
        if path.exists() {
          Self::load_from_file(&path)?
        } else {
          Self::default()
        }
      }
    };

    config.apply_env();
    Ok(config)
  }

  fn apply_env(&mut self) {
    if let Some(key) = API_KEY_VARS
      .iter()
      .filter_map(|var| std::env::var(var).ok())
      .find(|value| !value.trim().is_empty())
    {
      self.api_key = Some(key);
    }

    if let Ok(url) = std::env::var("REDACTA_BASE_URL") {
      self.base_url = url;
    }

    if let Ok(home) = std::env::var("REDACTA_HOME") {
      self.data_dir = PathBuf::from(home);
    }

    if let Some(secs) =
      std::env::var("REDACTA_TIMEOUT_SECS").ok().and_then(|value| value.parse::<u64>().ok())
    {
      self.timeout_secs = secs;
    }
  }

  /// Save configuration to a file, without the API key
  pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)?;
    }
    let sanitized = Self { api_key: None, ..self.clone() };
    std::fs::write(path, serde_json::to_string_pretty(&sanitized)?)?;
    Ok(())
  }

  pub fn history_dir(&self) -> PathBuf {
    self.data_dir.join("history")
  }

  pub fn style_path(&self) -> PathBuf {
    self.data_dir.join("style.md")
  }

  pub fn pipeline_settings(&self) -> PipelineSettings {
    PipelineSettings { humanize_policy: self.humanize_policy, critic_report: self.critic_report }
  }
}
