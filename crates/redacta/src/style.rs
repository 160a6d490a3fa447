//! Personal style guides
//!
//! A style guide is derived from the user's own writing samples and fed to the
//! humanize stage. The current guide lives in a single Markdown file.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::backend::{GenerationConfig, GenerationRequest, PromptContent, TextBackend};
use crate::error::{RedactaError, Result};
use crate::options::ModelId;
use crate::prompts;

/// Samples shorter than this rarely show a usable style
pub const MIN_SAMPLE_CHARS: usize = 100;

const STYLE_TEMPERATURE: f32 = 0.4;

/// Describe the writing style shared by `samples`
pub async fn extract_style_guide(
  backend: &dyn TextBackend,
  model: ModelId,
  samples: &[String],
) -> Result<String> {
  let samples: Vec<String> =
    samples.iter().filter(|s| !s.trim().is_empty()).cloned().collect();
  if samples.is_empty() {
    return Err(RedactaError::validation("Provide at least one writing sample"));
  }

  for (i, sample) in samples.iter().enumerate() {
    let chars = sample.trim().chars().count();
    if chars < MIN_SAMPLE_CHARS {
      warn!(sample = i + 1, chars, "writing sample is very short, the guide may be vague");
    }
  }

  debug!(samples = samples.len(), "extracting style guide");
  let request = GenerationRequest {
    model,
    content: PromptContent::Text(prompts::style_guide_prompt(&samples)),
    config: GenerationConfig::with_temperature(STYLE_TEMPERATURE),
  };
  let guide = backend.generate(&request).await?;
  Ok(guide.trim().to_string())
}

/// The saved style guide file
#[derive(Debug, Clone)]
pub struct StyleVault {
  path: PathBuf,
}

impl StyleVault {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn save(&self, guide: &str) -> Result<()> {
    if let Some(parent) = self.path.parent() {
      fs::create_dir_all(parent)?;
    }
    fs::write(&self.path, guide)?;
    Ok(())
  }

  /// The saved guide, or `None` when there is none yet
  pub fn load(&self) -> Result<Option<String>> {
    if !self.path.exists() {
      return Ok(None);
    }
    let guide = fs::read_to_string(&self.path)?;
    Ok(Some(guide).filter(|g| !g.trim().is_empty()))
  }
}
