//! Generation options
//!
//! The configuration snapshot handed to every pipeline run. Options are plain
//! values: a run clones what it needs, and history keeps its own copy.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Tone {
  Academic,
  Professional,
  Persuasive,
  Critical,
}

impl Tone {
  pub fn label(&self) -> &'static str {
    match self {
      Tone::Academic => "Academic (university level)",
      Tone::Professional => "Professional",
      Tone::Persuasive => "Persuasive / argumentative",
      Tone::Critical => "Critical / analytical",
    }
  }
}

/// Target length class. The two longest tiers are generated section by section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum LengthTier {
  Short,
  Medium,
  Long,
  Thesis,
}

/// Token ceilings sent with every drafting request for a tier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelBudget {
  pub thinking_budget: u32,
  pub max_output_tokens: u32,
}

impl LengthTier {
  pub fn label(&self) -> &'static str {
    match self {
      LengthTier::Short => "Short (~500 words)",
      LengthTier::Medium => "Standard (~1500 words)",
      LengthTier::Long => "Extended (~3000 words)",
      LengthTier::Thesis => "Final paper (~5000+ words)",
    }
  }

  pub fn budget(&self) -> ModelBudget {
    let (thinking_budget, max_output_tokens) = match self {
      LengthTier::Short => (1024, 8192),
      LengthTier::Medium => (2048, 16384),
      LengthTier::Long => (8192, 32768),
      LengthTier::Thesis => (16384, 64000),
    };
    ModelBudget { thinking_budget, max_output_tokens }
  }

  /// Long and thesis output is planned as an outline and drafted per section
  pub fn is_modular(&self) -> bool {
    matches!(self, LengthTier::Long | LengthTier::Thesis)
  }

  /// Inclusive range of sections the outline should aim for
  pub fn section_range(&self) -> Option<(usize, usize)> {
    match self {
      LengthTier::Long => Some((5, 7)),
      LengthTier::Thesis => Some((8, 15)),
      _ => None,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Format {
  Essay,
  Report,
  LiteratureReview,
  CriticalAnalysis,
}

impl Format {
  pub fn label(&self) -> &'static str {
    match self {
      Format::Essay => "Academic essay",
      Format::Report => "Research report",
      Format::LiteratureReview => "Literature review",
      Format::CriticalAnalysis => "Critical analysis",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Structure {
  Standard,
  ThesisDriven,
  Comparative,
}

impl Structure {
  pub fn label(&self) -> &'static str {
    match self {
      Structure::Standard => "Standard (introduction, development, conclusion)",
      Structure::ThesisDriven => "Dynamic (driven by the thesis)",
      Structure::Comparative => "Comparative (block by block)",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum ModelId {
  #[serde(rename = "gemini-3-flash-preview")]
  #[value(name = "gemini-3-flash-preview")]
  Gemini3Flash,
  #[serde(rename = "gemini-3-pro-preview")]
  #[value(name = "gemini-3-pro-preview")]
  Gemini3Pro,
  #[serde(rename = "gemini-2.0-flash")]
  #[value(name = "gemini-2.0-flash")]
  Gemini2Flash,
}

impl ModelId {
  pub fn as_str(&self) -> &'static str {
    match self {
      ModelId::Gemini3Flash => "gemini-3-flash-preview",
      ModelId::Gemini3Pro => "gemini-3-pro-preview",
      ModelId::Gemini2Flash => "gemini-2.0-flash",
    }
  }
}

impl std::fmt::Display for ModelId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationOptions {
  pub model: ModelId,
  pub tone: Tone,
  pub length: LengthTier,
  pub format: Format,
  pub structure: Structure,
  /// Weave explicit cross-references between sources into the text
  #[serde(default)]
  pub cross_references: bool,
  #[serde(default)]
  pub critic_mode: bool,
  /// Style-mimicry pass over the draft
  #[serde(default)]
  pub humanize: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub style_guide: Option<String>,
  #[serde(default = "default_language")]
  pub language: String,
}

fn default_language() -> String {
  "English".to_string()
}

impl Default for GenerationOptions {
  fn default() -> Self {
    Self {
      model: ModelId::Gemini3Pro,
      tone: Tone::Professional,
      length: LengthTier::Medium,
      format: Format::Essay,
      structure: Structure::Standard,
      cross_references: false,
      critic_mode: false,
      humanize: false,
      style_guide: None,
      language: default_language(),
    }
  }
}

impl GenerationOptions {
  /// The user's style guide, ignoring blank text
  pub fn style_guide(&self) -> Option<&str> {
    self.style_guide.as_deref().map(str::trim).filter(|s| !s.is_empty())
  }
}
