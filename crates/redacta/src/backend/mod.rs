//! Text-generation backend abstraction
//!
//! The pipeline only ever talks to [`TextBackend`]. A request carries either a
//! single text prompt or a list of typed parts (text plus inline binary
//! attachments), and a small generation config.

use async_trait::async_trait;

use crate::error::Result;
use crate::options::{ModelBudget, ModelId};

pub mod gemini;

pub use gemini::GeminiBackend;

/// One piece of a multi-part prompt
#[derive(Debug, Clone, PartialEq)]
pub enum Part {
  Text(String),
  /// Binary attachment, `data` is base64
  InlineData { mime_type: String, data: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum PromptContent {
  Text(String),
  Parts(Vec<Part>),
}

impl PromptContent {
  /// All text carried by the prompt, attachments left out
  pub fn text(&self) -> String {
    match self {
      PromptContent::Text(text) => text.clone(),
      PromptContent::Parts(parts) => parts
        .iter()
        .filter_map(|part| match part {
          Part::Text(text) => Some(text.as_str()),
          Part::InlineData { .. } => None,
        })
        .collect::<Vec<_>>()
        .join("\n"),
    }
  }

  pub fn attachment_count(&self) -> usize {
    match self {
      PromptContent::Text(_) => 0,
      PromptContent::Parts(parts) => {
        parts.iter().filter(|p| matches!(p, Part::InlineData { .. })).count()
      }
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationConfig {
  pub max_output_tokens: Option<u32>,
  pub thinking_budget: Option<u32>,
  pub temperature: f32,
  /// When set, the backend must answer with JSON matching this schema
  pub response_schema: Option<serde_json::Value>,
}

impl GenerationConfig {
  pub fn with_temperature(temperature: f32) -> Self {
    Self { max_output_tokens: None, thinking_budget: None, temperature, response_schema: None }
  }

  pub fn with_budget(temperature: f32, budget: ModelBudget) -> Self {
    Self {
      max_output_tokens: Some(budget.max_output_tokens),
      thinking_budget: Some(budget.thinking_budget),
      temperature,
      response_schema: None,
    }
  }

  pub fn json(mut self, schema: serde_json::Value) -> Self {
    self.response_schema = Some(schema);
    self
  }

  pub fn thinking(mut self, budget: u32) -> Self {
    self.thinking_budget = Some(budget);
    self
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
  pub model: ModelId,
  pub content: PromptContent,
  pub config: GenerationConfig,
}

/// A text-completion service
#[async_trait]
pub trait TextBackend: Send + Sync {
  /// Submit a request and wait for the whole answer
  async fn generate(&self, request: &GenerationRequest) -> Result<String>;

  /// Submit a request, handing each text fragment to `on_fragment` in order.
  /// Returns the concatenated text.
  async fn stream(
    &self,
    request: &GenerationRequest,
    on_fragment: &mut (dyn for<'a> FnMut(&'a str) + Send),
  ) -> Result<String>;
}
