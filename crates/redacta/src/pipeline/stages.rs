//! Individual pipeline stages
//!
//! Angle proposal and outlining are preparatory: their failures are logged and
//! replaced with a fallback, so they never return an error. The writing stages
//! propagate every failure.

use regex::Regex;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::{OutputSink, Pipeline, DRAFT_TEMPERATURE, HUMANIZE_TEMPERATURE};
use crate::backend::{GenerationConfig, GenerationRequest};
use crate::error::Result;
use crate::options::GenerationOptions;
use crate::prompts::{self, CritiqueMode, SectionContext, BANNED_PHRASES};
use crate::source::Source;
use crate::thesis::Thesis;

pub const FALLBACK_OUTLINE: [&str; 3] = ["Introduction", "Body", "Conclusion"];

const ANGLE_COUNT: usize = 3;

impl Pipeline {
  /// Up to three strategic angles; empty when anything goes wrong
  pub async fn propose_angles(
    &self,
    sources: &[Source],
    instruction: &str,
    options: &GenerationOptions,
  ) -> Vec<Thesis> {
    let request = GenerationRequest {
      model: options.model,
      content: prompts::assemble(sources, prompts::angles_prompt(sources, instruction)),
      config: GenerationConfig::with_temperature(DRAFT_TEMPERATURE).json(prompts::angles_schema()),
    };

    let raw = match self.backend.generate(&request).await {
      Ok(raw) => raw,
      Err(e) => {
        warn!("angle proposal failed, continuing without a thesis: {e}");
        return Vec::new();
      }
    };

    match parse_json::<Vec<Thesis>>(&raw) {
      Ok(mut angles) => {
        angles.truncate(ANGLE_COUNT);
        debug!(count = angles.len(), "angles proposed");
        angles
      }
      Err(e) => {
        warn!("angle proposal returned unusable data: {e}");
        Vec::new()
      }
    }
  }

  /// Section titles for the two longest tiers, or the three-part fallback
  pub async fn build_outline(
    &self,
    sources: &[Source],
    instruction: &str,
    thesis: Option<&Thesis>,
    options: &GenerationOptions,
  ) -> Vec<String> {
    let range = options.length.section_range().unwrap_or((3, 5));
    let prompt = prompts::outline_prompt(sources, instruction, thesis, options, range);
    let request = GenerationRequest {
      model: options.model,
      content: prompts::assemble(sources, prompt),
      config: GenerationConfig::with_temperature(DRAFT_TEMPERATURE)
        .json(prompts::outline_schema()),
    };

    let outline = match self.backend.generate(&request).await {
      Ok(raw) => parse_json::<Vec<String>>(&raw)
        .map(|titles| {
          titles
            .into_iter()
            .map(|title| title.trim().to_string())
            .filter(|title| !title.is_empty())
            .collect::<Vec<_>>()
        })
        .unwrap_or_else(|e| {
          warn!("outline was not a list of titles: {e}");
          Vec::new()
        }),
      Err(e) => {
        warn!("outline request failed: {e}");
        Vec::new()
      }
    };

    if outline.is_empty() {
      debug!("using fallback outline");
      return FALLBACK_OUTLINE.iter().map(|title| title.to_string()).collect();
    }
    outline
  }

  pub async fn draft_section(
    &self,
    ctx: &SectionContext<'_>,
    sink: Option<&mut dyn OutputSink>,
  ) -> Result<String> {
    let request = GenerationRequest {
      model: ctx.options.model,
      content: prompts::assemble(ctx.sources, prompts::section_prompt(ctx)),
      config: GenerationConfig::with_budget(DRAFT_TEMPERATURE, ctx.options.length.budget()),
    };
    self.call(&request, sink).await
  }

  pub async fn critique(
    &self,
    draft: &str,
    options: &GenerationOptions,
    mode: CritiqueMode,
    sink: Option<&mut dyn OutputSink>,
  ) -> Result<String> {
    let request = GenerationRequest {
      model: options.model,
      content: crate::backend::PromptContent::Text(prompts::critique_prompt(draft, options, mode)),
      config: GenerationConfig::with_budget(DRAFT_TEMPERATURE, options.length.budget()),
    };
    self.call(&request, sink).await
  }

  pub async fn humanize(
    &self,
    text: &str,
    options: &GenerationOptions,
    sink: Option<&mut dyn OutputSink>,
  ) -> Result<String> {
    let request = GenerationRequest {
      model: options.model,
      content: crate::backend::PromptContent::Text(prompts::humanize_prompt(text, options)),
      config: GenerationConfig::with_budget(HUMANIZE_TEMPERATURE, options.length.budget()),
    };
    let rewritten = self.call(&request, sink).await?;

    let leftovers = leftover_banned_phrases(&rewritten);
    if !leftovers.is_empty() {
      warn!(phrases = ?leftovers, "humanized text still contains banned phrases");
    }
    Ok(rewritten)
  }
}

/// The last `max_chars` characters of `text`
pub fn continuity_tail(text: &str, max_chars: usize) -> &str {
  if max_chars == 0 {
    return "";
  }
  match text.char_indices().rev().nth(max_chars - 1) {
    Some((start, _)) => &text[start..],
    None => text,
  }
}

/// Denylisted phrases that appear in `text`, matched case-insensitively on
/// word boundaries
pub fn leftover_banned_phrases(text: &str) -> Vec<&'static str> {
  BANNED_PHRASES
    .iter()
    .copied()
    .filter(|phrase| {
      let pattern = format!(r"(?i)\b{}\b", regex::escape(phrase));
      Regex::new(&pattern).map(|re| re.is_match(text)).unwrap_or(false)
    })
    .collect()
}

/// Parse JSON output, tolerating a surrounding Markdown code fence
fn parse_json<T: DeserializeOwned>(raw: &str) -> Result<T> {
  Ok(serde_json::from_str(strip_code_fence(raw))?)
}

fn strip_code_fence(raw: &str) -> &str {
  let trimmed = raw.trim();
  let Some(rest) = trimmed.strip_prefix("```") else {
    return trimmed;
  };
  let rest = rest.strip_prefix("json").unwrap_or(rest);
  rest.strip_suffix("```").unwrap_or(rest).trim()
}
