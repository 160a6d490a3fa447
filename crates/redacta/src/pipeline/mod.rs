//! The generation pipeline
//!
//! A run turns `(sources, instruction, options)` into Markdown. Short and
//! medium texts are drafted in one pass, optionally followed by a critic
//! rewrite and a humanizing rewrite; each rewrite clears the sink and streams
//! its replacement. Long texts are planned as an outline and drafted section by
//! section, each section seeing the tail of what came before.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::backend::{GenerationConfig, GenerationRequest, PromptContent, TextBackend};
use crate::error::{RedactaError, Result};
use crate::history::{HistoryRecord, HistoryStore};
use crate::options::GenerationOptions;
use crate::prompts::{self, CritiqueMode, SectionContext};
use crate::source::Source;
use crate::thesis::{AngleChoice, Thesis};

mod sink;
mod stages;

pub use sink::{BufferSink, OutputSink, Stage};
#[cfg(test)]
pub use sink::MockOutputSink;
pub use stages::{continuity_tail, leftover_banned_phrases, FALLBACK_OUTLINE};

pub const DRAFT_TEMPERATURE: f32 = 0.7;
pub const HUMANIZE_TEMPERATURE: f32 = 1.0;
pub const OPTIMIZE_TEMPERATURE: f32 = 0.8;
pub const OPTIMIZE_THINKING_BUDGET: u32 = 2048;

/// Characters of earlier text handed to each new section
pub const CONTINUITY_CHARS: usize = 2000;

const OUTLINE_NOTICE: &str = "_Planning the outline..._\n";
const SECTION_SEPARATOR: &str = "\n\n";
const REPORT_SEPARATOR: &str = "\n\n---\n\n";

/// When the humanize stage runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HumanizePolicy {
  /// Only when the options ask for it
  #[default]
  OnRequest,
  /// Always, for every length tier above the shortest
  AboveShortest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
  pub humanize_policy: HumanizePolicy,
  /// Append an evaluative report to a single-pass critic rewrite
  pub critic_report: bool,
}

impl Default for PipelineSettings {
  fn default() -> Self {
    Self { humanize_policy: HumanizePolicy::default(), critic_report: true }
  }
}

pub struct Pipeline {
  backend: Arc<dyn TextBackend>,
  settings: PipelineSettings,
}

impl Pipeline {
  pub fn new(backend: Arc<dyn TextBackend>, settings: PipelineSettings) -> Self {
    Self { backend, settings }
  }

  pub fn settings(&self) -> PipelineSettings {
    self.settings
  }

  pub fn humanize_active(&self, options: &GenerationOptions) -> bool {
    match self.settings.humanize_policy {
      HumanizePolicy::OnRequest => options.humanize,
      HumanizePolicy::AboveShortest => {
        options.humanize || options.length > crate::options::LengthTier::Short
      }
    }
  }

  /// Propose angles and hand back the pending choice
  pub async fn propose(
    &self,
    sources: &[Source],
    instruction: &str,
    options: &GenerationOptions,
  ) -> AngleChoice {
    AngleChoice::new(self.propose_angles(sources, instruction, options).await)
  }

  /// Produce the finished text, streaming it into `sink`.
  ///
  /// The returned text is exactly what `sink` holds when the run ends.
  pub async fn run(
    &self,
    sources: &[Source],
    instruction: &str,
    options: &GenerationOptions,
    thesis: Option<&Thesis>,
    sink: &mut dyn OutputSink,
  ) -> Result<String> {
    validate_input(sources, instruction)?;

    let text = if options.length.is_modular() {
      debug!(tier = ?options.length, "running modular pipeline");
      self.run_modular(sources, instruction, options, thesis, sink).await?
    } else {
      debug!(tier = ?options.length, "running single-pass pipeline");
      self.run_single_pass(sources, instruction, options, thesis, sink).await?
    };

    sink.stage(Stage::Done);
    Ok(text)
  }

  /// Run, then store the result in `store` with the options it ran under.
  /// A failed run stores nothing.
  pub async fn run_and_record(
    &self,
    store: &HistoryStore,
    sources: &[Source],
    instruction: &str,
    options: &GenerationOptions,
    thesis: Option<&Thesis>,
    sink: &mut dyn OutputSink,
  ) -> Result<HistoryRecord> {
    let snapshot = options.clone();
    let text = self.run(sources, instruction, &snapshot, thesis, sink).await?;

    let record = HistoryRecord::new(instruction, text, snapshot);
    store.append(&record)?;
    Ok(record)
  }

  /// Write a master prompt for the task instead of performing it
  pub async fn optimize_prompt(
    &self,
    sources: &[Source],
    instruction: &str,
    options: &GenerationOptions,
  ) -> Result<String> {
    validate_input(sources, instruction)?;

    let request = GenerationRequest {
      model: options.model,
      content: PromptContent::Text(prompts::optimize_prompt(sources, instruction, options)),
      config: GenerationConfig::with_temperature(OPTIMIZE_TEMPERATURE)
        .thinking(OPTIMIZE_THINKING_BUDGET),
    };
    self.backend.generate(&request).await
  }

  async fn run_single_pass(
    &self,
    sources: &[Source],
    instruction: &str,
    options: &GenerationOptions,
    thesis: Option<&Thesis>,
    sink: &mut dyn OutputSink,
  ) -> Result<String> {
    sink.stage(Stage::Drafting);
    let prompt = prompts::draft_prompt(sources, instruction, options, thesis);
    let request = GenerationRequest {
      model: options.model,
      content: prompts::assemble(sources, prompt),
      config: GenerationConfig::with_budget(DRAFT_TEMPERATURE, options.length.budget()),
    };
    let mut text = self.call(&request, Some(&mut *sink)).await?;

    if options.critic_mode {
      sink.stage(Stage::Critiquing);
      sink.clear();
      let mode = CritiqueMode::Rewrite { with_report: self.settings.critic_report };
      text = self.critique(&text, options, mode, Some(&mut *sink)).await?;
    }

    if self.humanize_active(options) {
      sink.stage(Stage::Humanizing);
      sink.clear();
      text = self.humanize(&text, options, Some(&mut *sink)).await?;
    }

    Ok(text)
  }

  async fn run_modular(
    &self,
    sources: &[Source],
    instruction: &str,
    options: &GenerationOptions,
    thesis: Option<&Thesis>,
    sink: &mut dyn OutputSink,
  ) -> Result<String> {
    sink.stage(Stage::Drafting);
    sink.append(OUTLINE_NOTICE);
    let outline = self.build_outline(sources, instruction, thesis, options).await;
    sink.clear();

    let humanize = self.humanize_active(options);
    let mut document = String::new();

    for (index, title) in outline.iter().enumerate() {
      if index > 0 {
        sink.append(SECTION_SEPARATOR);
        document.push_str(SECTION_SEPARATOR);
      }

      let previous = continuity_tail(document.trim_end(), CONTINUITY_CHARS).to_string();
      let ctx = SectionContext {
        title,
        index,
        outline: &outline,
        thesis,
        previous: &previous,
        sources,
        instruction,
        options,
      };

      sink.stage(Stage::Drafting);
      let section = if humanize {
        let draft = self.draft_section(&ctx, None).await?;
        sink.stage(Stage::Humanizing);
        self.humanize(&draft, options, Some(&mut *sink)).await?
      } else {
        self.draft_section(&ctx, Some(&mut *sink)).await?
      };

      debug!(section = index + 1, total = outline.len(), title = %title, "section complete");
      document.push_str(&section);
    }

    if options.critic_mode {
      sink.stage(Stage::Critiquing);
      sink.append(REPORT_SEPARATOR);
      let report =
        self.critique(&document, options, CritiqueMode::ReportOnly, Some(&mut *sink)).await?;
      document.push_str(REPORT_SEPARATOR);
      document.push_str(&report);
    }

    Ok(document)
  }

  /// Stream into `sink` when given, otherwise wait for the whole answer
  async fn call(
    &self,
    request: &GenerationRequest,
    sink: Option<&mut dyn OutputSink>,
  ) -> Result<String> {
    match sink {
      Some(sink) => {
        self.backend.stream(request, &mut |fragment: &str| sink.append(fragment)).await
      }
      None => self.backend.generate(request).await,
    }
  }
}

/// A run needs an instruction, at least one source, or both
pub fn validate_input(sources: &[Source], instruction: &str) -> Result<()> {
  if instruction.trim().is_empty() && sources.is_empty() {
    return Err(RedactaError::validation("Please add an instruction or at least one source"));
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::options::LengthTier;
  use async_trait::async_trait;
  use std::sync::Mutex;

  /// Answers every call with the next canned reply, streaming it word by word
  struct CannedBackend {
    replies: Mutex<Vec<String>>,
  }

  impl CannedBackend {
    fn new(replies: &[&str]) -> Arc<Self> {
      let mut replies: Vec<String> = replies.iter().map(|r| r.to_string()).collect();
      replies.reverse();
      Arc::new(Self { replies: Mutex::new(replies) })
    }

    fn next(&self) -> Result<String> {
      self
        .replies
        .lock()
        .unwrap()
        .pop()
        .ok_or_else(|| RedactaError::backend(500, "no reply left"))
    }
  }

  #[async_trait]
  impl TextBackend for CannedBackend {
    async fn generate(&self, _request: &GenerationRequest) -> Result<String> {
      self.next()
    }

    async fn stream(
      &self,
      _request: &GenerationRequest,
      on_fragment: &mut (dyn for<'a> FnMut(&'a str) + Send),
    ) -> Result<String> {
      let reply = self.next()?;
      for word in reply.split_inclusive(' ') {
        on_fragment(word);
      }
      Ok(reply)
    }
  }

  #[test]
  fn test_humanize_policy() {
    let short = GenerationOptions { length: LengthTier::Short, ..Default::default() };
    let medium = GenerationOptions { length: LengthTier::Medium, ..Default::default() };

    let on_request = Pipeline::new(CannedBackend::new(&[]), PipelineSettings::default());
    assert!(!on_request.humanize_active(&medium));
    assert!(on_request.humanize_active(&GenerationOptions { humanize: true, ..medium.clone() }));

    let settings =
      PipelineSettings { humanize_policy: HumanizePolicy::AboveShortest, critic_report: true };
    let always = Pipeline::new(CannedBackend::new(&[]), settings);
    assert!(!always.humanize_active(&short));
    assert!(always.humanize_active(&medium));
  }

  #[tokio::test]
  async fn test_empty_request_is_rejected_before_any_call() {
    let pipeline = Pipeline::new(CannedBackend::new(&[]), PipelineSettings::default());
    let mut sink = MockOutputSink::new();
    sink.expect_append().never();
    sink.expect_clear().never();
    sink.expect_stage().never();

    let err =
      pipeline.run(&[], "   ", &GenerationOptions::default(), None, &mut sink).await.unwrap_err();
    assert!(err.is_validation());
  }

  #[tokio::test]
  async fn test_single_pass_clears_once_per_rewrite() {
    let pipeline = Pipeline::new(
      CannedBackend::new(&["rough draft", "sharper draft", "human draft"]),
      PipelineSettings::default(),
    );
    let options = GenerationOptions { critic_mode: true, humanize: true, ..Default::default() };

    let calls = Arc::new(Mutex::new(Vec::<String>::new()));
    let mut sink = MockOutputSink::new();
    sink.expect_stage().returning(|_| ());
    let log = calls.clone();
    sink.expect_append().times(6).returning(move |fragment| {
      log.lock().unwrap().push(fragment.to_string());
    });
    let log = calls.clone();
    sink.expect_clear().times(2).returning(move || {
      log.lock().unwrap().push("<clear>".to_string());
    });

    let text = pipeline.run(&[], "Essay", &options, None, &mut sink).await.unwrap();
    assert_eq!(text, "human draft");
    assert_eq!(
      *calls.lock().unwrap(),
      vec!["rough ", "draft", "<clear>", "sharper ", "draft", "<clear>", "human ", "draft"]
    );
  }

  #[tokio::test]
  async fn test_plain_draft_never_clears() {
    let pipeline =
      Pipeline::new(CannedBackend::new(&["just a draft"]), PipelineSettings::default());
    let mut sink = BufferSink::new();

    let text =
      pipeline.run(&[], "Essay", &GenerationOptions::default(), None, &mut sink).await.unwrap();

    assert_eq!(text, "just a draft");
    assert_eq!(sink.contents(), text);
    assert_eq!(sink.clear_count(), 0);
    assert_eq!(sink.stages(), &[Stage::Drafting, Stage::Done]);
  }

  #[tokio::test]
  async fn test_optimize_prompt_is_one_call() {
    let backend = CannedBackend::new(&["<role_definition>...</role_definition>"]);
    let pipeline = Pipeline::new(backend, PipelineSettings::default());
    let prompt =
      pipeline.optimize_prompt(&[], "Write a report", &GenerationOptions::default()).await.unwrap();
    assert!(prompt.starts_with("<role_definition>"));

    let err = pipeline.optimize_prompt(&[], "", &GenerationOptions::default()).await.unwrap_err();
    assert!(err.is_validation());
  }
}
