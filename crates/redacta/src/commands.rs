//! Command handlers for the `redacta` CLI

use anyhow::{anyhow, Context as _, Result};
use clap::Args;
use colored::*;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::backend::GeminiBackend;
use crate::config::Config;
use crate::display::{self, TerminalSink};
use crate::history::{HistoryStore, RecordKind};
use crate::options::{Format, GenerationOptions, LengthTier, ModelId, Structure, Tone};
use crate::pipeline::{self, Pipeline};
use crate::source::{Source, SourceSet};
use crate::style::{self, StyleVault};
use crate::thesis::{AngleChoice, Thesis};

/// Source material for a run
#[derive(Args, Debug, Clone, Default)]
pub struct SourceArgs {
  /// Source file (.pdf, .txt or .md), repeatable
  #[arg(short, long = "source", value_name = "FILE")]
  pub sources: Vec<PathBuf>,
  /// Pasted text source, written as NAME=TEXT; repeatable
  #[arg(short, long = "note", value_name = "NAME=TEXT")]
  pub notes: Vec<String>,
}

impl SourceArgs {
  pub fn load(&self) -> Result<SourceSet> {
    let mut set = SourceSet::new();

    for path in &self.sources {
      let source = Source::from_file(path)
        .with_context(|| format!("Failed to add source {}", path.display()))?;
      bentley::verbose(&format!("Added {} ({})", source.name, source.size_hint()));
      set.add(source)?;
    }

    for note in &self.notes {
      let (name, text) =
        note.split_once('=').ok_or_else(|| anyhow!("Notes are written as NAME=TEXT: '{note}'"))?;
      set.add(Source::from_text(name, text)?)?;
    }

    Ok(set)
  }
}

/// Overrides on top of the configured default options
#[derive(Args, Debug, Clone, Default)]
pub struct OptionArgs {
  #[arg(long, value_enum)]
  pub model: Option<ModelId>,
  #[arg(long, value_enum)]
  pub tone: Option<Tone>,
  #[arg(short, long, value_enum)]
  pub length: Option<LengthTier>,
  #[arg(short, long, value_enum)]
  pub format: Option<Format>,
  #[arg(long, value_enum)]
  pub structure: Option<Structure>,
  /// Connect and contrast the sources explicitly
  #[arg(long)]
  pub cross_references: bool,
  /// Run the critic pass
  #[arg(long)]
  pub critic: bool,
  /// Rewrite the result in a human register
  #[arg(long)]
  pub humanize: bool,
  /// Style guide file for the humanize pass; defaults to the saved guide
  #[arg(long, value_name = "FILE")]
  pub style: Option<PathBuf>,
  /// Output language
  #[arg(long)]
  pub language: Option<String>,
}

impl OptionArgs {
  pub fn resolve(&self, config: &Config) -> Result<GenerationOptions> {
    let mut options = config.defaults.clone();

    if let Some(model) = self.model {
      options.model = model;
    }
    if let Some(tone) = self.tone {
      options.tone = tone;
    }
    if let Some(length) = self.length {
      options.length = length;
    }
    if let Some(format) = self.format {
      options.format = format;
    }
    if let Some(structure) = self.structure {
      options.structure = structure;
    }
    if let Some(language) = &self.language {
      options.language = language.clone();
    }
    options.cross_references |= self.cross_references;
    options.critic_mode |= self.critic;
    options.humanize |= self.humanize;

    if let Some(path) = &self.style {
      let guide = fs::read_to_string(path)
        .with_context(|| format!("Failed to read style guide {}", path.display()))?;
      options.style_guide = Some(guide);
    } else if options.style_guide().is_none() {
      options.style_guide = StyleVault::new(config.style_path()).load()?;
    }

    Ok(options)
  }
}

/// Everything a command needs from the environment
pub struct Context {
  pub config: Config,
}

impl Context {
  pub fn load(config_path: Option<&Path>) -> Result<Self> {
    let config = Config::load(config_path).context("Failed to load configuration")?;
    Ok(Self { config })
  }

  fn pipeline(&self) -> Result<Pipeline> {
    let backend = GeminiBackend::from_config(&self.config)?;
    Ok(Pipeline::new(Arc::new(backend), self.config.pipeline_settings()))
  }

  fn history(&self) -> HistoryStore {
    HistoryStore::new(self.config.history_dir())
  }

  fn style_vault(&self) -> StyleVault {
    StyleVault::new(self.config.style_path())
  }
}

/// How the thesis for a run is picked
#[derive(Debug, Clone, Copy, Default)]
pub enum AngleSelection {
  #[default]
  None,
  Interactive,
  /// 1-based position among the proposals
  Index(usize),
}

pub struct GenerateRequest {
  pub instruction: String,
  pub sources: SourceArgs,
  pub options: OptionArgs,
  pub angle: AngleSelection,
  pub output: Option<PathBuf>,
  pub save: bool,
}

/// Generate a text and stream it to stdout
pub async fn generate(ctx: &Context, request: GenerateRequest) -> Result<()> {
  let sources = request.sources.load()?;
  pipeline::validate_input(sources.as_slice(), &request.instruction)?;
  let options = request.options.resolve(&ctx.config)?;
  let pipeline = ctx.pipeline()?;

  let thesis = match request.angle {
    AngleSelection::None => None,
    selection => {
      let choice = pipeline.propose(sources.as_slice(), &request.instruction, &options).await;
      pick_angle(choice, selection)?
    }
  };
  if let Some(thesis) = &thesis {
    bentley::info!(&format!("Writing from the angle: {}", thesis.title));
  }

  let mut sink = TerminalSink::new();
  let text = if request.save {
    let record = pipeline
      .run_and_record(
        &ctx.history(),
        sources.as_slice(),
        &request.instruction,
        &options,
        thesis.as_ref(),
        &mut sink,
      )
      .await
      .context("Generation failed")?;
    bentley::verbose(&format!("Saved to history as {}", record.id));
    record.text
  } else {
    pipeline
      .run(sources.as_slice(), &request.instruction, &options, thesis.as_ref(), &mut sink)
      .await
      .context("Generation failed")?
  };

  if let Some(path) = &request.output {
    fs::write(path, &text).with_context(|| format!("Failed to write {}", path.display()))?;
    bentley::success!(&format!("Wrote {}", path.display()));
  }

  Ok(())
}

fn pick_angle(choice: AngleChoice, selection: AngleSelection) -> Result<Option<Thesis>> {
  if choice.is_empty() {
    bentley::warn!("No angles were proposed, continuing without a thesis");
    return Ok(choice.skip());
  }

  let index = match selection {
    AngleSelection::Index(n) => n,
    _ => {
      for (i, thesis) in choice.angles().iter().enumerate() {
        display::display_angle(i, thesis);
      }
      eprint!("Pick an angle [1-{}], or press Enter to skip: ", choice.angles().len());
      std::io::stderr().flush()?;

      let mut input = String::new();
      std::io::stdin().read_line(&mut input)?;
      let input = input.trim();
      if input.is_empty() {
        return Ok(choice.skip());
      }
      input.parse::<usize>().map_err(|_| anyhow!("'{input}' is not an angle number"))?
    }
  };

  let count = choice.angles().len();
  match index.checked_sub(1).and_then(|i| choice.choose(i)) {
    Some(thesis) => Ok(Some(thesis)),
    None => {
      let message = format!("Angle {index} is not one of 1-{count}, continuing without a thesis");
      bentley::warn!(&message);
      Ok(None)
    }
  }
}

/// Print the proposed angles for a task
pub async fn angles(
  ctx: &Context,
  instruction: &str,
  sources: &SourceArgs,
  options: &OptionArgs,
) -> Result<()> {
  let sources = sources.load()?;
  pipeline::validate_input(sources.as_slice(), instruction)?;
  let options = options.resolve(&ctx.config)?;
  let pipeline = ctx.pipeline()?;

  let choice = pipeline.propose(sources.as_slice(), instruction, &options).await;
  if choice.is_empty() {
    println!("No angles proposed");
    return Ok(());
  }

  for (i, thesis) in choice.angles().iter().enumerate() {
    display::display_angle(i, thesis);
  }
  Ok(())
}

/// Write an optimized master prompt for the task instead of the text
pub async fn prompt(
  ctx: &Context,
  instruction: &str,
  sources: &SourceArgs,
  options: &OptionArgs,
  save: bool,
) -> Result<()> {
  let sources = sources.load()?;
  pipeline::validate_input(sources.as_slice(), instruction)?;
  let options = options.resolve(&ctx.config)?;
  let pipeline = ctx.pipeline()?;

  let text = pipeline
    .optimize_prompt(sources.as_slice(), instruction, &options)
    .await
    .context("Prompt generation failed")?;
  println!("{text}");

  if save {
    let record =
      crate::history::HistoryRecord::new(instruction, text, options).with_kind(RecordKind::Prompt);
    ctx.history().append(&record)?;
  }
  Ok(())
}

/// Derive a style guide from writing samples
pub async fn style_analyze(ctx: &Context, samples: &[PathBuf], save: bool) -> Result<()> {
  let mut texts = Vec::new();
  for path in samples {
    let text = fs::read_to_string(path)
      .with_context(|| format!("Failed to read sample {}", path.display()))?;
    texts.push(text);
  }

  let backend = GeminiBackend::from_config(&ctx.config)?;
  bentley::info!(&format!("Analysing {} sample(s)...", texts.len()));
  let guide = style::extract_style_guide(&backend, ctx.config.defaults.model, &texts)
    .await
    .context("Style analysis failed")?;
  println!("{guide}");

  if save {
    let vault = ctx.style_vault();
    vault.save(&guide)?;
    bentley::success!(&format!("Saved style guide to {}", vault.path().display()));
  }
  Ok(())
}

pub fn style_show(ctx: &Context) -> Result<()> {
  match ctx.style_vault().load()? {
    Some(guide) => println!("{guide}"),
    None => println!("No style guide saved"),
  }
  Ok(())
}

pub fn history_list(ctx: &Context, limit: Option<usize>) -> Result<()> {
  let records = ctx.history().list()?;
  if records.is_empty() {
    println!("No history yet");
    return Ok(());
  }

  for record in records.iter().take(limit.unwrap_or(usize::MAX)) {
    display::display_history_entry(record);
  }
  Ok(())
}

pub fn history_show(ctx: &Context, id: &str) -> Result<()> {
  let record = ctx.history().get(id)?;
  display::display_history_record(&record);
  Ok(())
}

pub fn history_delete(ctx: &Context, id: &str, force: bool) -> Result<()> {
  let store = ctx.history();
  let record = store.get(id)?;

  if !force && !confirm(&format!("Delete \"{}\"?", record.title(60).yellow()))? {
    println!("Deletion cancelled");
    return Ok(());
  }

  store.delete(id)?;
  println!("{} Deleted {}", "✓".green(), id.dimmed());
  Ok(())
}

pub fn history_clear(ctx: &Context, force: bool) -> Result<()> {
  if !force && !confirm("Delete the entire history?")? {
    println!("Clear cancelled");
    return Ok(());
  }

  let removed = ctx.history().clear()?;
  println!("{} Removed {} record(s)", "✓".green(), removed);
  Ok(())
}

fn confirm(question: &str) -> Result<bool> {
  println!("{question} [y/N]");

  let mut input = String::new();
  std::io::stdin().read_line(&mut input)?;
  Ok(input.trim().to_lowercase().starts_with('y'))
}

#[cfg(test)]
mod tests {
  use super::*;
  use serial_test::serial;
  use tempfile::TempDir;

  fn config_in(dir: &Path) -> Config {
    Config { data_dir: dir.to_path_buf(), ..Config::default() }
  }

  #[test]
  fn test_notes_need_a_name() {
    let args = SourceArgs { notes: vec!["no separator".to_string()], ..Default::default() };
    assert!(args.load().is_err());

    let args = SourceArgs {
      notes: vec!["Notes=first".to_string(), "Notes=second".to_string()],
      ..Default::default()
    };
    let err = args.load().unwrap_err();
    assert!(err.to_string().contains("already been added"));
  }

  #[test]
  #[serial]
  fn test_flags_override_config_defaults() {
    let temp = TempDir::new().unwrap();
    let mut config = config_in(temp.path());
    config.defaults.critic_mode = true;
    config.defaults.tone = Tone::Academic;

    let args = OptionArgs { length: Some(LengthTier::Long), humanize: true, ..Default::default() };
    let options = args.resolve(&config).unwrap();

    assert_eq!(options.length, LengthTier::Long);
    assert_eq!(options.tone, Tone::Academic);
    assert!(options.critic_mode);
    assert!(options.humanize);
    assert_eq!(options.style_guide, None);
  }

  #[test]
  #[serial]
  fn test_saved_style_guide_is_picked_up() {
    let temp = TempDir::new().unwrap();
    let config = config_in(temp.path());
    StyleVault::new(config.style_path()).save("Never use semicolons.").unwrap();

    let options = OptionArgs::default().resolve(&config).unwrap();
    assert_eq!(options.style_guide(), Some("Never use semicolons."));

    let explicit = temp.path().join("other.md");
    fs::write(&explicit, "Use many semicolons.").unwrap();
    let args = OptionArgs { style: Some(explicit), ..Default::default() };
    assert_eq!(args.resolve(&config).unwrap().style_guide(), Some("Use many semicolons."));
  }
}
