//! Display formatting utilities for CLI output

use colored::*;
use std::io::{IsTerminal, Write};

use crate::history::{HistoryRecord, RecordKind};
use crate::options::GenerationOptions;
use crate::pipeline::{OutputSink, Stage};
use crate::thesis::Thesis;

/// Streams generated text to stdout and announces stages on stderr.
///
/// Text already printed cannot be taken back, so a `clear` marks the discarded
/// output with a divider before the replacement starts.
pub struct TerminalSink {
  buffer: String,
  last_stage: Option<Stage>,
  announce: bool,
}

impl TerminalSink {
  pub fn new() -> Self {
    Self { buffer: String::new(), last_stage: None, announce: std::io::stderr().is_terminal() }
  }

  /// Everything appended since the last clear
  pub fn contents(&self) -> &str {
    &self.buffer
  }
}

impl Default for TerminalSink {
  fn default() -> Self {
    Self::new()
  }
}

impl OutputSink for TerminalSink {
  fn append(&mut self, fragment: &str) {
    self.buffer.push_str(fragment);
    let mut stdout = std::io::stdout().lock();
    let _ = stdout.write_all(fragment.as_bytes());
    let _ = stdout.flush();
  }

  fn clear(&mut self) {
    if !self.buffer.is_empty() {
      println!();
      eprintln!("{}", "~~ discarded, rewriting ~~".dimmed());
    }
    self.buffer.clear();
  }

  fn stage(&mut self, stage: Stage) {
    if self.last_stage == Some(stage) {
      return;
    }
    self.last_stage = Some(stage);

    match stage {
      Stage::Done => println!(),
      Stage::Drafting | Stage::Critiquing | Stage::Humanizing if self.announce => {
        eprintln!();
        bentley::stage(&stage.to_string());
      }
      _ => {}
    }
  }
}

/// Wrap text to fit within a specified width
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
  let mut lines = Vec::new();

  for paragraph in text.split('\n') {
    if paragraph.trim().is_empty() {
      lines.push(String::new());
      continue;
    }

    let mut current_line = String::new();
    for word in paragraph.split_whitespace() {
      if current_line.is_empty() {
        current_line = word.to_string();
      } else if current_line.chars().count() + 1 + word.chars().count() <= width {
        current_line.push(' ');
        current_line.push_str(word);
      } else {
        lines.push(current_line);
        current_line = word.to_string();
      }
    }

    if !current_line.is_empty() {
      lines.push(current_line);
    }
  }

  lines
}

/// One-line summary of the options a text was generated with
pub fn options_summary(options: &GenerationOptions) -> String {
  let mut parts = vec![
    options.model.to_string(),
    format!("{:?}", options.length).to_lowercase(),
    format!("{:?}", options.tone).to_lowercase(),
  ];
  if options.critic_mode {
    parts.push("critic".to_string());
  }
  if options.humanize {
    parts.push("humanized".to_string());
  }
  if options.style_guide().is_some() {
    parts.push("style guide".to_string());
  }
  parts.join(", ")
}

pub fn display_angle(index: usize, thesis: &Thesis) {
  println!(
    "{} {} {}",
    format!("[{}]", index + 1).yellow().bold(),
    format!("({})", thesis.angle.label()).cyan(),
    thesis.title.bold()
  );
  for line in wrap_text(&thesis.description, 76) {
    println!("    {line}");
  }
  println!();
}

pub fn display_history_entry(record: &HistoryRecord) {
  let kind = match record.kind {
    RecordKind::Redaction => "text".green(),
    RecordKind::Prompt => "prompt".magenta(),
  };
  println!(
    "{} {} {} {}",
    record.id.dimmed(),
    record.created_at.format("%Y-%m-%d %H:%M").to_string().blue(),
    kind,
    record.title(60).bold()
  );
}

pub fn display_history_record(record: &HistoryRecord) {
  let header = format!("=== {} ===", record.title(70).yellow().bold());
  println!("{header}");
  println!("{} {}", "id:".dimmed(), record.id);
  println!("{} {}", "created:".dimmed(), record.created_at.to_rfc3339());
  println!("{} {}", "options:".dimmed(), options_summary(&record.options));
  println!();
  println!("{}", record.text);
}
