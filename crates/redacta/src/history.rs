//! History of completed generations
//!
//! Each record is one `<id>.history.md` file: YAML frontmatter with the
//! instruction, options snapshot and timestamp, followed by the generated
//! Markdown. Records are written once and never edited.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;
use uuid::Uuid;

use crate::error::{RedactaError, Result};
use crate::options::GenerationOptions;

const EXTENSION: &str = ".history.md";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecordKind {
  /// Finished text
  #[default]
  Redaction,
  /// Master prompt from the prompt optimizer
  Prompt,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRecord {
  pub id: String,
  pub kind: RecordKind,
  pub instruction: String,
  pub text: String,
  pub options: GenerationOptions,
  pub created_at: DateTime<Utc>,
}

/// YAML frontmatter of a history file
#[derive(Debug, Serialize, Deserialize)]
struct FrontMatter {
  id: String,
  #[serde(default)]
  kind: RecordKind,
  instruction: String,
  options: GenerationOptions,
  created_at: DateTime<Utc>,
}

impl HistoryRecord {
  pub fn new(instruction: &str, text: String, options: GenerationOptions) -> Self {
    Self {
      id: Uuid::new_v4().to_string(),
      kind: RecordKind::Redaction,
      instruction: instruction.to_string(),
      text,
      options,
      created_at: Utc::now(),
    }
  }

  pub fn with_kind(mut self, kind: RecordKind) -> Self {
    self.kind = kind;
    self
  }

  /// First non-empty line of the instruction, cut to `max` characters
  pub fn title(&self, max: usize) -> String {
    let line = self.instruction.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("");
    if line.is_empty() {
      return "(sources only)".to_string();
    }
    if line.chars().count() <= max {
      return line.to_string();
    }
    let cut: String = line.chars().take(max.saturating_sub(3)).collect();
    format!("{cut}...")
  }

  fn to_file_content(&self) -> Result<String> {
    let frontmatter = FrontMatter {
      id: self.id.clone(),
      kind: self.kind,
      instruction: self.instruction.clone(),
      options: self.options.clone(),
      created_at: self.created_at,
    };
    let yaml_content = serde_yaml::to_string(&frontmatter)?;
    Ok(format!("---\n{}---\n\n{}", yaml_content, self.text))
  }

  fn from_file_content(content: &str) -> Result<Self> {
    let Some(after_open) = content.strip_prefix("---\n") else {
      return Err(RedactaError::malformed("history file is missing its frontmatter"));
    };
    let Some(end_pos) = after_open.find("\n---\n") else {
      return Err(RedactaError::malformed("history file frontmatter is not terminated"));
    };

    let frontmatter: FrontMatter = serde_yaml::from_str(&after_open[..end_pos])?;
    let body = &after_open[end_pos + 5..];
    let text = body.strip_prefix('\n').unwrap_or(body);

    Ok(Self {
      id: frontmatter.id,
      kind: frontmatter.kind,
      instruction: frontmatter.instruction,
      text: text.to_string(),
      options: frontmatter.options,
      created_at: frontmatter.created_at,
    })
  }
}

/// Append-only record store rooted at one directory
#[derive(Debug, Clone)]
pub struct HistoryStore {
  root: PathBuf,
}

impl HistoryStore {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  pub fn append(&self, record: &HistoryRecord) -> Result<()> {
    fs::create_dir_all(&self.root)?;
    fs::write(self.path_for(&record.id)?, record.to_file_content()?)?;
    Ok(())
  }

  /// All records, newest first. Unreadable files are skipped with a warning.
  pub fn list(&self) -> Result<Vec<HistoryRecord>> {
    let mut records = Vec::new();
    for path in self.history_files()? {
      match fs::read_to_string(&path)
        .map_err(RedactaError::from)
        .and_then(|content| HistoryRecord::from_file_content(&content))
      {
        Ok(record) => records.push(record),
        Err(e) => warn!("skipping unreadable history file {}: {e}", path.display()),
      }
    }

    records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(records)
  }

  pub fn get(&self, id: &str) -> Result<HistoryRecord> {
    let path = self.path_for(id)?;
    if !path.exists() {
      return Err(RedactaError::not_found("History record", id));
    }
    HistoryRecord::from_file_content(&fs::read_to_string(path)?)
  }

  pub fn delete(&self, id: &str) -> Result<()> {
    let path = self.path_for(id)?;
    if !path.exists() {
      return Err(RedactaError::not_found("History record", id));
    }
    fs::remove_file(path)?;
    Ok(())
  }

  /// Remove every record, returning how many were deleted
  pub fn clear(&self) -> Result<usize> {
    let files = self.history_files()?;
    for path in &files {
      fs::remove_file(path)?;
    }
    Ok(files.len())
  }

  fn path_for(&self, id: &str) -> Result<PathBuf> {
    // Ids are UUIDs, which also keeps lookups inside the root
    if Uuid::parse_str(id).is_err() {
      return Err(RedactaError::not_found("History record", id));
    }
    Ok(self.root.join(format!("{id}{EXTENSION}")))
  }

  fn history_files(&self) -> Result<Vec<PathBuf>> {
    if !self.root.exists() {
      return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(&self.root)? {
      let path = entry?.path();
      let is_record = path
        .file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.ends_with(EXTENSION));
      if path.is_file() && is_record {
        files.push(path);
      }
    }
    Ok(files)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::options::{LengthTier, Tone};
  use chrono::Duration;
  use tempfile::TempDir;

  fn record_at(instruction: &str, minutes_ago: i64) -> HistoryRecord {
    let body = format!("# {instruction}\n\nBody.");
    let mut record = HistoryRecord::new(instruction, body, GenerationOptions::default());
    record.created_at = Utc::now() - Duration::minutes(minutes_ago);
    record
  }

  #[test]
  fn test_file_content_round_trip() {
    let options = GenerationOptions {
      tone: Tone::Academic,
      length: LengthTier::Thesis,
      style_guide: Some("Short sentences.".to_string()),
      ..Default::default()
    };
    let record = HistoryRecord::new(
      "Compare two papers\n---\nwith care",
      "## Heading\n\n---\n\nText after a rule.\n".to_string(),
      options,
    )
    .with_kind(RecordKind::Prompt);

    let content = record.to_file_content().unwrap();
    assert!(content.starts_with("---\nid: "));

    let parsed = HistoryRecord::from_file_content(&content).unwrap();
    assert_eq!(parsed, record);
  }

  #[test]
  fn test_missing_frontmatter_is_malformed() {
    assert!(matches!(
      HistoryRecord::from_file_content("# just markdown"),
      Err(RedactaError::MalformedResponse { .. })
    ));
  }

  #[test]
  fn test_list_is_newest_first() {
    let temp = TempDir::new().unwrap();
    let store = HistoryStore::new(temp.path().join("history"));
    assert!(store.list().unwrap().is_empty());

    store.append(&record_at("old", 30)).unwrap();
    store.append(&record_at("newest", 1)).unwrap();
    store.append(&record_at("middle", 10)).unwrap();
    fs::write(temp.path().join("history").join("notes.txt"), "ignored").unwrap();

    let titles: Vec<String> = store.list().unwrap().iter().map(|r| r.instruction.clone()).collect();
    assert_eq!(titles, vec!["newest", "middle", "old"]);
  }

  #[test]
  fn test_get_and_delete_unknown_ids() {
    let temp = TempDir::new().unwrap();
    let store = HistoryStore::new(temp.path());

    let missing = Uuid::new_v4().to_string();
    assert!(matches!(store.get(&missing), Err(RedactaError::NotFound { .. })));
    assert!(matches!(store.delete(&missing), Err(RedactaError::NotFound { .. })));
    assert!(matches!(store.get("../config"), Err(RedactaError::NotFound { .. })));
  }

  #[test]
  fn test_title_truncates() {
    let record = record_at("\n  A fairly long instruction line\nsecond", 0);
    assert_eq!(record.title(100), "A fairly long instruction line");
    assert_eq!(record.title(10), "A fairl...");
    assert_eq!(record_at("  ", 0).title(10), "(sources only)");
  }
}
