//! Source documents and the working set a run draws from

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{RedactaError, Result};

/// Largest file accepted as a source (inline request payload limit)
pub const MAX_SOURCE_BYTES: u64 = 20 * 1024 * 1024;

pub const PDF_MIME: &str = "application/pdf";
pub const TEXT_MIME: &str = "text/plain";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
  /// Binary document, content is a base64 payload
  Document,
  Text,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
  pub id: String,
  pub name: String,
  pub content: String,
  pub kind: SourceKind,
  pub mime_type: String,
}

impl Source {
  /// Wrap pasted text as a source
  pub fn from_text(name: &str, content: &str) -> Result<Self> {
    let name = name.trim();
    if name.is_empty() || content.trim().is_empty() {
      return Err(RedactaError::validation("A text source needs both a title and content"));
    }

    Ok(Self {
      id: uuid::Uuid::new_v4().to_string(),
      name: name.to_string(),
      content: content.to_string(),
      kind: SourceKind::Text,
      mime_type: TEXT_MIME.to_string(),
    })
  }

  /// Ingest a file: PDFs become an encoded payload, text files are read as-is
  pub fn from_file(path: &Path) -> Result<Self> {
    let name = path
      .file_name()
      .and_then(|n| n.to_str())
      .ok_or_else(|| RedactaError::validation(format!("Invalid file name: {}", path.display())))?
      .to_string();

    let extension =
      path.extension().and_then(|e| e.to_str()).map(|e| e.to_ascii_lowercase()).unwrap_or_default();

    let kind = match extension.as_str() {
      "pdf" => SourceKind::Document,
      "txt" | "md" | "markdown" => SourceKind::Text,
      _ => {
        return Err(RedactaError::validation(format!(
          "Unsupported file type for {name}: only PDF, .txt and .md sources are accepted"
        )))
      }
    };

    if !path.exists() {
      return Err(RedactaError::not_found("Source file", path.display().to_string()));
    }

    let size = fs::metadata(path)?.len();
    if size > MAX_SOURCE_BYTES {
      return Err(RedactaError::validation(format!(
        "{name} is {:.1} MiB, the limit is {} MiB",
        size as f64 / (1024.0 * 1024.0),
        MAX_SOURCE_BYTES / (1024 * 1024)
      )));
    }

    let (content, mime_type) = match kind {
      SourceKind::Document => (BASE64_STANDARD.encode(fs::read(path)?), PDF_MIME),
      SourceKind::Text => (fs::read_to_string(path)?, TEXT_MIME),
    };

    Ok(Self {
      id: uuid::Uuid::new_v4().to_string(),
      name,
      content,
      kind,
      mime_type: mime_type.to_string(),
    })
  }

  pub fn is_document(&self) -> bool {
    self.kind == SourceKind::Document
  }

  /// Size shown to the user, in thousands of characters
  pub fn size_hint(&self) -> String {
    format!("{:.1}k chars", self.content.len() as f64 / 1000.0)
  }
}

/// Ordered collection of sources with unique names
#[derive(Debug, Clone, Default)]
pub struct SourceSet {
  sources: Vec<Source>,
}

impl SourceSet {
  pub fn new() -> Self {
    Self::default()
  }

  /// Add a source, rejecting a name that is already present
  pub fn add(&mut self, source: Source) -> Result<()> {
    if self.sources.iter().any(|s| s.name == source.name) {
      return Err(RedactaError::validation(format!(
        "A source named '{}' has already been added",
        source.name
      )));
    }
    self.sources.push(source);
    Ok(())
  }

  pub fn remove(&mut self, id: &str) -> Option<Source> {
    let index = self.sources.iter().position(|s| s.id == id)?;
    Some(self.sources.remove(index))
  }

  pub fn clear(&mut self) {
    self.sources.clear();
  }

  pub fn as_slice(&self) -> &[Source] {
    &self.sources
  }

  pub fn len(&self) -> usize {
    self.sources.len()
  }

  pub fn is_empty(&self) -> bool {
    self.sources.is_empty()
  }
}
