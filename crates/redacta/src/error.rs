use thiserror::Error;

pub type Result<T> = std::result::Result<T, RedactaError>;

#[derive(Error, Debug)]
pub enum RedactaError {
  #[error("No API key configured (set REDACTA_API_KEY, GEMINI_API_KEY or API_KEY)")]
  MissingCredential,

  #[error("Backend returned HTTP {status}: {message}")]
  Backend { status: u16, message: String },

  #[error("Backend response could not be used: {message}")]
  MalformedResponse { message: String },

  #[error("Backend request timed out after {secs}s")]
  Timeout { secs: u64 },

  #[error("HTTP request failed: {0}")]
  Http(#[from] reqwest::Error),

  #[error("{0}")]
  Validation(String),

  #[error("{kind} '{id}' not found")]
  NotFound { kind: &'static str, id: String },

  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),

  #[error("JSON error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("YAML error: {0}")]
  Yaml(#[from] serde_yaml::Error),
}

impl RedactaError {
  pub fn backend(status: u16, message: impl Into<String>) -> Self {
    Self::Backend { status, message: message.into() }
  }

  pub fn malformed(message: impl Into<String>) -> Self {
    Self::MalformedResponse { message: message.into() }
  }

  pub fn validation(message: impl Into<String>) -> Self {
    Self::Validation(message.into())
  }

  pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
    Self::NotFound { kind, id: id.into() }
  }

  /// True for input problems caught before any backend call
  pub fn is_validation(&self) -> bool {
    matches!(self, Self::Validation(_))
  }
}
