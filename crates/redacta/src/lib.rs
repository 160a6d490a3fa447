//! Redacta - source-grounded writing assistant
//!
//! Drafts essays and reports from a set of sources and an instruction, with
//! optional angle proposals, a critic pass and a humanizing pass. See
//! [`pipeline::Pipeline`] for the entry point.

pub mod backend;
pub mod commands;
pub mod config;
pub mod display;
pub mod error;
pub mod history;
pub mod options;
pub mod pipeline;
pub mod prompts;
pub mod source;
pub mod style;
pub mod thesis;

pub use backend::{GeminiBackend, TextBackend};
pub use config::Config;
pub use error::{RedactaError, Result};
pub use history::{HistoryRecord, HistoryStore};
pub use options::GenerationOptions;
pub use pipeline::{OutputSink, Pipeline, PipelineSettings};
pub use source::{Source, SourceSet};
pub use thesis::{AngleChoice, Thesis};
