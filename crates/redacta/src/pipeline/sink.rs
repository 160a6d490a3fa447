//! Where streamed text goes

use std::fmt;

/// Progress of a single run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
  Idle,
  ProposingAngles,
  AwaitingAngleChoice,
  Drafting,
  Critiquing,
  Humanizing,
  Done,
}

impl fmt::Display for Stage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Stage::Idle => "idle",
      Stage::ProposingAngles => "proposing angles",
      Stage::AwaitingAngleChoice => "awaiting angle choice",
      Stage::Drafting => "drafting",
      Stage::Critiquing => "critiquing",
      Stage::Humanizing => "humanizing",
      Stage::Done => "done",
    };
    f.write_str(name)
  }
}

/// Consumer of generated text.
///
/// Fragments arrive in generation order. `clear` discards everything appended
/// so far; the pipeline calls it once between two stages that both produce
/// visible text.
#[cfg_attr(test, mockall::automock)]
pub trait OutputSink: Send {
  fn append(&mut self, fragment: &str);

  fn clear(&mut self);

  /// Observer hook for stage transitions
  fn stage(&mut self, _stage: Stage) {}
}

/// Sink that keeps the visible text in memory
#[derive(Debug, Default, Clone)]
pub struct BufferSink {
  buffer: String,
  clears: usize,
  stages: Vec<Stage>,
}

impl BufferSink {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn contents(&self) -> &str {
    &self.buffer
  }

  pub fn clear_count(&self) -> usize {
    self.clears
  }

  pub fn stages(&self) -> &[Stage] {
    &self.stages
  }
}

impl OutputSink for BufferSink {
  fn append(&mut self, fragment: &str) {
    self.buffer.push_str(fragment);
  }

  fn clear(&mut self) {
    self.buffer.clear();
    self.clears += 1;
  }

  fn stage(&mut self, stage: Stage) {
    self.stages.push(stage);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_buffer_sink_tracks_text_and_clears() {
    let mut sink = BufferSink::new();
    sink.append("draft ");
    sink.append("text");
    assert_eq!(sink.contents(), "draft text");

    sink.clear();
    sink.append("final");
    sink.stage(Stage::Done);

    assert_eq!(sink.contents(), "final");
    assert_eq!(sink.clear_count(), 1);
    assert_eq!(sink.stages(), &[Stage::Done]);
  }
}
