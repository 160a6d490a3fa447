//! Strategic angles proposed before drafting, and the choice between them

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AngleKind {
  Analytical,
  Critical,
  Comparative,
  Innovative,
}

impl AngleKind {
  pub fn label(&self) -> &'static str {
    match self {
      AngleKind::Analytical => "Analytical",
      AngleKind::Critical => "Critical",
      AngleKind::Comparative => "Comparative",
      AngleKind::Innovative => "Innovative",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thesis {
  pub id: String,
  pub angle: AngleKind,
  pub title: String,
  pub description: String,
}

/// Angles on offer, waiting for the caller to pick one or skip.
///
/// Resolving the choice consumes it, so a proposal feeds exactly one run.
#[derive(Debug, Clone, Default)]
pub struct AngleChoice {
  angles: Vec<Thesis>,
}

impl AngleChoice {
  pub fn new(angles: Vec<Thesis>) -> Self {
    Self { angles }
  }

  pub fn angles(&self) -> &[Thesis] {
    &self.angles
  }

  pub fn is_empty(&self) -> bool {
    self.angles.is_empty()
  }

  /// Pick by position; out of range behaves like `skip`
  pub fn choose(mut self, index: usize) -> Option<Thesis> {
    if index < self.angles.len() {
      Some(self.angles.swap_remove(index))
    } else {
      None
    }
  }

  pub fn choose_id(self, id: &str) -> Option<Thesis> {
    self.angles.into_iter().find(|thesis| thesis.id == id)
  }

  pub fn skip(self) -> Option<Thesis> {
    None
  }
}
