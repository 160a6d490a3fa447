use async_trait::async_trait;
use redacta::backend::{GenerationRequest, TextBackend};
use redacta::{RedactaError, Result};
use std::collections::VecDeque;
use std::sync::Mutex;

/// One scripted answer
pub enum Reply {
  Text(String),
  Fail,
}

/// A call the pipeline made
#[derive(Debug, Clone)]
pub struct Call {
  pub streamed: bool,
  pub request: GenerationRequest,
}

impl Call {
  pub fn prompt(&self) -> String {
    self.request.content.text()
  }
}

/// Mock text backend that answers calls in order from a script
pub struct ScriptedBackend {
  replies: Mutex<VecDeque<Reply>>,
  calls: Mutex<Vec<Call>>,
}

impl Default for ScriptedBackend {
  fn default() -> Self {
    Self::new()
  }
}

#[allow(dead_code)]
impl ScriptedBackend {
  pub fn new() -> Self {
    Self { replies: Mutex::new(VecDeque::new()), calls: Mutex::new(Vec::new()) }
  }

  pub fn reply(self, text: &str) -> Self {
    self.replies.lock().unwrap().push_back(Reply::Text(text.to_string()));
    self
  }

  pub fn fail(self) -> Self {
    self.replies.lock().unwrap().push_back(Reply::Fail);
    self
  }

  pub fn calls(&self) -> Vec<Call> {
    self.calls.lock().unwrap().clone()
  }

  pub fn call_count(&self) -> usize {
    self.calls.lock().unwrap().len()
  }

  fn answer(&self, request: &GenerationRequest, streamed: bool) -> Result<String> {
    self.calls.lock().unwrap().push(Call { streamed, request: request.clone() });

    match self.replies.lock().unwrap().pop_front() {
      Some(Reply::Text(text)) => Ok(text),
      Some(Reply::Fail) => Err(RedactaError::backend(503, "UNAVAILABLE: scripted failure")),
      None => Err(RedactaError::backend(500, "script exhausted")),
    }
  }
}

#[async_trait]
impl TextBackend for ScriptedBackend {
  async fn generate(&self, request: &GenerationRequest) -> Result<String> {
    self.answer(request, false)
  }

  async fn stream(
    &self,
    request: &GenerationRequest,
    on_fragment: &mut (dyn for<'a> FnMut(&'a str) + Send),
  ) -> Result<String> {
    let text = self.answer(request, true)?;
    for fragment in text.split_inclusive(' ') {
      on_fragment(fragment);
    }
    Ok(text)
  }
}
