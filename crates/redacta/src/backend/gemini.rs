//! Gemini REST backend
//!
//! Talks to `generateContent` for whole answers and to
//! `streamGenerateContent?alt=sse` for streamed ones.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::timeout;

use super::{GenerationConfig, GenerationRequest, Part, PromptContent, TextBackend};
use crate::config::Config;
use crate::error::{RedactaError, Result};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GeminiBackend {
  client: Client,
  api_key: String,
  base_url: String,
  timeout_secs: u64,
}

impl GeminiBackend {
  /// Fails fast when no credential is available
  pub fn new(api_key: &str, base_url: &str, timeout_secs: u64) -> Result<Self> {
    if api_key.trim().is_empty() {
      return Err(RedactaError::MissingCredential);
    }

    let client = Client::builder().connect_timeout(Duration::from_secs(30)).build()?;

    Ok(Self {
      client,
      api_key: api_key.trim().to_string(),
      base_url: base_url.trim_end_matches('/').to_string(),
      timeout_secs,
    })
  }

  pub fn from_config(config: &Config) -> Result<Self> {
    let api_key = config.api_key.as_deref().unwrap_or_default();
    Self::new(api_key, &config.base_url, config.timeout_secs)
  }

  fn endpoint(&self, request: &GenerationRequest, method: &str) -> String {
    format!("{}/models/{}:{method}", self.base_url, request.model.as_str())
  }

  async fn post(&self, url: &str, body: &GenerateContentRequest) -> Result<Response> {
    let send = self.client.post(url).header("x-goog-api-key", &self.api_key).json(body).send();

    let response = timeout(Duration::from_secs(self.timeout_secs), send)
      .await
      .map_err(|_| RedactaError::Timeout { secs: self.timeout_secs })??;

    if !response.status().is_success() {
      let status = response.status();
      let body = response.text().await.unwrap_or_else(|_| "Failed to read error body".to_string());
      return Err(map_http_error(status, &body));
    }

    Ok(response)
  }
}

#[async_trait]
impl TextBackend for GeminiBackend {
  async fn generate(&self, request: &GenerationRequest) -> Result<String> {
    let url = self.endpoint(request, "generateContent");
    let body = GenerateContentRequest::from(request);
    tracing::debug!(model = %request.model, "generateContent");

    let response = self.post(&url, &body).await?;
    let parsed: GenerateContentResponse =
      timeout(Duration::from_secs(self.timeout_secs), response.json())
        .await
        .map_err(|_| RedactaError::Timeout { secs: self.timeout_secs })?
        .map_err(|e| RedactaError::malformed(format!("Failed to parse Gemini response: {e}")))?;

    extract_text(&parsed).ok_or_else(|| RedactaError::malformed(describe_empty(&parsed)))
  }

  async fn stream(
    &self,
    request: &GenerationRequest,
    on_fragment: &mut (dyn for<'a> FnMut(&'a str) + Send),
  ) -> Result<String> {
    let url = format!("{}?alt=sse", self.endpoint(request, "streamGenerateContent"));
    let body = GenerateContentRequest::from(request);
    tracing::debug!(model = %request.model, "streamGenerateContent");

    let response = self.post(&url, &body).await?;
    let mut stream = response.bytes_stream();
    let mut decoder = SseDecoder::default();
    let mut full_text = String::new();

    // The timeout bounds the silence between chunks, not the whole answer
    loop {
      let next = timeout(Duration::from_secs(self.timeout_secs), stream.next())
        .await
        .map_err(|_| RedactaError::Timeout { secs: self.timeout_secs })?;

      let Some(chunk) = next else { break };
      for event in decoder.push(&chunk?) {
        emit_event(&event, &mut full_text, on_fragment)?;
      }
    }

    if let Some(event) = decoder.finish() {
      emit_event(&event, &mut full_text, on_fragment)?;
    }

    if full_text.is_empty() {
      return Err(RedactaError::malformed("Gemini stream ended without any text"));
    }
    Ok(full_text)
  }
}

fn emit_event(
  payload: &str,
  full_text: &mut String,
  on_fragment: &mut (dyn for<'a> FnMut(&'a str) + Send),
) -> Result<()> {
  let parsed: GenerateContentResponse = serde_json::from_str(payload)
    .map_err(|e| RedactaError::malformed(format!("Invalid stream chunk: {e}")))?;

  if let Some(text) = extract_text(&parsed) {
    on_fragment(&text);
    full_text.push_str(&text);
  }
  Ok(())
}

/// Splits a server-sent-events byte stream into `data:` payloads
#[derive(Default)]
struct SseDecoder {
  buffer: Vec<u8>,
}

impl SseDecoder {
  fn push(&mut self, bytes: &[u8]) -> Vec<String> {
    self.buffer.extend_from_slice(bytes);
    let mut events = Vec::new();

    while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
      let line: Vec<u8> = self.buffer.drain(..=pos).collect();
      if let Some(payload) = data_payload(&line) {
        events.push(payload);
      }
    }
    events
  }

  fn finish(&mut self) -> Option<String> {
    let rest = std::mem::take(&mut self.buffer);
    data_payload(&rest)
  }
}

fn data_payload(line: &[u8]) -> Option<String> {
  let line = String::from_utf8_lossy(line);
  let line = line.trim_end_matches(['\n', '\r']);
  let payload = line.strip_prefix("data:")?.trim();
  if payload.is_empty() || payload == "[DONE]" {
    return None;
  }
  Some(payload.to_string())
}

// Wire types

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
  contents: Vec<Content>,
  generation_config: WireGenerationConfig,
}

#[derive(Serialize)]
struct Content {
  role: String,
  parts: Vec<WirePart>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum WirePart {
  Text {
    text: String,
  },
  InlineData {
    #[serde(rename = "inlineData")]
    inline_data: InlineDataPayload,
  },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineDataPayload {
  mime_type: String,
  data: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireGenerationConfig {
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  max_output_tokens: Option<u32>,
  #[serde(skip_serializing_if = "Option::is_none")]
  thinking_config: Option<ThinkingConfig>,
  #[serde(skip_serializing_if = "Option::is_none")]
  response_mime_type: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  response_schema: Option<serde_json::Value>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ThinkingConfig {
  thinking_budget: u32,
}

impl From<&GenerationRequest> for GenerateContentRequest {
  fn from(request: &GenerationRequest) -> Self {
    let parts = match &request.content {
      PromptContent::Text(text) => vec![WirePart::Text { text: text.clone() }],
      PromptContent::Parts(parts) => parts.iter().map(WirePart::from).collect(),
    };

    Self {
      contents: vec![Content { role: "user".to_string(), parts }],
      generation_config: WireGenerationConfig::from(&request.config),
    }
  }
}

impl From<&Part> for WirePart {
  fn from(part: &Part) -> Self {
    match part {
      Part::Text(text) => WirePart::Text { text: text.clone() },
      Part::InlineData { mime_type, data } => WirePart::InlineData {
        inline_data: InlineDataPayload { mime_type: mime_type.clone(), data: data.clone() },
      },
    }
  }
}

impl From<&GenerationConfig> for WireGenerationConfig {
  fn from(config: &GenerationConfig) -> Self {
    Self {
      temperature: config.temperature,
      max_output_tokens: config.max_output_tokens,
      thinking_config: config
        .thinking_budget
        .map(|thinking_budget| ThinkingConfig { thinking_budget }),
      response_mime_type: config.response_schema.as_ref().map(|_| "application/json".to_string()),
      response_schema: config.response_schema.clone(),
    }
  }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
  #[serde(default)]
  candidates: Vec<Candidate>,
  prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
  content: Option<ContentResponse>,
  finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ContentResponse {
  #[serde(default)]
  parts: Vec<PartResponse>,
}

#[derive(Deserialize)]
struct PartResponse {
  text: Option<String>,
  #[serde(default)]
  thought: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
  block_reason: Option<String>,
}

#[derive(Deserialize)]
struct ErrorWrapper {
  error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
  message: Option<String>,
  status: Option<String>,
}

/// Visible text of the first candidate; reasoning parts are dropped
fn extract_text(response: &GenerateContentResponse) -> Option<String> {
  let content = response.candidates.first()?.content.as_ref()?;
  let text: String = content
    .parts
    .iter()
    .filter(|part| !part.thought)
    .filter_map(|part| part.text.as_deref())
    .collect();

  if text.is_empty() {
    None
  } else {
    Some(text)
  }
}

fn describe_empty(response: &GenerateContentResponse) -> String {
  if let Some(reason) = response.prompt_feedback.as_ref().and_then(|f| f.block_reason.as_deref()) {
    return format!("prompt was blocked ({reason})");
  }
  match response.candidates.first().and_then(|c| c.finish_reason.as_deref()) {
    Some(reason) => format!("no text returned (finish reason {reason})"),
    None => "no text returned".to_string(),
  }
}

fn map_http_error(status: StatusCode, body: &str) -> RedactaError {
  let message = serde_json::from_str::<ErrorWrapper>(body)
    .map(|wrapper| {
      let msg = wrapper.error.message.unwrap_or_else(|| body.to_string());
      match wrapper.error.status {
        Some(status_text) if !status_text.is_empty() => format!("{status_text}: {msg}"),
        _ => msg,
      }
    })
    .unwrap_or_else(|_| body.to_string());

  RedactaError::backend(status.as_u16(), message)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::options::ModelId;
  use mockito::{Matcher, Server};

  fn request(content: PromptContent, config: GenerationConfig) -> GenerationRequest {
    GenerationRequest { model: ModelId::Gemini2Flash, content, config }
  }

  fn text_request() -> GenerationRequest {
    let content = PromptContent::Text("Write about tides".to_string());
    request(content, GenerationConfig::with_temperature(0.7))
  }

  fn backend(server: &Server) -> GeminiBackend {
    GeminiBackend::new("test-key", &server.url(), 5).unwrap()
  }

  /// Accepts connections and never answers
  async fn silent_server() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
      let mut held = Vec::new();
      while let Ok((socket, _)) = listener.accept().await {
        held.push(socket);
      }
    });
    format!("http://{addr}")
  }

  #[test]
  fn test_blank_key_is_missing_credential() {
    let result = GeminiBackend::new("  ", DEFAULT_BASE_URL, 5);
    assert!(matches!(result, Err(RedactaError::MissingCredential)));
  }

  #[test]
  fn test_request_body_shape() {
    let content = PromptContent::Parts(vec![
      Part::Text("Summarise".to_string()),
      Part::InlineData { mime_type: "application/pdf".to_string(), data: "JVBE".to_string() },
    ]);
    let config = GenerationConfig {
      max_output_tokens: Some(8192),
      thinking_budget: Some(1024),
      temperature: 0.7,
      response_schema: Some(serde_json::json!({"type": "ARRAY"})),
    };

    let wire = GenerateContentRequest::from(&request(content, config));
    let body = serde_json::to_value(wire).unwrap();

    assert_eq!(body["contents"][0]["role"], "user");
    assert_eq!(body["contents"][0]["parts"][0]["text"], "Summarise");
    assert_eq!(body["contents"][0]["parts"][1]["inlineData"]["mimeType"], "application/pdf");
    assert_eq!(body["contents"][0]["parts"][1]["inlineData"]["data"], "JVBE");
    assert_eq!(body["generationConfig"]["maxOutputTokens"], 8192);
    assert_eq!(body["generationConfig"]["thinkingConfig"]["thinkingBudget"], 1024);
    assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
  }

  #[test]
  fn test_plain_config_omits_optional_fields() {
    let body = serde_json::to_value(GenerateContentRequest::from(&text_request())).unwrap();
    let config = body["generationConfig"].as_object().unwrap();
    assert_eq!(config.len(), 1);
    assert!(config.contains_key("temperature"));
  }

  #[test]
  fn test_sse_decoder_handles_split_chunks() {
    let mut decoder = SseDecoder::default();
    assert!(decoder.push(b"data: {\"a\":").is_empty());
    let events = decoder.push(b"1}\r\n\r\ndata: {\"b\":2}\n\n: comment\n");
    assert_eq!(events, vec!["{\"a\":1}".to_string(), "{\"b\":2}".to_string()]);

    decoder.push(b"data: {\"c\":3}");
    assert_eq!(decoder.finish(), Some("{\"c\":3}".to_string()));
  }

  #[test]
  fn test_extract_text_skips_thoughts() {
    let response: GenerateContentResponse = serde_json::from_str(
      r#"{"candidates":[{"content":{"parts":[
        {"text":"planning...","thought":true},{"text":"Hello "},{"text":"world"}]}}]}"#,
    )
    .unwrap();
    assert_eq!(extract_text(&response), Some("Hello world".to_string()));
  }

  #[tokio::test]
  async fn test_generate_returns_text() {
    let mut server = Server::new_async().await;
    let _mock = server
      .mock("POST", "/models/gemini-2.0-flash:generateContent")
      .match_header("x-goog-api-key", "test-key")
      .match_body(Matcher::PartialJson(serde_json::json!({
        "contents": [{"role": "user", "parts": [{"text": "Write about tides"}]}]
      })))
      .with_status(200)
      .with_header("content-type", "application/json")
      .with_body(r#"{"candidates":[{"content":{"parts":[{"text":"Tides are..."}]}}]}"#)
      .create_async()
      .await;

    let text = backend(&server).generate(&text_request()).await.unwrap();
    assert_eq!(text, "Tides are...");
  }

  #[tokio::test]
  async fn test_generate_maps_http_errors() {
    let mut server = Server::new_async().await;
    let _mock = server
      .mock("POST", "/models/gemini-2.0-flash:generateContent")
      .with_status(429)
      .with_body(
        r#"{"error":{"code":429,"message":"Quota exceeded","status":"RESOURCE_EXHAUSTED"}}"#,
      )
      .create_async()
      .await;

    let err = backend(&server).generate(&text_request()).await.unwrap_err();
    match err {
      RedactaError::Backend { status, message } => {
        assert_eq!(status, 429);
        assert_eq!(message, "RESOURCE_EXHAUSTED: Quota exceeded");
      }
      other => panic!("unexpected error: {other}"),
    }
  }

  #[tokio::test]
  async fn test_generate_reports_blocked_prompt() {
    let mut server = Server::new_async().await;
    let _mock = server
      .mock("POST", "/models/gemini-2.0-flash:generateContent")
      .with_status(200)
      .with_body(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#)
      .create_async()
      .await;

    let err = backend(&server).generate(&text_request()).await.unwrap_err();
    assert!(err.to_string().contains("SAFETY"));
  }

  #[tokio::test]
  async fn test_stream_delivers_fragments_in_order() {
    let mut server = Server::new_async().await;
    let body = concat!(
      "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"One \"}]}}]}\r\n\r\n",
      "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"two \"}]}}]}\r\n\r\n",
      "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"three\"}]},",
      "\"finishReason\":\"STOP\"}]}\r\n\r\n",
    );
    let _mock = server
      .mock("POST", "/models/gemini-2.0-flash:streamGenerateContent")
      .match_query(Matcher::UrlEncoded("alt".into(), "sse".into()))
      .with_status(200)
      .with_header("content-type", "text/event-stream")
      .with_body(body)
      .create_async()
      .await;

    let mut fragments = Vec::new();
    let text = backend(&server)
      .stream(&text_request(), &mut |fragment: &str| fragments.push(fragment.to_string()))
      .await
      .unwrap();

    assert_eq!(fragments, vec!["One ", "two ", "three"]);
    assert_eq!(text, "One two three");
  }

  #[tokio::test]
  async fn test_stream_without_text_is_an_error() {
    let mut server = Server::new_async().await;
    let _mock = server
      .mock("POST", "/models/gemini-2.0-flash:streamGenerateContent")
      .match_query(Matcher::Any)
      .with_status(200)
      .with_body("data: {\"candidates\":[]}\n\n")
      .create_async()
      .await;

    let result = backend(&server).stream(&text_request(), &mut |_: &str| {}).await;
    assert!(matches!(result, Err(RedactaError::MalformedResponse { .. })));
  }

  #[tokio::test]
  async fn test_unresponsive_backend_times_out() {
    let backend = GeminiBackend::new("test-key", &silent_server().await, 1).unwrap();

    let err = backend.generate(&text_request()).await.unwrap_err();
    assert!(matches!(err, RedactaError::Timeout { secs: 1 }), "generate: {err}");

    let err = backend.stream(&text_request(), &mut |_: &str| {}).await.unwrap_err();
    assert!(matches!(err, RedactaError::Timeout { secs: 1 }), "stream: {err}");
  }
}
