//! OpenAI chat-completions client, streaming JSON objects.
//!
//! We request `response_format: json_object` with `stream: true`; the system
//! prompt embeds the JSON Schema of the expected value. Text deltas are fed to
//! a `PartialTracker`, so consumers see growing objects while the model writes.
//! The complete text is parsed strictly and validated against the schema.
//!
//! NOTE: We never log the API key, and model output only appears in logs truncated.

use std::{sync::Arc, time::Duration, time::Instant};

use futures::StreamExt;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};

use super::{object_channel, partial_json::PartialTracker, validate_final, ObjectModel, ObjectSink, ObjectStream};
use crate::config::{ModelSettings, Prompts};
use crate::error::ModelError;
use crate::schema::OutputSchema;
use crate::sse::SseDecoder;
use crate::util::{fill_template, trunc_for_log};

#[derive(Clone)]
pub struct OpenAiModel {
  client: reqwest::Client,
  api_key: String,
  pub base_url: String,
  pub model: String,
  temperature: f32,
  system_template: String,
}

impl OpenAiModel {
  /// Construct the client if we find OPENAI_API_KEY; otherwise return None.
  pub fn from_env(settings: &ModelSettings, prompts: &Prompts) -> Option<Self> {
    let api_key = std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.trim().is_empty())?;
    Self::new(settings, prompts, api_key)
  }

  pub fn new(settings: &ModelSettings, prompts: &Prompts, api_key: String) -> Option<Self> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(settings.request_timeout_secs))
      .build()
      .ok()?;
    Some(Self {
      client,
      api_key,
      base_url: settings.base_url.trim_end_matches('/').to_string(),
      model: settings.model.clone(),
      temperature: settings.temperature,
      system_template: prompts.system_template.clone(),
    })
  }

  async fn run(self, schema: Arc<OutputSchema>, prompt: String, sink: ObjectSink) {
    let result = self.stream_completion(&schema, &prompt, &sink).await;
    if let Err(e) = &result {
      if matches!(e, ModelError::Cancelled) {
        return;
      }
      error!(target: "generation", schema = %schema.name, error = %e, "OpenAI streaming generation failed");
    }
    sink.finish(result);
  }

  #[instrument(
    level = "info",
    skip(self, schema, prompt, sink),
    fields(model = %self.model, schema = %schema.name, prompt_len = prompt.len())
  )]
  async fn stream_completion(
    &self,
    schema: &OutputSchema,
    prompt: &str,
    sink: &ObjectSink,
  ) -> Result<Value, ModelError> {
    let url = format!("{}/chat/completions", self.base_url);
    let schema_text = serde_json::to_string_pretty(&schema.json_schema)?;
    let system = fill_template(&self.system_template, &[("schema", schema_text.as_str())]);
    let req = ChatCompletionRequest {
      model: self.model.clone(),
      messages: vec![
        ChatMessageReq { role: "system".into(), content: system },
        ChatMessageReq { role: "user".into(), content: prompt.to_string() },
      ],
      temperature: self.temperature,
      response_format: Some(ResponseFormat { r#type: "json_object".into() }),
      stream: true,
      stream_options: Some(StreamOptions { include_usage: true }),
    };

    let start = Instant::now();
    let res = self.client.post(&url)
      .header(USER_AGENT, "examcraft-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req).send().await?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let message = extract_openai_error(&body).unwrap_or_else(|| trunc_for_log(&body, 300));
      return Err(ModelError::Http { status: status.as_u16(), message });
    }

    let mut body = res.bytes_stream();
    let mut decoder = SseDecoder::default();
    let mut tracker = PartialTracker::default();
    let mut partials = 0usize;
    let mut done = false;

    while !done {
      let Some(chunk) = body.next().await else { break };
      let chunk = chunk?;
      let mut frames = decoder.push(&chunk);
      if frames.is_empty() && sink.is_cancelled() {
        return Err(ModelError::Cancelled);
      }
      for data in frames.drain(..) {
        match self.apply_frame(&data, &mut tracker, sink)? {
          Frame::Continue(n) => partials += n,
          Frame::Done => {
            done = true;
            break;
          }
        }
      }
    }
    if let Some(data) = decoder.finish() {
      self.apply_frame(&data, &mut tracker, sink)?;
    }

    let value = tracker.finish().map_err(|e| {
      warn!(target: "generation", preview = %trunc_for_log(tracker.text(), 200), "Model output is not valid JSON");
      e
    })?;
    let value = validate_final(schema, value)?;
    info!(
      target: "generation",
      elapsed_ms = start.elapsed().as_millis() as u64,
      partials,
      bytes = tracker.text().len(),
      "OpenAI object stream complete"
    );
    Ok(value)
  }

  /// Handle one SSE data payload. Partials go to the sink as they appear.
  fn apply_frame(&self, data: &str, tracker: &mut PartialTracker, sink: &ObjectSink) -> Result<Frame, ModelError> {
    if data.trim() == "[DONE]" {
      return Ok(Frame::Done);
    }
    let chunk: ChatChunk = match serde_json::from_str(data) {
      Ok(c) => c,
      Err(e) => {
        debug!(target: "generation", error = %e, frame = %trunc_for_log(data, 120), "Skipping unparsable stream frame");
        return Ok(Frame::Continue(0));
      }
    };
    if let Some(err) = chunk.error {
      return Err(ModelError::Http { status: 200, message: err.message });
    }
    if let Some(usage) = &chunk.usage {
      info!(prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "OpenAI usage");
    }
    let mut emitted = 0;
    for choice in chunk.choices {
      let Some(delta) = choice.delta.content else { continue };
      if let Some(partial) = tracker.push(&delta) {
        if !sink.partial(partial) {
          info!(target: "generation", "Consumer went away; dropping OpenAI stream");
          return Err(ModelError::Cancelled);
        }
        emitted += 1;
      }
    }
    Ok(Frame::Continue(emitted))
  }
}

enum Frame {
  Continue(usize),
  Done,
}

impl ObjectModel for OpenAiModel {
  fn name(&self) -> &str {
    &self.model
  }

  fn stream_object(&self, schema: Arc<OutputSchema>, prompt: String) -> ObjectStream {
    let (sink, stream) = object_channel();
    tokio::spawn(self.clone().run(schema, prompt, sink));
    stream
  }
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  response_format: Option<ResponseFormat>,
  stream: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  stream_options: Option<StreamOptions>,
}
#[derive(Serialize)]
struct ChatMessageReq { role: String, content: String }
#[derive(Serialize)]
struct ResponseFormat { #[serde(rename = "type")] r#type: String }
#[derive(Serialize)]
struct StreamOptions { include_usage: bool }

#[derive(Deserialize)]
struct ChatChunk {
  #[serde(default)] choices: Vec<ChunkChoice>,
  #[serde(default)] usage: Option<Usage>,
  #[serde(default)] error: Option<EObj>,
}
#[derive(Deserialize)]
struct ChunkChoice { #[serde(default)] delta: ChunkDelta }
#[derive(Deserialize, Default)]
struct ChunkDelta { #[serde(default)] content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}
#[derive(Deserialize)]
struct EObj { message: String }

/// Try to extract a clean error message from OpenAI error body.
fn extract_openai_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  match serde_json::from_str::<EWrap>(body) {
    Ok(w) => Some(w.error.message),
    Err(_) => None,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use axum::{
    http::{header, StatusCode},
    response::IntoResponse,
    routing::post,
    Router,
  };
  use serde_json::json;
  use tokio::net::TcpListener;

  fn delta_frame(text: &str) -> String {
    format!("data: {}\n\n", json!({ "choices": [{ "delta": { "content": text } }] }))
  }

  async fn serve(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
    format!("http://{addr}")
  }

  fn model(base_url: String) -> OpenAiModel {
    let settings = ModelSettings { base_url, ..ModelSettings::default() };
    OpenAiModel::new(&settings, &Prompts::default(), "test-key".into()).unwrap()
  }

  fn passage_schema() -> Arc<OutputSchema> {
    Arc::new(crate::exams::goethe::passage_schema())
  }

  #[tokio::test]
  async fn streams_partials_and_validates_final_value() {
    let mut body = String::from(": keep-alive\n\n");
    for piece in [r#"{"title": "Ein "#, r#"Tag", "#, r#""content": "Ich wohne"#, r#" in Köln."}"#] {
      body.push_str(&delta_frame(piece));
    }
    body.push_str("data: {\"choices\": [], \"usage\": {\"total_tokens\": 42}}\n\n");
    body.push_str("data: [DONE]\n\n");
    let router = Router::new().route(
      "/chat/completions",
      post(move || async move { ([(header::CONTENT_TYPE, "text/event-stream")], body) }),
    );
    let m = model(serve(router).await);

    let stream = m.stream_object(passage_schema(), "Write.".into());
    let partials: Vec<Value> = stream.partials.collect().await;
    assert_eq!(partials.first(), Some(&json!({ "title": "Ein " })));
    assert!(partials.len() >= 3);
    let value = stream.object.await.unwrap();
    assert_eq!(value, json!({ "title": "Ein Tag", "content": "Ich wohne in Köln." }));
  }

  #[tokio::test]
  async fn provider_error_surfaces_status_and_message() {
    let router = Router::new().route(
      "/chat/completions",
      post(|| async {
        (StatusCode::UNAUTHORIZED, axum::Json(json!({ "error": { "message": "Incorrect API key" } }))).into_response()
      }),
    );
    let m = model(serve(router).await);
    let err = m.stream_object(passage_schema(), "Write.".into()).into_object().await.unwrap_err();
    match err {
      ModelError::Http { status, message } => {
        assert_eq!(status, 401);
        assert_eq!(message, "Incorrect API key");
      }
      other => panic!("unexpected error: {other:?}"),
    }
  }

  #[tokio::test]
  async fn schema_mismatch_is_an_error() {
    let body = format!("{}data: [DONE]\n\n", delta_frame(r#"{"title": "Nur ein Titel"}"#));
    let router = Router::new().route(
      "/chat/completions",
      post(move || async move { ([(header::CONTENT_TYPE, "text/event-stream")], body) }),
    );
    let m = model(serve(router).await);
    let err = m.stream_object(passage_schema(), "Write.".into()).into_object().await.unwrap_err();
    assert!(matches!(err, ModelError::Schema { .. }), "{err:?}");
  }

  #[test]
  fn extracts_error_message() {
    assert_eq!(extract_openai_error(r#"{"error":{"message":"quota"}}"#), Some("quota".into()));
    assert_eq!(extract_openai_error("gateway timeout"), None);
  }
}
