//! Core behaviors shared by the SSE and JSON handlers.
//!
//! This includes:
//!   - The content stream: passage, then questions built from the finished
//!     passage text, relayed as `StreamEvent`s
//!   - Non-streaming generation of the same pair
//!
//! The stream task is the only writer of its `EventSink`. It stops at the
//! first terminal event, on timeout, or as soon as the receiving side is gone.

use std::time::Duration;

use futures::StreamExt;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};

use crate::config::StreamSettings;
use crate::domain::ExamType;
use crate::error::ModelError;
use crate::protocol::{GenerateOut, StreamEvent};
use crate::service::{ContentStream, Generated, GenerationService};

/// Outbound half of one content stream.
#[derive(Clone)]
pub struct EventSink {
  tx: mpsc::Sender<StreamEvent>,
}

impl EventSink {
  pub fn new(tx: mpsc::Sender<StreamEvent>) -> Self {
    Self { tx }
  }

  async fn emit(&self, event: StreamEvent) -> Result<(), StreamFailure> {
    self.tx.send(event).await.map_err(|_| StreamFailure::Disconnected)
  }

  async fn closed(&self) {
    self.tx.closed().await
  }
}

#[derive(Clone, Copy, Debug)]
pub struct StreamLimits {
  pub max_duration: Duration,
  pub idle_timeout: Duration,
}

impl From<&StreamSettings> for StreamLimits {
  fn from(s: &StreamSettings) -> Self {
    Self { max_duration: s.max_duration(), idle_timeout: s.idle_timeout() }
  }
}

#[derive(Clone, Debug)]
pub struct ContentRequest {
  pub exam_type: ExamType,
  pub difficulty: Option<String>,
}

/// How a content stream ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamOutcome {
  Completed,
  UnimplementedLevel,
  Failed,
  /// The receiver went away; nothing more was written.
  Aborted,
  TimedOut,
}

#[derive(Debug, Error)]
enum StreamFailure {
  #[error("client disconnected")]
  Disconnected,
  #[error(transparent)]
  Model(#[from] ModelError),
  #[error("no progress within {0:?}")]
  Timeout(Duration),
}

enum Stage {
  Done(Value),
  Unimplemented,
}

/// Run one passage + questions stream to its end. Always leaves the sink with
/// a terminal event unless the receiver disconnected.
#[instrument(level = "info", skip(service, sink, limits), fields(exam = %request.exam_type, difficulty = ?request.difficulty))]
pub async fn stream_content(
  service: &GenerationService,
  request: ContentRequest,
  limits: StreamLimits,
  sink: EventSink,
) -> StreamOutcome {
  let run = run_stages(service, &request, limits.idle_timeout, &sink);
  let result = match tokio::time::timeout(limits.max_duration, run).await {
    Ok(r) => r,
    Err(_) => Err(StreamFailure::Timeout(limits.max_duration)),
  };

  match result {
    Ok(outcome) => {
      info!(target: "generation", ?outcome, "Content stream finished");
      outcome
    }
    Err(StreamFailure::Disconnected) => {
      info!(target: "generation", "Client went away; generation abandoned");
      StreamOutcome::Aborted
    }
    Err(e) => {
      error!(target: "generation", error = %e, "Content stream failed");
      if sink.emit(StreamEvent::failure()).await.is_err() {
        debug!(target: "generation", "Failure event not delivered; client already gone");
      }
      match e {
        StreamFailure::Timeout(_) => StreamOutcome::TimedOut,
        _ => StreamOutcome::Failed,
      }
    }
  }
}

async fn run_stages(
  service: &GenerationService,
  request: &ContentRequest,
  idle: Duration,
  sink: &EventSink,
) -> Result<StreamOutcome, StreamFailure> {
  let exam = request.exam_type;
  let difficulty = request.difficulty.as_deref();

  sink.emit(StreamEvent::PassageStart).await?;
  let passage = match relay_stage(service.stream_passage(exam, difficulty), idle, sink, |passage| {
    StreamEvent::PassageUpdate { passage }
  })
  .await?
  {
    Stage::Done(p) => p,
    Stage::Unimplemented => return Ok(StreamOutcome::UnimplementedLevel),
  };
  sink.emit(StreamEvent::PassageComplete { passage: passage.clone() }).await?;

  let text = passage_text(&passage);
  sink.emit(StreamEvent::QuestionsStart).await?;
  let questions = match relay_stage(service.stream_questions(&text, exam, difficulty), idle, sink, |questions| {
    StreamEvent::QuestionsUpdate { questions }
  })
  .await?
  {
    Stage::Done(q) => q,
    Stage::Unimplemented => return Ok(StreamOutcome::UnimplementedLevel),
  };

  sink.emit(StreamEvent::Complete { passage: Some(passage), questions: Some(questions) }).await?;
  Ok(StreamOutcome::Completed)
}

/// Forward every partial of one stage, then check the final value on its own.
/// Returning early drops both halves of the stream, which tells the producer
/// to stop.
async fn relay_stage(
  stream: ContentStream,
  idle: Duration,
  sink: &EventSink,
  update: fn(Value) -> StreamEvent,
) -> Result<Stage, StreamFailure> {
  let ContentStream { mut items, object } = stream;
  let mut relayed = 0usize;

  loop {
    let next = tokio::select! {
      biased;
      _ = sink.closed() => return Err(StreamFailure::Disconnected),
      next = tokio::time::timeout(idle, items.next()) => next.map_err(|_| StreamFailure::Timeout(idle))?,
    };
    match next {
      None => break,
      Some(Generated::UnimplementedLevel(message)) => {
        sink.emit(StreamEvent::unimplemented_level(message)).await?;
        return Ok(Stage::Unimplemented);
      }
      Some(Generated::Value(v)) => {
        relayed += 1;
        sink.emit(update(v)).await?;
      }
    }
  }
  drop(items);

  let resolved = tokio::select! {
    biased;
    _ = sink.closed() => return Err(StreamFailure::Disconnected),
    r = tokio::time::timeout(idle, object) => r.map_err(|_| StreamFailure::Timeout(idle))??,
  };
  debug!(target: "generation", relayed, "Stage resolved");

  match resolved {
    Generated::UnimplementedLevel(message) => {
      sink.emit(StreamEvent::unimplemented_level(message)).await?;
      Ok(Stage::Unimplemented)
    }
    Generated::Value(v) => Ok(Stage::Done(v)),
  }
}

/// Text the questions are written against: `content`, or the joined section
/// bodies when a model left `content` out.
fn passage_text(passage: &Value) -> String {
  if let Some(content) = passage.get("content").and_then(Value::as_str) {
    return content.to_string();
  }
  passage
    .get("sections")
    .and_then(Value::as_array)
    .map(|sections| {
      sections
        .iter()
        .filter_map(|s| s.get("content").and_then(Value::as_str))
        .collect::<Vec<_>>()
        .join("\n\n")
    })
    .unwrap_or_default()
}

/// Result of the non-streaming generation.
#[derive(Debug)]
pub enum ReadingOutcome {
  Ready(GenerateOut),
  UnimplementedLevel(String),
}

#[instrument(level = "info", skip(service), fields(exam = %request.exam_type, difficulty = ?request.difficulty))]
pub async fn generate_reading(service: &GenerationService, request: ContentRequest) -> Result<ReadingOutcome, ModelError> {
  let exam = request.exam_type;
  let difficulty = request.difficulty.as_deref();
  let level = service.resolve_difficulty(exam, difficulty);

  let passage = match service.generate_passage(exam, Some(&level.id)).await? {
    Generated::Value(p) => p,
    Generated::UnimplementedLevel(message) => return Ok(ReadingOutcome::UnimplementedLevel(message)),
  };
  let questions = match service.generate_questions(&passage_text(&passage), exam, Some(&level.id)).await? {
    Generated::Value(q) => q,
    Generated::UnimplementedLevel(message) => {
      warn!(target: "generation", level = %level.id, "Questions refused after passage was generated");
      return Ok(ReadingOutcome::UnimplementedLevel(message));
    }
  };

  info!(target: "generation", level = %level.id, "Reading set generated");
  Ok(ReadingOutcome::Ready(GenerateOut { passage, questions, exam_type: exam, difficulty: level.id }))
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::Arc;

  use serde_json::json;

  use crate::exams::ExamHandlerFactory;
  use crate::model::scripted::{ScriptedModel, ScriptedReply};
  use crate::protocol::StreamErrorType;

  fn service(model: Arc<ScriptedModel>) -> GenerationService {
    GenerationService::new(Arc::new(ExamHandlerFactory::new(ExamType::Ielts)), model)
  }

  fn limits() -> StreamLimits {
    StreamLimits { max_duration: Duration::from_secs(5), idle_timeout: Duration::from_secs(5) }
  }

  fn request(exam: ExamType, difficulty: Option<&str>) -> ContentRequest {
    ContentRequest { exam_type: exam, difficulty: difficulty.map(str::to_string) }
  }

  fn tags(events: &[StreamEvent]) -> Vec<String> {
    events
      .iter()
      .map(|e| serde_json::to_value(e).unwrap()["type"].as_str().unwrap().to_string())
      .collect()
  }

  async fn drain(mut rx: mpsc::Receiver<StreamEvent>) -> Vec<StreamEvent> {
    let mut out = Vec::new();
    while let Some(ev) = rx.recv().await {
      out.push(ev);
    }
    out
  }

  fn passage_reply() -> ScriptedReply {
    ScriptedReply::ok(
      vec![json!({ "title": "Roofs" }), json!({ "title": "Roofs", "content": "Green roofs" })],
      json!({ "title": "Roofs", "content": "Green roofs cool cities." }),
    )
  }

  fn questions_reply() -> ScriptedReply {
    ScriptedReply::ok(
      vec![json!({ "questions": [{ "id": 1 }] })],
      json!({ "questions": [{ "id": 1, "text": "Q", "options": ["a", "b", "c", "d"], "correctAnswer": 0 }] }),
    )
  }

  #[tokio::test]
  async fn events_follow_the_stage_order() {
    let model = Arc::new(ScriptedModel::new(vec![passage_reply(), questions_reply()]));
    let svc = service(model.clone());
    let (tx, rx) = mpsc::channel(64);

    let outcome = stream_content(&svc, request(ExamType::Ielts, None), limits(), EventSink::new(tx)).await;
    assert_eq!(outcome, StreamOutcome::Completed);

    let events = drain(rx).await;
    assert_eq!(
      tags(&events),
      vec![
        "passage_start",
        "passage_update",
        "passage_update",
        "passage_complete",
        "questions_start",
        "questions_update",
        "complete"
      ]
    );
    match events.last().unwrap() {
      StreamEvent::Complete { passage, questions } => {
        assert_eq!(passage.as_ref().unwrap()["title"], "Roofs");
        assert_eq!(questions.as_ref().unwrap()["questions"].as_array().unwrap().len(), 1);
      }
      other => panic!("unexpected terminal event {other:?}"),
    }
    // Questions are written against the finished passage text.
    assert!(model.calls()[1].prompt.contains("Green roofs cool cities."));
  }

  #[tokio::test]
  async fn unimplemented_level_ends_with_one_error() {
    let model = Arc::new(ScriptedModel::default());
    let svc = service(model.clone());
    let (tx, rx) = mpsc::channel(64);

    let outcome = stream_content(&svc, request(ExamType::Goethe, Some("a2")), limits(), EventSink::new(tx)).await;
    assert_eq!(outcome, StreamOutcome::UnimplementedLevel);

    let events = drain(rx).await;
    assert_eq!(tags(&events), vec!["passage_start", "error"]);
    assert_eq!(
      events[1],
      StreamEvent::Error {
        error: "The Goethe A2 level is not yet implemented. Please select A1 or B2 level.".into(),
        error_type: Some(StreamErrorType::UnimplementedLevel),
      }
    );
    assert!(model.calls().is_empty());
  }

  #[tokio::test]
  async fn model_failure_becomes_generic_error() {
    let model = Arc::new(ScriptedModel::new(vec![
      passage_reply(),
      ScriptedReply::fail(vec![json!({ "questions": [] })], "upstream exploded"),
    ]));
    let svc = service(model);
    let (tx, rx) = mpsc::channel(64);

    let outcome = stream_content(&svc, request(ExamType::Ielts, None), limits(), EventSink::new(tx)).await;
    assert_eq!(outcome, StreamOutcome::Failed);

    let events = drain(rx).await;
    assert_eq!(events.last(), Some(&StreamEvent::failure()));
    assert!(!tags(&events).contains(&"complete".to_string()));
    // Progress made before the failure was still delivered.
    assert!(tags(&events).contains(&"passage_complete".to_string()));
  }

  #[tokio::test]
  async fn stalled_model_times_out() {
    let model = Arc::new(ScriptedModel::new(vec![passage_reply().with_delay(Duration::from_millis(500))]));
    let svc = service(model);
    let (tx, rx) = mpsc::channel(64);
    let limits = StreamLimits { max_duration: Duration::from_secs(5), idle_timeout: Duration::from_millis(50) };

    let outcome = stream_content(&svc, request(ExamType::Ielts, None), limits, EventSink::new(tx)).await;
    assert_eq!(outcome, StreamOutcome::TimedOut);
    let events = drain(rx).await;
    assert_eq!(tags(&events), vec!["passage_start", "error"]);
  }

  #[tokio::test]
  async fn dropped_receiver_stops_generation() {
    let many: Vec<Value> = (1..=20).map(|n| json!({ "questions": vec![json!({ "id": 1 }); n] })).collect();
    let model = Arc::new(ScriptedModel::new(vec![
      passage_reply(),
      ScriptedReply::ok(many, json!({ "questions": [] })).with_delay(Duration::from_millis(20)),
    ]));
    let svc = Arc::new(service(model.clone()));
    let (tx, mut rx) = mpsc::channel(64);

    let task = {
      let svc = svc.clone();
      tokio::spawn(async move { stream_content(&svc, request(ExamType::Ielts, None), limits(), EventSink::new(tx)).await })
    };

    while let Some(ev) = rx.recv().await {
      if matches!(ev, StreamEvent::QuestionsUpdate { .. }) {
        break;
      }
    }
    drop(rx);

    assert_eq!(task.await.unwrap(), StreamOutcome::Aborted);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(model.abandoned());
    // Two passage partials plus a handful of question partials at most.
    assert!(model.emitted() < 22);
  }

  #[tokio::test]
  async fn sentinel_in_final_value_alone_is_caught() {
    let (tx, mut rx) = mpsc::channel(8);
    let sink = EventSink::new(tx);
    let stream = ContentStream {
      items: futures::stream::empty().boxed(),
      object: Box::pin(async { Ok(Generated::UnimplementedLevel("not yet".into())) }),
    };

    let stage = relay_stage(stream, Duration::from_secs(1), &sink, |passage| StreamEvent::PassageUpdate { passage })
      .await
      .unwrap();
    assert!(matches!(stage, Stage::Unimplemented));
    assert_eq!(rx.recv().await, Some(StreamEvent::unimplemented_level("not yet".into())));
  }

  #[test]
  fn passage_text_falls_back_to_sections() {
    assert_eq!(passage_text(&json!({ "content": "body" })), "body");
    assert_eq!(
      passage_text(&json!({ "sections": [{ "content": "one" }, { "heading": "h", "content": "two" }] })),
      "one\n\ntwo"
    );
    assert_eq!(passage_text(&json!({})), "");
  }

  #[tokio::test]
  async fn non_streaming_generation_reports_resolved_level() {
    let model = Arc::new(ScriptedModel::new(vec![passage_reply(), questions_reply()]));
    let svc = service(model);
    let out = generate_reading(&svc, request(ExamType::Ielts, Some("nope"))).await.unwrap();
    match out {
      ReadingOutcome::Ready(g) => {
        assert_eq!(g.difficulty, "band-4-5");
        assert_eq!(g.exam_type, ExamType::Ielts);
        assert_eq!(g.passage["title"], "Roofs");
      }
      other => panic!("unexpected {other:?}"),
    }

    let svc = service(Arc::new(ScriptedModel::default()));
    let out = generate_reading(&svc, request(ExamType::Goethe, Some("c1"))).await.unwrap();
    assert!(matches!(out, ReadingOutcome::UnimplementedLevel(m) if m.contains("C1")));
  }
}
