//! Generation service: exam type + level id in, incremental content out.
//!
//! Resolves the exam handler and difficulty, asks it for a prompt and schema,
//! and hands both to the model. An unimplemented level never reaches the model:
//! it becomes a single `Generated::UnimplementedLevel` item, and the final value
//! resolves to the same sentinel, so downstream code switches on a variant
//! instead of catching an error.

use std::sync::Arc;

use futures::{future::BoxFuture, stream::BoxStream, FutureExt, StreamExt};
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::domain::{DifficultyDescriptor, ExamType};
use crate::error::{ModelError, UnimplementedLevelError};
use crate::exams::{ExamHandler, ExamHandlerFactory, ExamTypeInfo};
use crate::model::{ObjectModel, ObjectStream};

/// One element of a content stream.
#[derive(Clone, Debug, PartialEq)]
pub enum Generated {
  Value(Value),
  /// The requested level has no calibrated handler; carries the user-facing message.
  UnimplementedLevel(String),
}

pub struct ContentStream {
  pub items: BoxStream<'static, Generated>,
  pub object: BoxFuture<'static, Result<Generated, ModelError>>,
}

impl ContentStream {
  fn from_model(stream: ObjectStream) -> Self {
    Self {
      items: stream.partials.map(Generated::Value).boxed(),
      object: stream.object.map(|r| r.map(Generated::Value)).boxed(),
    }
  }

  fn unimplemented(err: UnimplementedLevelError) -> Self {
    let message = err.message;
    Self {
      items: futures::stream::iter([Generated::UnimplementedLevel(message.clone())]).boxed(),
      object: futures::future::ready(Ok(Generated::UnimplementedLevel(message))).boxed(),
    }
  }

  /// Skip the partials and wait for the final value.
  pub async fn into_object(self) -> Result<Generated, ModelError> {
    drop(self.items);
    self.object.await
  }
}

pub struct GenerationService {
  factory: Arc<ExamHandlerFactory>,
  model: Arc<dyn ObjectModel>,
}

impl GenerationService {
  pub fn new(factory: Arc<ExamHandlerFactory>, model: Arc<dyn ObjectModel>) -> Self {
    Self { factory, model }
  }

  pub fn factory(&self) -> &ExamHandlerFactory {
    &self.factory
  }

  pub fn model_name(&self) -> &str {
    self.model.name()
  }

  pub fn exam_types(&self) -> Vec<ExamTypeInfo> {
    self.factory.list_exam_types()
  }

  /// Catalogue of an exam type with implementation flags, plus its default level.
  pub fn difficulty_levels(&self, exam: ExamType) -> (Vec<DifficultyDescriptor>, DifficultyDescriptor) {
    let handler = self.factory.get_handler(exam);
    (handler.difficulty_levels(), handler.default_difficulty().clone())
  }

  /// Unknown or missing ids resolve to the exam's default level.
  pub fn resolve_difficulty(&self, exam: ExamType, difficulty: Option<&str>) -> DifficultyDescriptor {
    self.factory.get_handler(exam).resolve_difficulty(difficulty).clone()
  }

  #[instrument(level = "info", skip(self), fields(model = %self.model.name()))]
  pub fn stream_passage(&self, exam: ExamType, difficulty: Option<&str>) -> ContentStream {
    let handler = self.factory.get_handler(exam);
    let level = resolve_logged(&handler, difficulty);
    match handler.passage_prompt(level) {
      Ok(prompt) => {
        let schema = handler.passage_schema(level);
        info!(target: "generation", %exam, level = %level.id, schema = %schema.name, prompt_len = prompt.len(), "Streaming passage");
        ContentStream::from_model(self.model.stream_object(schema, prompt))
      }
      Err(e) => {
        warn!(target: "generation", %exam, level = %level.id, code = %e.code, "Passage requested for unimplemented level");
        ContentStream::unimplemented(e)
      }
    }
  }

  #[instrument(level = "info", skip(self, passage_text), fields(model = %self.model.name(), passage_len = passage_text.len()))]
  pub fn stream_questions(&self, passage_text: &str, exam: ExamType, difficulty: Option<&str>) -> ContentStream {
    let handler = self.factory.get_handler(exam);
    let level = resolve_logged(&handler, difficulty);
    match handler.questions_prompt(level, passage_text) {
      Ok(prompt) => {
        let schema = handler.questions_schema(level);
        info!(target: "generation", %exam, level = %level.id, schema = %schema.name, prompt_len = prompt.len(), "Streaming questions");
        ContentStream::from_model(self.model.stream_object(schema, prompt))
      }
      Err(e) => {
        warn!(target: "generation", %exam, level = %level.id, code = %e.code, "Questions requested for unimplemented level");
        ContentStream::unimplemented(e)
      }
    }
  }

  pub async fn generate_passage(&self, exam: ExamType, difficulty: Option<&str>) -> Result<Generated, ModelError> {
    self.stream_passage(exam, difficulty).into_object().await
  }

  pub async fn generate_questions(
    &self,
    passage_text: &str,
    exam: ExamType,
    difficulty: Option<&str>,
  ) -> Result<Generated, ModelError> {
    self.stream_questions(passage_text, exam, difficulty).into_object().await
  }
}

fn resolve_logged<'a>(handler: &'a ExamHandler, difficulty: Option<&str>) -> &'a DifficultyDescriptor {
  let level = handler.resolve_difficulty(difficulty);
  if let Some(id) = difficulty {
    if id != level.id {
      warn!(target: "generation", requested = %id, using = %level.id, "Unknown difficulty id; using default");
    }
  }
  level
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::scripted::{ScriptedModel, ScriptedReply};
  use serde_json::json;

  fn service(model: Arc<ScriptedModel>) -> GenerationService {
    GenerationService::new(Arc::new(ExamHandlerFactory::new(ExamType::Ielts)), model)
  }

  #[tokio::test]
  async fn unimplemented_level_yields_single_sentinel() {
    let model = Arc::new(ScriptedModel::default());
    let svc = service(model.clone());
    let ContentStream { items, object } = svc.stream_passage(ExamType::Goethe, Some("a2"));
    let items: Vec<Generated> = items.collect().await;
    let expected = Generated::UnimplementedLevel(
      "The Goethe A2 level is not yet implemented. Please select A1 or B2 level.".into(),
    );
    assert_eq!(items, vec![expected.clone()]);
    assert_eq!(object.await.unwrap(), expected);
    assert!(model.calls().is_empty());
  }

  #[tokio::test]
  async fn unknown_difficulty_uses_default_level() {
    let model = Arc::new(ScriptedModel::new(vec![ScriptedReply::ok(vec![], json!({ "title": "T", "content": "C" }))]));
    let svc = service(model.clone());
    let out = svc.generate_passage(ExamType::Ielts, Some("band-99")).await.unwrap();
    assert_eq!(out, Generated::Value(json!({ "title": "T", "content": "C" })));
    let calls = model.calls();
    assert_eq!(calls[0].schema, "ielts.passage");
    assert!(calls[0].prompt.contains("Band 4.5 level"));
  }

  #[tokio::test]
  async fn partials_pass_through_in_order() {
    let model = Arc::new(ScriptedModel::new(vec![ScriptedReply::ok(
      vec![json!({ "title": "T" }), json!({ "title": "T", "content": "C" })],
      json!({ "title": "T", "content": "C" }),
    )]));
    let svc = service(model);
    let ContentStream { items, object } = svc.stream_passage(ExamType::Goethe, Some("a1"));
    let items: Vec<Generated> = items.collect().await;
    assert_eq!(items.len(), 2);
    assert_eq!(items[0], Generated::Value(json!({ "title": "T" })));
    assert!(matches!(object.await, Ok(Generated::Value(_))));
  }

  #[tokio::test]
  async fn questions_prompt_carries_passage_and_level_schema() {
    let model = Arc::new(ScriptedModel::new(vec![ScriptedReply::ok(vec![], json!({ "questions": [] }))]));
    let svc = service(model.clone());
    svc.generate_questions("Der Text.", ExamType::Goethe, Some("b2")).await.unwrap();
    let calls = model.calls();
    assert_eq!(calls[0].schema, "goethe.b2.questions");
    assert!(calls[0].prompt.contains("Passage:\nDer Text.\n"));
  }

  #[tokio::test]
  async fn model_errors_propagate() {
    let model = Arc::new(ScriptedModel::new(vec![ScriptedReply::fail(vec![], "provider down")]));
    let svc = service(model);
    let err = svc.generate_passage(ExamType::Ielts, None).await.unwrap_err();
    assert_eq!(err.to_string(), "provider down");
  }
}
