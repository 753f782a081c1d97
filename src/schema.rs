//! Output schemas handed to the model together with a prompt.
//!
//! An `OutputSchema` carries the JSON Schema shown to the model and a validator
//! that checks the final value. Schemas are derived from typed structs with
//! `schemars`, validation deserializes into the same struct and then applies
//! the constraints serde cannot express (option count, answer range, minimum
//! question count).

use schemars::JsonSchema;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::domain::ExamType;

/// Which of the two generation stages a schema belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaKind {
  Passage,
  Questions,
}

#[derive(Clone, Debug)]
pub struct OutputSchema {
  pub name: String,
  pub exam_type: ExamType,
  pub kind: SchemaKind,
  pub json_schema: Value,
  validate: fn(&Value) -> Result<(), String>,
}

impl OutputSchema {
  pub fn of<T>(name: &str, exam_type: ExamType, kind: SchemaKind) -> Self
  where
    T: JsonSchema + DeserializeOwned + Constrained,
  {
    let json_schema = serde_json::to_value(schemars::schema_for!(T)).unwrap_or_default();
    Self { name: name.to_string(), exam_type, kind, json_schema, validate: check::<T> }
  }

  /// Check a final model value against this schema.
  pub fn validate(&self, value: &Value) -> Result<(), String> {
    (self.validate)(value)
  }
}

fn check<T: DeserializeOwned + Constrained>(value: &Value) -> Result<(), String> {
  let parsed = T::deserialize(value).map_err(|e| e.to_string())?;
  parsed.check()
}

/// Constraints checked after a value deserialized successfully.
pub trait Constrained {
  fn check(&self) -> Result<(), String>;
}

/// Access to the answer key of a question struct.
pub trait AnswerKey {
  fn options(&self) -> &[String];
  fn correct_answer(&self) -> u8;
}

pub const OPTIONS_PER_QUESTION: usize = 4;

pub fn check_passage(title: &str, content: &str) -> Result<(), String> {
  if title.trim().is_empty() {
    return Err("passage title is empty".into());
  }
  if content.trim().is_empty() {
    return Err("passage content is empty".into());
  }
  Ok(())
}

pub fn check_questions<Q: AnswerKey>(questions: &[Q], min: usize) -> Result<(), String> {
  if questions.len() < min {
    return Err(format!("expected at least {} questions, got {}", min, questions.len()));
  }
  for (i, q) in questions.iter().enumerate() {
    if q.options().len() != OPTIONS_PER_QUESTION {
      return Err(format!(
        "question {} has {} options, expected {}",
        i + 1,
        q.options().len(),
        OPTIONS_PER_QUESTION
      ));
    }
    if usize::from(q.correct_answer()) >= OPTIONS_PER_QUESTION {
      return Err(format!("question {} has correctAnswer {} outside 0..=3", i + 1, q.correct_answer()));
    }
  }
  Ok(())
}

// ---------------------------------------------------------------------------
// Pieces shared by several exam schemas
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
pub struct Section {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub heading: Option<String>,
  pub content: String,
}

/// Generic passage used by exam types without level granularity.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
pub struct BasePassage {
  pub title: String,
  pub content: String,
}

impl Constrained for BasePassage {
  fn check(&self) -> Result<(), String> {
    check_passage(&self.title, &self.content)
  }
}

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BaseQuestion {
  pub id: u32,
  pub text: String,
  #[schemars(length(equal = 4))]
  pub options: Vec<String>,
  #[schemars(range(min = 0, max = 3))]
  pub correct_answer: u8,
}

impl AnswerKey for BaseQuestion {
  fn options(&self) -> &[String] { &self.options }
  fn correct_answer(&self) -> u8 { self.correct_answer }
}

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
pub struct BaseQuestions {
  #[schemars(length(min = 3))]
  pub questions: Vec<BaseQuestion>,
}

impl Constrained for BaseQuestions {
  fn check(&self) -> Result<(), String> {
    check_questions(&self.questions, 3)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn base_questions() -> OutputSchema {
    OutputSchema::of::<BaseQuestions>("base.questions", ExamType::Ielts, SchemaKind::Questions)
  }

  fn question(id: u32, correct: u8) -> Value {
    json!({ "id": id, "text": "Q?", "options": ["a", "b", "c", "d"], "correctAnswer": correct })
  }

  #[test]
  fn json_schema_mentions_camel_case_fields() {
    let schema = base_questions();
    let text = schema.json_schema.to_string();
    assert!(text.contains("correctAnswer"));
    assert!(text.contains("questions"));
  }

  #[test]
  fn accepts_well_formed_batch() {
    let v = json!({ "questions": [question(1, 0), question(2, 3), question(3, 1)] });
    assert_eq!(base_questions().validate(&v), Ok(()));
  }

  #[test]
  fn rejects_short_batch() {
    let v = json!({ "questions": [question(1, 0), question(2, 1)] });
    let err = base_questions().validate(&v).unwrap_err();
    assert!(err.contains("at least 3"), "{err}");
  }

  #[test]
  fn rejects_answer_out_of_range() {
    let v = json!({ "questions": [question(1, 0), question(2, 4), question(3, 1)] });
    let err = base_questions().validate(&v).unwrap_err();
    assert!(err.contains("question 2"), "{err}");
  }

  #[test]
  fn rejects_wrong_option_count() {
    let v = json!({ "questions": [
      question(1, 0),
      { "id": 2, "text": "Q?", "options": ["a", "b", "c"], "correctAnswer": 0 },
      question(3, 1)
    ] });
    assert!(base_questions().validate(&v).is_err());
  }

  #[test]
  fn rejects_missing_fields_and_empty_passage() {
    let passage = OutputSchema::of::<BasePassage>("base.passage", ExamType::Ielts, SchemaKind::Passage);
    assert!(passage.validate(&json!({ "title": "Only a title" })).is_err());
    assert!(passage.validate(&json!({ "title": " ", "content": "text" })).is_err());
    assert_eq!(passage.validate(&json!({ "title": "T", "content": "text" })), Ok(()));
  }
}
