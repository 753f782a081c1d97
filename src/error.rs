//! Error taxonomy for exam content generation.
//!
//! - `InvalidExamTypeError` is recovered where exam types enter the system.
//! - `UnimplementedLevelError` is an expected, user-facing refusal.
//! - `ModelError` covers everything that can go wrong talking to the model.
//! - `ClientError` belongs to the stream consumer side.

use thiserror::Error;

use crate::domain::ExamType;

/// Raw exam type string that is not one of the known tags.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid exam type: {0}")]
pub struct InvalidExamTypeError(pub String);

/// A level exists in the catalogue but has no calibrated level handler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct UnimplementedLevelError {
  pub exam_type: ExamType,
  /// Display code of the refused level (e.g. "A2").
  pub code: String,
  /// User-facing message.
  pub message: String,
}

impl UnimplementedLevelError {
  pub fn new(exam_type: ExamType, code: &str, available: &[&str]) -> Self {
    let message = if available.is_empty() {
      format!("The {} {} level is not yet implemented.", exam_type.display_name(), code)
    } else {
      format!(
        "The {} {} level is not yet implemented. Please select {} level.",
        exam_type.display_name(),
        code,
        join_alternatives(available)
      )
    };
    Self { exam_type, code: code.to_string(), message }
  }
}

fn join_alternatives(items: &[&str]) -> String {
  match items {
    [] => String::new(),
    [only] => only.to_string(),
    [head @ .., last] => format!("{} or {}", head.join(", "), last),
  }
}

/// Failures of the language-model capability.
#[derive(Debug, Error)]
pub enum ModelError {
  #[error("model HTTP {status}: {message}")]
  Http { status: u16, message: String },

  #[error("model transport error: {0}")]
  Transport(#[from] reqwest::Error),

  #[error("model returned invalid JSON: {0}")]
  Json(#[from] serde_json::Error),

  #[error("model output does not match schema '{schema}': {reason}")]
  Schema { schema: String, reason: String },

  #[error("model produced no output")]
  Empty,

  #[error("model task ended before resolving a value")]
  Dropped,

  #[error("generation abandoned by its consumer")]
  Cancelled,

  #[error("{0}")]
  Other(String),
}

/// Failures while opening or reading a content stream from the client side.
#[derive(Debug, Error)]
pub enum ClientError {
  #[error("server responded with HTTP {0}")]
  Status(u16),

  #[error("transport error: {0}")]
  Transport(#[from] reqwest::Error),
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn unimplemented_message_lists_alternatives() {
    let e = UnimplementedLevelError::new(ExamType::Goethe, "A2", &["A1", "B2"]);
    assert_eq!(e.code, "A2");
    assert_eq!(
      e.to_string(),
      "The Goethe A2 level is not yet implemented. Please select A1 or B2 level."
    );
  }

  #[test]
  fn unimplemented_message_without_alternatives() {
    let e = UnimplementedLevelError::new(ExamType::Goethe, "C1", &[]);
    assert_eq!(e.message, "The Goethe C1 level is not yet implemented.");
  }

  #[test]
  fn alternatives_join_with_commas_then_or() {
    assert_eq!(join_alternatives(&["A1", "B1", "B2"]), "A1, B1 or B2");
  }
}
