//! Public protocol structs for the SSE stream and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{DifficultyDescriptor, ExamType};
use crate::exams::ExamTypeInfo;

/// Message used for every failure that is not an unimplemented level.
pub const GENERIC_FAILURE: &str = "Failed to generate content";

/// Frames of the content stream (`data: <json>\n\n`), discriminated by `type`.
///
/// Payloads stay as raw JSON: partial objects do not fit typed structs yet.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    PassageStart,
    PassageUpdate {
        passage: Value,
    },
    PassageComplete {
        passage: Value,
    },
    QuestionsStart,
    /// `questions` is the batch object, `{ "questions": [...] }`.
    QuestionsUpdate {
        questions: Value,
    },
    /// Understood by clients; the server goes straight to `Complete`.
    QuestionsComplete {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        questions: Option<Value>,
    },
    Complete {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        passage: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        questions: Option<Value>,
    },
    Error {
        error: String,
        #[serde(rename = "errorType", default, skip_serializing_if = "Option::is_none")]
        error_type: Option<StreamErrorType>,
    },
}

impl StreamEvent {
    pub fn failure() -> Self {
        StreamEvent::Error { error: GENERIC_FAILURE.into(), error_type: None }
    }

    pub fn unimplemented_level(message: String) -> Self {
        StreamEvent::Error { error: message, error_type: Some(StreamErrorType::UnimplementedLevel) }
    }

    /// `complete` and `error` end a stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Complete { .. } | StreamEvent::Error { .. })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamErrorType {
    UnimplementedLevel,
}

// --- HTTP DTOs ---

/// Query of `GET /api/v1/reading/content`; also the body of `POST /api/v1/reading/generate`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exam_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateOut {
    pub passage: Value,
    pub questions: Value,
    pub exam_type: ExamType,
    pub difficulty: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorOut {
    pub error: String,
    #[serde(rename = "errorType", default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<StreamErrorType>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamsOut {
    pub default_exam_type: ExamType,
    pub exam_types: Vec<ExamTypeInfo>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelsOut {
    pub exam_type: ExamType,
    pub default_level: String,
    pub levels: Vec<DifficultyDescriptor>,
}

#[derive(Debug, Serialize)]
pub struct HealthOut {
    pub ok: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn events_use_snake_case_type_tags() {
        assert_eq!(serde_json::to_value(StreamEvent::PassageStart).unwrap(), json!({ "type": "passage_start" }));
        assert_eq!(
            serde_json::to_value(StreamEvent::QuestionsUpdate { questions: json!({ "questions": [] }) }).unwrap(),
            json!({ "type": "questions_update", "questions": { "questions": [] } })
        );
    }

    #[test]
    fn error_type_is_camel_case_and_optional() {
        let v = serde_json::to_value(StreamEvent::unimplemented_level("nope".into())).unwrap();
        assert_eq!(v, json!({ "type": "error", "error": "nope", "errorType": "unimplemented_level" }));
        let v = serde_json::to_value(StreamEvent::failure()).unwrap();
        assert_eq!(v, json!({ "type": "error", "error": "Failed to generate content" }));
    }

    #[test]
    fn complete_without_payloads_parses() {
        let ev: StreamEvent = serde_json::from_str(r#"{"type":"complete"}"#).unwrap();
        assert_eq!(ev, StreamEvent::Complete { passage: None, questions: None });
        assert!(ev.is_terminal());
        assert!(serde_json::from_str::<StreamEvent>(r#"{"type":"mystery"}"#).is_err());
    }
}
