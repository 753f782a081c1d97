//! Domain models: exam types, difficulty descriptors and the lenient question view.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::InvalidExamTypeError;

/// Top-level exam family. Determines target language and prompt family.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ExamType {
  Ielts,
  Goethe,
}

impl ExamType {
  pub const ALL: [ExamType; 2] = [ExamType::Ielts, ExamType::Goethe];

  /// Wire tag (`ielts`, `goethe`).
  pub fn as_str(&self) -> &'static str {
    match self {
      ExamType::Ielts => "ielts",
      ExamType::Goethe => "goethe",
    }
  }

  pub fn display_name(&self) -> &'static str {
    match self {
      ExamType::Ielts => "IELTS",
      ExamType::Goethe => "Goethe",
    }
  }

  pub fn description(&self) -> &'static str {
    match self {
      ExamType::Ielts => "International English Language Testing System",
      ExamType::Goethe => "German language proficiency examination",
    }
  }

  pub fn language(&self) -> Language {
    match self {
      ExamType::Ielts => Language { code: "en", name: "English", flag: "🇬🇧" },
      ExamType::Goethe => Language { code: "de", name: "German", flag: "🇩🇪" },
    }
  }
}

impl fmt::Display for ExamType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for ExamType {
  type Err = InvalidExamTypeError;

  fn from_str(raw: &str) -> Result<Self, Self::Err> {
    ExamType::ALL
      .into_iter()
      .find(|t| t.as_str() == raw)
      .ok_or_else(|| InvalidExamTypeError(raw.to_string()))
  }
}

/// Target language of an exam type.
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
pub struct Language {
  pub code: &'static str,
  pub name: &'static str,
  pub flag: &'static str,
}

/// Exam-specific calibration data of a level.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum LevelDetails {
  Ielts { band: f32, descriptor: String },
  Goethe { cefr: String, certificate: String },
}

/// One entry of an exam type's difficulty catalogue.
/// Statically defined at startup; `is_implemented` is recomputed on read.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DifficultyDescriptor {
  pub id: String,
  pub name: String,
  pub description: String,
  /// Total order within one exam type. Lowest rank is the default.
  pub rank: u8,
  #[serde(flatten)]
  pub details: LevelDetails,
  #[serde(default = "default_true")]
  pub is_implemented: bool,
}

fn default_true() -> bool { true }

impl DifficultyDescriptor {
  pub fn ielts(id: &str, name: &str, description: &str, rank: u8, band: f32, descriptor: &str) -> Self {
    Self {
      id: id.into(),
      name: name.into(),
      description: description.into(),
      rank,
      details: LevelDetails::Ielts { band, descriptor: descriptor.into() },
      is_implemented: true,
    }
  }

  pub fn goethe(id: &str, description: &str, rank: u8, cefr: &str, certificate: &str) -> Self {
    Self {
      id: id.into(),
      name: cefr.into(),
      description: description.into(),
      rank,
      details: LevelDetails::Goethe { cefr: cefr.into(), certificate: certificate.into() },
      is_implemented: true,
    }
  }

  /// Key used by level registries: the CEFR code for Goethe, the band id for IELTS.
  pub fn registry_key(&self) -> &str {
    match &self.details {
      LevelDetails::Goethe { cefr, .. } => cefr,
      LevelDetails::Ielts { .. } => &self.id,
    }
  }

  /// Code shown to users when talking about this level ("A2", "Band 5-6").
  pub fn display_code(&self) -> &str {
    match &self.details {
      LevelDetails::Goethe { cefr, .. } => cefr,
      LevelDetails::Ielts { .. } => &self.name,
    }
  }

  pub fn band(&self) -> Option<f32> {
    match self.details {
      LevelDetails::Ielts { band, .. } => Some(band),
      LevelDetails::Goethe { .. } => None,
    }
  }

  pub fn cefr(&self) -> Option<&str> {
    match &self.details {
      LevelDetails::Goethe { cefr, .. } => Some(cefr),
      LevelDetails::Ielts { .. } => None,
    }
  }
}

/// Question as seen by consumers of the stream.
///
/// Every field tolerates absence because questions arrive half-built while
/// the model is still writing them.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Question {
  pub id: u32,
  pub text: String,
  pub options: Vec<String>,
  pub correct_answer: Option<u8>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub explanation: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub context: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub question_type: Option<String>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn exam_type_parses_known_tags_only() {
    assert_eq!("ielts".parse::<ExamType>(), Ok(ExamType::Ielts));
    assert_eq!("goethe".parse::<ExamType>(), Ok(ExamType::Goethe));
    assert_eq!(
      "klingon".parse::<ExamType>(),
      Err(InvalidExamTypeError("klingon".into()))
    );
  }

  #[test]
  fn descriptor_serializes_flat_with_camel_case() {
    let d = DifficultyDescriptor::goethe("a1", "basic", 1, "A1", "Goethe-Zertifikat A1: Start Deutsch 1");
    let v = serde_json::to_value(&d).unwrap();
    assert_eq!(v["cefr"], "A1");
    assert_eq!(v["certificate"], "Goethe-Zertifikat A1: Start Deutsch 1");
    assert_eq!(v["isImplemented"], true);
    assert!(v.get("details").is_none());

    let back: DifficultyDescriptor = serde_json::from_value(v).unwrap();
    assert_eq!(back, d);
  }

  #[test]
  fn registry_key_differs_per_exam() {
    let band = DifficultyDescriptor::ielts("band-7-8", "Band 7-8", "good", 4, 7.5, "Good User");
    let cefr = DifficultyDescriptor::goethe("b2", "fluent", 4, "B2", "Goethe-Zertifikat B2");
    assert_eq!(band.registry_key(), "band-7-8");
    assert_eq!(band.display_code(), "Band 7-8");
    assert_eq!(cefr.registry_key(), "B2");
    assert_eq!(band.band(), Some(7.5));
    assert_eq!(cefr.cefr(), Some("B2"));
  }

  #[test]
  fn partial_question_parses_with_missing_fields() {
    let q: Question = serde_json::from_value(serde_json::json!({
      "id": 2, "text": "What is", "options": ["a", "b"]
    }))
    .unwrap();
    assert_eq!(q.id, 2);
    assert_eq!(q.options.len(), 2);
    assert_eq!(q.correct_answer, None);
  }
}
