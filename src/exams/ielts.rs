//! IELTS Academic reading: band catalogue, prompts, schemas and the band 7-8 handler.
//!
//! Bands without a level handler fall back to the IELTS exam-wide prompt,
//! which already carries the academic reading requirements.

use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{catalogue, prompts, ExamHandler, ExamPrompts, LevelHandler, LevelRegistry, MissingLevel};
use crate::domain::{DifficultyDescriptor, ExamType};
use crate::schema::{check_passage, check_questions, AnswerKey, Constrained, OutputSchema, SchemaKind, Section};

// ---------------------------------------------------------------------------
// Schemas
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
pub struct VocabularyNote {
  pub term: String,
  pub definition: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub example: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IeltsPassage {
  pub title: String,
  pub content: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub sections: Option<Vec<Section>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub vocabulary_notes: Option<Vec<VocabularyNote>>,
}

impl Constrained for IeltsPassage {
  fn check(&self) -> Result<(), String> {
    check_passage(&self.title, &self.content)
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum IeltsQuestionType {
  MultipleChoice,
  TrueFalseNotgiven,
  Matching,
  Completion,
}

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IeltsQuestion {
  pub id: u32,
  pub text: String,
  #[schemars(length(equal = 4))]
  pub options: Vec<String>,
  #[schemars(range(min = 0, max = 3))]
  pub correct_answer: u8,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub question_type: Option<IeltsQuestionType>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub explanation: Option<String>,
}

impl AnswerKey for IeltsQuestion {
  fn options(&self) -> &[String] { &self.options }
  fn correct_answer(&self) -> u8 { self.correct_answer }
}

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
pub struct IeltsQuestions {
  #[schemars(length(min = 3))]
  pub questions: Vec<IeltsQuestion>,
}

impl Constrained for IeltsQuestions {
  fn check(&self) -> Result<(), String> {
    check_questions(&self.questions, 3)
  }
}

/// Band 7-8 notes also record the register of a term (academic, formal, technical).
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
pub struct AdvancedVocabularyNote {
  pub term: String,
  pub definition: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub example: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub registers: Option<Vec<String>>,
}

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Band78Passage {
  pub title: String,
  pub content: String,
  pub sections: Vec<Section>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub vocabulary_notes: Option<Vec<AdvancedVocabularyNote>>,
}

impl Constrained for Band78Passage {
  fn check(&self) -> Result<(), String> {
    check_passage(&self.title, &self.content)?;
    if self.sections.is_empty() {
      return Err("band 7-8 passages need at least one section".into());
    }
    Ok(())
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Band78QuestionType {
  MultipleChoice,
  TrueFalseNotgiven,
  Matching,
  Completion,
  SummaryCompletion,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum QuestionDifficulty {
  #[serde(rename = "moderate")]
  Moderate,
  #[serde(rename = "challenging")]
  Challenging,
  #[serde(rename = "very challenging")]
  VeryChallenging,
}

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Band78Question {
  pub id: u32,
  pub text: String,
  pub question_type: Band78QuestionType,
  #[schemars(length(equal = 4))]
  pub options: Vec<String>,
  #[schemars(range(min = 0, max = 3))]
  pub correct_answer: u8,
  pub explanation: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub difficulty_level: Option<QuestionDifficulty>,
}

impl AnswerKey for Band78Question {
  fn options(&self) -> &[String] { &self.options }
  fn correct_answer(&self) -> u8 { self.correct_answer }
}

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Band78Questions {
  #[schemars(length(min = 5))]
  pub questions: Vec<Band78Question>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub recommended_time_minutes: Option<u32>,
}

impl Constrained for Band78Questions {
  fn check(&self) -> Result<(), String> {
    check_questions(&self.questions, 5)
  }
}

pub fn passage_schema() -> OutputSchema {
  OutputSchema::of::<IeltsPassage>("ielts.passage", ExamType::Ielts, SchemaKind::Passage)
}

pub fn questions_schema() -> OutputSchema {
  OutputSchema::of::<IeltsQuestions>("ielts.questions", ExamType::Ielts, SchemaKind::Questions)
}

// ---------------------------------------------------------------------------
// Exam-wide prompts (bands without a level handler)
// ---------------------------------------------------------------------------

fn band_of(difficulty: &DifficultyDescriptor) -> f32 {
  difficulty.band().unwrap_or(6.5)
}

pub fn exam_passage_prompt(difficulty: &DifficultyDescriptor) -> String {
  let band = band_of(difficulty);
  let target = format!("Create a passage suitable for IELTS Academic Reading Test at Band {band} level");
  let structures = format!("Include complex sentence structures appropriate for Band {band}");
  prompts::with_guidelines(
    prompts::base_passage_prompt(ExamType::Ielts, difficulty),
    "Additional IELTS-specific requirements:",
    &[
      target.as_str(),
      "Content should be 350-450 words with an academic tone",
      "The passage should be divided into 2-3 sections with optional headings",
      structures.as_str(),
      "Use academic vocabulary typical of IELTS reading tests",
      "Cover topics like science, social sciences, environment, or current affairs",
      "The content should be factual and informative",
      "Include some specialized vocabulary items that would be appropriate for testing",
    ],
  ) + "\n\nReturn the passage with clear sections and appropriate academic language for IELTS."
}

pub fn exam_questions_prompt(difficulty: &DifficultyDescriptor, passage: &str) -> String {
  let band = band_of(difficulty);
  let count = format!("Generate 5 questions suitable for IELTS Band {band} level");
  let matching = format!("Questions should match the difficulty level expected for Band {band}");
  prompts::with_guidelines(
    prompts::base_questions_prompt(ExamType::Ielts, difficulty, passage),
    "Additional IELTS-specific requirements:",
    &[
      count.as_str(),
      "Include a mix of question types typical for IELTS: multiple choice questions that test deep comprehension \
       and questions that may require inference from the text",
      "Each question should require careful reading of the passage",
      "Some questions should test vocabulary in context",
      "Questions should increase in difficulty as they progress",
      "For each question, add a brief explanation of why the correct answer is correct",
      matching.as_str(),
    ],
  )
}

// ---------------------------------------------------------------------------
// Band-level prompts shared by every band handler
// ---------------------------------------------------------------------------

pub fn topics_for_band(band: f32) -> &'static str {
  if band < 5.0 {
    "education, lifestyle, technology, simple science, personal experiences"
  } else if band < 6.5 {
    "environment, health, social issues, business, culture, science"
  } else if band < 8.0 {
    "science, medicine, history, economics, psychology, social sciences"
  } else {
    "specialized academic topics, research methodologies, theoretical frameworks, complex scientific concepts"
  }
}

fn band_passage_prompt(level: &LevelHandler, difficulty: &DifficultyDescriptor) -> String {
  let band = band_of(difficulty);
  format!(
    "Generate an IELTS Academic reading passage suitable for band {band} level.\n\
     \n\
     Text types for this band include: {text_types}\n\
     \n\
     Consider these cognitive demands: {demands}\n\
     \n\
     Requirements:\n\
     - Content should be 350-450 words with an academic tone\n\
     - Use vocabulary and grammar appropriate for band {band} level\n\
     - Divide the passage into 2-3 sections with optional headings\n\
     - The content should be factual and informative\n\
     - Include some specialized vocabulary items that would be appropriate for testing\n\
     - Topics may include: {topics}\n\
     \n\
     Return a passage with clear structure and appropriate academic language for IELTS.",
    text_types = level.text_types.join(", "),
    demands = level.cognitive_demands.join(", "),
    topics = topics_for_band(band),
  )
}

fn band_questions_prompt(level: &LevelHandler, difficulty: &DifficultyDescriptor, passage: &str) -> String {
  let band = band_of(difficulty);
  format!(
    "Based on the following IELTS passage, generate band {band} level questions.\n\
     \n\
     Passage:\n\
     {passage}\n\
     \n\
     Question formats for band {band} include: {formats}\n\
     \n\
     Requirements:\n\
     - Generate 5 questions in English suitable for IELTS band {band} level\n\
     - Questions should test: {demands}\n\
     - Each question must have exactly 4 options\n\
     - The correctAnswer must be a number between 0 and 3 (index of the correct option)\n\
     - For each question, add a brief explanation of why the correct answer is correct\n\
     - Questions should match the difficulty level expected for band {band}\n\
     - Questions should increase in difficulty as they progress",
    formats = level.question_formats.join(", "),
    demands = level.cognitive_demands.join(", "),
  )
}

// ---------------------------------------------------------------------------
// Band 7-8
// ---------------------------------------------------------------------------

fn band_7_8_passage_prompt(level: &LevelHandler, difficulty: &DifficultyDescriptor) -> String {
  prompts::with_guidelines(
    band_passage_prompt(level, difficulty),
    "Band 7-8 specific guidelines:",
    &[
      "Use complex sentence structures with a mix of compound and complex sentences",
      "Include academic vocabulary characteristic of sophisticated academic writing",
      "Use passive voice, nominalizations, and conditionals where appropriate",
      "Incorporate abstract concepts and theoretical frameworks",
      "Include nuanced arguments with counterpoints",
      "Use specialized terminology with context that allows meaning to be inferred",
      "Include subtle author perspectives without explicitly stating opinions",
      "Structure text with clear introduction, body paragraphs developing arguments, and conclusion",
      "Include data, examples, or evidence to support key points",
      "Use appropriate cohesive devices to link ideas across paragraphs",
    ],
  )
}

fn band_7_8_questions_prompt(level: &LevelHandler, difficulty: &DifficultyDescriptor, passage: &str) -> String {
  prompts::with_guidelines(
    band_questions_prompt(level, difficulty, passage),
    "Band 7-8 specific guidelines:",
    &[
      "Design questions that test higher-order thinking skills",
      "Create multiple-choice options with subtle distinctions that require precise understanding",
      "For True/False/Not Given questions, include statements requiring careful inference",
      "Include questions that require synthesizing information from different parts of the text",
      "Test understanding of academic vocabulary in context",
      "Include questions about implied meanings or author's perspective",
      "Ensure distractors are plausible but subtly incorrect",
      "Create questions that test understanding of logical relationships between ideas",
      "Include at least one question requiring an understanding of the overall argument structure",
      "Questions should progress from moderately difficult to very challenging",
    ],
  )
}

pub fn band_7_8() -> LevelHandler {
  LevelHandler {
    key: "band-7-8",
    text_types: &[
      "Academic journal articles",
      "Research papers",
      "Complex argumentative essays",
      "Scientific reports",
      "Historical analyses",
      "Technical descriptions",
    ],
    question_formats: &[
      "Multiple choice with subtle distinctions",
      "True/False/Not Given requiring inference",
      "Matching headings with abstract concepts",
      "Summary completion requiring synthesis",
      "Sentence completion with precise wording",
    ],
    cognitive_demands: &[
      "Critical analysis of complex arguments",
      "Understanding of implied meanings",
      "Recognition of author stance and bias",
      "Synthesis of information across paragraphs",
      "Evaluation of evidence and reasoning",
      "Distinction between fact and opinion",
    ],
    passage_prompt: band_7_8_passage_prompt,
    questions_prompt: band_7_8_questions_prompt,
    passage_schema: Arc::new(OutputSchema::of::<Band78Passage>(
      "ielts.band-7-8.passage",
      ExamType::Ielts,
      SchemaKind::Passage,
    )),
    questions_schema: Arc::new(OutputSchema::of::<Band78Questions>(
      "ielts.band-7-8.questions",
      ExamType::Ielts,
      SchemaKind::Questions,
    )),
  }
}

pub fn handler() -> ExamHandler {
  ExamHandler::new(
    ExamType::Ielts,
    catalogue::ielts_levels(),
    LevelRegistry::new(vec![band_7_8()]),
    MissingLevel::ExamDefault(ExamPrompts {
      passage: exam_passage_prompt,
      questions: exam_questions_prompt,
    }),
    passage_schema(),
    questions_schema(),
  )
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn level(id: &str) -> DifficultyDescriptor {
    catalogue::ielts_levels().into_iter().find(|d| d.id == id).unwrap()
  }

  fn band78_question(id: u32) -> serde_json::Value {
    json!({
      "id": id,
      "text": "Which claim does the author support?",
      "questionType": "multiple-choice",
      "options": ["a", "b", "c", "d"],
      "correctAnswer": 2,
      "explanation": "Paragraph two states it.",
      "difficultyLevel": "very challenging"
    })
  }

  #[test]
  fn topics_follow_band_thresholds() {
    assert!(topics_for_band(4.5).starts_with("education"));
    assert!(topics_for_band(5.5).starts_with("environment"));
    assert!(topics_for_band(6.5).starts_with("science, medicine"));
    assert!(topics_for_band(7.5).starts_with("science, medicine"));
    assert!(topics_for_band(8.5).starts_with("specialized academic"));
  }

  #[test]
  fn exam_prompt_extends_base_prompt() {
    let p = exam_passage_prompt(&level("band-5-6"));
    assert!(p.starts_with("Generate a reading passage for IELTS reading practice"));
    assert!(p.contains("IELTS Academic Reading Test at Band 5.5 level"));
    assert!(p.ends_with("appropriate academic language for IELTS."));
  }

  #[test]
  fn band_7_8_prompts_carry_level_tables() {
    let h = band_7_8();
    let d = level("band-7-8");
    let p = h.passage_prompt(&d);
    assert!(p.starts_with("Generate an IELTS Academic reading passage suitable for band 7.5 level."));
    assert!(p.contains("Academic journal articles, Research papers"));
    assert!(p.contains("science, medicine, history"));
    assert!(p.contains("Band 7-8 specific guidelines:"));

    let q = h.questions_prompt(&d, "The passage body.");
    assert!(q.contains("Passage:\nThe passage body.\n"));
    assert!(q.contains("Summary completion requiring synthesis"));
    assert!(q.ends_with("Questions should progress from moderately difficult to very challenging"));
  }

  #[test]
  fn band_7_8_schema_requires_sections_and_explanations() {
    let h = band_7_8();
    let no_sections = json!({ "title": "T", "content": "C" });
    assert!(h.passage_schema.validate(&no_sections).is_err());
    let with_sections = json!({
      "title": "T",
      "content": "C",
      "sections": [{ "heading": "One", "content": "C" }],
      "vocabularyNotes": [{ "term": "t", "definition": "d", "registers": ["academic"] }]
    });
    assert_eq!(h.passage_schema.validate(&with_sections), Ok(()));

    let five: Vec<_> = (1..=5).map(band78_question).collect();
    assert_eq!(h.questions_schema.validate(&json!({ "questions": five })), Ok(()));

    let mut missing_explanation = band78_question(1);
    missing_explanation.as_object_mut().unwrap().remove("explanation");
    let mut batch: Vec<_> = (2..=5).map(band78_question).collect();
    batch.push(missing_explanation);
    assert!(h.questions_schema.validate(&json!({ "questions": batch })).is_err());

    let four: Vec<_> = (1..=4).map(band78_question).collect();
    assert!(h.questions_schema.validate(&json!({ "questions": four })).is_err());
  }

  #[test]
  fn exam_schema_rejects_unknown_question_type() {
    let q = json!({
      "id": 1, "text": "Q", "options": ["a", "b", "c", "d"], "correctAnswer": 0,
      "questionType": "essay"
    });
    let schema = questions_schema();
    assert!(schema.validate(&json!({ "questions": [q.clone(), q.clone(), q] })).is_err());
  }
}
