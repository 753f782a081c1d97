//! Goethe-Institut reading: CEFR catalogue, prompts, schemas and the A1/B2 handlers.
//!
//! Goethe refuses levels without a calibrated handler; there is no exam-wide
//! fallback prompt.

use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{catalogue, prompts, ExamHandler, LevelHandler, LevelRegistry, MissingLevel};
use crate::domain::{DifficultyDescriptor, ExamType};
use crate::schema::{check_passage, check_questions, AnswerKey, Constrained, OutputSchema, SchemaKind, Section};

// ---------------------------------------------------------------------------
// Exam-level schemas
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
pub struct VocabularyEntry {
  pub word: String,
  pub definition: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub example: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
pub struct GoethePassage {
  pub title: String,
  pub content: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub vocabulary: Option<Vec<VocabularyEntry>>,
}

impl Constrained for GoethePassage {
  fn check(&self) -> Result<(), String> {
    check_passage(&self.title, &self.content)
  }
}

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GoetheQuestion {
  pub id: u32,
  pub text: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub context: Option<String>,
  #[schemars(length(equal = 4))]
  pub options: Vec<String>,
  #[schemars(range(min = 0, max = 3))]
  pub correct_answer: u8,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub explanation: Option<String>,
}

impl AnswerKey for GoetheQuestion {
  fn options(&self) -> &[String] { &self.options }
  fn correct_answer(&self) -> u8 { self.correct_answer }
}

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
pub struct GoetheQuestions {
  #[schemars(length(min = 3))]
  pub questions: Vec<GoetheQuestion>,
}

impl Constrained for GoetheQuestions {
  fn check(&self) -> Result<(), String> {
    check_questions(&self.questions, 3)
  }
}

pub fn passage_schema() -> OutputSchema {
  OutputSchema::of::<GoethePassage>("goethe.passage", ExamType::Goethe, SchemaKind::Passage)
}

pub fn questions_schema() -> OutputSchema {
  OutputSchema::of::<GoetheQuestions>("goethe.questions", ExamType::Goethe, SchemaKind::Questions)
}

// ---------------------------------------------------------------------------
// A1 schemas
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum A1QuestionType {
  TrueFalse,
  Matching,
  MultipleChoice,
}

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct A1Question {
  pub id: u32,
  pub text: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub context: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub question_type: Option<A1QuestionType>,
  #[schemars(length(equal = 4))]
  pub options: Vec<String>,
  #[schemars(range(min = 0, max = 3))]
  pub correct_answer: u8,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub explanation: Option<String>,
}

impl AnswerKey for A1Question {
  fn options(&self) -> &[String] { &self.options }
  fn correct_answer(&self) -> u8 { self.correct_answer }
}

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
pub struct A1Questions {
  #[schemars(length(min = 3))]
  pub questions: Vec<A1Question>,
}

impl Constrained for A1Questions {
  fn check(&self) -> Result<(), String> {
    check_questions(&self.questions, 3)
  }
}

// ---------------------------------------------------------------------------
// B2 schemas
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
pub struct B2VocabularyEntry {
  pub word: String,
  pub definition: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub example: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub synonyms: Option<Vec<String>>,
}

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
pub struct B2Passage {
  pub title: String,
  pub content: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub sections: Option<Vec<Section>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub vocabulary: Option<Vec<B2VocabularyEntry>>,
}

impl Constrained for B2Passage {
  fn check(&self) -> Result<(), String> {
    check_passage(&self.title, &self.content)
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum B2QuestionType {
  MultipleChoice,
  ArgumentAnalysis,
  DetailOriented,
  Inference,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum B2Difficulty {
  Easy,
  Medium,
  Hard,
}

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct B2Question {
  pub id: u32,
  pub text: String,
  pub context: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub question_type: Option<B2QuestionType>,
  #[schemars(length(equal = 4))]
  pub options: Vec<String>,
  #[schemars(range(min = 0, max = 3))]
  pub correct_answer: u8,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub explanation: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub difficulty: Option<B2Difficulty>,
}

impl AnswerKey for B2Question {
  fn options(&self) -> &[String] { &self.options }
  fn correct_answer(&self) -> u8 { self.correct_answer }
}

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
pub struct B2Questions {
  #[schemars(length(min = 5))]
  pub questions: Vec<B2Question>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub topics: Option<Vec<String>>,
}

impl Constrained for B2Questions {
  fn check(&self) -> Result<(), String> {
    check_questions(&self.questions, 5)
  }
}

// ---------------------------------------------------------------------------
// CEFR base prompts shared by every level handler
// ---------------------------------------------------------------------------

pub fn word_count_for_level(cefr: &str) -> &'static str {
  match cefr {
    "A1" => "100-150",
    "A2" => "150-200",
    "B1" => "200-300",
    "B2" => "300-400",
    "C1" => "400-500",
    "C2" => "500-600",
    _ => "300-400",
  }
}

pub fn topics_for_level(cefr: &str) -> &'static str {
  match cefr {
    "A1" => "personal information, daily routines, family, shopping",
    "A2" => "leisure, hobbies, travel, food, accommodation",
    "B1" => "work, education, media, environment, German culture",
    "B2" => "current affairs, social issues, technology, cultural differences",
    "C1" => "politics, economics, scientific advances, literature, philosophy",
    "C2" => "complex social issues, academic topics, specialized fields, cultural nuances",
    _ => "daily life, work, education, environment, culture in German-speaking countries",
  }
}

fn cefr_passage_prompt(level: &LevelHandler, difficulty: &DifficultyDescriptor) -> String {
  let cefr = difficulty.cefr().unwrap_or(level.key);
  format!(
    "Generate a German reading passage suitable for Goethe-Institut {cefr} level.\n\
     \n\
     Text types for this level include: {text_types}\n\
     \n\
     Consider these cognitive demands: {demands}\n\
     \n\
     Requirements:\n\
     - Content should be {words} words\n\
     - Use vocabulary and grammar appropriate for {cefr} level\n\
     - Cover topics like: {topics}\n\
     - Include 5-7 key vocabulary items with definitions\n\
     - Structure the text with appropriate paragraphs and flow\n\
     - The language complexity should match exactly what is expected at {cefr} level\n\
     \n\
     Return the passage with clear vocabulary notes that would help a learner at {cefr} level.",
    text_types = level.text_types.join(", "),
    demands = level.cognitive_demands.join(", "),
    words = word_count_for_level(cefr),
    topics = topics_for_level(cefr),
  )
}

fn cefr_questions_prompt(level: &LevelHandler, difficulty: &DifficultyDescriptor, passage: &str) -> String {
  let cefr = difficulty.cefr().unwrap_or(level.key);
  format!(
    "Based on the following German passage, generate {cefr} level questions.\n\
     \n\
     Passage:\n\
     {passage}\n\
     \n\
     Question formats for {cefr} include: {formats}\n\
     \n\
     Requirements:\n\
     - Generate 5 questions in German suitable for Goethe-Institut {cefr} level\n\
     - For each question, include a brief context showing which part of the passage it relates to\n\
     - Questions should test: {demands}\n\
     - Each question must have exactly 4 options and one correct answer (0-3)\n\
     - The language complexity of questions should match {cefr} level\n\
     - Include questions that test both direct comprehension and implicit understanding where appropriate\n\
     - Questions should reflect authentic Goethe-Institut examination style",
    formats = level.question_formats.join(", "),
    demands = level.cognitive_demands.join(", "),
  )
}

// ---------------------------------------------------------------------------
// A1
// ---------------------------------------------------------------------------

fn a1_passage_prompt(level: &LevelHandler, difficulty: &DifficultyDescriptor) -> String {
  prompts::with_guidelines(
    cefr_passage_prompt(level, difficulty),
    "A1-specific guidelines:",
    &[
      "Use very simple sentence structures (mainly subject-verb-object)",
      "Avoid subordinate clauses and complex grammar",
      "Focus on present tense and simple vocabulary",
      "Include common everyday expressions and routine phrases",
      "Stick to concrete topics, not abstract concepts",
      "Vocabulary should be limited to the most common 500-800 German words",
      "Include greetings, numbers, days of the week, or basic personal information",
      "Keep sentences short (5-10 words per sentence on average)",
    ],
  )
}

fn a1_questions_prompt(level: &LevelHandler, difficulty: &DifficultyDescriptor, passage: &str) -> String {
  prompts::with_guidelines(
    cefr_questions_prompt(level, difficulty, passage),
    "A1-specific guidelines:",
    &[
      "Questions should be very simple and direct",
      "Focus on literal comprehension, not inference",
      "Use true/false format or simple multiple choice with clear, distinct options",
      "Options should be clearly different from each other",
      "Avoid ambiguity or subtle distinctions between answers",
      "Questions should focus on simple facts directly stated in the text",
      "Question sentences should be simple with basic vocabulary",
      "Include some visual context where appropriate (describe images that would accompany the question)",
    ],
  )
}

pub fn a1() -> LevelHandler {
  LevelHandler {
    key: "A1",
    text_types: &[
      "Short notes",
      "Simple advertisements",
      "Signs and notices",
      "Basic emails",
      "Short personal messages",
    ],
    question_formats: &[
      "True/False questions",
      "A/B matching",
      "Simple multiple-choice questions",
      "Image-to-text matching",
    ],
    cognitive_demands: &[
      "Fact retrieval",
      "Basic comprehension",
      "Recognition of personal information",
      "Understanding of simple instructions",
    ],
    passage_prompt: a1_passage_prompt,
    questions_prompt: a1_questions_prompt,
    // A1 passages use the exam-level shape.
    passage_schema: Arc::new(OutputSchema::of::<GoethePassage>(
      "goethe.a1.passage",
      ExamType::Goethe,
      SchemaKind::Passage,
    )),
    questions_schema: Arc::new(OutputSchema::of::<A1Questions>(
      "goethe.a1.questions",
      ExamType::Goethe,
      SchemaKind::Questions,
    )),
  }
}

// ---------------------------------------------------------------------------
// B2
// ---------------------------------------------------------------------------

fn b2_passage_prompt(level: &LevelHandler, difficulty: &DifficultyDescriptor) -> String {
  prompts::with_guidelines(
    cefr_passage_prompt(level, difficulty),
    "B2-specific guidelines:",
    &[
      "Write text in multiple sections with different aspects of the topic",
      "Use complex sentence structures with subordinate clauses",
      "Include passive voice, subjunctive forms, and varying tenses",
      "Incorporate abstract concepts and theoretical frameworks",
      "Use specialized vocabulary appropriate for educated non-specialists",
      "Include both opinions/arguments and factual information",
      "Develop logical argumentation with supporting examples",
      "Establish clear relationships between ideas using connectors",
      "Text should be structured with clear introduction, body paragraphs and conclusion",
      "Include some idiomatic expressions and figurative language",
    ],
  )
}

fn b2_questions_prompt(level: &LevelHandler, difficulty: &DifficultyDescriptor, passage: &str) -> String {
  prompts::with_guidelines(
    cefr_questions_prompt(level, difficulty, passage),
    "B2-specific guidelines:",
    &[
      "Focus on testing critical thinking and analytical skills",
      "Create multi-layered distractors that reflect partial comprehension errors",
      "Include questions about implied meanings and author's perspective",
      "Test understanding of argumentative structure and logical connections",
      "Distractors should be plausible but subtly incorrect",
      "Include questions that require synthesizing information from different parts of the text",
      "Test understanding of idiomatic language and nuanced meanings",
      "Ensure some questions focus on argumentation and evidence evaluation",
      "Include at least one question that examines the overall purpose or main argument",
      "Questions should increase in difficulty (start easier, end harder)",
    ],
  )
}

pub fn b2() -> LevelHandler {
  LevelHandler {
    key: "B2",
    text_types: &[
      "Complex articles",
      "Professional reports",
      "Detailed arguments",
      "Journalistic texts",
      "Opinion pieces",
      "Formal correspondence",
    ],
    question_formats: &[
      "Argument analysis",
      "Detail-oriented multiple choice questions",
      "Position and opinion identification",
      "Inference questions",
      "Logical deduction tasks",
    ],
    cognitive_demands: &[
      "Critical evaluation of arguments",
      "Understanding logical connections",
      "Recognition of implied meanings",
      "Identification of author stance and perspective",
      "Analysis of argumentation structure",
    ],
    passage_prompt: b2_passage_prompt,
    questions_prompt: b2_questions_prompt,
    passage_schema: Arc::new(OutputSchema::of::<B2Passage>(
      "goethe.b2.passage",
      ExamType::Goethe,
      SchemaKind::Passage,
    )),
    questions_schema: Arc::new(OutputSchema::of::<B2Questions>(
      "goethe.b2.questions",
      ExamType::Goethe,
      SchemaKind::Questions,
    )),
  }
}

pub fn handler() -> ExamHandler {
  ExamHandler::new(
    ExamType::Goethe,
    catalogue::goethe_levels(),
    LevelRegistry::new(vec![a1(), b2()]),
    MissingLevel::Refuse,
    passage_schema(),
    questions_schema(),
  )
}
