//! Exam handler hierarchy: exam type -> level.
//!
//! An `ExamHandler` owns the difficulty catalogue of one exam type and a
//! `LevelRegistry` of calibrated `LevelHandler`s. Prompt and schema requests
//! are answered by the level handler when one is registered. Otherwise the
//! exam's `MissingLevel` policy decides: use exam-wide prompts, or refuse with
//! `UnimplementedLevelError`.
//!
//! Level handlers compose prompts by calling the exam's base prompt function
//! and appending their own guidelines.

use std::{collections::HashMap, sync::Arc};

use crate::domain::{DifficultyDescriptor, ExamType};
use crate::error::UnimplementedLevelError;
use crate::schema::OutputSchema;

pub mod catalogue;
pub mod factory;
pub mod goethe;
pub mod ielts;
mod prompts;

pub use factory::{ExamHandlerFactory, ExamTypeInfo};

pub type PassagePromptFn = fn(&LevelHandler, &DifficultyDescriptor) -> String;
pub type QuestionsPromptFn = fn(&LevelHandler, &DifficultyDescriptor, &str) -> String;

/// Prompts and schemas calibrated for one exam-type x level pair.
pub struct LevelHandler {
  /// Registry key (CEFR code for Goethe, band id for IELTS).
  pub key: &'static str,
  pub text_types: &'static [&'static str],
  pub question_formats: &'static [&'static str],
  pub cognitive_demands: &'static [&'static str],
  pub passage_prompt: PassagePromptFn,
  pub questions_prompt: QuestionsPromptFn,
  pub passage_schema: Arc<OutputSchema>,
  pub questions_schema: Arc<OutputSchema>,
}

impl LevelHandler {
  pub fn passage_prompt(&self, difficulty: &DifficultyDescriptor) -> String {
    (self.passage_prompt)(self, difficulty)
  }

  pub fn questions_prompt(&self, difficulty: &DifficultyDescriptor, passage: &str) -> String {
    (self.questions_prompt)(self, difficulty, passage)
  }
}

/// Level handlers of one exam type, keyed by `DifficultyDescriptor::registry_key`.
#[derive(Default)]
pub struct LevelRegistry {
  handlers: HashMap<&'static str, LevelHandler>,
}

impl LevelRegistry {
  pub fn new(handlers: Vec<LevelHandler>) -> Self {
    let mut registry = Self::default();
    for h in handlers {
      registry.register(h);
    }
    registry
  }

  pub fn register(&mut self, handler: LevelHandler) {
    self.handlers.insert(handler.key, handler);
  }

  pub fn get(&self, key: &str) -> Option<&LevelHandler> {
    self.handlers.get(key)
  }

  pub fn contains(&self, key: &str) -> bool {
    self.handlers.contains_key(key)
  }

  pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
    self.handlers.keys().copied()
  }

  pub fn len(&self) -> usize {
    self.handlers.len()
  }

  pub fn is_empty(&self) -> bool {
    self.handlers.is_empty()
  }
}

/// Exam-wide prompt functions used for levels without a level handler.
#[derive(Clone, Copy)]
pub struct ExamPrompts {
  pub passage: fn(&DifficultyDescriptor) -> String,
  pub questions: fn(&DifficultyDescriptor, &str) -> String,
}

/// What an exam handler does for a level that has no level handler.
#[derive(Clone, Copy)]
pub enum MissingLevel {
  ExamDefault(ExamPrompts),
  Refuse,
}

pub struct ExamHandler {
  exam_type: ExamType,
  /// Sorted by rank; never empty.
  levels: Vec<DifficultyDescriptor>,
  registry: LevelRegistry,
  missing_level: MissingLevel,
  passage_schema: Arc<OutputSchema>,
  questions_schema: Arc<OutputSchema>,
}

impl ExamHandler {
  pub fn new(
    exam_type: ExamType,
    mut levels: Vec<DifficultyDescriptor>,
    registry: LevelRegistry,
    missing_level: MissingLevel,
    passage_schema: OutputSchema,
    questions_schema: OutputSchema,
  ) -> Self {
    debug_assert!(!levels.is_empty(), "difficulty catalogue must not be empty");
    levels.sort_by_key(|d| d.rank);
    Self {
      exam_type,
      levels,
      registry,
      missing_level,
      passage_schema: Arc::new(passage_schema),
      questions_schema: Arc::new(questions_schema),
    }
  }

  pub fn exam_type(&self) -> ExamType {
    self.exam_type
  }

  /// Full catalogue with `is_implemented` recomputed against the registry.
  pub fn difficulty_levels(&self) -> Vec<DifficultyDescriptor> {
    self
      .levels
      .iter()
      .map(|d| DifficultyDescriptor { is_implemented: self.is_implemented(d), ..d.clone() })
      .collect()
  }

  pub fn default_difficulty(&self) -> &DifficultyDescriptor {
    &self.levels[0]
  }

  pub fn difficulty_by_id(&self, id: &str) -> Option<&DifficultyDescriptor> {
    self.levels.iter().find(|d| d.id == id)
  }

  /// Lookup by id, degrading to the default for unknown or absent ids.
  pub fn resolve_difficulty(&self, id: Option<&str>) -> &DifficultyDescriptor {
    id.and_then(|id| self.difficulty_by_id(id))
      .unwrap_or_else(|| self.default_difficulty())
  }

  pub fn level_handler(&self, difficulty: &DifficultyDescriptor) -> Option<&LevelHandler> {
    self.registry.get(difficulty.registry_key())
  }

  pub fn is_implemented(&self, difficulty: &DifficultyDescriptor) -> bool {
    self.registry.contains(difficulty.registry_key())
      || matches!(self.missing_level, MissingLevel::ExamDefault(_))
  }

  /// Display codes of levels with a level handler, in catalogue order.
  pub fn implemented_levels(&self) -> Vec<&str> {
    self
      .levels
      .iter()
      .filter(|d| self.registry.contains(d.registry_key()))
      .map(|d| d.display_code())
      .collect()
  }

  pub fn passage_prompt(&self, difficulty: &DifficultyDescriptor) -> Result<String, UnimplementedLevelError> {
    if let Some(handler) = self.level_handler(difficulty) {
      return Ok(handler.passage_prompt(difficulty));
    }
    match self.missing_level {
      MissingLevel::ExamDefault(prompts) => Ok((prompts.passage)(difficulty)),
      MissingLevel::Refuse => Err(self.unimplemented(difficulty)),
    }
  }

  pub fn questions_prompt(
    &self,
    difficulty: &DifficultyDescriptor,
    passage: &str,
  ) -> Result<String, UnimplementedLevelError> {
    if let Some(handler) = self.level_handler(difficulty) {
      return Ok(handler.questions_prompt(difficulty, passage));
    }
    match self.missing_level {
      MissingLevel::ExamDefault(prompts) => Ok((prompts.questions)(difficulty, passage)),
      MissingLevel::Refuse => Err(self.unimplemented(difficulty)),
    }
  }

  pub fn passage_schema(&self, difficulty: &DifficultyDescriptor) -> Arc<OutputSchema> {
    self
      .level_handler(difficulty)
      .map(|h| h.passage_schema.clone())
      .unwrap_or_else(|| self.passage_schema.clone())
  }

  pub fn questions_schema(&self, difficulty: &DifficultyDescriptor) -> Arc<OutputSchema> {
    self
      .level_handler(difficulty)
      .map(|h| h.questions_schema.clone())
      .unwrap_or_else(|| self.questions_schema.clone())
  }

  fn unimplemented(&self, difficulty: &DifficultyDescriptor) -> UnimplementedLevelError {
    UnimplementedLevelError::new(self.exam_type, difficulty.display_code(), &self.implemented_levels())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::schema::SchemaKind;

  #[test]
  fn every_catalogue_id_resolves_to_itself() {
    for exam in ExamType::ALL {
      let handler = factory::build_handler(exam);
      for level in handler.difficulty_levels() {
        let found = handler.difficulty_by_id(&level.id).unwrap();
        assert_eq!(found.id, level.id, "{exam}");
      }
    }
  }

  #[test]
  fn default_difficulty_is_lowest_rank_member() {
    for exam in ExamType::ALL {
      let handler = factory::build_handler(exam);
      let levels = handler.difficulty_levels();
      let default = handler.default_difficulty();
      assert!(levels.iter().any(|d| d.id == default.id));
      assert!(levels.iter().all(|d| d.rank >= default.rank));
    }
  }

  #[test]
  fn unknown_difficulty_degrades_to_default() {
    let handler = factory::build_handler(ExamType::Goethe);
    assert_eq!(handler.resolve_difficulty(Some("z9")).id, "a1");
    assert_eq!(handler.resolve_difficulty(None).id, "a1");
    assert_eq!(handler.resolve_difficulty(Some("b2")).id, "b2");
  }

  #[test]
  fn goethe_implementation_flags_follow_registry() {
    let handler = factory::build_handler(ExamType::Goethe);
    let implemented: Vec<String> = handler
      .difficulty_levels()
      .into_iter()
      .filter(|d| d.is_implemented)
      .map(|d| d.id)
      .collect();
    assert_eq!(implemented, vec!["a1".to_string(), "b2".to_string()]);
    assert_eq!(handler.implemented_levels(), vec!["A1", "B2"]);
  }

  #[test]
  fn ielts_levels_are_all_implemented_through_exam_default() {
    let handler = factory::build_handler(ExamType::Ielts);
    assert!(handler.difficulty_levels().iter().all(|d| d.is_implemented));
  }

  #[test]
  fn refused_level_reports_display_code() {
    let handler = factory::build_handler(ExamType::Goethe);
    let a2 = handler.difficulty_by_id("a2").unwrap().clone();
    let err = handler.passage_prompt(&a2).unwrap_err();
    assert_eq!(err.code, "A2");
    assert_eq!(err.exam_type, ExamType::Goethe);
    assert!(err.message.contains("Please select A1 or B2 level"));
    assert!(handler.questions_prompt(&a2, "Text").is_err());
  }

  #[test]
  fn level_handler_extends_exam_base_prompt() {
    let handler = factory::build_handler(ExamType::Goethe);
    let b2 = handler.difficulty_by_id("b2").unwrap().clone();
    let prompt = handler.passage_prompt(&b2).unwrap();
    assert!(prompt.starts_with("Generate a German reading passage suitable for Goethe-Institut B2 level."));
    assert!(prompt.contains("B2-specific guidelines:"));
    assert!(prompt.contains("300-400 words"));
  }

  #[test]
  fn schemas_come_from_level_handler_when_present() {
    let handler = factory::build_handler(ExamType::Ielts);
    let band78 = handler.difficulty_by_id("band-7-8").unwrap().clone();
    let band45 = handler.difficulty_by_id("band-4-5").unwrap().clone();
    assert_eq!(handler.passage_schema(&band78).name, "ielts.band-7-8.passage");
    assert_eq!(handler.passage_schema(&band45).name, "ielts.passage");
    assert_eq!(handler.questions_schema(&band45).kind, SchemaKind::Questions);
  }

  #[test]
  fn registry_without_handlers_refuses_everything() {
    let handler = ExamHandler::new(
      ExamType::Goethe,
      catalogue::goethe_levels(),
      LevelRegistry::default(),
      MissingLevel::Refuse,
      goethe::passage_schema(),
      goethe::questions_schema(),
    );
    assert!(handler.difficulty_levels().iter().all(|d| !d.is_implemented));
    let a1 = handler.default_difficulty().clone();
    let err = handler.passage_prompt(&a1).unwrap_err();
    assert_eq!(err.message, "The Goethe A1 level is not yet implemented.");
  }
}
