//! Exam-agnostic prompt fragments. Exam and level prompts build on these.

use crate::domain::{DifficultyDescriptor, ExamType};

pub fn base_passage_prompt(exam: ExamType, difficulty: &DifficultyDescriptor) -> String {
  let lang = exam.language();
  let level = &difficulty.name;
  format!(
    "Generate a reading passage for {exam} reading practice with the following requirements:\n\
     - The content should be at {level} level\n\
     - Title should be clear and descriptive\n\
     - Content should be appropriate length for {level} level\n\
     - Use language appropriate for {level} level\n\
     - IMPORTANT: The entire passage MUST be written in {name} language ({code})\n\
     - Include appropriate paragraphs and structure\n\
     - Focus on a single main idea with supporting details\n\
     - The passage should be culturally appropriate for {name} speakers",
    exam = exam.display_name(),
    name = lang.name,
    code = lang.code,
  )
}

pub fn base_questions_prompt(exam: ExamType, difficulty: &DifficultyDescriptor, passage: &str) -> String {
  let lang = exam.language();
  let level = &difficulty.name;
  format!(
    "Based on the following passage, generate multiple-choice questions in {name} appropriate for {level} level. \
     Each question must have exactly 4 options and one correct answer (0-3).\n\
     \n\
     Passage:\n\
     {passage}\n\
     \n\
     Requirements:\n\
     - Generate questions appropriate for {level} level\n\
     - IMPORTANT: All questions and options MUST be written ONLY in {name} language ({code})\n\
     - Each question must have exactly 4 options\n\
     - The correctAnswer must be a number between 0 and 3 (index of the correct option)\n\
     - Questions should test comprehension of the main ideas and key details\n\
     - Options should be plausible but only one should be correct\n\
     - Questions should be culturally appropriate for {name} speakers",
    name = lang.name,
    code = lang.code,
  )
}

/// Append an indented block of guideline bullets under `heading`.
pub fn with_guidelines(prompt: String, heading: &str, lines: &[&str]) -> String {
  let mut out = prompt;
  out.push_str("\n\n");
  out.push_str(heading);
  for l in lines {
    out.push_str("\n- ");
    out.push_str(l);
  }
  out
}
