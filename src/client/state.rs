//! Client-side content state and the reducer that applies stream events to it.
//!
//! The reducer is synchronous and side-effect free: it mutates `ReadingState`
//! and returns the `Effect`s the caller must carry out (close the stream, show
//! an error, go back to the configuration screen after a pause).

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::domain::Question;
use crate::protocol::{StreamErrorType, StreamEvent};

/// What the rendering layer has to do after an event was applied.
#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
  CloseStream,
  ShowError { message: String, unimplemented: bool },
  ReturnToConfiguration { after: Duration },
}

#[derive(Clone, Debug)]
pub struct ReadingState {
  pub passage: Option<Value>,
  pub questions: Vec<Question>,
  /// Selected option per question, `None` while unanswered.
  pub answers: Vec<Option<usize>>,
  pub is_passage_loading: bool,
  pub is_questions_loading: bool,
  pub is_questions_ready: bool,
  pub error: Option<String>,
  redirect_delay: Duration,
}

impl ReadingState {
  pub fn new(redirect_delay: Duration) -> Self {
    Self {
      passage: None,
      questions: Vec::new(),
      answers: Vec::new(),
      is_passage_loading: false,
      is_questions_loading: false,
      is_questions_ready: false,
      error: None,
      redirect_delay,
    }
  }

  /// Back to a blank slate before a new stream.
  pub fn reset(&mut self) {
    *self = Self::new(self.redirect_delay);
  }

  pub fn apply(&mut self, event: StreamEvent) -> Vec<Effect> {
    match event {
      StreamEvent::PassageStart => {
        self.is_passage_loading = true;
        vec![]
      }
      StreamEvent::PassageUpdate { passage } => {
        self.is_passage_loading = true;
        if has_sections(self.passage.as_ref()) && !has_sections(Some(&passage)) {
          debug!(target: "examcraft_backend", "Ignoring passage update without sections");
        } else {
          self.passage = Some(passage);
        }
        vec![]
      }
      StreamEvent::PassageComplete { passage } => {
        self.passage = Some(passage);
        self.is_passage_loading = false;
        vec![]
      }
      StreamEvent::QuestionsStart => {
        self.is_questions_loading = true;
        vec![]
      }
      StreamEvent::QuestionsUpdate { questions } => {
        if let Some(list) = questions_of(&questions) {
          self.answers = vec![None; list.len()];
          self.questions = list;
        }
        vec![]
      }
      StreamEvent::QuestionsComplete { questions } => {
        self.finish(None, questions);
        vec![]
      }
      StreamEvent::Complete { passage, questions } => {
        self.finish(passage, questions);
        vec![Effect::CloseStream]
      }
      StreamEvent::Error { error, error_type } => {
        self.is_passage_loading = false;
        self.is_questions_loading = false;
        self.error = Some(error.clone());
        match error_type {
          Some(StreamErrorType::UnimplementedLevel) => vec![
            Effect::CloseStream,
            Effect::ShowError { message: error, unimplemented: true },
            Effect::ReturnToConfiguration { after: self.redirect_delay },
          ],
          None => vec![Effect::CloseStream, Effect::ShowError { message: error, unimplemented: false }],
        }
      }
    }
  }

  fn finish(&mut self, passage: Option<Value>, questions: Option<Value>) {
    if let Some(p) = passage {
      self.passage = Some(p);
    }
    if let Some(list) = questions.as_ref().and_then(questions_of) {
      // Keep selections when a replayed event carries the same set.
      if list.len() != self.answers.len() {
        self.answers = vec![None; list.len()];
      }
      self.questions = list;
    }
    self.is_passage_loading = false;
    self.is_questions_loading = false;
    self.is_questions_ready = true;
  }

  /// Record an answer. Ignored until the question set is final, or when the
  /// indices are out of range.
  pub fn select_answer(&mut self, question: usize, option: usize) -> bool {
    if !self.is_questions_ready {
      return false;
    }
    let in_range = self.questions.get(question).is_some_and(|q| option < q.options.len());
    if !in_range {
      return false;
    }
    self.answers[question] = Some(option);
    true
  }

  pub fn answered(&self) -> usize {
    self.answers.iter().filter(|a| a.is_some()).count()
  }

  /// Share of questions answered, 0..=100.
  pub fn progress(&self) -> f32 {
    if self.questions.is_empty() {
      return 0.0;
    }
    self.answered() as f32 * 100.0 / self.questions.len() as f32
  }

  pub fn score(&self) -> Score {
    let correct = self
      .questions
      .iter()
      .zip(&self.answers)
      .filter(|(q, a)| matches!((q.correct_answer, a), (Some(k), Some(a)) if k as usize == *a))
      .count();
    Score { correct, total: self.questions.len() }
  }

  /// Lenient view of the current passage for rendering.
  pub fn passage_view(&self) -> Option<PassageView> {
    self.passage.as_ref().and_then(|p| PassageView::deserialize(p).ok())
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Score {
  pub correct: usize,
  pub total: usize,
}

impl Score {
  pub fn percent(&self) -> f32 {
    if self.total == 0 {
      return 0.0;
    }
    self.correct as f32 * 100.0 / self.total as f32
  }
}

/// Estimated IELTS band for a percentage of correct answers.
pub fn ielts_band(percent: f32) -> f32 {
  const TABLE: [(f32, f32); 10] = [
    (90.0, 9.0),
    (85.0, 8.5),
    (80.0, 8.0),
    (75.0, 7.5),
    (70.0, 7.0),
    (65.0, 6.5),
    (60.0, 6.0),
    (55.0, 5.5),
    (50.0, 5.0),
    (40.0, 4.0),
  ];
  TABLE.iter().find(|(min, _)| percent >= *min).map(|(_, band)| *band).unwrap_or(3.0)
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct PassageView {
  pub title: String,
  pub content: String,
  pub sections: Vec<SectionView>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct SectionView {
  pub heading: Option<String>,
  pub content: String,
}

fn has_sections(passage: Option<&Value>) -> bool {
  passage.is_some_and(|p| p.get("sections").is_some())
}

/// Questions of a batch payload. Half-written entries keep their slot.
fn questions_of(batch: &Value) -> Option<Vec<Question>> {
  let list = batch.get("questions")?.as_array()?;
  Some(list.iter().map(|q| Question::deserialize(q).unwrap_or_default()).collect())
}
