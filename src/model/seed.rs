//! Offline model: built-in reading material that keeps the app usable without OpenAI.
//!
//! The canned passage and questions of each exam type satisfy every schema
//! shipped for that exam (sections, vocabulary, context, explanations and five
//! questions). They are revealed a few characters at a time through the same
//! partial-JSON tracker the OpenAI model uses, so clients see a realistic stream.

use std::{sync::Arc, time::Duration};

use serde_json::{json, Value};
use tracing::{debug, info, instrument};

use super::{object_channel, partial_json::PartialTracker, validate_final, ObjectModel, ObjectSink, ObjectStream};
use crate::domain::ExamType;
use crate::schema::{OutputSchema, SchemaKind};

#[derive(Clone, Debug)]
pub struct SeedModel {
  chunk_chars: usize,
  chunk_delay: Duration,
}

impl SeedModel {
  pub fn new(chunk_chars: usize, chunk_delay: Duration) -> Self {
    Self { chunk_chars: chunk_chars.max(1), chunk_delay }
  }
}

impl ObjectModel for SeedModel {
  fn name(&self) -> &str {
    "seed"
  }

  fn stream_object(&self, schema: Arc<OutputSchema>, prompt: String) -> ObjectStream {
    let (sink, stream) = object_channel();
    debug!(target: "generation", schema = %schema.name, prompt_len = prompt.len(), "Serving built-in content");
    let text = serde_json::to_string_pretty(&seed_content(schema.exam_type, schema.kind)).unwrap_or_default();
    tokio::spawn(reveal(text, schema, sink, self.chunk_chars, self.chunk_delay));
    stream
  }
}

#[instrument(level = "debug", skip_all, fields(schema = %schema.name, len = text.len()))]
async fn reveal(text: String, schema: Arc<OutputSchema>, sink: ObjectSink, chunk_chars: usize, delay: Duration) {
  let mut tracker = PartialTracker::default();
  let chars: Vec<char> = text.chars().collect();
  for chunk in chars.chunks(chunk_chars) {
    let piece: String = chunk.iter().collect();
    if let Some(v) = tracker.push(&piece) {
      if !sink.partial(v) {
        info!(target: "generation", schema = %schema.name, "Consumer went away; stopping seed stream");
        return;
      }
    }
    if delay.is_zero() {
      tokio::task::yield_now().await;
    } else {
      tokio::time::sleep(delay).await;
    }
  }
  let result = tracker.finish().and_then(|v| validate_final(&schema, v));
  sink.finish(result);
}

/// Canned value for an exam type and generation stage.
pub fn seed_content(exam: ExamType, kind: SchemaKind) -> Value {
  match (exam, kind) {
    (ExamType::Ielts, SchemaKind::Passage) => ielts_passage(),
    (ExamType::Ielts, SchemaKind::Questions) => ielts_questions(),
    (ExamType::Goethe, SchemaKind::Passage) => goethe_passage(),
    (ExamType::Goethe, SchemaKind::Questions) => goethe_questions(),
  }
}

fn ielts_passage() -> Value {
  let sections = [
    (
      "The problem with paved cities",
      "Asphalt and concrete absorb sunlight during the day and release it slowly at night. \
       As a result, dense city centres can be several degrees warmer than the surrounding countryside, \
       a phenomenon known as the urban heat island effect.",
    ),
    (
      "Green roofs as a response",
      "Planting vegetation on rooftops cools buildings through shade and evaporation. \
       Studies in Toronto and Singapore report roof surface temperatures up to 30 degrees lower \
       than on conventional roofs, while also retaining rainwater that would otherwise overload drains.",
    ),
    (
      "Costs and limits",
      "Critics point out that green roofs are expensive to install and require structural reinforcement. \
       Their cooling effect at street level is modest unless they are adopted across entire districts, \
       which makes coordinated planning policy as important as the technology itself.",
    ),
  ];
  let content = sections.iter().map(|(_, body)| *body).collect::<Vec<_>>().join("\n\n");
  json!({
    "title": "Cooling the City: The Promise of Green Roofs",
    "content": content,
    "sections": sections
      .iter()
      .map(|(heading, body)| json!({ "heading": heading, "content": body }))
      .collect::<Vec<_>>(),
    "vocabularyNotes": [
      {
        "term": "phenomenon",
        "definition": "an observable fact or event",
        "example": "The heat island effect is a well-documented phenomenon.",
        "registers": ["academic"]
      },
      {
        "term": "reinforcement",
        "definition": "additional support that makes a structure stronger",
        "registers": ["technical"]
      }
    ]
  })
}

fn ielts_questions() -> Value {
  json!({
    "questions": [
      {
        "id": 1,
        "text": "What causes city centres to be warmer than the countryside?",
        "questionType": "multiple-choice",
        "options": [
          "Paved surfaces release stored heat at night",
          "Cities receive more sunlight",
          "Rooftop gardens trap warm air",
          "Drains carry warm water through streets"
        ],
        "correctAnswer": 0,
        "explanation": "The first section says asphalt and concrete absorb sunlight and release it slowly."
      },
      {
        "id": 2,
        "text": "According to the passage, green roofs cool buildings mainly through",
        "questionType": "multiple-choice",
        "options": [
          "reflective paint",
          "shade and evaporation",
          "underground ventilation",
          "reduced traffic"
        ],
        "correctAnswer": 1,
        "explanation": "Section two names shade and evaporation as the cooling mechanisms."
      },
      {
        "id": 3,
        "text": "Which additional benefit of green roofs is mentioned?",
        "questionType": "multiple-choice",
        "options": [
          "Lower construction costs",
          "Higher property prices",
          "Retaining rainwater",
          "Producing food for residents"
        ],
        "correctAnswer": 2,
        "explanation": "The passage states that green roofs retain rainwater that would overload drains."
      },
      {
        "id": 4,
        "text": "Why is the street-level effect of green roofs described as modest?",
        "questionType": "multiple-choice",
        "options": [
          "The plants die in hot weather",
          "Most roofs are too small for plants",
          "Rooftop temperatures do not change",
          "They must be adopted across whole districts to matter"
        ],
        "correctAnswer": 3,
        "explanation": "Section three links a noticeable effect to district-wide adoption."
      },
      {
        "id": 5,
        "text": "What is the writer's overall position?",
        "questionType": "multiple-choice",
        "options": [
          "Green roofs are useful but need coordinated policy",
          "Green roofs should be banned",
          "The heat island effect is exaggerated",
          "Only Singapore can afford green roofs"
        ],
        "correctAnswer": 0,
        "explanation": "The conclusion stresses that planning policy matters as much as the technology."
      }
    ]
  })
}

fn goethe_passage() -> Value {
  let sections = [
    (
      "Mein Tag",
      "Ich heiße Anna und wohne in Köln. Jeden Morgen stehe ich um sieben Uhr auf und trinke einen Kaffee.",
    ),
    (
      "Arbeit und Freizeit",
      "Ich arbeite in einer Bäckerei. Am Nachmittag gehe ich oft in den Park. \
       Am Wochenende besuche ich meine Familie in Bonn.",
    ),
  ];
  let content = sections.iter().map(|(_, body)| *body).collect::<Vec<_>>().join("\n\n");
  json!({
    "title": "Ein Tag in Köln",
    "content": content,
    "sections": sections
      .iter()
      .map(|(heading, body)| json!({ "heading": heading, "content": body }))
      .collect::<Vec<_>>(),
    "vocabulary": [
      {
        "word": "aufstehen",
        "definition": "das Bett am Morgen verlassen",
        "example": "Ich stehe um sieben Uhr auf.",
        "synonyms": ["sich erheben"]
      },
      {
        "word": "die Bäckerei",
        "definition": "ein Geschäft, in dem man Brot kauft"
      }
    ]
  })
}

fn goethe_questions() -> Value {
  json!({
    "questions": [
      {
        "id": 1,
        "text": "Wo wohnt Anna?",
        "context": "Absatz 1",
        "questionType": "multiple-choice",
        "options": ["In Bonn", "In Köln", "In Berlin", "In München"],
        "correctAnswer": 1,
        "explanation": "Im ersten Absatz steht: Ich wohne in Köln."
      },
      {
        "id": 2,
        "text": "Wann steht Anna auf?",
        "context": "Absatz 1",
        "questionType": "multiple-choice",
        "options": ["Um sechs Uhr", "Um acht Uhr", "Um sieben Uhr", "Um neun Uhr"],
        "correctAnswer": 2,
        "explanation": "Sie steht jeden Morgen um sieben Uhr auf."
      },
      {
        "id": 3,
        "text": "Was trinkt Anna am Morgen?",
        "context": "Absatz 1",
        "questionType": "multiple-choice",
        "options": ["Kaffee", "Tee", "Wasser", "Saft"],
        "correctAnswer": 0,
        "explanation": "Sie trinkt einen Kaffee."
      },
      {
        "id": 4,
        "text": "Wo arbeitet Anna?",
        "context": "Absatz 2",
        "questionType": "multiple-choice",
        "options": ["In einer Schule", "In einem Park", "In einem Hotel", "In einer Bäckerei"],
        "correctAnswer": 3,
        "explanation": "Im zweiten Absatz steht: Ich arbeite in einer Bäckerei."
      },
      {
        "id": 5,
        "text": "Wen besucht Anna am Wochenende?",
        "context": "Absatz 2",
        "questionType": "multiple-choice",
        "options": ["Ihre Freunde", "Ihre Familie", "Ihre Kollegen", "Ihren Lehrer"],
        "correctAnswer": 1,
        "explanation": "Am Wochenende besucht sie ihre Familie in Bonn."
      }
    ]
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::exams::factory::build_handler;
  use futures::StreamExt;

  #[test]
  fn canned_content_satisfies_every_shipped_schema() {
    for exam in ExamType::ALL {
      let handler = build_handler(exam);
      for level in handler.difficulty_levels() {
        let passage = handler.passage_schema(&level);
        let questions = handler.questions_schema(&level);
        assert_eq!(
          passage.validate(&seed_content(exam, SchemaKind::Passage)),
          Ok(()),
          "{} / {}",
          exam,
          passage.name
        );
        assert_eq!(
          questions.validate(&seed_content(exam, SchemaKind::Questions)),
          Ok(()),
          "{} / {}",
          exam,
          questions.name
        );
      }
    }
  }

  #[tokio::test]
  async fn reveals_growing_partials_then_final_value() {
    let model = SeedModel::new(16, Duration::ZERO);
    let schema = Arc::new(crate::exams::ielts::passage_schema());
    let stream = model.stream_object(schema, "prompt".into());
    let partials: Vec<Value> = stream.partials.collect().await;
    assert!(partials.len() > 3);
    let final_value = stream.object.await.unwrap();
    assert_eq!(final_value, seed_content(ExamType::Ielts, SchemaKind::Passage));
    assert_ne!(partials[0], final_value);
    assert_eq!(partials.last(), Some(&final_value));
  }
}
