//! Static difficulty catalogues. Built once per exam handler.

use crate::domain::DifficultyDescriptor;

pub fn ielts_levels() -> Vec<DifficultyDescriptor> {
  vec![
    DifficultyDescriptor::ielts(
      "band-4-5",
      "Band 4-5",
      "Limited English proficiency suitable for basic communication",
      1,
      4.5,
      "Limited User",
    ),
    DifficultyDescriptor::ielts(
      "band-5-6",
      "Band 5-6",
      "Modest English proficiency for partial communication in many contexts",
      2,
      5.5,
      "Modest User",
    ),
    DifficultyDescriptor::ielts(
      "band-6-7",
      "Band 6-7",
      "Competent English proficiency for general effective communication",
      3,
      6.5,
      "Competent User",
    ),
    DifficultyDescriptor::ielts(
      "band-7-8",
      "Band 7-8",
      "Good English proficiency with occasional inaccuracies",
      4,
      7.5,
      "Good User",
    ),
    DifficultyDescriptor::ielts(
      "band-8-9",
      "Band 8-9",
      "Very good to expert English proficiency",
      5,
      8.5,
      "Expert User",
    ),
  ]
}

pub fn goethe_levels() -> Vec<DifficultyDescriptor> {
  vec![
    DifficultyDescriptor::goethe(
      "a1",
      "Can understand and use familiar everyday expressions and very basic phrases",
      1,
      "A1",
      "Goethe-Zertifikat A1: Start Deutsch 1",
    ),
    DifficultyDescriptor::goethe(
      "a2",
      "Can understand sentences and frequently used expressions related to areas of most immediate relevance",
      2,
      "A2",
      "Goethe-Zertifikat A2",
    ),
    DifficultyDescriptor::goethe(
      "b1",
      "Can deal with most situations likely to arise while travelling in an area where the language is spoken",
      3,
      "B1",
      "Goethe-Zertifikat B1",
    ),
    DifficultyDescriptor::goethe(
      "b2",
      "Can interact with a degree of fluency and spontaneity that makes regular interaction with native speakers possible",
      4,
      "B2",
      "Goethe-Zertifikat B2",
    ),
    DifficultyDescriptor::goethe(
      "c1",
      "Can express ideas fluently and spontaneously without much searching for expressions",
      5,
      "C1",
      "Goethe-Zertifikat C1",
    ),
    DifficultyDescriptor::goethe(
      "c2",
      "Can understand with ease virtually everything heard or read",
      6,
      "C2",
      "Goethe-Zertifikat C2: Großes Deutsches Sprachdiplom",
    ),
  ]
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::HashSet;

  #[test]
  fn ids_and_ranks_are_unique() {
    for levels in [ielts_levels(), goethe_levels()] {
      assert!(!levels.is_empty());
      let ids: HashSet<_> = levels.iter().map(|d| d.id.clone()).collect();
      let ranks: HashSet<_> = levels.iter().map(|d| d.rank).collect();
      assert_eq!(ids.len(), levels.len());
      assert_eq!(ranks.len(), levels.len());
    }
  }

  #[test]
  fn goethe_names_are_cefr_codes() {
    for d in goethe_levels() {
      assert_eq!(Some(d.name.as_str()), d.cefr());
    }
  }
}
