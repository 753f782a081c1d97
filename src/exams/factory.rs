//! Exam handler factory: one cached `ExamHandler` per exam type.
//!
//! The factory is an injected value (held by `AppState`), not a global.
//! Handlers are built on first use and never evicted. Construction is pure, so
//! two racing first-users may both build a handler; the first one stored wins
//! and every caller receives that instance.

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use serde::Serialize;
use tracing::{info, instrument, warn};

use super::{goethe, ielts, ExamHandler};
use crate::domain::{ExamType, Language};
use crate::error::InvalidExamTypeError;

/// Builds the handler of one exam type. Replaceable in tests.
pub type HandlerBuilder = fn(ExamType) -> ExamHandler;

pub fn build_handler(exam_type: ExamType) -> ExamHandler {
    match exam_type {
        ExamType::Ielts => ielts::handler(),
        ExamType::Goethe => goethe::handler(),
    }
}

/// Exam type metadata as listed by `GET /api/v1/exams`.
#[derive(Clone, Debug, Serialize)]
pub struct ExamTypeInfo {
    #[serde(rename = "type")]
    pub exam_type: ExamType,
    pub name: &'static str,
    pub description: &'static str,
    pub language: Language,
}

pub struct ExamHandlerFactory {
    handlers: RwLock<HashMap<ExamType, Arc<ExamHandler>>>,
    build: HandlerBuilder,
    default_exam: ExamType,
}

impl ExamHandlerFactory {
    pub fn new(default_exam: ExamType) -> Self {
        Self::with_builder(default_exam, build_handler)
    }

    pub fn with_builder(default_exam: ExamType, build: HandlerBuilder) -> Self {
        Self { handlers: RwLock::new(HashMap::new()), build, default_exam }
    }

    pub fn default_exam(&self) -> ExamType {
        self.default_exam
    }

    /// Cached handler for `exam_type`, built on first request.
    pub fn get_handler(&self, exam_type: ExamType) -> Arc<ExamHandler> {
        // A poisoned lock only means another thread panicked mid-access; the map
        // itself is append-only and stays consistent.
        if let Some(h) = self
            .handlers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&exam_type)
        {
            return h.clone();
        }

        let built = Arc::new((self.build)(exam_type));
        let mut map = self.handlers.write().unwrap_or_else(|e| e.into_inner());
        map.entry(exam_type).or_insert(built).clone()
    }

    pub fn validate_exam_type(&self, raw: &str) -> Result<ExamType, InvalidExamTypeError> {
        raw.parse()
    }

    /// Exam type from external input; invalid or missing values become the default.
    pub fn resolve_exam_type(&self, raw: Option<&str>) -> ExamType {
        match raw {
            None => self.default_exam,
            Some(raw) => self.validate_exam_type(raw).unwrap_or_else(|e| {
                warn!(target: "generation", error = %e, default = %self.default_exam, "Falling back to default exam type");
                self.default_exam
            }),
        }
    }

    pub fn list_exam_types(&self) -> Vec<ExamTypeInfo> {
        ExamType::ALL
            .into_iter()
            .map(|t| ExamTypeInfo {
                exam_type: t,
                name: t.display_name(),
                description: t.description(),
                language: t.language(),
            })
            .collect()
    }

    /// Build every handler up front and log the catalogue inventory.
    #[instrument(level = "info", skip_all)]
    pub fn preload(&self) {
        for exam in ExamType::ALL {
            let handler = self.get_handler(exam);
            let levels = handler.difficulty_levels();
            let implemented = levels.iter().filter(|d| d.is_implemented).count();
            let calibrated = handler.implemented_levels().join(",");
            info!(
                target: "generation",
                %exam,
                levels = levels.len(),
                implemented,
                calibrated = %calibrated,
                default = %handler.default_difficulty().id,
                "Startup exam inventory"
            );
        }
    }

    #[cfg(test)]
    fn cached(&self) -> usize {
        self.handlers.read().map(|m| m.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static BUILDS: AtomicUsize = AtomicUsize::new(0);

    fn counting_builder(exam: ExamType) -> ExamHandler {
        BUILDS.fetch_add(1, Ordering::SeqCst);
        build_handler(exam)
    }

    #[test]
    fn handler_is_built_once_and_shared() {
        let factory = ExamHandlerFactory::with_builder(ExamType::Ielts, counting_builder);
        let before = BUILDS.load(Ordering::SeqCst);
        let a = factory.get_handler(ExamType::Goethe);
        let b = factory.get_handler(ExamType::Goethe);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(BUILDS.load(Ordering::SeqCst) - before, 1);
        assert_eq!(factory.cached(), 1);
    }

    #[test]
    fn concurrent_first_access_yields_one_instance() {
        let factory = Arc::new(ExamHandlerFactory::new(ExamType::Ielts));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let f = factory.clone();
                std::thread::spawn(move || f.get_handler(ExamType::Ielts))
            })
            .collect();
        let got: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(got.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(factory.cached(), 1);
    }

    #[test]
    fn invalid_exam_type_falls_back_to_default() {
        let factory = ExamHandlerFactory::new(ExamType::Ielts);
        assert!(factory.validate_exam_type("klingon").is_err());
        assert_eq!(factory.resolve_exam_type(Some("klingon")), ExamType::Ielts);
        assert_eq!(factory.resolve_exam_type(None), ExamType::Ielts);
        assert_eq!(factory.resolve_exam_type(Some("goethe")), ExamType::Goethe);

        let german_first = ExamHandlerFactory::new(ExamType::Goethe);
        assert_eq!(german_first.resolve_exam_type(Some("")), ExamType::Goethe);
    }

    #[test]
    fn lists_both_exam_types_with_languages() {
        let factory = ExamHandlerFactory::new(ExamType::Ielts);
        let list = factory.list_exam_types();
        assert_eq!(list.len(), 2);
        let v = serde_json::to_value(&list).unwrap();
        assert_eq!(v[0]["type"], "ielts");
        assert_eq!(v[0]["language"]["code"], "en");
        assert_eq!(v[1]["name"], "Goethe");
        assert_eq!(v[1]["language"]["name"], "German");
    }

    #[test]
    fn preload_fills_cache() {
        let factory = ExamHandlerFactory::new(ExamType::Ielts);
        factory.preload();
        assert_eq!(factory.cached(), 2);
    }
}
