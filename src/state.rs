//! Application state: configuration, exam handler factory and the generation service.
//!
//! This module owns:
//!   - the loaded `AppConfig`
//!   - the exam handler factory (one cached handler per exam type)
//!   - the model behind the generation service
//!
//! With OPENAI_API_KEY set the OpenAI streaming model is used; otherwise the
//! offline seed model serves canned content so the whole flow stays usable.

use std::{sync::Arc, time::Duration};

use tracing::{info, instrument};

use crate::config::AppConfig;
use crate::exams::ExamHandlerFactory;
use crate::logic::StreamLimits;
use crate::model::{ObjectModel, OpenAiModel, SeedModel};
use crate::service::GenerationService;

pub struct AppState {
    pub config: AppConfig,
    pub factory: Arc<ExamHandlerFactory>,
    pub service: GenerationService,
}

impl AppState {
    /// Build state from config: pick the model, warm the handler cache.
    #[instrument(level = "info", skip_all)]
    pub fn new(config: AppConfig) -> Self {
        let model: Arc<dyn ObjectModel> = match OpenAiModel::from_env(&config.model, &config.prompts) {
            Some(oa) => {
                info!(target: "examcraft_backend", base_url = %oa.base_url, model = %oa.model, "OpenAI enabled.");
                Arc::new(oa)
            }
            None => {
                info!(target: "examcraft_backend", "OpenAI disabled (no OPENAI_API_KEY). Using seed content.");
                Arc::new(SeedModel::new(
                    config.seed.chunk_chars,
                    Duration::from_millis(config.seed.chunk_delay_ms),
                ))
            }
        };
        Self::with_model(config, model)
    }

    /// Build state around an explicit model (tests, alternative providers).
    pub fn with_model(config: AppConfig, model: Arc<dyn ObjectModel>) -> Self {
        let factory = Arc::new(ExamHandlerFactory::new(config.default_exam()));
        factory.preload();
        let service = GenerationService::new(factory.clone(), model);
        info!(target: "examcraft_backend", default_exam = %factory.default_exam(), model = %service.model_name(), "Application state ready");
        Self { config, factory, service }
    }

    pub fn stream_limits(&self) -> StreamLimits {
        StreamLimits::from(&self.config.stream)
    }
}
