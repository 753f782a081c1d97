//! Loading application configuration from TOML, with environment overrides.
//!
//! See `AppConfig` for the expected schema. Every section and field is
//! optional; missing values take the defaults below.

use std::time::Duration;

use serde::Deserialize;
use tracing::{error, info, warn};

use crate::domain::ExamType;

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct AppConfig {
  /// Exam type used when a request names none or an unknown one.
  pub default_exam_type: String,
  pub model: ModelSettings,
  pub prompts: Prompts,
  pub stream: StreamSettings,
  pub seed: SeedSettings,
  pub client: ClientSettings,
}

impl Default for AppConfig {
  fn default() -> Self {
    Self {
      default_exam_type: ExamType::Ielts.as_str().into(),
      model: ModelSettings::default(),
      prompts: Prompts::default(),
      stream: StreamSettings::default(),
      seed: SeedSettings::default(),
      client: ClientSettings::default(),
    }
  }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
  pub base_url: String,
  pub model: String,
  pub temperature: f32,
  pub request_timeout_secs: u64,
}

impl Default for ModelSettings {
  fn default() -> Self {
    Self {
      base_url: "https://api.openai.com/v1".into(),
      model: "gpt-4o-mini".into(),
      temperature: 0.7,
      request_timeout_secs: 120,
    }
  }
}

/// Prompts used by the OpenAI client. `{schema}` is replaced by the JSON Schema
/// of the value being generated.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub system_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      system_template: "You are an experienced language examiner who writes reading practice material.\n\
        Respond ONLY with a single JSON object, no Markdown and no commentary.\n\
        The object MUST validate against this JSON Schema:\n{schema}"
        .into(),
    }
  }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct StreamSettings {
  /// Upper bound on a whole content stream.
  pub max_duration_secs: u64,
  /// Longest wait for the next model element.
  pub idle_timeout_secs: u64,
  pub keep_alive_secs: u64,
}

impl Default for StreamSettings {
  fn default() -> Self {
    Self { max_duration_secs: 300, idle_timeout_secs: 90, keep_alive_secs: 15 }
  }
}

impl StreamSettings {
  pub fn max_duration(&self) -> Duration { Duration::from_secs(self.max_duration_secs) }
  pub fn idle_timeout(&self) -> Duration { Duration::from_secs(self.idle_timeout_secs) }
  pub fn keep_alive(&self) -> Duration { Duration::from_secs(self.keep_alive_secs) }
}

/// Pacing of the offline seed model.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SeedSettings {
  pub chunk_chars: usize,
  pub chunk_delay_ms: u64,
}

impl Default for SeedSettings {
  fn default() -> Self {
    Self { chunk_chars: 32, chunk_delay_ms: 25 }
  }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
  /// Pause between showing an unimplemented-level message and returning to configuration.
  pub unimplemented_redirect_ms: u64,
}

impl Default for ClientSettings {
  fn default() -> Self {
    Self { unimplemented_redirect_ms: 2500 }
  }
}

impl AppConfig {
  /// Parsed default exam type; unknown values fall back to IELTS.
  pub fn default_exam(&self) -> ExamType {
    self.default_exam_type.parse().unwrap_or_else(|e| {
      warn!(target: "examcraft_backend", error = %e, "Configured default exam type is invalid; using ielts");
      ExamType::Ielts
    })
  }

  /// Apply environment overrides on top of file values.
  pub fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("DEFAULT_EXAM_TYPE") { self.default_exam_type = v; }
    if let Some(v) = var("OPENAI_BASE_URL") { self.model.base_url = v; }
    if let Some(v) = var("OPENAI_MODEL") { self.model.model = v; }
  }
}

/// Attempt to load `AppConfig` from APP_CONFIG_PATH. On any IO/parse error the
/// defaults are used. Environment overrides are applied either way.
pub fn load_app_config_from_env() -> AppConfig {
  let mut cfg = match std::env::var("APP_CONFIG_PATH") {
    Ok(path) => read_config(&path).unwrap_or_default(),
    Err(_) => AppConfig::default(),
  };
  cfg.apply_env_overrides(|k| std::env::var(k).ok().filter(|v| !v.is_empty()));
  cfg
}

fn read_config(path: &str) -> Option<AppConfig> {
  match std::fs::read_to_string(path) {
    Ok(s) => match toml::from_str::<AppConfig>(&s) {
      Ok(cfg) => {
        info!(target: "examcraft_backend", %path, "Loaded app config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "examcraft_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "examcraft_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn partial_toml_keeps_defaults() {
    let cfg: AppConfig = toml::from_str(
      r#"
        default_exam_type = "goethe"
        [stream]
        idle_timeout_secs = 5
        [seed]
        chunk_delay_ms = 0
      "#,
    )
    .unwrap();
    assert_eq!(cfg.default_exam(), ExamType::Goethe);
    assert_eq!(cfg.stream.idle_timeout(), Duration::from_secs(5));
    assert_eq!(cfg.stream.max_duration_secs, 300);
    assert_eq!(cfg.seed.chunk_chars, 32);
    assert_eq!(cfg.seed.chunk_delay_ms, 0);
    assert_eq!(cfg.model.model, "gpt-4o-mini");
    assert!(cfg.prompts.system_template.contains("{schema}"));
  }

  #[test]
  fn invalid_default_exam_falls_back_to_ielts() {
    let cfg = AppConfig { default_exam_type: "toefl".into(), ..AppConfig::default() };
    assert_eq!(cfg.default_exam(), ExamType::Ielts);
  }

  #[test]
  fn env_overrides_win() {
    let mut cfg = AppConfig::default();
    cfg.apply_env_overrides(|k| match k {
      "DEFAULT_EXAM_TYPE" => Some("goethe".into()),
      "OPENAI_MODEL" => Some("gpt-4o".into()),
      _ => None,
    });
    assert_eq!(cfg.default_exam(), ExamType::Goethe);
    assert_eq!(cfg.model.model, "gpt-4o");
    assert_eq!(cfg.model.base_url, "https://api.openai.com/v1");
  }
}
