//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs its parameters and basic result info.

use std::sync::Arc;
use axum::{extract::{Path, State}, http::StatusCode, Json, response::{IntoResponse, Response}};
use tracing::{error, info, instrument};

use crate::logic::{generate_reading, ContentRequest, ReadingOutcome};
use crate::protocol::*;
use crate::state::AppState;

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse { Json(HealthOut { ok: true }) }

#[instrument(level = "info", skip(state))]
pub async fn http_list_exams(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(ExamsOut { default_exam_type: state.factory.default_exam(), exam_types: state.service.exam_types() })
}

#[instrument(level = "info", skip(state), fields(%exam_type))]
pub async fn http_get_levels(
  State(state): State<Arc<AppState>>,
  Path(exam_type): Path<String>,
) -> impl IntoResponse {
  let exam = state.factory.resolve_exam_type(Some(&exam_type));
  let (levels, default_level) = state.service.difficulty_levels(exam);
  info!(target: "examcraft_backend", %exam, count = levels.len(), default = %default_level.id, "HTTP levels served");
  Json(LevelsOut { exam_type: exam, default_level: default_level.id, levels })
}

#[instrument(level = "info", skip(state, body), fields(exam_type = ?body.exam_type, difficulty = ?body.difficulty))]
pub async fn http_post_generate(
  State(state): State<Arc<AppState>>,
  Json(body): Json<ContentQuery>,
) -> Response {
  let exam_type = state.factory.resolve_exam_type(body.exam_type.as_deref());
  let request = ContentRequest { exam_type, difficulty: body.difficulty };
  match generate_reading(&state.service, request).await {
    Ok(ReadingOutcome::Ready(out)) => {
      info!(target: "generation", exam = %out.exam_type, level = %out.difficulty, "HTTP reading set served");
      Json(out).into_response()
    }
    Ok(ReadingOutcome::UnimplementedLevel(message)) => {
      info!(target: "generation", %exam_type, "HTTP reading set refused: level not implemented");
      let body = ErrorOut { error: message, error_type: Some(StreamErrorType::UnimplementedLevel) };
      (StatusCode::UNPROCESSABLE_ENTITY, Json(body)).into_response()
    }
    Err(e) => {
      error!(target: "generation", %exam_type, error = %e, "HTTP reading generation failed");
      let body = ErrorOut { error: GENERIC_FAILURE.into(), error_type: None };
      (StatusCode::BAD_GATEWAY, Json(body)).into_response()
    }
  }
}
