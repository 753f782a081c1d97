//! SSE endpoint: one content stream per request.
//!
//! The generation runs in its own task and writes `StreamEvent`s into a small
//! bounded channel; the response body drains it. When the client disconnects
//! axum drops the body, the channel closes and the task stops at its next
//! suspension point.

use std::{convert::Infallible, sync::Arc};
use axum::{
  extract::{Query, State},
  response::sse::{Event, KeepAlive, Sse},
};
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, info, instrument, Instrument, Span};
use uuid::Uuid;

use crate::logic::{stream_content, ContentRequest, EventSink};
use crate::protocol::{ContentQuery, StreamEvent, GENERIC_FAILURE};
use crate::state::AppState;

/// Events buffered between the generation task and a slow client.
const EVENT_BUFFER: usize = 16;

#[instrument(level = "info", skip(state), fields(stream_id = %Uuid::new_v4()))]
pub async fn sse_reading_content(
  State(state): State<Arc<AppState>>,
  Query(q): Query<ContentQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
  let exam_type = state.factory.resolve_exam_type(q.exam_type.as_deref());
  let request = ContentRequest { exam_type, difficulty: q.difficulty };
  info!(target: "examcraft_backend", %exam_type, difficulty = ?request.difficulty, "SSE content stream opened");

  let (tx, rx) = mpsc::channel(EVENT_BUFFER);
  let limits = state.stream_limits();
  let task_state = state.clone();
  tokio::spawn(
    async move {
      stream_content(&task_state.service, request, limits, EventSink::new(tx)).await;
    }
    .instrument(Span::current()),
  );

  let events = ReceiverStream::new(rx).map(|ev| Ok(to_sse_event(&ev)));
  Sse::new(events).keep_alive(KeepAlive::new().interval(state.config.stream.keep_alive()))
}

fn to_sse_event(ev: &StreamEvent) -> Event {
  match Event::default().json_data(ev) {
    Ok(event) => event,
    Err(e) => {
      error!(target: "examcraft_backend", error = %e, "Failed to serialize stream event");
      Event::default().data(format!(r#"{{"type":"error","error":"{GENERIC_FAILURE}"}}"#))
    }
  }
}
