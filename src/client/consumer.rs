//! Stream consumer: opens `/api/v1/reading/content`, decodes SSE frames and
//! feeds them to the reducer.
//!
//! One `ReadingSession` owns at most one live stream. Starting a new one
//! cancels the previous stream, and dropping the session cancels whatever is
//! still running.

use std::time::Duration;

use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::state::{Effect, ReadingState};
use crate::error::ClientError;
use crate::protocol::{LevelsOut, StreamEvent};
use crate::sse::SseDecoder;
use crate::util::trunc_for_log;

/// How a consumed stream ended.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamEnd {
    Completed,
    Failed(String),
    /// The level is not available; go back to configuration after `return_after`.
    Unimplemented { message: String, return_after: Duration },
    Cancelled,
    /// The server closed the connection without a terminal event.
    Disconnected,
}

/// Apply every frame of `body` to `state` until a terminal event, cancellation
/// or end of input. Malformed frames are logged and skipped.
pub async fn consume<S, B, E>(
    body: S,
    state: &mut ReadingState,
    cancel: &CancellationToken,
    mut observe: impl FnMut(&StreamEvent, &ReadingState),
) -> Result<StreamEnd, ClientError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    ClientError: From<E>,
{
    let mut body = std::pin::pin!(body);
    let mut decoder = SseDecoder::default();

    loop {
        let chunk = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(target: "examcraft_backend", "Stream cancelled by caller");
                return Ok(StreamEnd::Cancelled);
            }
            chunk = body.next() => chunk,
        };
        let (frames, done) = match chunk {
            Some(bytes) => (decoder.push(bytes?.as_ref()), false),
            None => (decoder.finish().into_iter().collect::<Vec<_>>(), true),
        };

        for data in frames {
            if cancel.is_cancelled() {
                return Ok(StreamEnd::Cancelled);
            }
            let event = match serde_json::from_str::<StreamEvent>(&data) {
                Ok(ev) => ev,
                Err(e) => {
                    warn!(target: "examcraft_backend", error = %e, frame = %trunc_for_log(&data, 120), "Skipping malformed stream frame");
                    continue;
                }
            };
            let effects = state.apply(event.clone());
            observe(&event, state);
            if effects.contains(&Effect::CloseStream) {
                return Ok(end_of(&event, &effects));
            }
        }

        if done {
            warn!(target: "examcraft_backend", "Stream ended without a terminal event");
            return Ok(StreamEnd::Disconnected);
        }
    }
}

fn end_of(event: &StreamEvent, effects: &[Effect]) -> StreamEnd {
    let StreamEvent::Error { error, .. } = event else {
        return StreamEnd::Completed;
    };
    let redirect = effects.iter().find_map(|e| match e {
        Effect::ReturnToConfiguration { after } => Some(*after),
        _ => None,
    });
    match redirect {
        Some(return_after) => StreamEnd::Unimplemented { message: error.clone(), return_after },
        None => StreamEnd::Failed(error.clone()),
    }
}

/// HTTP side of the consumer.
#[derive(Clone, Debug)]
pub struct ContentClient {
    http: reqwest::Client,
    base_url: String,
}

impl ContentClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http: reqwest::Client::new(), base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Open a content stream; the body is still unread.
    #[instrument(level = "info", skip(self))]
    pub async fn open(&self, exam_type: &str, difficulty: Option<&str>) -> Result<reqwest::Response, ClientError> {
        let mut query = vec![("examType", exam_type)];
        if let Some(d) = difficulty {
            query.push(("difficulty", d));
        }
        let res = self
            .http
            .get(format!("{}/api/v1/reading/content", self.base_url))
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .query(&query)
            .send()
            .await?;
        if !res.status().is_success() {
            return Err(ClientError::Status(res.status().as_u16()));
        }
        Ok(res)
    }

    #[instrument(level = "debug", skip(self))]
    pub async fn levels(&self, exam_type: &str) -> Result<LevelsOut, ClientError> {
        let res = self
            .http
            .get(format!("{}/api/v1/exams/{}/levels", self.base_url, exam_type))
            .send()
            .await?;
        if !res.status().is_success() {
            return Err(ClientError::Status(res.status().as_u16()));
        }
        Ok(res.json::<LevelsOut>().await?)
    }
}

/// One practice session: the reducer state plus at most one live stream.
pub struct ReadingSession {
    client: ContentClient,
    pub state: ReadingState,
    root: CancellationToken,
    active: Option<CancellationToken>,
}

impl ReadingSession {
    pub fn new(client: ContentClient, redirect_delay: Duration) -> Self {
        Self { client, state: ReadingState::new(redirect_delay), root: CancellationToken::new(), active: None }
    }

    pub fn client(&self) -> &ContentClient {
        &self.client
    }

    /// Cancelling this token tears the session down: the live stream and any
    /// later one end as `StreamEnd::Cancelled`.
    pub fn teardown_token(&self) -> CancellationToken {
        self.root.clone()
    }

    /// Abort the live stream, if any.
    pub fn cancel(&mut self) {
        if let Some(token) = self.active.take() {
            token.cancel();
        }
    }

    /// Start generation from scratch. On an unimplemented level the state is
    /// reset after the redirect pause, which returns the caller to configuration.
    #[instrument(level = "info", skip(self, observe))]
    pub async fn start(
        &mut self,
        exam_type: &str,
        difficulty: Option<&str>,
        observe: impl FnMut(&StreamEvent, &ReadingState),
    ) -> Result<StreamEnd, ClientError> {
        self.cancel();
        self.state.reset();
        let token = self.root.child_token();
        self.active = Some(token.clone());

        let response = tokio::select! {
            biased;
            _ = token.cancelled() => return Ok(StreamEnd::Cancelled),
            res = self.client.open(exam_type, difficulty) => res?,
        };
        let end = consume(response.bytes_stream(), &mut self.state, &token, observe).await;
        self.active = None;
        let end = end?;

        if let StreamEnd::Unimplemented { return_after, .. } = &end {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(*return_after) => {}
            }
            self.state.reset();
        }
        info!(target: "examcraft_backend", ?end, questions = self.state.questions.len(), "Content stream consumed");
        Ok(end)
    }
}

impl Drop for ReadingSession {
    fn drop(&mut self) {
        self.root.cancel();
    }
}
