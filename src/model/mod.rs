//! Language-model capability.
//!
//! A model takes `(schema, prompt)` and answers with an `ObjectStream`: a lazy
//! sequence of partial values that grow towards the schema, plus a future that
//! resolves to the final, validated value. Implementations run as spawned
//! tasks and talk to the stream through an `ObjectSink`.
//!
//! Cancellation is cooperative. Dropping the `ObjectStream` (both halves)
//! closes the final-value channel; producers check `ObjectSink::partial` or
//! `ObjectSink::is_cancelled` between steps and stop once it reports closed.

use std::sync::Arc;

use futures::{future::BoxFuture, stream::BoxStream, FutureExt, StreamExt};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::error::ModelError;
use crate::schema::OutputSchema;

pub mod openai;
pub mod partial_json;
pub mod scripted;
pub mod seed;

pub use openai::OpenAiModel;
pub use scripted::ScriptedModel;
pub use seed::SeedModel;

pub trait ObjectModel: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    fn stream_object(&self, schema: Arc<OutputSchema>, prompt: String) -> ObjectStream;
}

pub struct ObjectStream {
    pub partials: BoxStream<'static, Value>,
    pub object: BoxFuture<'static, Result<Value, ModelError>>,
}

impl ObjectStream {
    /// Discard partials and wait for the final value.
    pub async fn into_object(self) -> Result<Value, ModelError> {
        let ObjectStream { partials, object } = self;
        drop(partials);
        object.await
    }

    /// Already-failed stream; yields no partials.
    pub fn failed(err: ModelError) -> Self {
        Self {
            partials: futures::stream::empty().boxed(),
            object: futures::future::ready(Err(err)).boxed(),
        }
    }
}

/// Producer half of an `ObjectStream`.
pub struct ObjectSink {
    partials: mpsc::UnboundedSender<Value>,
    object: oneshot::Sender<Result<Value, ModelError>>,
}

impl ObjectSink {
    /// Emit a partial value. Returns `false` once the consumer has gone away.
    pub fn partial(&self, value: Value) -> bool {
        if self.is_cancelled() {
            return false;
        }
        // Partials may be ignored (non-streaming callers); that is not a cancellation.
        let _ = self.partials.send(value);
        true
    }

    pub fn is_cancelled(&self) -> bool {
        self.object.is_closed()
    }

    /// Resolve the final value and close the partial sequence.
    pub fn finish(self, result: Result<Value, ModelError>) {
        let ObjectSink { partials, object } = self;
        drop(partials);
        let _ = object.send(result);
    }
}

pub fn object_channel() -> (ObjectSink, ObjectStream) {
    let (partial_tx, partial_rx) = mpsc::unbounded_channel();
    let (object_tx, object_rx) = oneshot::channel();
    let stream = ObjectStream {
        partials: UnboundedReceiverStream::new(partial_rx).boxed(),
        object: async move { object_rx.await.unwrap_or(Err(ModelError::Dropped)) }.boxed(),
    };
    (ObjectSink { partials: partial_tx, object: object_tx }, stream)
}

/// Final-value check shared by every model.
pub fn validate_final(schema: &OutputSchema, value: Value) -> Result<Value, ModelError> {
    schema
        .validate(&value)
        .map_err(|reason| ModelError::Schema { schema: schema.name.clone(), reason })?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn partials_then_final_value() {
        let (sink, stream) = object_channel();
        assert!(sink.partial(json!({ "title": "A" })));
        assert!(sink.partial(json!({ "title": "AB" })));
        sink.finish(Ok(json!({ "title": "ABC", "content": "x" })));

        let partials: Vec<Value> = stream.partials.collect().await;
        assert_eq!(partials.len(), 2);
        assert_eq!(stream.object.await.unwrap()["title"], "ABC");
    }

    #[tokio::test]
    async fn dropped_sink_resolves_to_dropped() {
        let (sink, stream) = object_channel();
        drop(sink);
        assert!(matches!(stream.into_object().await, Err(ModelError::Dropped)));
    }

    #[tokio::test]
    async fn ignoring_partials_is_not_cancellation() {
        let (sink, stream) = object_channel();
        let ObjectStream { partials, object } = stream;
        drop(partials);
        assert!(sink.partial(json!({})));
        sink.finish(Ok(json!({ "ok": true })));
        assert_eq!(object.await.unwrap()["ok"], true);
    }

    #[tokio::test]
    async fn dropping_stream_cancels_producer() {
        let (sink, stream) = object_channel();
        drop(stream);
        assert!(sink.is_cancelled());
        assert!(!sink.partial(json!({})));
    }
}
