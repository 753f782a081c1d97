//! Scripted model for tests: plays back queued replies and records what it was asked.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use serde_json::Value;

use super::{object_channel, ObjectModel, ObjectStream};
use crate::error::ModelError;
use crate::schema::OutputSchema;

/// One queued answer: partials in order, then a final value or an error.
#[derive(Clone, Debug)]
pub struct ScriptedReply {
    pub partials: Vec<Value>,
    pub outcome: Result<Value, String>,
    pub step_delay: Duration,
}

impl ScriptedReply {
    pub fn ok(partials: Vec<Value>, value: Value) -> Self {
        Self { partials, outcome: Ok(value), step_delay: Duration::ZERO }
    }

    pub fn fail(partials: Vec<Value>, message: &str) -> Self {
        Self { partials, outcome: Err(message.to_string()), step_delay: Duration::ZERO }
    }

    pub fn with_delay(mut self, step_delay: Duration) -> Self {
        self.step_delay = step_delay;
        self
    }
}

#[derive(Clone, Debug)]
pub struct ScriptedCall {
    pub schema: String,
    pub prompt: String,
}

#[derive(Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<ScriptedReply>>,
    calls: Mutex<Vec<ScriptedCall>>,
    emitted: Arc<AtomicUsize>,
    abandoned: Arc<AtomicBool>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<ScriptedReply>) -> Self {
        Self { replies: Mutex::new(replies.into()), ..Self::default() }
    }

    pub fn calls(&self) -> Vec<ScriptedCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Partials handed to consumers so far, across all calls.
    pub fn emitted(&self) -> usize {
        self.emitted.load(Ordering::SeqCst)
    }

    /// True once a producer noticed its consumer was gone.
    pub fn abandoned(&self) -> bool {
        self.abandoned.load(Ordering::SeqCst)
    }
}

impl ObjectModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    fn stream_object(&self, schema: Arc<OutputSchema>, prompt: String) -> ObjectStream {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(ScriptedCall { schema: schema.name.clone(), prompt });

        let next = self.replies.lock().unwrap_or_else(|e| e.into_inner()).pop_front();
        let Some(reply) = next else {
            return ObjectStream::failed(ModelError::Other("no scripted reply left".into()));
        };

        let (sink, stream) = object_channel();
        let emitted = self.emitted.clone();
        let abandoned = self.abandoned.clone();
        tokio::spawn(async move {
            for partial in reply.partials {
                if !reply.step_delay.is_zero() {
                    tokio::time::sleep(reply.step_delay).await;
                }
                if !sink.partial(partial) {
                    abandoned.store(true, Ordering::SeqCst);
                    return;
                }
                emitted.fetch_add(1, Ordering::SeqCst);
            }
            if !reply.step_delay.is_zero() {
                tokio::time::sleep(reply.step_delay).await;
            }
            if sink.is_cancelled() {
                abandoned.store(true, Ordering::SeqCst);
                return;
            }
            sink.finish(reply.outcome.map_err(ModelError::Other));
        });
        stream
    }
}
