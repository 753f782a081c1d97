//! Client side of the content stream: the reducer over `StreamEvent`s and the
//! connection driver that feeds it.

pub mod consumer;
pub mod state;

pub use consumer::{consume, ContentClient, ReadingSession, StreamEnd};
pub use state::{ielts_band, Effect, PassageView, ReadingState, Score};
