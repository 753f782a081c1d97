//! ExamCraft · reading practice generator.
//!
//! Generates IELTS and Goethe reading passages with matching comprehension
//! questions and streams them to clients as server-sent events while the model
//! is still writing. The `client` module is the consuming side of that stream.

pub mod client;
pub mod config;
pub mod domain;
pub mod error;
pub mod exams;
pub mod logic;
pub mod model;
pub mod protocol;
pub mod routes;
pub mod schema;
pub mod service;
pub mod sse;
pub mod state;
pub mod telemetry;
pub mod util;
