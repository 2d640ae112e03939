//! Cognition layer: contradiction detection between an incident report and
//! witness statements, grounded in retrieved statutes.
//!
//! The reasoning backend is advisory. Its output is parsed leniently,
//! discarded on any parse failure, and every severity is recomputed from
//! the contradiction label. Without a reachable backend the engine falls
//! back to lexical comparison and marks the report `basic`.

pub mod backend;
pub mod engine;
pub mod lexical;
pub mod parser;
pub mod prompt;
pub mod severity;
pub mod types;

pub use backend::*;
pub use engine::*;
pub use severity::*;
pub use types::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CognitionError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Reasoning backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Malformed reasoning response: {0}")]
    MalformedResponse(String),
}
