//! Error type shared by the compositing engine
//!
//! Per-pixel conditions (unmapped correspondences, out-of-bounds lookups,
//! partial skeleton tracking) are not errors: they are absorbed where they
//! happen and counted in the frame report. Only conditions that make a
//! whole frame impossible end up here.

use std::io;

pub type Result<T> = std::result::Result<T, CompositeError>;

#[derive(Debug, thiserror::Error)]
pub enum CompositeError {
    #[error("{what}: expected {expected} cells, got {actual}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("correspondence maps {actual}, the {resolution} domain needs {expected}")]
    CorrespondenceDomain {
        resolution: &'static str,
        expected: &'static str,
        actual: &'static str,
    },
    #[error("recursive fill exceeded its depth budget of {budget} levels")]
    RecursionBudget { budget: usize },
    #[error("{0} worker panicked")]
    WorkerPanicked(&'static str),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl From<serde_json::Error> for CompositeError {
    fn from(e: serde_json::Error) -> Self {
        Self::Config(e.to_string())
    }
}
