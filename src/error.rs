//! Error types for lexiquiz
//!
//! This module provides error handling using thiserror for structured error
//! definitions and anyhow for error propagation at the binary boundary.
//!
//! Generation-time errors (`PoolTooSmall`, `UniverseLookupFailed`, `SenseNotFound`)
//! are recovered by the batch job. Serving and scoring errors are surfaced to the
//! caller as typed results.

use crate::scoring::ScoreResult;
use thiserror::Error;

/// Main error type for lexiquiz operations
#[derive(Error, Debug)]
pub enum McqError {
    /// Fewer validated distractor candidates than the minimum pool size
    #[error("Pool too small for sense {sense_id}: {found} candidates, {required} required")]
    PoolTooSmall {
        sense_id: String,
        found: usize,
        required: usize,
    },

    /// Serving asked for more distractors than the pool can supply
    #[error("Insufficient pool: {requested} distractors requested, {available} available")]
    InsufficientPool { requested: usize, available: usize },

    /// Submission for a presentation that was never served or has expired
    #[error("Unknown presentation: {0}")]
    UnknownPresentation(String),

    /// Second submission for an already scored presentation
    #[error("Presentation already scored (is_correct: {})", first.is_correct)]
    DuplicatePresentation { first: Box<ScoreResult> },

    /// An attempt for this presentation is already in the log
    #[error("Attempt already recorded for presentation: {0}")]
    AttemptConflict(String),

    /// A universe (lexicon range) query failed
    #[error("Universe lookup failed: {0}")]
    UniverseLookupFailed(String),

    /// Sense not found in the lexicon
    #[error("Sense not found: {0}")]
    SenseNotFound(String),

    /// Item not found
    #[error("Item not found: {0}")]
    ItemNotFound(String),

    /// Item was deactivated by the scorer
    #[error("Item is inactive: {0}")]
    ItemInactive(String),

    /// Distractor pool not found for a sense
    #[error("Pool not found for sense: {0}")]
    PoolNotFound(String),

    /// Item references a pool version that is no longer current
    #[error("Pool version mismatch for sense {sense_id}: item expects v{expected}, store has v{found}")]
    PoolVersionMismatch {
        sense_id: String,
        expected: u32,
        found: u32,
    },

    /// Caller supplied an invalid argument
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database operation failed
    #[error("Database error: {0}")]
    Database(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl McqError {
    /// Errors the batch generator recovers from by skipping the sense
    pub fn is_generation_skip(&self) -> bool {
        matches!(
            self,
            McqError::PoolTooSmall { .. }
                | McqError::SenseNotFound(_)
                | McqError::UniverseLookupFailed(_)
        )
    }
}

/// Result type alias for lexiquiz operations
pub type Result<T> = std::result::Result<T, McqError>;

/// Convert anyhow::Error to McqError
impl From<anyhow::Error> for McqError {
    fn from(err: anyhow::Error) -> Self {
        McqError::Other(err.to_string())
    }
}

impl From<rusqlite::Error> for McqError {
    fn from(err: rusqlite::Error) -> Self {
        McqError::Database(err.to_string())
    }
}

impl From<bincode::Error> for McqError {
    fn from(err: bincode::Error) -> Self {
        McqError::Other(format!("Bincode error: {}", err))
    }
}
