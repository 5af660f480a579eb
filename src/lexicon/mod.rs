//! Lexical sense provider interface
//!
//! The lexical knowledge base is an external collaborator. This module defines the
//! read-only interface the pool builder consumes, plus an in-memory implementation
//! used by tests, benchmarks and the CLI.

pub mod fixtures;
pub mod memory;

use crate::error::Result;
use crate::types::{PartOfSpeech, Sense, SenseId};

pub use memory::InMemoryLexicon;

/// Read-only access to senses and frequency-band queries
pub trait SenseProvider: Send + Sync {
    /// Look up a sense by id
    ///
    /// Returns `McqError::SenseNotFound` when the id is unknown.
    fn get_sense(&self, id: &SenseId) -> Result<Sense>;

    /// Ids of senses whose frequency rank lies in `[min_rank, max_rank]` and whose
    /// part of speech matches `pos` (adjective satellites match adjectives).
    ///
    /// Implementations must return ids in a stable order so pool building stays
    /// deterministic. Failures are reported as `McqError::UniverseLookupFailed`.
    fn senses_in_band(&self, min_rank: u32, max_rank: u32, pos: PartOfSpeech)
        -> Result<Vec<SenseId>>;
}

impl<T: SenseProvider + ?Sized> SenseProvider for std::sync::Arc<T> {
    fn get_sense(&self, id: &SenseId) -> Result<Sense> {
        (**self).get_sense(id)
    }

    fn senses_in_band(
        &self,
        min_rank: u32,
        max_rank: u32,
        pos: PartOfSpeech,
    ) -> Result<Vec<SenseId>> {
        (**self).senses_in_band(min_rank, max_rank, pos)
    }
}
