//! Storage layer
//!
//! Traits for everything the service reads and writes, with an in-memory backend
//! (tests, interactive quiz) and a SQLite backend (batch ingestion, long-lived
//! learner state). Presentations are short-lived and only kept in memory.

pub mod memory;
pub mod sqlite;

pub use memory::{MemoryPresentationStore, MemoryStore};
pub use sqlite::SqliteStore;

use crate::config::ScoringConfig;
use crate::error::Result;
use crate::items::Item;
use crate::pool::DistractorPool;
use crate::scoring::{
    Ability, Attempt, AttemptSubmission, ItemStatistics, RecordedAttempt, ScoreResult,
};
use crate::serving::ServedPresentation;
use crate::types::{ItemId, LearnerId, PresentationId, SenseId};
use async_trait::async_trait;

/// Generated items
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Insert or replace items
    async fn put_items(&self, items: &[Item]) -> Result<()>;

    /// Retrieve an item by ID
    async fn get_item(&self, id: ItemId) -> Result<Item>;

    /// Items generated for a sense
    async fn items_for_sense(&self, sense_id: &SenseId) -> Result<Vec<Item>>;

    /// All items, optionally only active ones
    async fn list_items(&self, active_only: bool) -> Result<Vec<Item>>;

    /// Mark an item as no longer servable
    async fn deactivate(&self, id: ItemId) -> Result<()>;
}

/// Distractor pools, one current version per sense
#[async_trait]
pub trait PoolStore: Send + Sync {
    /// Current pool of a sense
    async fn get_pool(&self, sense_id: &SenseId) -> Result<DistractorPool>;

    /// Store a pool as the next version of its sense and return it
    ///
    /// The first pool of a sense is version 1; each replacement increments the
    /// version so items pointing at the old one are detected as stale.
    async fn replace_pool(&self, pool: DistractorPool) -> Result<DistractorPool>;
}

/// Per-(learner, sense) ability estimates
#[async_trait]
pub trait AbilityStore: Send + Sync {
    /// Current estimate, `None` if the learner has never answered for this sense
    async fn get_ability(
        &self,
        learner_id: &LearnerId,
        sense_id: &SenseId,
    ) -> Result<Option<Ability>>;
}

/// Per-item running statistics
#[async_trait]
pub trait StatisticsStore: Send + Sync {
    async fn get_statistics(&self, item_id: ItemId) -> Result<Option<ItemStatistics>>;
}

/// Append-only attempt history
#[async_trait]
pub trait AttemptLog: Send + Sync {
    async fn attempts_for_item(&self, item_id: ItemId) -> Result<Vec<Attempt>>;

    /// Attempts of one learner on one item
    async fn count_attempts(&self, learner_id: &LearnerId, item_id: ItemId) -> Result<u64>;
}

/// Writes every side effect of one scored answer as a single unit
#[async_trait]
pub trait ScoringStore: Send + Sync {
    /// Update the ability, append the attempt, add the statistics increments and
    /// deactivate the item if its quality fell below the threshold
    ///
    /// The ability update uses the item's difficulty as stored at the moment the
    /// unit starts. Either all of it is written or, on error, none of it.
    /// A second attempt for the same presentation fails with `AttemptConflict`.
    async fn record_attempt(
        &self,
        submission: &AttemptSubmission,
        config: &ScoringConfig,
    ) -> Result<RecordedAttempt>;
}

/// Served presentations awaiting submission
#[async_trait]
pub trait PresentationStore: Send + Sync {
    async fn insert(&self, presentation: &ServedPresentation) -> Result<()>;

    /// Pending or scored presentation; `UnknownPresentation` if missing or expired
    async fn get(&self, id: PresentationId) -> Result<ServedPresentation>;

    /// Atomically mark a presentation as scored with `result`
    ///
    /// Fails with `UnknownPresentation` when missing or expired, and with
    /// `DuplicatePresentation` carrying the stored result when already scored.
    async fn claim(&self, id: PresentationId, result: &ScoreResult) -> Result<()>;

    /// Replace the stored result of a claimed presentation
    async fn store_result(&self, id: PresentationId, result: &ScoreResult) -> Result<()>;

    /// Undo a claim whose attempt could not be recorded, so it can be resubmitted
    async fn release(&self, id: PresentationId) -> Result<()>;

    /// Unexpired presentations of an item served to a learner and not yet scored
    async fn count_pending(&self, learner_id: &LearnerId, item_id: ItemId) -> Result<u64>;

    /// Drop expired presentations, returning how many were removed
    async fn purge_expired(&self) -> Result<usize>;
}
