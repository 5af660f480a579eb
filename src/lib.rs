//! Lexiquiz - Tiered Distractor MCQs for Vocabulary Assessment
//!
//! Generates multiple-choice vocabulary items from a lexical database, serves
//! them to learners at a difficulty matched to their ability, and scores the
//! answers back into per-learner abilities and per-item quality statistics.
//!
//! # Architecture
//!
//! The crate is organized into a generation side and a serving side:
//! - **Lexicon**: the sense universe (`SenseProvider`) and an in-memory implementation
//! - **Pool**: the five-tier distractor waterfall that builds one pool per sense
//! - **Items**: MEANING, USAGE and DISCRIMINATION items referencing a pool
//! - **Generation / Batch**: parallel generation and the interchange file format
//! - **Serving**: ability-matched, rotation-varied option selection
//! - **Scoring**: ability updates, item statistics, review flags, deactivation
//! - **Store**: storage traits with in-memory and SQLite backends
//! - **Service**: `select` / `submit` over the stores
//!
//! # Example
//!
//! ```ignore
//! use lexiquiz_core::{
//!     AssessmentService, ItemFactory, LearnerId, McqConfig, PoolBuilder, SenseProvider,
//!     ServiceStores,
//! };
//! use lexiquiz_core::lexicon::fixtures::{accept_sense_id, sample_lexicon};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> lexiquiz_core::Result<()> {
//!     let config = McqConfig::default();
//!     let lexicon = sample_lexicon();
//!     let sense = lexicon.get_sense(&accept_sense_id())?;
//!
//!     let pool = PoolBuilder::new(config.pool.clone()).build_pool(&sense, &lexicon)?;
//!     let items = ItemFactory::new().make_items(&sense, &pool);
//!
//!     let service = AssessmentService::new(ServiceStores::memory(&config), config);
//!     let items = service.publish(pool, items).await?;
//!
//!     let learner = LearnerId::new("ana");
//!     let presentation = service.select(items[0].id, &learner, 4).await?;
//!     let result = service
//!         .submit(presentation.id, presentation.correct_display_index, Duration::from_secs(3))
//!         .await?;
//!     assert!(result.is_correct);
//!     Ok(())
//! }
//! ```

pub mod batch;
pub mod config;
pub mod error;
pub mod generation;
pub mod items;
pub mod lexicon;
pub mod pool;
pub mod scoring;
pub mod service;
pub mod serving;
pub mod store;
pub mod text;
pub mod types;

// Re-export commonly used types
pub use batch::{BatchFormat, BatchRecord};
pub use config::McqConfig;
pub use error::{McqError, Result};
pub use generation::{BatchGenerator, GenerationReport, SkippedSense};
pub use items::{Item, ItemFactory, ItemType};
pub use lexicon::{InMemoryLexicon, SenseProvider};
pub use pool::{CandidateSource, DistractorCandidate, DistractorPool, PoolBuilder, PoolRef};
pub use scoring::{Ability, Attempt, AttemptRecorder, ItemStatistics, ScoreResult};
pub use service::{AssessmentService, ServiceStores};
pub use serving::{DisplayedOption, RotationPolicy, ServedPresentation, ServingSelector};
pub use store::{MemoryPresentationStore, MemoryStore, SqliteStore};
pub use types::{ItemId, LearnerId, PartOfSpeech, PresentationId, Sense, SenseId};
