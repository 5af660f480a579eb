//! Batch generation
//!
//! Builds pools and items for many senses at once. Sense ids are split into
//! contiguous shards, one blocking task per shard; each task owns its shard and
//! shares nothing mutable with the others. A sense that cannot be generated is
//! reported and skipped, never fatal to the batch.

use crate::batch::BatchRecord;
use crate::config::McqConfig;
use crate::error::{McqError, Result};
use crate::items::{Item, ItemFactory};
use crate::lexicon::SenseProvider;
use crate::pool::{DistractorPool, PoolBuilder};
use crate::types::SenseId;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Pool and items generated for one sense
#[derive(Debug, Clone)]
pub struct GeneratedSense {
    pub sense_id: SenseId,
    pub pool: DistractorPool,
    pub items: Vec<Item>,
}

/// A sense left out of the batch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedSense {
    pub sense_id: SenseId,
    pub reason: String,
}

/// Outcome of a batch run, in input order
#[derive(Debug, Clone, Default)]
pub struct GenerationReport {
    pub generated: Vec<GeneratedSense>,
    pub skipped: Vec<SkippedSense>,
    pub elapsed: Duration,
}

impl GenerationReport {
    pub fn item_count(&self) -> usize {
        self.generated.iter().map(|g| g.items.len()).sum()
    }

    /// Interchange records for every generated item
    pub fn records(&self) -> Vec<BatchRecord> {
        self.generated
            .iter()
            .flat_map(|g| {
                g.items
                    .iter()
                    .map(move |item| BatchRecord::from_item(item, &g.pool))
            })
            .collect()
    }
}

enum SenseOutcome {
    Generated(GeneratedSense),
    Skipped(SkippedSense),
}

/// Parallel pool and item generation over a lexicon
pub struct BatchGenerator {
    provider: Arc<dyn SenseProvider>,
    builder: PoolBuilder,
    factory: ItemFactory,
    workers: usize,
}

impl BatchGenerator {
    pub fn new(provider: Arc<dyn SenseProvider>, config: &McqConfig) -> Self {
        Self {
            provider,
            builder: PoolBuilder::new(config.pool.clone()),
            factory: ItemFactory::new(),
            workers: config.generation.workers.max(1),
        }
    }

    /// Generate pools and items for `sense_ids`
    pub async fn generate(&self, sense_ids: Vec<SenseId>) -> Result<GenerationReport> {
        let started = Instant::now();
        let total = sense_ids.len();
        if total == 0 {
            return Ok(GenerationReport::default());
        }

        let shard_size = total.div_ceil(self.workers);
        let mut handles = Vec::new();
        for (shard_index, shard) in sense_ids.chunks(shard_size).enumerate() {
            let shard = shard.to_vec();
            let provider = self.provider.clone();
            let builder = self.builder.clone();
            let factory = self.factory;

            handles.push(tokio::task::spawn_blocking(move || {
                debug!("Shard {} generating {} senses", shard_index, shard.len());
                shard
                    .into_iter()
                    .map(|sense_id| generate_sense(&*provider, &builder, &factory, sense_id))
                    .collect::<Vec<_>>()
            }));
        }

        let mut report = GenerationReport::default();
        for handle in handles {
            let outcomes = handle
                .await
                .map_err(|e| McqError::Other(format!("Generation worker failed: {}", e)))?;
            for outcome in outcomes {
                match outcome {
                    SenseOutcome::Generated(generated) => report.generated.push(generated),
                    SenseOutcome::Skipped(skipped) => report.skipped.push(skipped),
                }
            }
        }
        report.elapsed = started.elapsed();

        info!(
            "Generated {} items for {} of {} senses ({} skipped) in {:?}",
            report.item_count(),
            report.generated.len(),
            total,
            report.skipped.len(),
            report.elapsed
        );
        Ok(report)
    }
}

fn generate_sense(
    provider: &dyn SenseProvider,
    builder: &PoolBuilder,
    factory: &ItemFactory,
    sense_id: SenseId,
) -> SenseOutcome {
    let result = provider
        .get_sense(&sense_id)
        .and_then(|sense| Ok((builder.build_pool(&sense, provider)?, sense)));

    let (pool, sense) = match result {
        Ok(built) => built,
        Err(e) => {
            if e.is_generation_skip() {
                warn!("Skipping {}: {}", sense_id, e);
            } else {
                warn!("Skipping {} after unexpected error: {}", sense_id, e);
            }
            return SenseOutcome::Skipped(SkippedSense {
                sense_id,
                reason: e.to_string(),
            });
        }
    };

    let items = factory.make_items(&sense, &pool);
    if items.is_empty() {
        warn!("Skipping {}: no item type applies", sense_id);
        return SenseOutcome::Skipped(SkippedSense {
            sense_id,
            reason: "no item type applies".into(),
        });
    }

    SenseOutcome::Generated(GeneratedSense {
        sense_id,
        pool,
        items,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexicon::fixtures::{accept_sense_id, sample_lexicon};
    use crate::lexicon::InMemoryLexicon;

    fn generator(workers: usize) -> (BatchGenerator, InMemoryLexicon) {
        let lexicon = sample_lexicon();
        let mut config = McqConfig::default();
        config.generation.workers = workers;
        (
            BatchGenerator::new(Arc::new(lexicon.clone()), &config),
            lexicon,
        )
    }

    #[tokio::test]
    async fn test_generate_whole_lexicon() {
        let (generator, lexicon) = generator(3);
        let ids = lexicon.sense_ids();
        let report = generator.generate(ids.clone()).await.unwrap();

        assert_eq!(report.generated.len() + report.skipped.len(), ids.len());
        assert!(report
            .generated
            .iter()
            .any(|g| g.sense_id == accept_sense_id()));
        assert_eq!(report.records().len(), report.item_count());
    }

    #[tokio::test]
    async fn test_output_independent_of_worker_count() {
        let (one, lexicon) = generator(1);
        let (four, _) = generator(4);
        let ids = lexicon.sense_ids();

        let a = one.generate(ids.clone()).await.unwrap();
        let b = four.generate(ids).await.unwrap();

        let pools = |r: &GenerationReport| {
            r.generated
                .iter()
                .map(|g| g.pool.clone())
                .collect::<Vec<_>>()
        };
        assert_eq!(pools(&a), pools(&b));
        assert_eq!(a.skipped, b.skipped);
    }

    #[tokio::test]
    async fn test_unknown_sense_is_skipped() {
        let (generator, _) = generator(2);
        let report = generator
            .generate(vec![accept_sense_id(), SenseId::from("nope.n.01")])
            .await
            .unwrap();

        assert_eq!(report.generated.len(), 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].sense_id, SenseId::from("nope.n.01"));
        assert!(report.skipped[0].reason.contains("not found"));
    }

    #[tokio::test]
    async fn test_empty_input() {
        let (generator, _) = generator(2);
        let report = generator.generate(vec![]).await.unwrap();
        assert!(report.generated.is_empty());
        assert!(report.skipped.is_empty());
    }
}
