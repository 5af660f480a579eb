//! Assessment service
//!
//! The surface callers use: serve an item to a learner and score the answer.
//! Wires the stores, the serving selector and the attempt recorder together.
//! Expired presentations are purged every `storage.purge_every` selections.

use crate::config::McqConfig;
use crate::error::{McqError, Result};
use crate::items::Item;
use crate::pool::DistractorPool;
use crate::scoring::{AttemptRecorder, ScoreResult};
use crate::serving::{RotationPolicy, ServedPresentation, ServingSelector};
use crate::store::{
    AbilityStore, AttemptLog, ItemStore, MemoryPresentationStore, MemoryStore, PoolStore,
    PresentationStore, ScoringStore, SqliteStore, StatisticsStore,
};
use crate::types::{ItemId, LearnerId, PresentationId};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Store handles used by the service
#[derive(Clone)]
pub struct ServiceStores {
    pub items: Arc<dyn ItemStore>,
    pub pools: Arc<dyn PoolStore>,
    pub abilities: Arc<dyn AbilityStore>,
    pub statistics: Arc<dyn StatisticsStore>,
    pub attempts: Arc<dyn AttemptLog>,
    pub scoring: Arc<dyn ScoringStore>,
    pub presentations: Arc<dyn PresentationStore>,
}

impl ServiceStores {
    /// Everything in memory
    pub fn memory(config: &McqConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            items: store.clone(),
            pools: store.clone(),
            abilities: store.clone(),
            statistics: store.clone(),
            attempts: store.clone(),
            scoring: store,
            presentations: Arc::new(MemoryPresentationStore::new(
                config.storage.presentation_ttl_secs,
            )),
        }
    }

    /// SQLite for persistent state, presentations in memory
    pub fn sqlite(store: Arc<SqliteStore>, config: &McqConfig) -> Self {
        Self {
            items: store.clone(),
            pools: store.clone(),
            abilities: store.clone(),
            statistics: store.clone(),
            attempts: store.clone(),
            scoring: store,
            presentations: Arc::new(MemoryPresentationStore::new(
                config.storage.presentation_ttl_secs,
            )),
        }
    }
}

/// Serves items and scores answers
pub struct AssessmentService {
    stores: ServiceStores,
    selector: ServingSelector,
    recorder: AttemptRecorder,
    rotation: RotationPolicy,
    selections: AtomicU64,
    config: McqConfig,
}

impl AssessmentService {
    pub fn new(stores: ServiceStores, config: McqConfig) -> Self {
        let selector = ServingSelector::new(config.serving.clone(), config.scoring.clone());
        let recorder = AttemptRecorder::new(
            stores.abilities.clone(),
            stores.statistics.clone(),
            stores.scoring.clone(),
            stores.presentations.clone(),
            config.scoring.clone(),
        );

        Self {
            stores,
            selector,
            recorder,
            rotation: RotationPolicy::default(),
            selections: AtomicU64::new(0),
            config,
        }
    }

    pub fn with_rotation(mut self, rotation: RotationPolicy) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn stores(&self) -> &ServiceStores {
        &self.stores
    }

    pub fn config(&self) -> &McqConfig {
        &self.config
    }

    /// Store a freshly built pool and its items
    ///
    /// The pool becomes the next version for its sense and the items are pointed at
    /// that version before being stored.
    pub async fn publish(&self, pool: DistractorPool, items: Vec<Item>) -> Result<Vec<Item>> {
        let pool = self.stores.pools.replace_pool(pool).await?;
        let items: Vec<Item> = items
            .into_iter()
            .filter(|item| &item.sense_id == pool.sense_id())
            .map(|mut item| {
                item.pool_ref = pool.pool_ref();
                item
            })
            .collect();
        self.stores.items.put_items(&items).await?;

        info!(
            "Published {} items for {} ({} candidates)",
            items.len(),
            pool.pool_ref(),
            pool.len()
        );
        Ok(items)
    }

    /// Serve `item_id` to `learner_id` with `k` options
    pub async fn select(
        &self,
        item_id: ItemId,
        learner_id: &LearnerId,
        k: usize,
    ) -> Result<ServedPresentation> {
        let item = self.stores.items.get_item(item_id).await?;
        if !item.is_active {
            return Err(McqError::ItemInactive(item_id.to_string()));
        }

        let pool = self.stores.pools.get_pool(&item.sense_id).await?;
        let stats = self.stores.statistics.get_statistics(item_id).await?;
        let ability = self
            .stores
            .abilities
            .get_ability(learner_id, &item.sense_id)
            .await?
            .map(|ability| ability.estimate)
            .unwrap_or(self.config.scoring.initial_estimate);

        let offset = match self.rotation {
            RotationPolicy::AttemptCount => {
                let attempts = self.stores.attempts.count_attempts(learner_id, item_id).await?;
                let pending = self
                    .stores
                    .presentations
                    .count_pending(learner_id, item_id)
                    .await?;
                self.rotation.offset(attempts + pending)
            }
            RotationPolicy::Explicit(_) => self.rotation.offset(0),
        };

        let presentation = self.selector.select(
            &item,
            &pool,
            stats.as_ref(),
            ability,
            k,
            offset,
            learner_id,
        )?;
        self.purge_if_due().await?;
        self.stores.presentations.insert(&presentation).await?;

        debug!(
            "Presentation {} of item {} for {} at ability {:.2}",
            presentation.id, item_id, learner_id, ability
        );
        Ok(presentation)
    }

    async fn purge_if_due(&self) -> Result<()> {
        let every = self.config.storage.purge_every;
        if every == 0 {
            return Ok(());
        }
        let count = self.selections.fetch_add(1, Ordering::Relaxed) + 1;
        if count % every == 0 {
            self.stores.presentations.purge_expired().await?;
        }
        Ok(())
    }

    /// Serve with the configured number of options
    pub async fn select_default(
        &self,
        item_id: ItemId,
        learner_id: &LearnerId,
    ) -> Result<ServedPresentation> {
        self.select(item_id, learner_id, self.config.serving.default_k)
            .await
    }

    /// Score the option at `selected_display_index` of a served presentation
    pub async fn submit(
        &self,
        presentation_id: PresentationId,
        selected_display_index: usize,
        response_time: Duration,
    ) -> Result<ScoreResult> {
        let presentation = self.stores.presentations.get(presentation_id).await?;
        let item = self.stores.items.get_item(presentation.item_id).await?;
        let learner_id = presentation.learner_id.clone();

        self.recorder
            .record(
                &item,
                &presentation,
                selected_display_index,
                response_time,
                &learner_id,
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::items::ItemFactory;
    use crate::lexicon::fixtures::{accept_sense_id, sample_lexicon};
    use crate::lexicon::SenseProvider;
    use crate::pool::PoolBuilder;

    async fn published_service() -> (AssessmentService, Vec<Item>) {
        let config = McqConfig::default();
        let lexicon = sample_lexicon();
        let sense = lexicon.get_sense(&accept_sense_id()).unwrap();
        let pool = PoolBuilder::new(config.pool.clone())
            .build_pool(&sense, &lexicon)
            .unwrap();
        let items = ItemFactory::new().make_items(&sense, &pool);

        let service = AssessmentService::new(ServiceStores::memory(&config), config);
        let items = service.publish(pool, items).await.unwrap();
        (service, items)
    }

    #[tokio::test]
    async fn test_select_then_submit() {
        let (service, items) = published_service().await;
        let learner = LearnerId::new("ana");

        let p = service.select(items[0].id, &learner, 4).await.unwrap();
        assert_eq!(p.displayed_options.len(), 4);

        let result = service
            .submit(p.id, p.correct_display_index, Duration::from_secs(2))
            .await
            .unwrap();
        assert!(result.is_correct);
    }

    #[tokio::test]
    async fn test_rotation_advances_per_presentation() {
        let (service, items) = published_service().await;
        let learner = LearnerId::new("ana");

        let first = service.select(items[0].id, &learner, 4).await.unwrap();
        let second = service.select(items[0].id, &learner, 4).await.unwrap();
        assert_eq!(first.rotation_offset, 0);
        assert_eq!(second.rotation_offset, 1);

        service
            .submit(second.id, 0, Duration::from_secs(1))
            .await
            .unwrap();
        // one scored, one still pending
        let third = service.select(items[0].id, &learner, 4).await.unwrap();
        assert_eq!(third.rotation_offset, 2);
    }

    #[tokio::test]
    async fn test_scored_presentations_count_once_for_rotation() {
        let (service, items) = published_service().await;
        let learner = LearnerId::new("ana");

        let first = service.select(items[0].id, &learner, 4).await.unwrap();
        service
            .submit(first.id, first.correct_display_index, Duration::from_secs(1))
            .await
            .unwrap();
        let second = service.select(items[0].id, &learner, 4).await.unwrap();
        service
            .submit(second.id, second.correct_display_index, Duration::from_secs(1))
            .await
            .unwrap();

        let third = service.select(items[0].id, &learner, 4).await.unwrap();
        assert_eq!(
            [first.rotation_offset, second.rotation_offset, third.rotation_offset],
            [0, 1, 2]
        );
    }

    #[tokio::test]
    async fn test_expired_presentations_are_purged_while_serving() {
        let mut config = McqConfig::default();
        config.storage.presentation_ttl_secs = 0;
        config.storage.purge_every = 1;

        let lexicon = sample_lexicon();
        let sense = lexicon.get_sense(&accept_sense_id()).unwrap();
        let pool = PoolBuilder::new(config.pool.clone())
            .build_pool(&sense, &lexicon)
            .unwrap();
        let items = ItemFactory::new().make_items(&sense, &pool);

        let presentations = Arc::new(MemoryPresentationStore::new(0));
        let mut stores = ServiceStores::memory(&config);
        stores.presentations = presentations.clone() as Arc<dyn PresentationStore>;
        let service = AssessmentService::new(stores, config);
        let items = service.publish(pool, items).await.unwrap();

        let learner = LearnerId::new("ana");
        for _ in 0..3 {
            tokio::time::sleep(Duration::from_millis(5)).await;
            service.select(items[0].id, &learner, 4).await.unwrap();
            assert_eq!(presentations.len().await, 1);
        }
    }

    #[tokio::test]
    async fn test_explicit_rotation_reproduces_selection() {
        let (service, items) = published_service().await;
        let service = service.with_rotation(RotationPolicy::Explicit(4));
        let learner = LearnerId::new("ana");

        let a = service.select(items[0].id, &learner, 4).await.unwrap();
        let b = service.select(items[0].id, &learner, 4).await.unwrap();
        assert_eq!(a.served_pool_indices, b.served_pool_indices);
    }

    #[tokio::test]
    async fn test_unknown_ids() {
        let (service, _) = published_service().await;
        assert!(matches!(
            service.select(ItemId::new(), &LearnerId::new("ana"), 4).await,
            Err(McqError::ItemNotFound(_))
        ));
        assert!(matches!(
            service
                .submit(PresentationId::new(), 0, Duration::from_secs(1))
                .await,
            Err(McqError::UnknownPresentation(_))
        ));
    }
}
