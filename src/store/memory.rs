//! In-memory storage backend
//!
//! Maps behind async locks. Ability and statistics rows each carry their own
//! mutex; the map lock is only held long enough to find or create the row.
//! A row created for an attempt stays `None` until that attempt commits, so a
//! failed attempt leaves nothing readable behind.
//!
//! `record_attempt` locks in a fixed order: ability row, statistics row, attempt
//! log, items. No other method holds more than one of these at a time.

use super::{
    AbilityStore, AttemptLog, ItemStore, PoolStore, PresentationStore, ScoringStore,
    StatisticsStore,
};
use crate::config::ScoringConfig;
use crate::error::{McqError, Result};
use crate::items::Item;
use crate::pool::DistractorPool;
use crate::scoring::{
    Ability, AbilityUpdate, Attempt, AttemptSubmission, ItemStatistics, RecordedAttempt,
    ScoreResult,
};
use crate::serving::ServedPresentation;
use crate::types::{ItemId, LearnerId, PresentationId, SenseId};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

type AbilityKey = (LearnerId, SenseId);
type Row<T> = Arc<Mutex<Option<T>>>;

/// Items, pools, abilities, statistics and attempts held in memory
#[derive(Default)]
pub struct MemoryStore {
    items: RwLock<HashMap<ItemId, Item>>,
    pools: RwLock<HashMap<SenseId, DistractorPool>>,
    abilities: Mutex<HashMap<AbilityKey, Row<Ability>>>,
    statistics: Mutex<HashMap<ItemId, Row<ItemStatistics>>>,
    attempts: RwLock<Vec<Attempt>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn ability_row(&self, key: AbilityKey) -> Row<Ability> {
        self.abilities.lock().await.entry(key).or_default().clone()
    }

    async fn statistics_row(&self, item_id: ItemId) -> Row<ItemStatistics> {
        self.statistics.lock().await.entry(item_id).or_default().clone()
    }
}

#[async_trait]
impl ItemStore for MemoryStore {
    async fn put_items(&self, items: &[Item]) -> Result<()> {
        let mut stored = self.items.write().await;
        for item in items {
            stored.insert(item.id, item.clone());
        }
        Ok(())
    }

    async fn get_item(&self, id: ItemId) -> Result<Item> {
        self.items
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| McqError::ItemNotFound(id.to_string()))
    }

    async fn items_for_sense(&self, sense_id: &SenseId) -> Result<Vec<Item>> {
        let mut items: Vec<Item> = self
            .items
            .read()
            .await
            .values()
            .filter(|item| &item.sense_id == sense_id)
            .cloned()
            .collect();
        items.sort_by_key(|item| item.created_at);
        Ok(items)
    }

    async fn list_items(&self, active_only: bool) -> Result<Vec<Item>> {
        let mut items: Vec<Item> = self
            .items
            .read()
            .await
            .values()
            .filter(|item| !active_only || item.is_active)
            .cloned()
            .collect();
        items.sort_by(|a, b| (&a.sense_id, a.created_at).cmp(&(&b.sense_id, b.created_at)));
        Ok(items)
    }

    async fn deactivate(&self, id: ItemId) -> Result<()> {
        let mut items = self.items.write().await;
        let item = items
            .get_mut(&id)
            .ok_or_else(|| McqError::ItemNotFound(id.to_string()))?;
        item.is_active = false;
        Ok(())
    }
}

#[async_trait]
impl PoolStore for MemoryStore {
    async fn get_pool(&self, sense_id: &SenseId) -> Result<DistractorPool> {
        self.pools
            .read()
            .await
            .get(sense_id)
            .cloned()
            .ok_or_else(|| McqError::PoolNotFound(sense_id.to_string()))
    }

    async fn replace_pool(&self, pool: DistractorPool) -> Result<DistractorPool> {
        let mut pools = self.pools.write().await;
        let version = pools
            .get(pool.sense_id())
            .map(|current| current.version() + 1)
            .unwrap_or(1);
        let pool = pool.with_version(version);
        debug!("Stored pool {}", pool.pool_ref());
        pools.insert(pool.sense_id().clone(), pool.clone());
        Ok(pool)
    }
}

#[async_trait]
impl AbilityStore for MemoryStore {
    async fn get_ability(
        &self,
        learner_id: &LearnerId,
        sense_id: &SenseId,
    ) -> Result<Option<Ability>> {
        let key = (learner_id.clone(), sense_id.clone());
        let row = self.abilities.lock().await.get(&key).cloned();
        match row {
            Some(row) => Ok(row.lock().await.clone()),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl StatisticsStore for MemoryStore {
    async fn get_statistics(&self, item_id: ItemId) -> Result<Option<ItemStatistics>> {
        let row = self.statistics.lock().await.get(&item_id).cloned();
        match row {
            Some(row) => Ok(row.lock().await.clone()),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl AttemptLog for MemoryStore {
    async fn attempts_for_item(&self, item_id: ItemId) -> Result<Vec<Attempt>> {
        Ok(self
            .attempts
            .read()
            .await
            .iter()
            .filter(|attempt| attempt.item_id == item_id)
            .cloned()
            .collect())
    }

    async fn count_attempts(&self, learner_id: &LearnerId, item_id: ItemId) -> Result<u64> {
        Ok(self
            .attempts
            .read()
            .await
            .iter()
            .filter(|attempt| attempt.item_id == item_id && &attempt.learner_id == learner_id)
            .count() as u64)
    }
}

#[async_trait]
impl ScoringStore for MemoryStore {
    async fn record_attempt(
        &self,
        submission: &AttemptSubmission,
        config: &ScoringConfig,
    ) -> Result<RecordedAttempt> {
        let ability_row = self
            .ability_row((submission.learner_id.clone(), submission.sense_id.clone()))
            .await;
        let statistics_row = self.statistics_row(submission.item_id).await;

        let mut ability_slot = ability_row.lock().await;
        let mut statistics_slot = statistics_row.lock().await;
        let mut attempts = self.attempts.write().await;
        let mut items = self.items.write().await;

        if attempts
            .iter()
            .any(|attempt| attempt.presentation_id == submission.presentation_id)
        {
            return Err(McqError::AttemptConflict(
                submission.presentation_id.to_string(),
            ));
        }
        let item = items
            .get_mut(&submission.item_id)
            .ok_or_else(|| McqError::ItemNotFound(submission.item_id.to_string()))?;

        // Work on copies; nothing below can fail, so commit is all or nothing
        let mut statistics = statistics_slot
            .clone()
            .unwrap_or_else(|| ItemStatistics::new(submission.item_id));
        let difficulty = statistics.difficulty_or(config.default_difficulty);

        let before = ability_slot.clone().unwrap_or_else(|| {
            Ability::new(
                submission.learner_id.clone(),
                submission.sense_id.clone(),
                config,
            )
        });
        let mut after = before.clone();
        after.observe(submission.is_correct, difficulty, config);

        let attempt = submission.to_attempt(before.estimate);
        statistics.apply(&submission.statistics_delta(before.estimate), config);
        let deactivated = item.is_active && statistics.should_deactivate(config);

        *ability_slot = Some(after.clone());
        *statistics_slot = Some(statistics.clone());
        attempts.push(attempt.clone());
        if deactivated {
            item.is_active = false;
        }

        Ok(RecordedAttempt {
            ability: AbilityUpdate { before, after },
            attempt,
            statistics,
            deactivated,
        })
    }
}

struct PresentationEntry {
    presentation: ServedPresentation,
    result: Option<ScoreResult>,
}

/// Served presentations with a time-to-live
pub struct MemoryPresentationStore {
    ttl: Duration,
    entries: Mutex<HashMap<PresentationId, PresentationEntry>>,
}

impl MemoryPresentationStore {
    pub fn new(ttl_secs: i64) -> Self {
        Self {
            ttl: Duration::seconds(ttl_secs),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Entries held, expired or not
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    fn is_expired(&self, presentation: &ServedPresentation) -> bool {
        Utc::now() - presentation.served_at > self.ttl
    }
}

impl Default for MemoryPresentationStore {
    fn default() -> Self {
        Self::new(3600)
    }
}

#[async_trait]
impl PresentationStore for MemoryPresentationStore {
    async fn insert(&self, presentation: &ServedPresentation) -> Result<()> {
        self.entries.lock().await.insert(
            presentation.id,
            PresentationEntry {
                presentation: presentation.clone(),
                result: None,
            },
        );
        Ok(())
    }

    async fn get(&self, id: PresentationId) -> Result<ServedPresentation> {
        let entries = self.entries.lock().await;
        match entries.get(&id) {
            Some(entry) if !self.is_expired(&entry.presentation) => {
                Ok(entry.presentation.clone())
            }
            _ => Err(McqError::UnknownPresentation(id.to_string())),
        }
    }

    async fn claim(&self, id: PresentationId, result: &ScoreResult) -> Result<()> {
        let mut entries = self.entries.lock().await;
        let entry = match entries.get_mut(&id) {
            Some(entry) if !self.is_expired(&entry.presentation) => entry,
            _ => return Err(McqError::UnknownPresentation(id.to_string())),
        };

        if let Some(first) = &entry.result {
            return Err(McqError::DuplicatePresentation {
                first: Box::new(first.clone()),
            });
        }
        entry.result = Some(result.clone());
        Ok(())
    }

    async fn store_result(&self, id: PresentationId, result: &ScoreResult) -> Result<()> {
        let mut entries = self.entries.lock().await;
        let entry = entries
            .get_mut(&id)
            .ok_or_else(|| McqError::UnknownPresentation(id.to_string()))?;
        entry.result = Some(result.clone());
        Ok(())
    }

    async fn release(&self, id: PresentationId) -> Result<()> {
        let mut entries = self.entries.lock().await;
        let entry = entries
            .get_mut(&id)
            .ok_or_else(|| McqError::UnknownPresentation(id.to_string()))?;
        entry.result = None;
        Ok(())
    }

    async fn count_pending(&self, learner_id: &LearnerId, item_id: ItemId) -> Result<u64> {
        Ok(self
            .entries
            .lock()
            .await
            .values()
            .filter(|entry| {
                entry.result.is_none()
                    && entry.presentation.item_id == item_id
                    && &entry.presentation.learner_id == learner_id
                    && !self.is_expired(&entry.presentation)
            })
            .count() as u64)
    }

    async fn purge_expired(&self) -> Result<usize> {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, entry| !self.is_expired(&entry.presentation));
        let purged = before - entries.len();
        if purged > 0 {
            debug!("Purged {} expired presentations", purged);
        }
        Ok(purged)
    }
}
