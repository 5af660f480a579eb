//! SQLite storage backend
//!
//! rusqlite connections behind a deadpool-sqlite pool. Items, pools and attempts
//! are stored as JSON documents with indexed key columns; abilities and item
//! statistics are plain columns so they can be updated in place:
//!
//! Each scored attempt is one immediate transaction covering the ability row, the
//! attempt log, the statistics counters and the item's active flag:
//!
//! - abilities carry a `version` column that every write checks and bumps
//! - statistics counters are incremented with `col = col + ?`, then the derived
//!   fields are recomputed from the stored totals
//! - `attempts.presentation_id` is unique, so a presentation is logged at most once
//! - a busy database when the transaction begins is retried a bounded number of times

use super::{AbilityStore, AttemptLog, ItemStore, PoolStore, ScoringStore, StatisticsStore};
use crate::config::{ScoringConfig, StorageConfig};
use crate::error::{McqError, Result};
use crate::items::Item;
use crate::pool::DistractorPool;
use crate::scoring::{
    Ability, AbilityUpdate, Attempt, AttemptSubmission, ItemStatistics, RecordedAttempt,
    StatisticsDelta,
};
use crate::types::{ItemId, LearnerId, SenseId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_sqlite::{Config, Pool, Runtime};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS items (
    id TEXT PRIMARY KEY,
    sense_id TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    data TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_items_sense ON items(sense_id);

CREATE TABLE IF NOT EXISTS pools (
    sense_id TEXT PRIMARY KEY,
    version INTEGER NOT NULL,
    data TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS abilities (
    learner_id TEXT NOT NULL,
    sense_id TEXT NOT NULL,
    estimate REAL NOT NULL,
    confidence REAL NOT NULL,
    observations INTEGER NOT NULL,
    version INTEGER NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (learner_id, sense_id)
);

CREATE TABLE IF NOT EXISTS item_statistics (
    item_id TEXT PRIMARY KEY,
    total_attempts INTEGER NOT NULL DEFAULT 0,
    correct_attempts INTEGER NOT NULL DEFAULT 0,
    ability_sum_correct REAL NOT NULL DEFAULT 0,
    ability_sum_incorrect REAL NOT NULL DEFAULT 0,
    ability_sum_sq REAL NOT NULL DEFAULT 0,
    difficulty_index REAL,
    discrimination_index REAL,
    quality_score REAL,
    needs_review INTEGER NOT NULL DEFAULT 0,
    review_reason TEXT,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS distractor_counts (
    item_id TEXT NOT NULL,
    pool_index INTEGER NOT NULL,
    exposures INTEGER NOT NULL DEFAULT 0,
    selections INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (item_id, pool_index)
);

CREATE TABLE IF NOT EXISTS attempts (
    id TEXT PRIMARY KEY,
    presentation_id TEXT NOT NULL UNIQUE,
    learner_id TEXT NOT NULL,
    item_id TEXT NOT NULL,
    created_at TEXT NOT NULL,
    data TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_attempts_item ON attempts(item_id, learner_id);
";

/// Persistent store backed by a SQLite file
pub struct SqliteStore {
    pool: Pool,
    path: PathBuf,
    max_update_retries: u32,
}

impl SqliteStore {
    /// Open (and create if needed) the database at `path`
    pub async fn open(path: &Path, config: &StorageConfig) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut pool_config = Config::new(path);
        pool_config.pool = Some(deadpool_sqlite::PoolConfig::new(config.pool_size.max(1)));
        let pool = pool_config.create_pool(Runtime::Tokio1).map_err(|e| {
            McqError::Database(format!("Failed to create connection pool: {}", e))
        })?;

        let store = Self {
            pool,
            path: path.to_path_buf(),
            max_update_retries: config.max_update_retries.max(1),
        };
        store.init_schema().await?;
        info!("Opened database at {}", store.path.display());
        Ok(store)
    }

    /// Default database location under the user's data directory
    pub fn default_path() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("lexiquiz")
            .join("lexiquiz.db")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn init_schema(&self) -> Result<()> {
        self.with_conn(|conn| {
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
                row.get::<_, String>(0)
            })?;
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.pool.get().await.map_err(|e| {
            McqError::Database(format!("Failed to get connection from pool: {}", e))
        })?;

        conn.interact(move |conn| {
            conn.busy_timeout(BUSY_TIMEOUT)?;
            f(conn)
        })
        .await
        .map_err(|e| McqError::Database(format!("Pool interaction failed: {}", e)))?
    }
}

fn parse_item(data: &str, is_active: bool) -> Result<Item> {
    let mut item: Item = serde_json::from_str(data)?;
    item.is_active = is_active;
    Ok(item)
}

fn load_ability(
    conn: &Connection,
    learner_id: &LearnerId,
    sense_id: &SenseId,
) -> rusqlite::Result<Option<(Ability, i64)>> {
    conn.query_row(
        "SELECT estimate, confidence, observations, version, updated_at
         FROM abilities WHERE learner_id = ?1 AND sense_id = ?2",
        params![learner_id.as_str(), sense_id.as_str()],
        |row| {
            let observations: i64 = row.get(2)?;
            Ok((
                Ability {
                    learner_id: learner_id.clone(),
                    sense_id: sense_id.clone(),
                    estimate: row.get(0)?,
                    confidence: row.get(1)?,
                    observations: observations as u64,
                    updated_at: row.get::<_, DateTime<Utc>>(4)?,
                },
                row.get::<_, i64>(3)?,
            ))
        },
    )
    .optional()
}

fn load_statistics(conn: &Connection, item_id: ItemId) -> Result<Option<ItemStatistics>> {
    let id = item_id.to_string();
    let stats = conn
        .query_row(
            "SELECT total_attempts, correct_attempts, ability_sum_correct,
                    ability_sum_incorrect, ability_sum_sq, difficulty_index,
                    discrimination_index, quality_score, needs_review,
                    review_reason, updated_at
             FROM item_statistics WHERE item_id = ?1",
            params![id],
            |row| {
                let mut stats = ItemStatistics::new(item_id);
                stats.total_attempts = row.get::<_, i64>(0)? as u64;
                stats.correct_attempts = row.get::<_, i64>(1)? as u64;
                stats.ability_sum_correct = row.get(2)?;
                stats.ability_sum_incorrect = row.get(3)?;
                stats.ability_sum_sq = row.get(4)?;
                stats.difficulty_index = row.get(5)?;
                stats.discrimination_index = row.get(6)?;
                stats.quality_score = row.get(7)?;
                stats.needs_review = row.get(8)?;
                stats.review_reason = row.get(9)?;
                stats.updated_at = row.get(10)?;
                Ok(stats)
            },
        )
        .optional()?;

    let Some(mut stats) = stats else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(
        "SELECT pool_index, exposures, selections FROM distractor_counts WHERE item_id = ?1",
    )?;
    let rows = stmt.query_map(params![id], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, i64>(1)?,
            row.get::<_, i64>(2)?,
        ))
    })?;
    for row in rows {
        let (index, exposures, selections) = row?;
        let index = index as usize;
        if exposures > 0 {
            stats.exposure_counts.insert(index, exposures as u64);
        }
        if selections > 0 {
            stats
                .distractor_selection_counts
                .insert(index, selections as u64);
        }
    }

    Ok(Some(stats))
}

#[async_trait]
impl ItemStore for SqliteStore {
    async fn put_items(&self, items: &[Item]) -> Result<()> {
        let rows = items
            .iter()
            .map(|item| {
                Ok((
                    item.id.to_string(),
                    item.sense_id.to_string(),
                    item.is_active,
                    item.created_at,
                    serde_json::to_string(item)?,
                ))
            })
            .collect::<Result<Vec<_>>>()?;
        let count = rows.len();

        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO items (id, sense_id, is_active, created_at, data)
                     VALUES (?1, ?2, ?3, ?4, ?5)
                     ON CONFLICT(id) DO UPDATE SET
                        sense_id = excluded.sense_id,
                        is_active = excluded.is_active,
                        data = excluded.data",
                )?;
                for (id, sense_id, is_active, created_at, data) in &rows {
                    stmt.execute(params![id, sense_id, is_active, created_at, data])?;
                }
            }
            tx.commit()?;
            Ok(())
        })
        .await?;

        debug!("Stored {} items", count);
        Ok(())
    }

    async fn get_item(&self, id: ItemId) -> Result<Item> {
        let key = id.to_string();
        let row = self
            .with_conn(move |conn| {
                Ok(conn
                    .query_row(
                        "SELECT data, is_active FROM items WHERE id = ?1",
                        params![key],
                        |row| Ok((row.get::<_, String>(0)?, row.get::<_, bool>(1)?)),
                    )
                    .optional()?)
            })
            .await?;

        match row {
            Some((data, is_active)) => parse_item(&data, is_active),
            None => Err(McqError::ItemNotFound(id.to_string())),
        }
    }

    async fn items_for_sense(&self, sense_id: &SenseId) -> Result<Vec<Item>> {
        let key = sense_id.to_string();
        let rows = self
            .with_conn(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT data, is_active FROM items WHERE sense_id = ?1 ORDER BY created_at",
                )?;
                let rows = stmt
                    .query_map(params![key], |row| {
                        Ok((row.get::<_, String>(0)?, row.get::<_, bool>(1)?))
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            })
            .await?;

        rows.iter()
            .map(|(data, is_active)| parse_item(data, *is_active))
            .collect()
    }

    async fn list_items(&self, active_only: bool) -> Result<Vec<Item>> {
        let rows = self
            .with_conn(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT data, is_active FROM items
                     WHERE (?1 = 0 OR is_active = 1)
                     ORDER BY sense_id, created_at",
                )?;
                let rows = stmt
                    .query_map(params![active_only], |row| {
                        Ok((row.get::<_, String>(0)?, row.get::<_, bool>(1)?))
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            })
            .await?;

        rows.iter()
            .map(|(data, is_active)| parse_item(data, *is_active))
            .collect()
    }

    async fn deactivate(&self, id: ItemId) -> Result<()> {
        let key = id.to_string();
        let updated = self
            .with_conn(move |conn| {
                Ok(conn.execute("UPDATE items SET is_active = 0 WHERE id = ?1", params![key])?)
            })
            .await?;

        if updated == 0 {
            return Err(McqError::ItemNotFound(id.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl PoolStore for SqliteStore {
    async fn get_pool(&self, sense_id: &SenseId) -> Result<DistractorPool> {
        let key = sense_id.to_string();
        let data = self
            .with_conn(move |conn| {
                Ok(conn
                    .query_row(
                        "SELECT data FROM pools WHERE sense_id = ?1",
                        params![key],
                        |row| row.get::<_, String>(0),
                    )
                    .optional()?)
            })
            .await?;

        match data {
            Some(data) => Ok(serde_json::from_str(&data)?),
            None => Err(McqError::PoolNotFound(sense_id.to_string())),
        }
    }

    async fn replace_pool(&self, pool: DistractorPool) -> Result<DistractorPool> {
        self.with_conn(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let current: Option<u32> = tx
                .query_row(
                    "SELECT version FROM pools WHERE sense_id = ?1",
                    params![pool.sense_id().as_str()],
                    |row| row.get(0),
                )
                .optional()?;

            let pool = pool.with_version(current.map(|v| v + 1).unwrap_or(1));
            tx.execute(
                "INSERT INTO pools (sense_id, version, data) VALUES (?1, ?2, ?3)
                 ON CONFLICT(sense_id) DO UPDATE SET
                    version = excluded.version,
                    data = excluded.data",
                params![
                    pool.sense_id().as_str(),
                    pool.version(),
                    serde_json::to_string(&pool)?
                ],
            )?;
            tx.commit()?;
            debug!("Stored pool {}", pool.pool_ref());
            Ok(pool)
        })
        .await
    }
}

fn is_busy(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::DatabaseBusy
    )
}

/// Apply one response to the stored estimate, creating the row if needed
fn write_ability(
    conn: &Connection,
    submission: &AttemptSubmission,
    difficulty: f64,
    config: &ScoringConfig,
) -> Result<AbilityUpdate> {
    let learner_id = &submission.learner_id;
    let sense_id = &submission.sense_id;
    let (before, version) = match load_ability(conn, learner_id, sense_id)? {
        Some((ability, version)) => (ability, Some(version)),
        None => (Ability::new(learner_id.clone(), sense_id.clone(), config), None),
    };

    let mut after = before.clone();
    after.observe(submission.is_correct, difficulty, config);

    let written = match version {
        Some(version) => conn.execute(
            "UPDATE abilities
             SET estimate = ?3, confidence = ?4, observations = ?5,
                 updated_at = ?6, version = version + 1
             WHERE learner_id = ?1 AND sense_id = ?2 AND version = ?7",
            params![
                learner_id.as_str(),
                sense_id.as_str(),
                after.estimate,
                after.confidence,
                after.observations as i64,
                after.updated_at,
                version
            ],
        )?,
        None => conn.execute(
            "INSERT INTO abilities
                (learner_id, sense_id, estimate, confidence, observations, version, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6)
             ON CONFLICT(learner_id, sense_id) DO NOTHING",
            params![
                learner_id.as_str(),
                sense_id.as_str(),
                after.estimate,
                after.confidence,
                after.observations as i64,
                after.updated_at
            ],
        )?,
    };

    if written != 1 {
        return Err(McqError::Database(format!(
            "ability for ({}, {}) changed during the update",
            learner_id, sense_id
        )));
    }
    Ok(AbilityUpdate { before, after })
}

fn insert_attempt(conn: &Connection, attempt: &Attempt) -> Result<()> {
    conn.execute(
        "INSERT INTO attempts (id, presentation_id, learner_id, item_id, created_at, data)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            attempt.id.to_string(),
            attempt.presentation_id.to_string(),
            attempt.learner_id.as_str(),
            attempt.item_id.to_string(),
            attempt.created_at,
            serde_json::to_string(attempt)?
        ],
    )?;
    Ok(())
}

/// Add one attempt's increments and recompute the derived fields
fn write_statistics(
    conn: &Connection,
    delta: &StatisticsDelta,
    config: &ScoringConfig,
) -> Result<ItemStatistics> {
    let id = delta.item_id.to_string();
    let ability = delta.ability_at_attempt;
    let (sum_correct, sum_incorrect) = if delta.is_correct {
        (ability, 0.0)
    } else {
        (0.0, ability)
    };

    conn.execute(
        "INSERT INTO item_statistics (item_id, updated_at) VALUES (?1, ?2)
         ON CONFLICT(item_id) DO NOTHING",
        params![id, Utc::now()],
    )?;
    conn.execute(
        "UPDATE item_statistics SET
            total_attempts = total_attempts + 1,
            correct_attempts = correct_attempts + ?2,
            ability_sum_correct = ability_sum_correct + ?3,
            ability_sum_incorrect = ability_sum_incorrect + ?4,
            ability_sum_sq = ability_sum_sq + ?5
         WHERE item_id = ?1",
        params![
            id,
            i64::from(delta.is_correct),
            sum_correct,
            sum_incorrect,
            ability * ability
        ],
    )?;

    for &index in &delta.served_pool_indices {
        conn.execute(
            "INSERT INTO distractor_counts (item_id, pool_index, exposures, selections)
             VALUES (?1, ?2, 1, 0)
             ON CONFLICT(item_id, pool_index) DO UPDATE SET exposures = exposures + 1",
            params![id, index as i64],
        )?;
    }
    if let Some(index) = delta.selected_pool_index {
        conn.execute(
            "INSERT INTO distractor_counts (item_id, pool_index, exposures, selections)
             VALUES (?1, ?2, 0, 1)
             ON CONFLICT(item_id, pool_index) DO UPDATE SET selections = selections + 1",
            params![id, index as i64],
        )?;
    }

    let mut stats = load_statistics(conn, delta.item_id)?
        .ok_or_else(|| McqError::Database(format!("statistics row for {} vanished", id)))?;
    stats.refresh(config);

    conn.execute(
        "UPDATE item_statistics SET
            difficulty_index = ?2,
            discrimination_index = ?3,
            quality_score = ?4,
            needs_review = ?5,
            review_reason = ?6,
            updated_at = ?7
         WHERE item_id = ?1",
        params![
            id,
            stats.difficulty_index,
            stats.discrimination_index,
            stats.quality_score,
            stats.needs_review,
            stats.review_reason,
            stats.updated_at
        ],
    )?;
    Ok(stats)
}

/// Every write of one attempt; the caller owns the transaction
fn write_attempt(
    conn: &Connection,
    submission: &AttemptSubmission,
    config: &ScoringConfig,
) -> Result<RecordedAttempt> {
    let presentation_key = submission.presentation_id.to_string();
    let item_key = submission.item_id.to_string();

    let seen = conn
        .query_row(
            "SELECT 1 FROM attempts WHERE presentation_id = ?1",
            params![presentation_key],
            |_| Ok(()),
        )
        .optional()?;
    if seen.is_some() {
        return Err(McqError::AttemptConflict(presentation_key));
    }

    let is_active: bool = conn
        .query_row(
            "SELECT is_active FROM items WHERE id = ?1",
            params![item_key],
            |row| row.get(0),
        )
        .optional()?
        .ok_or_else(|| McqError::ItemNotFound(item_key.clone()))?;

    let difficulty = load_statistics(conn, submission.item_id)?
        .map(|stats| stats.difficulty_or(config.default_difficulty))
        .unwrap_or(config.default_difficulty);

    let ability = write_ability(conn, submission, difficulty, config)?;
    let attempt = submission.to_attempt(ability.before.estimate);
    insert_attempt(conn, &attempt)?;
    let statistics = write_statistics(
        conn,
        &submission.statistics_delta(ability.before.estimate),
        config,
    )?;

    let deactivated = is_active && statistics.should_deactivate(config);
    if deactivated {
        conn.execute("UPDATE items SET is_active = 0 WHERE id = ?1", params![item_key])?;
    }

    Ok(RecordedAttempt {
        ability,
        attempt,
        statistics,
        deactivated,
    })
}

#[async_trait]
impl AbilityStore for SqliteStore {
    async fn get_ability(
        &self,
        learner_id: &LearnerId,
        sense_id: &SenseId,
    ) -> Result<Option<Ability>> {
        let learner_id = learner_id.clone();
        let sense_id = sense_id.clone();
        self.with_conn(move |conn| {
            Ok(load_ability(conn, &learner_id, &sense_id)?.map(|(ability, _)| ability))
        })
        .await
    }
}

#[async_trait]
impl StatisticsStore for SqliteStore {
    async fn get_statistics(&self, item_id: ItemId) -> Result<Option<ItemStatistics>> {
        self.with_conn(move |conn| load_statistics(conn, item_id)).await
    }
}

#[async_trait]
impl ScoringStore for SqliteStore {
    async fn record_attempt(
        &self,
        submission: &AttemptSubmission,
        config: &ScoringConfig,
    ) -> Result<RecordedAttempt> {
        let submission = submission.clone();
        let config = config.clone();
        let max_retries = self.max_update_retries;

        self.with_conn(move |conn| {
            for round in 1..=max_retries {
                let tx = match conn.transaction_with_behavior(TransactionBehavior::Immediate) {
                    Ok(tx) => tx,
                    Err(e) if is_busy(&e) && round < max_retries => {
                        debug!(
                            "Database busy recording {}, retry {}",
                            submission.presentation_id, round
                        );
                        continue;
                    }
                    Err(e) => return Err(e.into()),
                };

                // Dropping the transaction on error rolls every write back
                let recorded = write_attempt(&tx, &submission, &config)?;
                tx.commit()?;
                return Ok(recorded);
            }

            warn!(
                "Gave up recording {} after {} retries",
                submission.presentation_id, max_retries
            );
            Err(McqError::Database(format!(
                "database stayed busy recording {}",
                submission.presentation_id
            )))
        })
        .await
    }
}

#[async_trait]
impl AttemptLog for SqliteStore {
    async fn attempts_for_item(&self, item_id: ItemId) -> Result<Vec<Attempt>> {
        let key = item_id.to_string();
        let rows = self
            .with_conn(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT data FROM attempts WHERE item_id = ?1 ORDER BY created_at",
                )?;
                let rows = stmt
                    .query_map(params![key], |row| row.get::<_, String>(0))?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            })
            .await?;

        rows.iter()
            .map(|data| Ok(serde_json::from_str(data)?))
            .collect()
    }

    async fn count_attempts(&self, learner_id: &LearnerId, item_id: ItemId) -> Result<u64> {
        let learner = learner_id.to_string();
        let item = item_id.to_string();
        self.with_conn(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM attempts WHERE item_id = ?1 AND learner_id = ?2",
                params![item, learner],
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
        .await
    }
}
