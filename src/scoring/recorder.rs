//! Attempt recorder
//!
//! Scores a submitted answer and applies its effects. The presentation is claimed
//! first so a second submission changes nothing; the ability estimate, attempt
//! log, item statistics and deactivation are then written by the store as one
//! unit. If that unit fails the claim is released, so the learner can resubmit
//! and no partial effect remains.

use super::{Ability, AttemptSubmission, ScoreResult};
use crate::config::ScoringConfig;
use crate::error::{McqError, Result};
use crate::items::Item;
use crate::serving::ServedPresentation;
use crate::store::{AbilityStore, PresentationStore, ScoringStore, StatisticsStore};
use crate::types::LearnerId;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Applies submitted answers to abilities, statistics and the attempt log
#[derive(Clone)]
pub struct AttemptRecorder {
    abilities: Arc<dyn AbilityStore>,
    statistics: Arc<dyn StatisticsStore>,
    scoring: Arc<dyn ScoringStore>,
    presentations: Arc<dyn PresentationStore>,
    config: ScoringConfig,
}

impl AttemptRecorder {
    pub fn new(
        abilities: Arc<dyn AbilityStore>,
        statistics: Arc<dyn StatisticsStore>,
        scoring: Arc<dyn ScoringStore>,
        presentations: Arc<dyn PresentationStore>,
        config: ScoringConfig,
    ) -> Self {
        Self {
            abilities,
            statistics,
            scoring,
            presentations,
            config,
        }
    }

    /// Score `selected_display_index` for a served presentation of `item`
    pub async fn record(
        &self,
        item: &Item,
        presentation: &ServedPresentation,
        selected_display_index: usize,
        response_time: Duration,
        learner_id: &LearnerId,
    ) -> Result<ScoreResult> {
        if &presentation.learner_id != learner_id {
            return Err(McqError::InvalidInput(format!(
                "presentation {} was served to another learner",
                presentation.id
            )));
        }
        if presentation.item_id != item.id {
            return Err(McqError::InvalidInput(format!(
                "presentation {} is not for item {}",
                presentation.id, item.id
            )));
        }

        let selected_pool_index = presentation.pool_index_at(selected_display_index)?;
        let is_correct = selected_display_index == presentation.correct_display_index;

        let expected = self.expected_ability(item, learner_id, is_correct).await?;
        let mut result = ScoreResult {
            is_correct,
            explanation: item.explanation.clone(),
            correct_text: item.correct_text.clone(),
            selected_pool_index,
            ability_estimate: expected.estimate,
            confidence: expected.confidence,
        };

        self.presentations.claim(presentation.id, &result).await?;

        let submission = AttemptSubmission {
            presentation_id: presentation.id,
            learner_id: learner_id.clone(),
            item_id: item.id,
            sense_id: item.sense_id.clone(),
            selected_display_index,
            selected_pool_index,
            is_correct,
            response_time_ms: response_time.as_millis() as u64,
            served_pool_indices: presentation.served_pool_indices.clone(),
        };
        let recorded = match self.scoring.record_attempt(&submission, &self.config).await {
            Ok(recorded) => recorded,
            Err(e) => {
                warn!("Recording {} failed, releasing claim: {}", presentation.id, e);
                if let Err(release) = self.presentations.release(presentation.id).await {
                    error!("Could not release {}: {}", presentation.id, release);
                }
                return Err(e);
            }
        };

        let stats = &recorded.statistics;
        if stats.needs_review {
            debug!(
                "Item {} needs review: {}",
                item.id,
                stats.review_reason.as_deref().unwrap_or_default()
            );
        }
        if recorded.deactivated {
            warn!(
                "Deactivated item {} (quality {:.2})",
                item.id,
                stats.quality_score.unwrap_or_default()
            );
        }

        let update = &recorded.ability;
        result.ability_estimate = update.after.estimate;
        result.confidence = update.after.confidence;
        self.presentations.store_result(presentation.id, &result).await?;

        info!(
            "Scored {} for {} on {}: {} (ability {:.2} -> {:.2})",
            presentation.id,
            learner_id,
            item.sense_id,
            if is_correct { "correct" } else { "incorrect" },
            update.before.estimate,
            update.after.estimate
        );
        Ok(result)
    }

    /// Outcome predicted from the current snapshot, stored with the claim until the
    /// recorded values replace it
    async fn expected_ability(
        &self,
        item: &Item,
        learner_id: &LearnerId,
        is_correct: bool,
    ) -> Result<Ability> {
        let difficulty = self
            .statistics
            .get_statistics(item.id)
            .await?
            .map(|stats| stats.difficulty_or(self.config.default_difficulty))
            .unwrap_or(self.config.default_difficulty);

        let mut expected = self
            .abilities
            .get_ability(learner_id, &item.sense_id)
            .await?
            .unwrap_or_else(|| {
                Ability::new(learner_id.clone(), item.sense_id.clone(), &self.config)
            });
        expected.observe(is_correct, difficulty, &self.config);
        Ok(expected)
    }
}
