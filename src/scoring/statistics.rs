//! Item statistics
//!
//! Classical item analysis maintained incrementally. Each attempt contributes a
//! [`StatisticsDelta`]; stores add deltas to the stored row, so concurrent
//! submissions never overwrite each other's counts. Discrimination is derived from
//! running sums of the learners' abilities at attempt time rather than by replaying
//! the attempt log.

use crate::config::ScoringConfig;
use crate::types::ItemId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const ZERO_STDEV: f64 = 1e-9;

/// Increment contributed by one attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsDelta {
    pub item_id: ItemId,
    pub is_correct: bool,
    pub ability_at_attempt: f64,

    /// Pool entries that were displayed in the presentation
    pub served_pool_indices: Vec<usize>,

    /// Pool entry chosen, `None` when the answer was correct
    pub selected_pool_index: Option<usize>,
}

/// Running statistics of one item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemStatistics {
    pub item_id: ItemId,
    pub total_attempts: u64,
    pub correct_attempts: u64,

    /// Share of correct attempts; `None` before the first attempt
    pub difficulty_index: Option<f64>,

    /// `None` until enough attempts are recorded
    pub discrimination_index: Option<f64>,

    /// `None` while discrimination is undefined
    pub quality_score: Option<f64>,

    /// Times each pool entry was chosen
    pub distractor_selection_counts: BTreeMap<usize, u64>,

    /// Times each pool entry was displayed
    pub exposure_counts: BTreeMap<usize, u64>,

    pub ability_sum_correct: f64,
    pub ability_sum_incorrect: f64,
    pub ability_sum_sq: f64,

    pub needs_review: bool,
    pub review_reason: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl ItemStatistics {
    pub fn new(item_id: ItemId) -> Self {
        Self {
            item_id,
            total_attempts: 0,
            correct_attempts: 0,
            difficulty_index: None,
            discrimination_index: None,
            quality_score: None,
            distractor_selection_counts: BTreeMap::new(),
            exposure_counts: BTreeMap::new(),
            ability_sum_correct: 0.0,
            ability_sum_incorrect: 0.0,
            ability_sum_sq: 0.0,
            needs_review: false,
            review_reason: None,
            updated_at: Utc::now(),
        }
    }

    /// Add one attempt and recompute the derived fields
    pub fn apply(&mut self, delta: &StatisticsDelta, config: &ScoringConfig) {
        self.total_attempts += 1;
        if delta.is_correct {
            self.correct_attempts += 1;
            self.ability_sum_correct += delta.ability_at_attempt;
        } else {
            self.ability_sum_incorrect += delta.ability_at_attempt;
        }
        self.ability_sum_sq += delta.ability_at_attempt * delta.ability_at_attempt;

        for &index in &delta.served_pool_indices {
            *self.exposure_counts.entry(index).or_default() += 1;
        }
        if let Some(index) = delta.selected_pool_index {
            *self.distractor_selection_counts.entry(index).or_default() += 1;
        }

        self.refresh(config);
    }

    /// Recompute difficulty, discrimination, quality and the review flag from counters
    pub fn refresh(&mut self, config: &ScoringConfig) {
        self.updated_at = Utc::now();

        if self.total_attempts == 0 {
            self.difficulty_index = None;
            self.discrimination_index = None;
            self.quality_score = None;
            self.needs_review = false;
            self.review_reason = None;
            return;
        }

        let difficulty = self.correct_attempts as f64 / self.total_attempts as f64;
        self.difficulty_index = Some(difficulty);

        if self.total_attempts < config.discrimination_min_attempts {
            self.discrimination_index = None;
            self.quality_score = None;
            self.needs_review = false;
            self.review_reason = None;
            return;
        }

        let discrimination = self.compute_discrimination();
        self.discrimination_index = Some(discrimination);
        self.quality_score = Some(quality_score(discrimination, difficulty));

        let reasons = self.review_reasons(discrimination, difficulty, config);
        self.needs_review = !reasons.is_empty();
        self.review_reason = (!reasons.is_empty()).then(|| reasons.join("; "));
    }

    /// Share of displays of `index` in which the learner chose it
    pub fn selection_rate(&self, index: usize) -> Option<f64> {
        let shown = *self.exposure_counts.get(&index)?;
        if shown == 0 {
            return None;
        }
        let chosen = self
            .distractor_selection_counts
            .get(&index)
            .copied()
            .unwrap_or(0);
        Some(chosen as f64 / shown as f64)
    }

    /// Difficulty used for ability updates; the configured default until measured
    pub fn difficulty_or(&self, default: f64) -> f64 {
        self.difficulty_index.unwrap_or(default)
    }

    /// True when quality is defined and below the deactivation threshold
    pub fn should_deactivate(&self, config: &ScoringConfig) -> bool {
        self.quality_score
            .is_some_and(|quality| quality < config.deactivate_below)
    }

    fn compute_discrimination(&self) -> f64 {
        let total = self.total_attempts as f64;
        let correct = self.correct_attempts;
        let incorrect = self.total_attempts - correct;
        if correct == 0 || incorrect == 0 {
            return 0.0;
        }

        let mean_all = (self.ability_sum_correct + self.ability_sum_incorrect) / total;
        let variance = (self.ability_sum_sq / total - mean_all * mean_all).max(0.0);
        let stdev = variance.sqrt();
        if stdev < ZERO_STDEV {
            return 0.0;
        }

        let mean_correct = self.ability_sum_correct / correct as f64;
        let mean_incorrect = self.ability_sum_incorrect / incorrect as f64;
        let p = correct as f64 / total;

        (mean_correct - mean_incorrect) / stdev * (p * (1.0 - p)).sqrt()
    }

    fn review_reasons(
        &self,
        discrimination: f64,
        difficulty: f64,
        config: &ScoringConfig,
    ) -> Vec<String> {
        let mut reasons = Vec::new();

        if discrimination < config.min_discrimination {
            reasons.push(format!(
                "discrimination {:.2} below {:.2}",
                discrimination, config.min_discrimination
            ));
        }
        if difficulty < config.min_difficulty || difficulty > config.max_difficulty {
            reasons.push(format!(
                "difficulty {:.2} outside [{:.2}, {:.2}]",
                difficulty, config.min_difficulty, config.max_difficulty
            ));
        }

        if self.total_attempts >= config.distractor_review_min_attempts {
            for &index in self.exposure_counts.keys() {
                match self.selection_rate(index) {
                    Some(rate) if rate == 0.0 => {
                        reasons.push(format!("distractor #{} never selected", index))
                    }
                    Some(rate) if rate > config.confusable_rate => reasons.push(format!(
                        "distractor #{} selected {:.0}% of the time",
                        index,
                        rate * 100.0
                    )),
                    _ => {}
                }
            }
        }

        reasons
    }
}

/// Combined quality in [0, 1] for non-negative discrimination
pub fn quality_score(discrimination: f64, difficulty: f64) -> f64 {
    0.6 * (discrimination / 0.5).min(1.0) + 0.4 * (1.0 - 2.0 * (difficulty - 0.5).abs())
}
