//! Attempt scoring
//!
//! Per-(learner, sense) ability estimates, per-item statistics, and the recorder
//! that applies both for each submitted answer.

pub mod recorder;
pub mod statistics;

pub use recorder::AttemptRecorder;
pub use statistics::{ItemStatistics, StatisticsDelta};

use crate::config::ScoringConfig;
use crate::types::{ItemId, LearnerId, PresentationId, SenseId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Ability estimate of one learner for one sense
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ability {
    pub learner_id: LearnerId,
    pub sense_id: SenseId,

    /// In [0, 1]
    pub estimate: f64,

    /// In [0, 1], grows with every observation
    pub confidence: f64,

    pub observations: u64,
    pub updated_at: DateTime<Utc>,
}

impl Ability {
    /// Fresh estimate for a pair with no observations
    pub fn new(learner_id: LearnerId, sense_id: SenseId, config: &ScoringConfig) -> Self {
        Self {
            learner_id,
            sense_id,
            estimate: config.initial_estimate,
            confidence: 0.0,
            observations: 0,
            updated_at: Utc::now(),
        }
    }

    /// Apply one observation against an item of difficulty `difficulty`
    pub fn observe(&mut self, is_correct: bool, difficulty: f64, config: &ScoringConfig) {
        self.estimate = (self.estimate
            + ability_delta(is_correct, difficulty, config.learning_rate))
        .clamp(0.0, 1.0);
        self.confidence = (self.confidence + config.confidence_step).min(1.0);
        self.observations += 1;
        self.updated_at = Utc::now();
    }
}

/// Change in ability for one response
///
/// Correct answers on hard items move the estimate most; so do wrong answers on
/// easy ones.
pub fn ability_delta(is_correct: bool, difficulty: f64, learning_rate: f64) -> f64 {
    if is_correct {
        learning_rate * (1.0 - difficulty)
    } else {
        -learning_rate * difficulty
    }
}

/// Ability before and after one observation
#[derive(Debug, Clone, PartialEq)]
pub struct AbilityUpdate {
    pub before: Ability,
    pub after: Ability,
}

/// One scored response, append-only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    pub id: Uuid,
    pub presentation_id: PresentationId,
    pub learner_id: LearnerId,
    pub item_id: ItemId,
    pub sense_id: SenseId,
    pub selected_display_index: usize,

    /// `None` when the correct option was chosen
    pub selected_pool_index: Option<usize>,

    pub is_correct: bool,
    pub response_time_ms: u64,

    /// Learner's estimate before this attempt was applied
    pub ability_at_attempt: f64,

    pub created_at: DateTime<Utc>,
}

/// One answer to apply, before the store knows the learner's current estimate
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptSubmission {
    pub presentation_id: PresentationId,
    pub learner_id: LearnerId,
    pub item_id: ItemId,
    pub sense_id: SenseId,
    pub selected_display_index: usize,
    pub selected_pool_index: Option<usize>,
    pub is_correct: bool,
    pub response_time_ms: u64,

    /// Pool entries that were displayed
    pub served_pool_indices: Vec<usize>,
}

impl AttemptSubmission {
    /// Attempt row at the learner's pre-update estimate
    pub fn to_attempt(&self, ability_at_attempt: f64) -> Attempt {
        Attempt {
            id: Uuid::new_v4(),
            presentation_id: self.presentation_id,
            learner_id: self.learner_id.clone(),
            item_id: self.item_id,
            sense_id: self.sense_id.clone(),
            selected_display_index: self.selected_display_index,
            selected_pool_index: self.selected_pool_index,
            is_correct: self.is_correct,
            response_time_ms: self.response_time_ms,
            ability_at_attempt,
            created_at: Utc::now(),
        }
    }

    pub fn statistics_delta(&self, ability_at_attempt: f64) -> StatisticsDelta {
        StatisticsDelta {
            item_id: self.item_id,
            is_correct: self.is_correct,
            ability_at_attempt,
            served_pool_indices: self.served_pool_indices.clone(),
            selected_pool_index: self.selected_pool_index,
        }
    }
}

/// Everything one recorded attempt changed
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedAttempt {
    pub ability: AbilityUpdate,
    pub attempt: Attempt,
    pub statistics: ItemStatistics,

    /// This attempt switched the item off
    pub deactivated: bool,
}

/// What the learner gets back after submitting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub is_correct: bool,
    pub explanation: String,
    pub correct_text: String,
    pub selected_pool_index: Option<usize>,
    pub ability_estimate: f64,
    pub confidence: f64,
}
