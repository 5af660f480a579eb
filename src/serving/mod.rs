//! Serving selector
//!
//! Chooses which `k-1` pool entries a learner sees for one presentation of an
//! item. Two concerns are composed:
//!
//! 1. **Ability matching**: entries whose distractor difficulty falls inside
//!    `[ability - w, ability + w]` are preferred; when there are not enough, the
//!    closest entries by distance fill the remaining slots.
//! 2. **Anti-memorization**: entries at the same distance from the window are
//!    equally eligible, and [`rotate`] picks among them by a rotation offset, so
//!    repeated exposure shows a different subset while any single offset stays
//!    reproducible.

use crate::config::{ScoringConfig, ServingConfig};
use crate::error::{McqError, Result};
use crate::items::Item;
use crate::pool::{DistractorCandidate, DistractorPool};
use crate::scoring::ItemStatistics;
use crate::text;
use crate::types::{ItemId, LearnerId, PresentationId, SenseId};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Distances closer than this are treated as equal when grouping
const DISTANCE_RESOLUTION: f64 = 1e-6;

/// One option as displayed to the learner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayedOption {
    pub text: String,

    /// Pool entry behind this option; `None` for the correct answer
    pub pool_index: Option<usize>,

    pub is_correct: bool,
}

/// A served presentation of an item, kept until it is scored or expires
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServedPresentation {
    pub id: PresentationId,
    pub item_id: ItemId,
    pub learner_id: LearnerId,
    pub sense_id: SenseId,
    pub displayed_options: Vec<DisplayedOption>,

    /// Pool indices of the displayed distractors, in selection order
    pub served_pool_indices: Vec<usize>,

    pub correct_display_index: usize,
    pub rotation_offset: u64,
    pub served_at: DateTime<Utc>,
}

impl ServedPresentation {
    /// Pool index behind a displayed option; `Ok(None)` for the correct answer
    pub fn pool_index_at(&self, display_index: usize) -> Result<Option<usize>> {
        self.displayed_options
            .get(display_index)
            .map(|option| option.pool_index)
            .ok_or_else(|| {
                McqError::InvalidInput(format!(
                    "display index {} out of range (0..{})",
                    display_index,
                    self.displayed_options.len()
                ))
            })
    }
}

/// How the rotation offset for a presentation is derived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum RotationPolicy {
    /// Prior attempts plus unscored, unexpired presentations of the item to the
    /// learner; a scored presentation counts once, as its attempt
    #[default]
    AttemptCount,

    /// Fixed offset, for reproducing a presentation
    Explicit(u64),
}

impl RotationPolicy {
    pub fn offset(&self, prior: u64) -> u64 {
        match self {
            RotationPolicy::AttemptCount => prior,
            RotationPolicy::Explicit(offset) => *offset,
        }
    }
}

/// Cyclic rotation of `candidates` starting at `offset`
///
/// Taking a prefix of the result yields a subset that changes with the offset and
/// is identical for identical offsets.
pub fn rotate<T: Clone>(candidates: &[T], offset: u64) -> Vec<T> {
    if candidates.is_empty() {
        return Vec::new();
    }
    let start = (offset % candidates.len() as u64) as usize;
    candidates[start..]
        .iter()
        .chain(&candidates[..start])
        .cloned()
        .collect()
}

/// Ability-matched, rotation-varied option selection
#[derive(Debug, Clone, Default)]
pub struct ServingSelector {
    serving: ServingConfig,
    scoring: ScoringConfig,
}

impl ServingSelector {
    pub fn new(serving: ServingConfig, scoring: ScoringConfig) -> Self {
        Self { serving, scoring }
    }

    /// Build a presentation of `item` with `k` options (1 correct, `k-1` distractors)
    #[allow(clippy::too_many_arguments)]
    pub fn select(
        &self,
        item: &Item,
        pool: &DistractorPool,
        stats: Option<&ItemStatistics>,
        ability: f64,
        k: usize,
        offset: u64,
        learner_id: &LearnerId,
    ) -> Result<ServedPresentation> {
        if !item.is_active {
            return Err(McqError::ItemInactive(item.id.to_string()));
        }
        if item.pool_ref != pool.pool_ref() {
            return Err(McqError::PoolVersionMismatch {
                sense_id: item.sense_id.to_string(),
                expected: item.pool_ref.version,
                found: pool.version(),
            });
        }
        if k < 2 {
            return Err(McqError::InvalidInput(format!(
                "k must be at least 2, got {}",
                k
            )));
        }
        if !ability.is_finite() {
            return Err(McqError::InvalidInput("ability must be finite".into()));
        }

        let eligible = item.eligible_indices(pool);
        let needed = k - 1;
        if needed > eligible.len() {
            return Err(McqError::InsufficientPool {
                requested: needed,
                available: eligible.len(),
            });
        }

        let chosen = self.choose_distractors(
            pool,
            &eligible,
            stats,
            ability.clamp(0.0, 1.0),
            needed,
            offset,
        );

        let mut options: Vec<DisplayedOption> = chosen
            .iter()
            .map(|&index| DisplayedOption {
                text: item.option_text(pool, index).unwrap_or_default().to_string(),
                pool_index: Some(index),
                is_correct: false,
            })
            .collect();
        options.push(DisplayedOption {
            text: item.correct_text.clone(),
            pool_index: None,
            is_correct: true,
        });

        let seed = text::stable_hash(&item.id.to_string()) ^ offset;
        options.shuffle(&mut StdRng::seed_from_u64(seed));
        let correct_display_index = options
            .iter()
            .position(|option| option.is_correct)
            .ok_or_else(|| McqError::Other("correct option lost while shuffling".into()))?;

        debug!(
            "Served item {} to {} with pool entries {:?} (offset {})",
            item.id, learner_id, chosen, offset
        );

        Ok(ServedPresentation {
            id: PresentationId::new(),
            item_id: item.id,
            learner_id: learner_id.clone(),
            sense_id: item.sense_id.clone(),
            displayed_options: options,
            served_pool_indices: chosen,
            correct_display_index,
            rotation_offset: offset,
            served_at: Utc::now(),
        })
    }

    /// Ability window clamped to [0, 1]
    pub fn window(&self, ability: f64) -> (f64, f64) {
        let half = self.serving.window_half_width;
        ((ability - half).clamp(0.0, 1.0), (ability + half).clamp(0.0, 1.0))
    }

    /// Difficulty of a pool entry as a distractor
    ///
    /// Measured from selection rates once the item has enough attempts and the
    /// entry has been shown; otherwise the tier prior.
    pub fn entry_difficulty(
        &self,
        index: usize,
        candidate: &DistractorCandidate,
        stats: Option<&ItemStatistics>,
    ) -> f64 {
        let measured = stats
            .filter(|s| s.total_attempts >= self.scoring.distractor_review_min_attempts)
            .and_then(|s| s.selection_rate(index));

        match measured {
            Some(rate) if self.scoring.confusable_rate > 0.0 => {
                (rate / self.scoring.confusable_rate).min(1.0)
            }
            _ => self.serving.tier_difficulty[usize::from(candidate.tier()) - 1],
        }
    }

    fn choose_distractors(
        &self,
        pool: &DistractorPool,
        eligible: &[usize],
        stats: Option<&ItemStatistics>,
        ability: f64,
        needed: usize,
        offset: u64,
    ) -> Vec<usize> {
        let (low, high) = self.window(ability);

        // Group by distance to the window; distance 0 is "inside"
        let mut groups: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        for &index in eligible {
            let Some(candidate) = pool.get(index) else {
                continue;
            };
            let difficulty = self.entry_difficulty(index, candidate, stats);
            let distance = if difficulty < low {
                low - difficulty
            } else if difficulty > high {
                difficulty - high
            } else {
                0.0
            };
            let key = (distance / DISTANCE_RESOLUTION).round() as i64;
            groups.entry(key).or_default().push(index);
        }

        let mut chosen = Vec::with_capacity(needed);
        for group in groups.values() {
            let remaining = needed - chosen.len();
            if remaining == 0 {
                break;
            }
            chosen.extend(rotate(group, offset).into_iter().take(remaining));
        }
        chosen
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::items::{ItemFactory, ItemType};
    use crate::lexicon::fixtures::{accept_sense_id, sample_lexicon};
    use crate::lexicon::SenseProvider;
    use crate::pool::PoolBuilder;
    use std::collections::HashSet;

    fn accept_item(item_type: ItemType) -> (Item, DistractorPool) {
        let lexicon = sample_lexicon();
        let sense = lexicon.get_sense(&accept_sense_id()).unwrap();
        let pool = PoolBuilder::default().build_pool(&sense, &lexicon).unwrap();
        let item = ItemFactory::new()
            .make_item(item_type, &sense, &pool)
            .unwrap();
        (item, pool)
    }

    fn learner() -> LearnerId {
        LearnerId::new("learner-1")
    }

    #[test]
    fn test_rotate() {
        assert_eq!(rotate(&[1, 2, 3, 4], 0), vec![1, 2, 3, 4]);
        assert_eq!(rotate(&[1, 2, 3, 4], 1), vec![2, 3, 4, 1]);
        assert_eq!(rotate(&[1, 2, 3, 4], 6), vec![3, 4, 1, 2]);
        assert!(rotate::<u8>(&[], 3).is_empty());
    }

    #[test]
    fn test_select_returns_k_options_one_correct() {
        let (item, pool) = accept_item(ItemType::Meaning);
        let selector = ServingSelector::default();

        for k in [2, 4, 6] {
            let p = selector
                .select(&item, &pool, None, 0.5, k, 0, &learner())
                .unwrap();
            assert_eq!(p.displayed_options.len(), k);
            assert_eq!(p.displayed_options.iter().filter(|o| o.is_correct).count(), 1);
            assert_eq!(p.served_pool_indices.len(), k - 1);
            assert!(p.displayed_options[p.correct_display_index].is_correct);
            assert_eq!(p.pool_index_at(p.correct_display_index).unwrap(), None);
        }
    }

    #[test]
    fn test_served_indices_map_back_to_options() {
        let (item, pool) = accept_item(ItemType::Discrimination);
        let p = ServingSelector::default()
            .select(&item, &pool, None, 0.5, 4, 3, &learner())
            .unwrap();

        for option in &p.displayed_options {
            if let Some(index) = option.pool_index {
                assert!(p.served_pool_indices.contains(&index));
                assert_eq!(option.text, pool.get(index).unwrap().source_word);
                assert_ne!(option.text, "accept");
            }
        }
    }

    #[test]
    fn test_same_offset_is_reproducible() {
        let (item, pool) = accept_item(ItemType::Meaning);
        let selector = ServingSelector::default();
        let a = selector.select(&item, &pool, None, 0.5, 4, 5, &learner()).unwrap();
        let b = selector.select(&item, &pool, None, 0.5, 4, 5, &learner()).unwrap();

        assert_eq!(a.served_pool_indices, b.served_pool_indices);
        assert_eq!(a.displayed_options, b.displayed_options);
    }

    #[test]
    fn test_offsets_vary_subsets() {
        let (item, pool) = accept_item(ItemType::Meaning);
        let selector = ServingSelector::default();

        let subsets: HashSet<Vec<usize>> = (0..20)
            .map(|offset| {
                let mut indices = selector
                    .select(&item, &pool, None, 0.5, 4, offset, &learner())
                    .unwrap()
                    .served_pool_indices;
                indices.sort();
                indices
            })
            .collect();
        assert!(subsets.len() > 1);
    }

    #[test]
    fn test_ability_prefers_window() {
        let (item, pool) = accept_item(ItemType::Meaning);
        let selector = ServingSelector::default();

        // Strong learners see tier 1/2 distractors first
        let p = selector.select(&item, &pool, None, 0.8, 3, 0, &learner()).unwrap();
        for index in &p.served_pool_indices {
            assert!(pool.get(*index).unwrap().tier() <= 2);
        }

        // Weak learners see band samples
        let p = selector.select(&item, &pool, None, 0.2, 4, 0, &learner()).unwrap();
        for index in &p.served_pool_indices {
            assert_eq!(pool.get(*index).unwrap().tier(), 5);
        }
    }

    #[test]
    fn test_insufficient_pool() {
        let (item, pool) = accept_item(ItemType::Usage);
        let available = item.eligible_indices(&pool).len();
        let err = ServingSelector::default()
            .select(&item, &pool, None, 0.5, available + 2, 0, &learner())
            .unwrap_err();
        assert!(matches!(
            err,
            McqError::InsufficientPool { requested, available: a }
                if requested == available + 1 && a == available
        ));
    }

    #[test]
    fn test_invalid_k_and_inactive_item() {
        let (mut item, pool) = accept_item(ItemType::Meaning);
        let selector = ServingSelector::default();
        assert!(matches!(
            selector.select(&item, &pool, None, 0.5, 1, 0, &learner()),
            Err(McqError::InvalidInput(_))
        ));

        item.is_active = false;
        assert!(matches!(
            selector.select(&item, &pool, None, 0.5, 4, 0, &learner()),
            Err(McqError::ItemInactive(_))
        ));
    }

    #[test]
    fn test_stale_pool_version_rejected() {
        let (item, pool) = accept_item(ItemType::Meaning);
        let newer = pool.with_version(2);
        assert!(matches!(
            ServingSelector::default().select(&item, &newer, None, 0.5, 4, 0, &learner()),
            Err(McqError::PoolVersionMismatch { expected: 1, found: 2, .. })
        ));
    }

    #[test]
    fn test_measured_difficulty_overrides_prior() {
        let (item, pool) = accept_item(ItemType::Meaning);
        let selector = ServingSelector::default();
        let band_index = pool
            .candidates()
            .iter()
            .position(|c| c.tier() == 5)
            .unwrap();

        let mut stats = ItemStatistics::new(item.id);
        stats.total_attempts = 20;
        stats.exposure_counts.insert(band_index, 10);
        stats.distractor_selection_counts.insert(band_index, 4);

        let candidate = pool.get(band_index).unwrap();
        assert!((selector.entry_difficulty(band_index, candidate, None) - 0.3).abs() < 1e-9);
        let measured = selector.entry_difficulty(band_index, candidate, Some(&stats));
        assert!((measured - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_rotation_policy() {
        assert_eq!(RotationPolicy::AttemptCount.offset(7), 7);
        assert_eq!(RotationPolicy::Explicit(3).offset(7), 3);
    }
}
