//! Five-tier distractor waterfall
//!
//! Tiers are tried in priority order (confused, opposite, orthographic, related,
//! band sample). Each tier fills at most its cap and the waterfall stops once the
//! pool cap is reached. Every candidate, whatever its tier, must pass polysemy
//! safety, textual dedup and the definition-similarity check; tiers 2-5 also
//! enforce POS and frequency-band rules.
//!
//! A failed universe query degrades only its own tier. The build fails only when
//! fewer than `min_size` candidates survive.

use super::{CandidateSource, DistractorCandidate, DistractorPool, TierRules};
use crate::config::PoolConfig;
use crate::error::{McqError, Result};
use crate::lexicon::SenseProvider;
use crate::text;
use crate::types::{Sense, SenseId};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Why a candidate was turned away
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rejection {
    TargetSense,
    SameWord,
    EmptyText,
    PosMismatch,
    OutsideBand,
    Duplicate,
    TooSimilar,
}

/// Builds distractor pools
#[derive(Debug, Clone, Default)]
pub struct PoolBuilder {
    config: PoolConfig,
}

impl PoolBuilder {
    pub fn new(config: PoolConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Build the distractor pool for `target`
    ///
    /// Deterministic for a given target, universe and configuration.
    pub fn build_pool(
        &self,
        target: &Sense,
        universe: &dyn SenseProvider,
    ) -> Result<DistractorPool> {
        let mut pool = PoolAccumulator::new(target, &self.config);

        self.fill_confused(&mut pool, universe);
        self.fill_opposite(&mut pool, universe);
        self.fill_orthographic(&mut pool, universe);
        self.fill_related(&mut pool, universe);
        self.fill_band_sample(&mut pool, universe);

        let found = pool.accepted.len();
        if found < self.config.min_size {
            info!(
                "Pool for {} too small: {} of {} required candidates",
                target.id, found, self.config.min_size
            );
            return Err(McqError::PoolTooSmall {
                sense_id: target.id.to_string(),
                found,
                required: self.config.min_size,
            });
        }

        let built = DistractorPool::new(target.id.clone(), target.word.clone(), pool.accepted);
        debug!(
            "Built pool for {} with {} candidates, tiers {:?}",
            target.id,
            built.len(),
            built.tier_counts()
        );
        Ok(built)
    }

    fn fill_confused(&self, pool: &mut PoolAccumulator<'_>, universe: &dyn SenseProvider) {
        for relation in &pool.target.relationships.confused {
            let source = CandidateSource::Confused {
                reason: relation.reason.clone(),
            };
            if !pool.has_room(&source) {
                break;
            }
            if let Some(sense) = resolve(universe, &relation.sense_id) {
                pool.offer(&sense, source);
            }
        }
    }

    fn fill_opposite(&self, pool: &mut PoolAccumulator<'_>, universe: &dyn SenseProvider) {
        let ids = pool.target.relationships.opposite.clone();
        self.fill_from_relation(pool, universe, &ids, CandidateSource::Opposite);
    }

    fn fill_related(&self, pool: &mut PoolAccumulator<'_>, universe: &dyn SenseProvider) {
        let ids = pool.target.relationships.related.clone();
        self.fill_from_relation(pool, universe, &ids, CandidateSource::Related);
    }

    fn fill_from_relation(
        &self,
        pool: &mut PoolAccumulator<'_>,
        universe: &dyn SenseProvider,
        ids: &[SenseId],
        source: CandidateSource,
    ) {
        for id in ids {
            if !pool.has_room(&source) {
                break;
            }
            if let Some(sense) = resolve(universe, id) {
                pool.offer(&sense, source.clone());
            }
        }
    }

    fn fill_orthographic(&self, pool: &mut PoolAccumulator<'_>, universe: &dyn SenseProvider) {
        let probe = CandidateSource::Orthographic { edit_distance: 0 };
        if !pool.has_room(&probe) {
            return;
        }

        let Some(band) = self.band_senses(pool.target, universe, self.config.frequency_tolerance)
        else {
            return;
        };

        let target = pool.target;
        let mut lookalikes: Vec<(usize, u32, Sense)> = band
            .into_iter()
            .filter(|sense| !text::same_word(&sense.word, &target.word))
            .filter_map(|sense| {
                let distance = text::edit_distance(&sense.word, &target.word);
                (distance <= self.config.max_edit_distance)
                    .then(|| (distance, sense.rank_distance(target), sense))
            })
            .collect();
        lookalikes.sort_by(|a, b| (a.0, a.1, &a.2.id).cmp(&(b.0, b.1, &b.2.id)));

        for (edit_distance, _, sense) in lookalikes {
            let source = CandidateSource::Orthographic { edit_distance };
            if !pool.has_room(&source) {
                break;
            }
            pool.offer(&sense, source);
        }
    }

    fn fill_band_sample(&self, pool: &mut PoolAccumulator<'_>, universe: &dyn SenseProvider) {
        let source = CandidateSource::BandSample;
        if !pool.has_room(&source) {
            return;
        }

        let Some(mut band) = self.band_senses(pool.target, universe, self.config.band_window)
        else {
            return;
        };

        // Stable order before the seeded shuffle keeps the draw reproducible
        band.sort_by(|a, b| a.id.cmp(&b.id));
        let seed = text::stable_hash(pool.target.id.as_str()) ^ self.config.seed;
        let mut rng = StdRng::seed_from_u64(seed);
        band.shuffle(&mut rng);

        for sense in band {
            if !pool.has_room(&source) {
                break;
            }
            pool.offer(&sense, source.clone());
        }
    }

    /// Senses of the target's POS within `tolerance` ranks, or `None` when the
    /// universe query fails
    fn band_senses(
        &self,
        target: &Sense,
        universe: &dyn SenseProvider,
        tolerance: u32,
    ) -> Option<Vec<Sense>> {
        let min_rank = target.frequency_rank.saturating_sub(tolerance);
        let max_rank = target.frequency_rank.saturating_add(tolerance);

        let ids = match universe.senses_in_band(min_rank, max_rank, target.pos) {
            Ok(ids) => ids,
            Err(e) => {
                let err = match e {
                    McqError::UniverseLookupFailed(_) => e,
                    other => McqError::UniverseLookupFailed(other.to_string()),
                };
                warn!("Skipping tier for {}: {}", target.id, err);
                return None;
            }
        };

        Some(
            ids.iter()
                .filter(|id| **id != target.id)
                .filter_map(|id| resolve(universe, id))
                .collect(),
        )
    }
}

/// Look up a sense, logging and skipping ids the lexicon cannot resolve
fn resolve(universe: &dyn SenseProvider, id: &SenseId) -> Option<Sense> {
    match universe.get_sense(id) {
        Ok(sense) => Some(sense),
        Err(e) => {
            debug!("Skipping unresolvable candidate {}: {}", id, e);
            None
        }
    }
}

/// Accepted candidates plus the state needed to validate the next one
struct PoolAccumulator<'a> {
    target: &'a Sense,
    config: &'a PoolConfig,
    accepted: Vec<DistractorCandidate>,
    seen_texts: HashSet<String>,
    tier_counts: [usize; super::TIER_COUNT],
}

impl<'a> PoolAccumulator<'a> {
    fn new(target: &'a Sense, config: &'a PoolConfig) -> Self {
        Self {
            target,
            config,
            accepted: Vec::new(),
            seen_texts: HashSet::new(),
            tier_counts: [0; super::TIER_COUNT],
        }
    }

    /// Room left both in the pool and in the tier of `source`
    fn has_room(&self, source: &CandidateSource) -> bool {
        let tier_index = usize::from(source.tier()) - 1;
        self.accepted.len() < self.config.pool_cap()
            && self.tier_counts[tier_index] < source.rules(self.config).cap
    }

    fn offer(&mut self, sense: &Sense, source: CandidateSource) -> bool {
        let rules = source.rules(self.config);
        match self.validate(sense, &rules) {
            Ok(normalized) => {
                debug!(
                    "Accepted {} ({}) as tier {} for {}",
                    sense.id,
                    sense.word,
                    source.tier(),
                    self.target.id
                );
                self.seen_texts.insert(normalized);
                self.tier_counts[usize::from(source.tier()) - 1] += 1;
                self.accepted.push(DistractorCandidate {
                    text: sense.definition.trim().to_string(),
                    source_sense_id: sense.id.clone(),
                    source_word: sense.word.clone(),
                    source_pos: sense.pos,
                    frequency_rank: sense.frequency_rank,
                    example_sentence: sense.example().map(str::to_string),
                    source,
                });
                true
            }
            Err(reason) => {
                debug!(
                    "Rejected {} ({}) for {}: {:?}",
                    sense.id, sense.word, self.target.id, reason
                );
                false
            }
        }
    }

    /// Returns the normalized text on success
    fn validate(&self, sense: &Sense, rules: &TierRules) -> std::result::Result<String, Rejection> {
        let target = self.target;

        if sense.id == target.id || target.sibling_senses.contains(&sense.id) {
            return Err(Rejection::TargetSense);
        }
        if text::same_word(&sense.word, &target.word) {
            return Err(Rejection::SameWord);
        }

        let normalized = text::normalize(&sense.definition);
        if normalized.is_empty() {
            return Err(Rejection::EmptyText);
        }

        if rules.check_pos && !sense.pos.matches(target.pos) {
            return Err(Rejection::PosMismatch);
        }
        if let Some(tolerance) = rules.rank_tolerance {
            if sense.rank_distance(target) > tolerance {
                return Err(Rejection::OutsideBand);
            }
        }

        if self.seen_texts.contains(&normalized) {
            return Err(Rejection::Duplicate);
        }
        if text::sequence_ratio(&sense.definition, &target.definition)
            > self.config.similarity_threshold
        {
            return Err(Rejection::TooSimilar);
        }

        Ok(normalized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexicon::fixtures::{accept_sense_id, sample_lexicon};
    use crate::lexicon::InMemoryLexicon;
    use crate::types::{ConfusedRelation, PartOfSpeech, Relationships};

    fn verb(id: &str, word: &str, rank: u32, definition: &str) -> Sense {
        Sense {
            id: id.into(),
            word: word.into(),
            pos: PartOfSpeech::Verb,
            frequency_rank: rank,
            definition: definition.into(),
            example_sentence: None,
            relationships: Relationships::default(),
            sibling_senses: vec![],
        }
    }

    /// Universe whose band queries always fail
    struct BrokenBand(InMemoryLexicon);

    impl SenseProvider for BrokenBand {
        fn get_sense(&self, id: &SenseId) -> Result<Sense> {
            self.0.get_sense(id)
        }

        fn senses_in_band(&self, _: u32, _: u32, _: PartOfSpeech) -> Result<Vec<SenseId>> {
            Err(McqError::UniverseLookupFailed("index offline".into()))
        }
    }

    #[test]
    fn test_accept_pool_tiers() {
        let lexicon = sample_lexicon();
        let target = lexicon.get_sense(&accept_sense_id()).unwrap();
        let pool = PoolBuilder::default().build_pool(&target, &lexicon).unwrap();

        let counts = pool.tier_counts();
        assert_eq!(counts[0], 2, "confused tier");
        assert_eq!(counts[1], 2, "opposite tier");
        assert_eq!(counts[3], 1, "related tier");
        assert!(counts[4] > 0, "band filler");
        assert!(pool.len() <= 15);

        // Waterfall order is preserved
        let tiers: Vec<u8> = pool.candidates().iter().map(|c| c.tier()).collect();
        let mut sorted = tiers.clone();
        sorted.sort();
        assert_eq!(tiers, sorted);
    }

    #[test]
    fn test_polysemy_safety_rejects_sibling_sense() {
        let lexicon = sample_lexicon();
        let target = lexicon.get_sense(&accept_sense_id()).unwrap();
        let pool = PoolBuilder::default().build_pool(&target, &lexicon).unwrap();

        assert!(pool
            .candidates()
            .iter()
            .all(|c| !c.source_word.eq_ignore_ascii_case("accept")));
    }

    #[test]
    fn test_build_is_deterministic() {
        let lexicon = sample_lexicon();
        let target = lexicon.get_sense(&accept_sense_id()).unwrap();
        let builder = PoolBuilder::default();

        let first = builder.build_pool(&target, &lexicon).unwrap();
        let second = builder.build_pool(&target, &lexicon).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_seed_changes_band_draw_only() {
        let lexicon = sample_lexicon();
        let target = lexicon.get_sense(&accept_sense_id()).unwrap();
        let a = PoolBuilder::default().build_pool(&target, &lexicon).unwrap();
        let b = PoolBuilder::new(PoolConfig {
            seed: 7,
            ..PoolConfig::default()
        })
        .build_pool(&target, &lexicon)
        .unwrap();

        let relation_ids = |pool: &DistractorPool| {
            pool.candidates()
                .iter()
                .filter(|c| c.tier() < 5)
                .map(|c| c.source_sense_id.clone())
                .collect::<Vec<_>>()
        };
        assert_eq!(relation_ids(&a), relation_ids(&b));
    }

    #[test]
    fn test_similar_definition_rejected() {
        let mut target = verb(
            "give.v.01",
            "give",
            100,
            "transfer possession of something to someone",
        );
        target.relationships.related = vec!["hand.v.01".into()];
        target.relationships.confused = vec![ConfusedRelation {
            sense_id: "gift.v.01".into(),
            reason: "meaning".into(),
        }];

        let lexicon = InMemoryLexicon::from_senses(vec![
            target.clone(),
            verb("hand.v.01", "hand", 120, "transfer possession of something to somebody"),
            verb("gift.v.01", "gift", 5000, "transfer possession of something to someone else"),
            verb("eat.v.01", "eat", 130, "take in solid food"),
            verb("sleep.v.01", "sleep", 140, "be asleep"),
            verb("walk.v.01", "walk", 150, "use one's feet to advance"),
            verb("sing.v.01", "sing", 160, "produce tones with the voice"),
        ]);

        let pool = PoolBuilder::default().build_pool(&target, &lexicon).unwrap();
        let ids: Vec<&str> = pool
            .candidates()
            .iter()
            .map(|c| c.source_sense_id.as_str())
            .collect();
        assert!(!ids.contains(&"hand.v.01"));
        assert!(!ids.contains(&"gift.v.01"));
        assert_eq!(pool.len(), 4);
    }

    #[test]
    fn test_confused_tier_ignores_pos_and_band() {
        let mut target = verb("affect.v.01", "affect", 800, "have an influence upon");
        target.relationships.confused = vec![ConfusedRelation {
            sense_id: "effect.n.01".into(),
            reason: "sound-alike".into(),
        }];
        let mut effect = verb("effect.n.01", "effect", 9000, "a phenomenon that follows a cause");
        effect.pos = PartOfSpeech::Noun;

        let lexicon = InMemoryLexicon::from_senses(vec![
            target.clone(),
            effect,
            verb("eat.v.01", "eat", 700, "take in solid food"),
            verb("sleep.v.01", "sleep", 750, "be asleep"),
            verb("walk.v.01", "walk", 850, "use one's feet to advance"),
        ]);

        let pool = PoolBuilder::default().build_pool(&target, &lexicon).unwrap();
        assert_eq!(pool.candidates()[0].source_sense_id.as_str(), "effect.n.01");
        assert_eq!(pool.candidates()[0].tier(), 1);
    }

    #[test]
    fn test_opposite_outside_band_rejected() {
        let mut target = verb("rise.v.01", "rise", 500, "move upward");
        target.relationships.opposite = vec!["plummet.v.01".into()];

        let lexicon = InMemoryLexicon::from_senses(vec![
            target.clone(),
            verb("plummet.v.01", "plummet", 2600, "drop sharply"),
            verb("eat.v.01", "eat", 400, "take in solid food"),
            verb("sleep.v.01", "sleep", 450, "be asleep"),
            verb("walk.v.01", "walk", 550, "use one's feet to advance"),
            verb("sing.v.01", "sing", 600, "produce tones with the voice"),
        ]);

        let pool = PoolBuilder::default().build_pool(&target, &lexicon).unwrap();
        assert_eq!(pool.tier_counts()[1], 0);
    }

    #[test]
    fn test_pool_too_small() {
        let target = verb("rare.v.01", "rare", 10, "a lonely verb");
        let lexicon = InMemoryLexicon::from_senses(vec![
            target.clone(),
            verb("eat.v.01", "eat", 20, "take in solid food"),
        ]);

        let err = PoolBuilder::default().build_pool(&target, &lexicon).unwrap_err();
        match err {
            McqError::PoolTooSmall {
                found, required, ..
            } => {
                assert_eq!(found, 1);
                assert_eq!(required, 4);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_failed_band_query_degrades_tiers_only() {
        let lexicon = sample_lexicon();
        let target = lexicon.get_sense(&accept_sense_id()).unwrap();
        let broken = BrokenBand(lexicon);

        let pool = PoolBuilder::default().build_pool(&target, &broken).unwrap();
        let counts = pool.tier_counts();
        assert_eq!(counts[2], 0);
        assert_eq!(counts[4], 0);
        assert_eq!(pool.len(), 5);
    }

    #[test]
    fn test_orthographic_tier_uses_edit_distance() {
        let lexicon = sample_lexicon();
        let target = lexicon.get_sense(&accept_sense_id()).unwrap();
        let pool = PoolBuilder::default().build_pool(&target, &lexicon).unwrap();

        for candidate in pool.candidates().iter().filter(|c| c.tier() == 3) {
            assert!(text::edit_distance(&candidate.source_word, "accept") <= 2);
        }
        assert!(pool
            .candidates()
            .iter()
            .any(|c| c.source_word == "access" && c.tier() == 3));
    }

    #[test]
    fn test_pool_cap_respected() {
        let lexicon = sample_lexicon();
        let target = lexicon.get_sense(&accept_sense_id()).unwrap();
        let config = PoolConfig {
            max_size: 6,
            ..PoolConfig::default()
        };
        let pool = PoolBuilder::new(config).build_pool(&target, &lexicon).unwrap();
        assert_eq!(pool.len(), 6);
    }
}
