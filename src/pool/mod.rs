//! Distractor pools
//!
//! A pool is the validated, tiered list of wrong answers for one sense. It is
//! built once by [`PoolBuilder`], stored once per sense, and referenced by every
//! item of that sense through a [`PoolRef`]. Regeneration replaces a pool
//! wholesale under a new version; nothing edits a pool in place.

pub mod builder;

use crate::config::PoolConfig;
use crate::types::{PartOfSpeech, SenseId};
use serde::{Deserialize, Serialize};

pub use builder::PoolBuilder;

/// Number of waterfall tiers
pub const TIER_COUNT: usize = 5;

/// Where a distractor candidate came from
///
/// Each variant is one waterfall tier; [`CandidateSource::rules`] gives the
/// validation rules that tier applies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum CandidateSource {
    /// Tier 1: lexicon-declared confusable (sound-alike, look-alike)
    Confused { reason: String },

    /// Tier 2: antonym
    Opposite,

    /// Tier 3: similarly spelled word from the target's frequency band
    Orthographic { edit_distance: usize },

    /// Tier 4: lexicon-declared related sense
    Related,

    /// Tier 5: random draw from the narrow frequency band
    BandSample,
}

/// Validation rules for one tier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierRules {
    /// Candidate POS must match the target
    pub check_pos: bool,

    /// Maximum frequency-rank distance, if any
    pub rank_tolerance: Option<u32>,

    /// Slots this tier may fill
    pub cap: usize,
}

impl CandidateSource {
    /// Tier number, 1 (most valuable) through 5
    pub fn tier(&self) -> u8 {
        match self {
            CandidateSource::Confused { .. } => 1,
            CandidateSource::Opposite => 2,
            CandidateSource::Orthographic { .. } => 3,
            CandidateSource::Related => 4,
            CandidateSource::BandSample => 5,
        }
    }

    pub fn tier_name(&self) -> &'static str {
        match self {
            CandidateSource::Confused { .. } => "confused",
            CandidateSource::Opposite => "opposite",
            CandidateSource::Orthographic { .. } => "orthographic",
            CandidateSource::Related => "related",
            CandidateSource::BandSample => "band-sample",
        }
    }

    /// Sourced from the sense's own relationship edges
    pub fn is_relation(&self) -> bool {
        matches!(
            self,
            CandidateSource::Confused { .. } | CandidateSource::Opposite | CandidateSource::Related
        )
    }

    pub fn rules(&self, config: &PoolConfig) -> TierRules {
        let tier_cap = |normal: usize| {
            if config.high_volume {
                config.high_volume_tier_cap.max(normal)
            } else {
                normal
            }
        };

        match self {
            // Confusables are valuable across POS and frequency gaps
            CandidateSource::Confused { .. } => TierRules {
                check_pos: false,
                rank_tolerance: None,
                cap: tier_cap(config.confused_cap),
            },
            CandidateSource::Opposite => TierRules {
                check_pos: true,
                rank_tolerance: Some(config.frequency_tolerance),
                cap: tier_cap(config.opposite_cap),
            },
            CandidateSource::Orthographic { .. } => TierRules {
                check_pos: true,
                rank_tolerance: Some(config.frequency_tolerance),
                cap: tier_cap(config.orthographic_cap),
            },
            CandidateSource::Related => TierRules {
                check_pos: true,
                rank_tolerance: Some(config.frequency_tolerance),
                cap: tier_cap(config.related_cap),
            },
            CandidateSource::BandSample => TierRules {
                check_pos: true,
                rank_tolerance: Some(config.band_window),
                cap: config.band_sample_cap,
            },
        }
    }
}

/// One validated wrong answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistractorCandidate {
    /// Option text for meaning items: the source sense's definition
    pub text: String,
    pub source_sense_id: SenseId,
    pub source_word: String,
    pub source_pos: PartOfSpeech,
    pub frequency_rank: u32,

    /// Source sense's example sentence, used by usage items
    pub example_sentence: Option<String>,

    pub source: CandidateSource,
}

impl DistractorCandidate {
    pub fn tier(&self) -> u8 {
        self.source.tier()
    }

    pub fn tier_name(&self) -> &'static str {
        self.source.tier_name()
    }
}

/// Reference from an item to the pool of its sense
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PoolRef {
    pub sense_id: SenseId,
    pub version: u32,
}

impl std::fmt::Display for PoolRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@v{}", self.sense_id, self.version)
    }
}

/// Ordered, deduplicated, capped list of distractor candidates for one sense
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistractorPool {
    sense_id: SenseId,
    target_word: String,
    version: u32,
    candidates: Vec<DistractorCandidate>,
}

impl DistractorPool {
    pub(crate) fn new(
        sense_id: SenseId,
        target_word: String,
        candidates: Vec<DistractorCandidate>,
    ) -> Self {
        Self {
            sense_id,
            target_word,
            version: 1,
            candidates,
        }
    }

    /// Same candidates under another version, for wholesale replacement
    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn sense_id(&self) -> &SenseId {
        &self.sense_id
    }

    pub fn target_word(&self) -> &str {
        &self.target_word
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn candidates(&self) -> &[DistractorCandidate] {
        &self.candidates
    }

    pub fn get(&self, index: usize) -> Option<&DistractorCandidate> {
        self.candidates.get(index)
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn pool_ref(&self) -> PoolRef {
        PoolRef {
            sense_id: self.sense_id.clone(),
            version: self.version,
        }
    }

    /// Candidate count per tier, index 0 is tier 1
    pub fn tier_counts(&self) -> [usize; TIER_COUNT] {
        let mut counts = [0; TIER_COUNT];
        for candidate in &self.candidates {
            counts[usize::from(candidate.tier()) - 1] += 1;
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_rules_defaults() {
        let config = PoolConfig::default();

        let confused = CandidateSource::Confused {
            reason: "sound".into(),
        }
        .rules(&config);
        assert!(!confused.check_pos);
        assert_eq!(confused.rank_tolerance, None);
        assert_eq!(confused.cap, 2);

        let related = CandidateSource::Related.rules(&config);
        assert!(related.check_pos);
        assert_eq!(related.rank_tolerance, Some(2000));
        assert_eq!(related.cap, 1);

        let band = CandidateSource::BandSample.rules(&config);
        assert_eq!(band.rank_tolerance, Some(500));
        assert_eq!(band.cap, 10);
    }

    #[test]
    fn test_high_volume_raises_tier_caps() {
        let config = PoolConfig {
            high_volume: true,
            ..PoolConfig::default()
        };
        assert_eq!(CandidateSource::Related.rules(&config).cap, 5);
        assert_eq!(CandidateSource::Opposite.rules(&config).cap, 5);
        assert_eq!(CandidateSource::BandSample.rules(&config).cap, 10);
    }

    #[test]
    fn test_tier_names() {
        assert_eq!(CandidateSource::BandSample.tier_name(), "band-sample");
        assert_eq!(CandidateSource::Orthographic { edit_distance: 1 }.tier(), 3);
        assert!(CandidateSource::Related.is_relation());
        assert!(!CandidateSource::BandSample.is_relation());
    }
}
