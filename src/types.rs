//! Core data types for lexiquiz
//!
//! Identifiers, part-of-speech handling, and the read-only `Sense` shape supplied
//! by the lexical knowledge base. Pool, item, serving and scoring types live in
//! their own modules.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a lexical sense, as assigned by the lexical knowledge base
/// (for example `accept.v.01`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SenseId(pub String);

impl SenseId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SenseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SenseId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identifier of a learner, opaque to this crate
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LearnerId(pub String);

impl LearnerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LearnerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for LearnerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Unique identifier for generated items
///
/// Wraps a UUID to keep item ids from being mixed up with presentation ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub Uuid);

impl ItemId {
    /// Create a new random item ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse an item ID from a string
    pub fn from_string(s: &str) -> std::result::Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for one served presentation of an item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PresentationId(pub Uuid);

impl PresentationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> std::result::Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for PresentationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PresentationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Part of speech
///
/// The adjective satellite is a lexicon artifact; for every matching rule it is
/// the same part of speech as `Adjective`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartOfSpeech {
    Noun,
    Verb,
    Adjective,
    AdjectiveSatellite,
    Adverb,
}

impl PartOfSpeech {
    /// Collapse the satellite variant onto `Adjective`
    pub fn canonical(self) -> Self {
        match self {
            PartOfSpeech::AdjectiveSatellite => PartOfSpeech::Adjective,
            other => other,
        }
    }

    /// POS equality with adjective/adjective-satellite equivalence
    pub fn matches(self, other: PartOfSpeech) -> bool {
        self.canonical() == other.canonical()
    }

    /// Parse the short tags used by WordNet-style lexicons (`n`, `v`, `a`, `s`, `r`)
    /// as well as the long names.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "n" | "noun" => Some(PartOfSpeech::Noun),
            "v" | "verb" => Some(PartOfSpeech::Verb),
            "a" | "adj" | "adjective" => Some(PartOfSpeech::Adjective),
            "s" | "adjective_satellite" | "satellite" => Some(PartOfSpeech::AdjectiveSatellite),
            "r" | "adv" | "adverb" => Some(PartOfSpeech::Adverb),
            _ => None,
        }
    }
}

impl std::fmt::Display for PartOfSpeech {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PartOfSpeech::Noun => write!(f, "noun"),
            PartOfSpeech::Verb => write!(f, "verb"),
            PartOfSpeech::Adjective | PartOfSpeech::AdjectiveSatellite => write!(f, "adjective"),
            PartOfSpeech::Adverb => write!(f, "adverb"),
        }
    }
}

/// A confusable sense with the reason it is confused with the target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusedRelation {
    pub sense_id: SenseId,

    /// Free-form reason from the lexicon (e.g. "sound-alike", "spelling")
    #[serde(default)]
    pub reason: String,
}

/// Typed relationship edges of a sense
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationships {
    #[serde(default)]
    pub confused: Vec<ConfusedRelation>,

    #[serde(default)]
    pub opposite: Vec<SenseId>,

    #[serde(default)]
    pub related: Vec<SenseId>,

    /// Derivational family; carried through but not a distractor source
    #[serde(default)]
    pub morphological: Vec<SenseId>,
}

/// One meaning of a word, as supplied by the lexical knowledge base
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sense {
    pub id: SenseId,
    pub word: String,
    pub pos: PartOfSpeech,

    /// Corpus frequency rank; lower is more frequent
    pub frequency_rank: u32,

    pub definition: String,

    #[serde(default)]
    pub example_sentence: Option<String>,

    #[serde(default)]
    pub relationships: Relationships,

    /// Other senses of the same word
    #[serde(default)]
    pub sibling_senses: Vec<SenseId>,
}

impl Sense {
    /// Example sentence, if present and not blank
    pub fn example(&self) -> Option<&str> {
        self.example_sentence
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Absolute frequency-rank distance to another sense
    pub fn rank_distance(&self, other: &Sense) -> u32 {
        self.frequency_rank.abs_diff(other.frequency_rank)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_satellite_matches_adjective() {
        assert!(PartOfSpeech::AdjectiveSatellite.matches(PartOfSpeech::Adjective));
        assert!(PartOfSpeech::Adjective.matches(PartOfSpeech::AdjectiveSatellite));
        assert!(!PartOfSpeech::Noun.matches(PartOfSpeech::Verb));
    }

    #[test]
    fn test_pos_parse() {
        assert_eq!(PartOfSpeech::parse("s"), Some(PartOfSpeech::AdjectiveSatellite));
        assert_eq!(PartOfSpeech::parse("Verb"), Some(PartOfSpeech::Verb));
        assert_eq!(PartOfSpeech::parse("x"), None);
    }

    #[test]
    fn test_sense_deserializes_with_defaults() {
        let json = r#"{
            "id": "accept.v.01",
            "word": "accept",
            "pos": "verb",
            "frequency_rank": 900,
            "definition": "consider or hold as true"
        }"#;
        let sense: Sense = serde_json::from_str(json).unwrap();
        assert_eq!(sense.id, SenseId::from("accept.v.01"));
        assert!(sense.example().is_none());
        assert!(sense.relationships.confused.is_empty());
    }

    #[test]
    fn test_blank_example_is_absent() {
        let sense = Sense {
            id: "a".into(),
            word: "a".into(),
            pos: PartOfSpeech::Noun,
            frequency_rank: 1,
            definition: "d".into(),
            example_sentence: Some("   ".into()),
            relationships: Relationships::default(),
            sibling_senses: vec![],
        };
        assert!(sense.example().is_none());
    }
}
