//! Item factory
//!
//! Turns a sense and its distractor pool into typed multiple-choice items. Items
//! never copy distractor text: they hold a [`PoolRef`] and resolve option text
//! from the pool at serving time, so pool-level statistics apply to every item of
//! a sense.

use crate::pool::{DistractorCandidate, DistractorPool, PoolRef};
use crate::text;
use crate::types::{ItemId, Sense, SenseId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// Usage items need at least this many distractor sentences from distinct words
pub const MIN_USAGE_DISTRACTORS: usize = 3;

/// Discrimination items need at least this many distinct distractor words
pub const MIN_DISCRIMINATION_DISTRACTORS: usize = 3;

const BLANK: &str = "_____";

/// Kind of assessment item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemType {
    /// Pick the definition of a word shown in context
    Meaning,

    /// Pick the sentence that shows the target meaning
    Usage,

    /// Pick the word that fits, against confusable words
    Discrimination,
}

impl ItemType {
    pub const ALL: [ItemType; 3] = [ItemType::Meaning, ItemType::Usage, ItemType::Discrimination];

    /// Text a pool candidate shows as an option of this item type, if it can be shown
    pub fn option_text<'a>(&self, candidate: &'a DistractorCandidate) -> Option<&'a str> {
        match self {
            ItemType::Meaning => Some(candidate.text.as_str()),
            ItemType::Usage => candidate
                .source
                .is_relation()
                .then_some(candidate.example_sentence.as_deref())
                .flatten(),
            ItemType::Discrimination => Some(candidate.source_word.as_str()),
        }
    }

    /// Key that must be unique among shown distractors
    fn distinct_key(&self, candidate: &DistractorCandidate, option: &str) -> String {
        match self {
            ItemType::Meaning => text::normalize(option),
            ItemType::Usage | ItemType::Discrimination => text::normalize(&candidate.source_word),
        }
    }
}

impl std::fmt::Display for ItemType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemType::Meaning => write!(f, "MEANING"),
            ItemType::Usage => write!(f, "USAGE"),
            ItemType::Discrimination => write!(f, "DISCRIMINATION"),
        }
    }
}

impl std::str::FromStr for ItemType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "MEANING" => Ok(ItemType::Meaning),
            "USAGE" => Ok(ItemType::Usage),
            "DISCRIMINATION" => Ok(ItemType::Discrimination),
            other => Err(format!("unknown item type: {}", other)),
        }
    }
}

/// A generated multiple-choice item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub sense_id: SenseId,
    pub word: String,
    pub item_type: ItemType,
    pub question_template_id: String,
    pub question_text: String,
    pub context: Option<String>,
    pub correct_text: String,
    pub pool_ref: PoolRef,
    pub explanation: String,

    /// Cleared by the scorer when item quality degrades
    pub is_active: bool,

    pub created_at: DateTime<Utc>,
}

impl Item {
    /// Pool indices this item may show, in pool order
    ///
    /// Drops candidates without option text for this item type, duplicates by
    /// option text or word, and anything that reads the same as the correct answer.
    pub fn eligible_indices(&self, pool: &DistractorPool) -> Vec<usize> {
        eligible_indices(self.item_type, &self.correct_text, pool)
    }

    /// Option text of a pool entry for this item
    pub fn option_text<'a>(&self, pool: &'a DistractorPool, index: usize) -> Option<&'a str> {
        pool.get(index)
            .and_then(|candidate| self.item_type.option_text(candidate))
    }
}

fn eligible_indices(item_type: ItemType, correct_text: &str, pool: &DistractorPool) -> Vec<usize> {
    let correct = text::normalize(correct_text);
    let mut seen = HashSet::new();

    pool.candidates()
        .iter()
        .enumerate()
        .filter_map(|(index, candidate)| {
            let option = item_type.option_text(candidate)?;
            let normalized = text::normalize(option);
            if normalized.is_empty() || normalized == correct {
                return None;
            }
            seen.insert(item_type.distinct_key(candidate, option))
                .then_some(index)
        })
        .collect()
}

/// Builds items from a sense and its pool
#[derive(Debug, Clone, Copy, Default)]
pub struct ItemFactory;

impl ItemFactory {
    pub fn new() -> Self {
        Self
    }

    /// Emit every item type the sense and pool qualify for
    pub fn make_items(&self, sense: &Sense, pool: &DistractorPool) -> Vec<Item> {
        ItemType::ALL
            .iter()
            .filter_map(|item_type| self.make_item(*item_type, sense, pool))
            .collect()
    }

    /// Build one item of the given type, or `None` when the sense or pool does not
    /// meet that type's minimum constraints
    pub fn make_item(
        &self,
        item_type: ItemType,
        sense: &Sense,
        pool: &DistractorPool,
    ) -> Option<Item> {
        if pool.sense_id() != &sense.id {
            debug!(
                "Pool {} does not belong to sense {}",
                pool.sense_id(),
                sense.id
            );
            return None;
        }

        let item = match item_type {
            ItemType::Meaning => self.meaning(sense, pool),
            ItemType::Usage => self.usage(sense, pool),
            ItemType::Discrimination => self.discrimination(sense, pool),
        };
        if item.is_none() {
            debug!("Skipping {} item for {}", item_type, sense.id);
        }
        item
    }

    fn meaning(&self, sense: &Sense, pool: &DistractorPool) -> Option<Item> {
        let example = sense.example()?;
        Some(new_item(
            sense,
            pool,
            ItemType::Meaning,
            "meaning.v1",
            format!("What does \"{}\" mean in this sentence?", sense.word),
            Some(example.to_string()),
            sense.definition.trim().to_string(),
            format!(
                "\"{}\" ({}) means \"{}\".",
                sense.word,
                sense.pos,
                sense.definition.trim()
            ),
        ))
    }

    fn usage(&self, sense: &Sense, pool: &DistractorPool) -> Option<Item> {
        let example = sense.example()?;
        if eligible_indices(ItemType::Usage, example, pool).len() < MIN_USAGE_DISTRACTORS {
            return None;
        }

        Some(new_item(
            sense,
            pool,
            ItemType::Usage,
            "usage.v1",
            format!(
                "Which sentence shows the meaning \"{}\"?",
                sense.definition.trim()
            ),
            None,
            example.to_string(),
            format!(
                "\"{}\" means \"{}\", as in: {}",
                sense.word,
                sense.definition.trim(),
                example
            ),
        ))
    }

    fn discrimination(&self, sense: &Sense, pool: &DistractorPool) -> Option<Item> {
        if sense.relationships.confused.is_empty() {
            return None;
        }
        if eligible_indices(ItemType::Discrimination, &sense.word, pool).len()
            < MIN_DISCRIMINATION_DISTRACTORS
        {
            return None;
        }

        let blanked = sense
            .example()
            .and_then(|example| text::blank_word(example, &sense.word, BLANK));
        let (template_id, question, context) = match blanked {
            Some(sentence) => (
                "discrimination.blank.v1",
                "Choose the word that completes the sentence.".to_string(),
                Some(sentence),
            ),
            None => (
                "discrimination.clue.v1",
                format!("Which word means \"{}\"?", sense.definition.trim()),
                None,
            ),
        };

        let confusables: Vec<&str> = pool
            .candidates()
            .iter()
            .filter(|c| c.tier() == 1)
            .map(|c| c.source_word.as_str())
            .collect();
        let explanation = if confusables.is_empty() {
            format!("\"{}\" means \"{}\".", sense.word, sense.definition.trim())
        } else {
            format!(
                "\"{}\" means \"{}\". Do not confuse it with {}.",
                sense.word,
                sense.definition.trim(),
                confusables
                    .iter()
                    .map(|w| format!("\"{}\"", w))
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        };

        Some(new_item(
            sense,
            pool,
            ItemType::Discrimination,
            template_id,
            question,
            context,
            sense.word.clone(),
            explanation,
        ))
    }
}

#[allow(clippy::too_many_arguments)]
fn new_item(
    sense: &Sense,
    pool: &DistractorPool,
    item_type: ItemType,
    template_id: &str,
    question_text: String,
    context: Option<String>,
    correct_text: String,
    explanation: String,
) -> Item {
    Item {
        id: ItemId::new(),
        sense_id: sense.id.clone(),
        word: sense.word.clone(),
        item_type,
        question_template_id: template_id.to_string(),
        question_text,
        context,
        correct_text,
        pool_ref: pool.pool_ref(),
        explanation,
        is_active: true,
        created_at: Utc::now(),
    }
}
