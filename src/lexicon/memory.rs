//! In-memory lexicon
//!
//! Holds senses in ordered maps so band queries come back in a stable order.
//! Loadable from a JSON file that is either an array of senses or an object with
//! a `senses` array.

use super::SenseProvider;
use crate::error::{McqError, Result};
use crate::types::{PartOfSpeech, Sense, SenseId};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{debug, info};

/// Lexicon backed by ordered maps
#[derive(Debug, Clone, Default)]
pub struct InMemoryLexicon {
    senses: BTreeMap<SenseId, Sense>,

    /// (frequency_rank, sense_id) for range scans
    by_rank: BTreeSet<(u32, SenseId)>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LexiconFile {
    List(Vec<Sense>),
    Wrapped { senses: Vec<Sense> },
}

impl InMemoryLexicon {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a lexicon from senses; later duplicates replace earlier ones
    pub fn from_senses(senses: impl IntoIterator<Item = Sense>) -> Self {
        let mut lexicon = Self::new();
        for sense in senses {
            lexicon.insert(sense);
        }
        lexicon
    }

    /// Load a JSON lexicon file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let lexicon = Self::from_json_str(&content)?;
        info!(
            "Loaded {} senses from {}",
            lexicon.len(),
            path.display()
        );
        Ok(lexicon)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let senses = match serde_json::from_str::<LexiconFile>(content)? {
            LexiconFile::List(senses) => senses,
            LexiconFile::Wrapped { senses } => senses,
        };
        Ok(Self::from_senses(senses))
    }

    /// Insert or replace a sense
    pub fn insert(&mut self, sense: Sense) {
        if let Some(previous) = self.senses.get(&sense.id) {
            debug!("Replacing sense {}", sense.id);
            self.by_rank
                .remove(&(previous.frequency_rank, previous.id.clone()));
        }
        self.by_rank.insert((sense.frequency_rank, sense.id.clone()));
        self.senses.insert(sense.id.clone(), sense);
    }

    pub fn len(&self) -> usize {
        self.senses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.senses.is_empty()
    }

    /// All sense ids in id order
    pub fn sense_ids(&self) -> Vec<SenseId> {
        self.senses.keys().cloned().collect()
    }

    pub fn senses(&self) -> impl Iterator<Item = &Sense> {
        self.senses.values()
    }
}

impl SenseProvider for InMemoryLexicon {
    fn get_sense(&self, id: &SenseId) -> Result<Sense> {
        self.senses
            .get(id)
            .cloned()
            .ok_or_else(|| McqError::SenseNotFound(id.to_string()))
    }

    fn senses_in_band(
        &self,
        min_rank: u32,
        max_rank: u32,
        pos: PartOfSpeech,
    ) -> Result<Vec<SenseId>> {
        if min_rank > max_rank {
            return Err(McqError::UniverseLookupFailed(format!(
                "empty rank range {}..={}",
                min_rank, max_rank
            )));
        }

        let lower = (min_rank, SenseId(String::new()));
        Ok(self
            .by_rank
            .range(lower..)
            .take_while(|(rank, _)| *rank <= max_rank)
            .filter_map(|(_, id)| self.senses.get(id))
            .filter(|sense| sense.pos.matches(pos))
            .map(|sense| sense.id.clone())
            .collect())
    }
}
