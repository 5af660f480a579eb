//! Batch interchange files
//!
//! Generated items leave the generator as one [`BatchRecord`] per item, in JSON
//! Lines or as a bincode record stream (a `u64` record count followed by the
//! records). Files are written to a temporary file next to the target and renamed
//! into place, so readers never see a partial batch.

use crate::error::{McqError, Result};
use crate::items::{Item, ItemType};
use crate::pool::{DistractorPool, TIER_COUNT};
use crate::text;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::info;

/// On-disk batch encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchFormat {
    #[default]
    Jsonl,
    Bincode,
}

impl BatchFormat {
    /// Guess the format from a file extension, defaulting to JSON Lines
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("bin") | Some("bincode") => BatchFormat::Bincode,
            _ => BatchFormat::Jsonl,
        }
    }
}

impl std::str::FromStr for BatchFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "jsonl" | "json" => Ok(BatchFormat::Jsonl),
            "bincode" | "bin" => Ok(BatchFormat::Bincode),
            other => Err(format!("unknown batch format: {}", other)),
        }
    }
}

impl std::fmt::Display for BatchFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BatchFormat::Jsonl => write!(f, "jsonl"),
            BatchFormat::Bincode => write!(f, "bincode"),
        }
    }
}

/// One option of a batch item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchOption {
    pub text: String,
    pub is_correct: bool,

    /// Distractor tier; `None` for the correct answer
    pub tier: Option<u8>,
}

/// Pool facts carried alongside each item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchQuality {
    pub pool_version: u32,
    pub pool_size: usize,
    pub tier_counts: [usize; TIER_COUNT],
}

/// One generated item, self-contained for ingestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRecord {
    pub sense_id: String,
    pub word: String,
    pub item_type: ItemType,
    pub question_text: String,
    pub context: Option<String>,
    pub options: Vec<BatchOption>,
    pub correct_index: usize,
    pub explanation: String,
    pub quality: BatchQuality,
}

impl BatchRecord {
    /// Expand an item against its pool
    ///
    /// Options are the correct answer plus every distractor the item may show,
    /// in an order seeded by the sense and item type so reruns produce identical
    /// files.
    pub fn from_item(item: &Item, pool: &DistractorPool) -> Self {
        let mut options: Vec<BatchOption> = item
            .eligible_indices(pool)
            .into_iter()
            .filter_map(|index| {
                let candidate = pool.get(index)?;
                Some(BatchOption {
                    text: item.option_text(pool, index)?.to_string(),
                    is_correct: false,
                    tier: Some(candidate.tier()),
                })
            })
            .collect();
        options.push(BatchOption {
            text: item.correct_text.clone(),
            is_correct: true,
            tier: None,
        });

        let seed = text::stable_hash(&format!("{}:{}", item.sense_id, item.item_type));
        options.shuffle(&mut StdRng::seed_from_u64(seed));
        let correct_index = options
            .iter()
            .position(|option| option.is_correct)
            .unwrap_or_default();

        Self {
            sense_id: item.sense_id.to_string(),
            word: item.word.clone(),
            item_type: item.item_type,
            question_text: item.question_text.clone(),
            context: item.context.clone(),
            options,
            correct_index,
            explanation: item.explanation.clone(),
            quality: BatchQuality {
                pool_version: pool.version(),
                pool_size: pool.len(),
                tier_counts: pool.tier_counts(),
            },
        }
    }
}

/// Write records atomically
pub fn write_batch(path: &Path, format: BatchFormat, records: &[BatchRecord]) -> Result<()> {
    let parent = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;

    let mut temp_file = NamedTempFile::new_in(parent)?;
    {
        let mut writer = BufWriter::new(&mut temp_file);
        match format {
            BatchFormat::Jsonl => {
                for record in records {
                    serde_json::to_writer(&mut writer, record)?;
                    writer.write_all(b"\n")?;
                }
            }
            BatchFormat::Bincode => {
                bincode::serialize_into(&mut writer, &(records.len() as u64))?;
                for record in records {
                    bincode::serialize_into(&mut writer, record)?;
                }
            }
        }
        writer.flush()?;
    }
    temp_file
        .persist(path)
        .map_err(|e| McqError::Io(e.error))?;

    info!(
        "Wrote {} records to {} ({})",
        records.len(),
        path.display(),
        format
    );
    Ok(())
}

/// Read records back
pub fn read_batch(path: &Path, format: BatchFormat) -> Result<Vec<BatchRecord>> {
    let reader = BufReader::new(File::open(path)?);

    match format {
        BatchFormat::Jsonl => {
            let mut records = Vec::new();
            for (number, line) in reader.lines().enumerate() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                let record = serde_json::from_str(&line).map_err(|e| {
                    McqError::InvalidInput(format!(
                        "{}:{}: {}",
                        path.display(),
                        number + 1,
                        e
                    ))
                })?;
                records.push(record);
            }
            Ok(records)
        }
        BatchFormat::Bincode => {
            let mut reader = reader;
            let count: u64 = bincode::deserialize_from(&mut reader)?;
            (0..count)
                .map(|_| Ok(bincode::deserialize_from(&mut reader)?))
                .collect()
        }
    }
}

/// Aggregate view of a batch file
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchSummary {
    pub records: usize,
    pub senses: usize,
    pub by_type: BTreeMap<String, usize>,
    pub tier_totals: [usize; TIER_COUNT],
    pub mean_options: f64,
    pub mean_pool_size: f64,
}

impl BatchSummary {
    pub fn from_records(records: &[BatchRecord]) -> Self {
        if records.is_empty() {
            return Self::default();
        }

        let mut summary = Self {
            records: records.len(),
            ..Self::default()
        };
        let mut senses = BTreeSet::new();
        let mut pool_sizes = BTreeMap::new();
        let mut options = 0;

        for record in records {
            *summary
                .by_type
                .entry(record.item_type.to_string())
                .or_default() += 1;
            options += record.options.len();

            // Pool facts repeat per item; count each sense once
            if senses.insert(record.sense_id.as_str()) {
                pool_sizes.insert(record.sense_id.as_str(), record.quality.pool_size);
                for (total, count) in summary
                    .tier_totals
                    .iter_mut()
                    .zip(record.quality.tier_counts)
                {
                    *total += count;
                }
            }
        }

        summary.senses = senses.len();
        summary.mean_options = options as f64 / records.len() as f64;
        summary.mean_pool_size =
            pool_sizes.values().sum::<usize>() as f64 / pool_sizes.len() as f64;
        summary
    }
}
