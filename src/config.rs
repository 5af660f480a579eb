//! Configuration for pool building, serving, scoring and batch generation
//!
//! # Configuration File Format
//!
//! TOML format, by default in `.lexiquiz/config.toml`:
//!
//! ```toml
//! [pool]
//! max_size = 15
//! min_size = 4
//! high_volume = false
//! similarity_threshold = 0.75
//!
//! [serving]
//! window_half_width = 0.1
//! default_k = 4
//!
//! [scoring]
//! learning_rate = 0.1
//! confidence_step = 0.05
//! discrimination_min_attempts = 10
//!
//! [generation]
//! workers = 4
//!
//! [storage]
//! presentation_ttl_secs = 3600
//! purge_every = 128
//! ```
//!
//! Every section and field is optional; missing values fall back to the defaults below.

use crate::error::{McqError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable naming a config file
pub const CONFIG_ENV_VAR: &str = "LEXIQUIZ_CONFIG";

/// Complete configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct McqConfig {
    #[serde(default)]
    pub pool: PoolConfig,

    #[serde(default)]
    pub serving: ServingConfig,

    #[serde(default)]
    pub scoring: ScoringConfig,

    #[serde(default)]
    pub generation: GenerationConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

/// Distractor pool construction settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Pool cap in normal mode
    pub max_size: usize,

    /// Pool cap in high-volume mode
    pub high_volume_max_size: usize,

    /// Fewer validated candidates than this fails the build
    pub min_size: usize,

    /// Raise tier caps and the pool cap for high-traffic senses
    pub high_volume: bool,

    pub confused_cap: usize,
    pub opposite_cap: usize,
    pub orthographic_cap: usize,
    pub related_cap: usize,

    /// Tier cap used for tiers 1-4 in high-volume mode
    pub high_volume_tier_cap: usize,

    /// Upper bound on band-sample fill
    pub band_sample_cap: usize,

    /// Rank tolerance for tiers 2-4
    pub frequency_tolerance: u32,

    /// Rank window for the band sample
    pub band_window: u32,

    /// Maximum edit distance between words for orthographic candidates
    pub max_edit_distance: usize,

    /// Definition similarity ratio above which a candidate is rejected
    pub similarity_threshold: f64,

    /// Mixed into the per-sense band-sample seed
    pub seed: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: 15,
            high_volume_max_size: 25,
            min_size: 4,
            high_volume: false,
            confused_cap: 2,
            opposite_cap: 2,
            orthographic_cap: 2,
            related_cap: 1,
            high_volume_tier_cap: 5,
            band_sample_cap: 10,
            frequency_tolerance: 2000,
            band_window: 500,
            max_edit_distance: 2,
            similarity_threshold: 0.75,
            seed: 0,
        }
    }
}

impl PoolConfig {
    /// Effective pool cap
    pub fn pool_cap(&self) -> usize {
        if self.high_volume {
            self.high_volume_max_size
        } else {
            self.max_size
        }
    }
}

/// Serving selector settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServingConfig {
    /// Half-width of the ability window
    pub window_half_width: f64,

    /// Options displayed when the caller does not ask for a size
    pub default_k: usize,

    /// A-priori distractor difficulty by tier (index 0 is tier 1)
    pub tier_difficulty: [f64; 5],
}

impl Default for ServingConfig {
    fn default() -> Self {
        Self {
            window_half_width: 0.1,
            default_k: 4,
            tier_difficulty: [0.8, 0.7, 0.6, 0.4, 0.3],
        }
    }
}

/// Ability and item-statistics settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub learning_rate: f64,
    pub confidence_step: f64,
    pub initial_estimate: f64,

    /// Difficulty used for items with no attempts yet
    pub default_difficulty: f64,

    /// Attempts before discrimination is defined
    pub discrimination_min_attempts: u64,

    pub min_discrimination: f64,
    pub min_difficulty: f64,
    pub max_difficulty: f64,

    /// Attempts before per-distractor selection rates are judged
    pub distractor_review_min_attempts: u64,

    /// A distractor chosen more often than this share is flagged as too confusable
    pub confusable_rate: f64,

    /// Items whose quality score falls below this are deactivated
    pub deactivate_below: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            confidence_step: 0.05,
            initial_estimate: 0.5,
            default_difficulty: 0.5,
            discrimination_min_attempts: 10,
            min_discrimination: 0.30,
            min_difficulty: 0.20,
            max_difficulty: 0.80,
            distractor_review_min_attempts: 20,
            confusable_rate: 0.40,
            deactivate_below: 0.2,
        }
    }
}

/// Batch generation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Number of shard workers
    pub workers: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
        }
    }
}

/// Storage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// How long a served presentation may be submitted
    pub presentation_ttl_secs: i64,

    /// Connection pool size for the SQLite backend
    pub pool_size: usize,

    /// Retries when the SQLite database is busy at the start of an attempt
    pub max_update_retries: u32,

    /// Purge expired presentations every this many selections; 0 disables
    pub purge_every: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            presentation_ttl_secs: 3600,
            pool_size: 8,
            max_update_retries: 8,
            purge_every: 128,
        }
    }
}

impl McqConfig {
    /// Parse configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: McqConfig = toml::from_str(content)
            .map_err(|e| McqError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            McqError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Resolve the config file from the CLI flag, `LEXIQUIZ_CONFIG`, or the
    /// project directory, falling back to defaults when none exists.
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        let path = cli_path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var(CONFIG_ENV_VAR).ok().map(PathBuf::from))
            .or_else(|| {
                let project = PathBuf::from(".lexiquiz").join("config.toml");
                project.exists().then_some(project)
            });

        match path {
            Some(path) => {
                debug!("Loading config from {}", path.display());
                Self::from_file(&path)
            }
            None => {
                debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Reject inconsistent settings
    pub fn validate(&self) -> Result<()> {
        let pool = &self.pool;
        if pool.min_size == 0 {
            return Err(McqError::Config("pool.min_size must be at least 1".into()));
        }
        if pool.min_size > pool.pool_cap() {
            return Err(McqError::Config(format!(
                "pool.min_size ({}) exceeds the pool cap ({})",
                pool.min_size,
                pool.pool_cap()
            )));
        }
        if !(0.0..=1.0).contains(&pool.similarity_threshold) {
            return Err(McqError::Config(
                "pool.similarity_threshold must be within [0, 1]".into(),
            ));
        }
        if pool.band_window > pool.frequency_tolerance {
            return Err(McqError::Config(
                "pool.band_window must not exceed pool.frequency_tolerance".into(),
            ));
        }

        if !(0.0..=0.5).contains(&self.serving.window_half_width) {
            return Err(McqError::Config(
                "serving.window_half_width must be within [0, 0.5]".into(),
            ));
        }
        if self.serving.default_k < 2 {
            return Err(McqError::Config("serving.default_k must be at least 2".into()));
        }
        if self
            .serving
            .tier_difficulty
            .iter()
            .any(|d| !(0.0..=1.0).contains(d))
        {
            return Err(McqError::Config(
                "serving.tier_difficulty values must be within [0, 1]".into(),
            ));
        }

        let scoring = &self.scoring;
        if scoring.min_difficulty > scoring.max_difficulty {
            return Err(McqError::Config(
                "scoring.min_difficulty exceeds scoring.max_difficulty".into(),
            ));
        }
        if !(0.0..=1.0).contains(&scoring.initial_estimate)
            || !(0.0..=1.0).contains(&scoring.default_difficulty)
        {
            return Err(McqError::Config(
                "scoring estimates must be within [0, 1]".into(),
            ));
        }
        if scoring.discrimination_min_attempts == 0 {
            return Err(McqError::Config(
                "scoring.discrimination_min_attempts must be at least 1".into(),
            ));
        }

        if self.generation.workers == 0 {
            return Err(McqError::Config("generation.workers must be at least 1".into()));
        }
        Ok(())
    }
}
