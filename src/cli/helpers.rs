//! Shared helper functions for CLI commands
//!
//! Lexicon loading, database path resolution and service construction.

use clap::Args;
use lexiquiz_core::{
    error::{McqError, Result},
    lexicon::fixtures::sample_lexicon,
    AssessmentService, InMemoryLexicon, McqConfig, ServiceStores, SqliteStore,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Where senses come from
#[derive(Debug, Clone, Args)]
pub struct LexiconArgs {
    /// JSON lexicon file (array of senses or {"senses": [...]})
    #[arg(long, env = "LEXIQUIZ_LEXICON")]
    pub lexicon: Option<PathBuf>,

    /// Use the built-in sample lexicon around "accept"
    #[arg(long, conflicts_with = "lexicon")]
    pub demo: bool,
}

/// Load the lexicon selected on the command line
pub fn load_lexicon(args: &LexiconArgs) -> Result<InMemoryLexicon> {
    if args.demo {
        debug!("Using the sample lexicon");
        return Ok(sample_lexicon());
    }
    match &args.lexicon {
        Some(path) => InMemoryLexicon::from_json_file(path),
        None => Err(McqError::InvalidInput(
            "no lexicon given; pass --lexicon <FILE> or --demo".into(),
        )),
    }
}

/// Get the database path from CLI arg, env var, project dir, or default
pub fn get_db_path(cli_path: Option<PathBuf>) -> PathBuf {
    cli_path
        .or_else(|| std::env::var("LEXIQUIZ_DB_PATH").ok().map(PathBuf::from))
        .or_else(|| {
            // Check for project-specific database in .lexiquiz/
            let project_db = PathBuf::from(".lexiquiz").join("lexiquiz.db");
            project_db.exists().then_some(project_db)
        })
        .unwrap_or_else(SqliteStore::default_path)
}

/// Open the SQLite store at the resolved path
pub async fn open_store(config: &McqConfig, db_path: Option<PathBuf>) -> Result<Arc<SqliteStore>> {
    let path = get_db_path(db_path);
    debug!("Using database at {}", path.display());
    Ok(Arc::new(SqliteStore::open(&path, &config.storage).await?))
}

/// Build the assessment service, persistent or in memory
pub async fn build_service(
    config: &McqConfig,
    persist: bool,
    db_path: Option<PathBuf>,
) -> Result<AssessmentService> {
    let stores = if persist {
        ServiceStores::sqlite(open_store(config, db_path).await?, config)
    } else {
        ServiceStores::memory(config)
    };
    Ok(AssessmentService::new(stores, config.clone()))
}
