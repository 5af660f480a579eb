//! Lexiquiz - vocabulary MCQ generation, serving and scoring
//!
//! Command-line entry point: inspect distractor pools, generate item batches,
//! summarize batch files, and run an interactive quiz.

mod cli;

use anyhow::Context;
use clap::{Parser, Subcommand};
use cli::helpers::LexiconArgs;
use lexiquiz_core::{batch::BatchFormat, McqConfig};
use std::path::PathBuf;
use tracing::{debug, Level};
use tracing_subscriber::{self, EnvFilter};

#[derive(Parser)]
#[command(name = "lexiquiz")]
#[command(about = "Tiered-distractor vocabulary quizzes", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (overrides LEXIQUIZ_CONFIG and .lexiquiz/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Set log level
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Database path (overrides LEXIQUIZ_DB_PATH env var and default)
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build and print the distractor pool of a sense
    Pool {
        /// Sense id, e.g. accept.v.01
        sense_id: String,

        #[command(flatten)]
        lexicon: LexiconArgs,

        /// Use the high-volume tier caps
        #[arg(long)]
        high_volume: bool,

        /// Print the pool as JSON
        #[arg(long)]
        json: bool,
    },

    /// Generate pools and items for many senses into a batch file
    Generate {
        #[command(flatten)]
        lexicon: LexiconArgs,

        /// Output file
        #[arg(short, long, default_value = "items.jsonl")]
        output: PathBuf,

        /// Batch format (jsonl or bincode); guessed from the extension by default
        #[arg(short, long)]
        format: Option<BatchFormat>,

        /// Only these sense ids (comma-separated); all senses by default
        #[arg(short, long, value_delimiter = ',')]
        senses: Vec<String>,

        /// Number of generation workers
        #[arg(short, long)]
        workers: Option<usize>,

        /// Use the high-volume tier caps
        #[arg(long)]
        high_volume: bool,

        /// Also store pools and items in the database
        #[arg(long)]
        ingest: bool,
    },

    /// Summarize a batch file
    Inspect {
        /// Batch file
        path: PathBuf,

        /// Batch format (jsonl or bincode); guessed from the extension by default
        #[arg(short, long)]
        format: Option<BatchFormat>,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,

        /// Print the first N records
        #[arg(long, default_value = "0")]
        show: usize,
    },

    /// Run an interactive quiz in the terminal
    Quiz {
        #[command(flatten)]
        lexicon: LexiconArgs,

        /// Learner id
        #[arg(long, default_value = "me")]
        learner: String,

        /// Number of questions
        #[arg(short, long, default_value = "10")]
        questions: usize,

        /// Only these sense ids (comma-separated); all senses by default
        #[arg(short, long, value_delimiter = ',')]
        senses: Vec<String>,

        /// Options per question
        #[arg(short = 'k', long)]
        options: Option<usize>,

        /// Keep abilities and statistics in the database
        #[arg(long)]
        persist: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = match cli.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // RUST_LOG wins when set
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "lexiquiz={level},lexiquiz_core={level}",
            level = level.as_str().to_lowercase()
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr) // Write logs to stderr, not stdout
        .init();

    debug!("Lexiquiz v{} starting...", env!("CARGO_PKG_VERSION"));

    let config =
        McqConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    let result = match cli.command {
        Commands::Pool {
            sense_id,
            lexicon,
            high_volume,
            json,
        } => cli::pool::handle(&config, &lexicon, &sense_id, high_volume, json),
        Commands::Generate {
            lexicon,
            output,
            format,
            senses,
            workers,
            high_volume,
            ingest,
        } => {
            cli::generate::handle(
                &config,
                &lexicon,
                cli::generate::GenerateOptions {
                    output,
                    format,
                    senses,
                    workers,
                    high_volume,
                    ingest,
                },
                cli.db_path,
            )
            .await
        }
        Commands::Inspect {
            path,
            format,
            json,
            show,
        } => cli::inspect::handle(&path, format, json, show),
        Commands::Quiz {
            lexicon,
            learner,
            questions,
            senses,
            options,
            persist,
        } => {
            cli::quiz::handle(
                &config,
                &lexicon,
                cli::quiz::QuizOptions {
                    learner,
                    questions,
                    senses,
                    options,
                    persist,
                },
                cli.db_path,
            )
            .await
        }
    };

    result?;
    Ok(())
}
