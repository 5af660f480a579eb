//! Batch generation command

use super::helpers::{build_service, load_lexicon, LexiconArgs};
use lexiquiz_core::{
    batch::{write_batch, BatchFormat},
    error::Result,
    BatchGenerator, McqConfig, SenseId,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

pub struct GenerateOptions {
    pub output: PathBuf,
    pub format: Option<BatchFormat>,
    pub senses: Vec<String>,
    pub workers: Option<usize>,
    pub high_volume: bool,
    pub ingest: bool,
}

/// Generate pools and items, write the batch file, optionally ingest into the database
pub async fn handle(
    config: &McqConfig,
    lexicon_args: &LexiconArgs,
    options: GenerateOptions,
    db_path: Option<PathBuf>,
) -> Result<()> {
    let lexicon = load_lexicon(lexicon_args)?;
    let sense_ids: Vec<SenseId> = if options.senses.is_empty() {
        lexicon.sense_ids()
    } else {
        options.senses.iter().map(|id| SenseId::from(id.as_str())).collect()
    };

    let mut config = config.clone();
    if let Some(workers) = options.workers {
        config.generation.workers = workers.max(1);
    }
    config.pool.high_volume |= options.high_volume;
    config.validate()?;

    debug!(
        "Generating {} senses with {} workers",
        sense_ids.len(),
        config.generation.workers
    );
    let generator = BatchGenerator::new(Arc::new(lexicon), &config);
    let report = generator.generate(sense_ids).await?;

    let format = options
        .format
        .unwrap_or_else(|| BatchFormat::from_path(&options.output));
    let records = report.records();
    write_batch(&options.output, format, &records)?;

    if options.ingest {
        let service = build_service(&config, true, db_path).await?;
        for generated in &report.generated {
            service
                .publish(generated.pool.clone(), generated.items.clone())
                .await?;
        }
        info!("Ingested {} senses", report.generated.len());
    }

    print_report(&options.output, format, records.len(), &report);
    Ok(())
}

fn print_report(
    output: &Path,
    format: BatchFormat,
    records: usize,
    report: &lexiquiz_core::GenerationReport,
) {
    println!();
    println!("✓ Generated {} items for {} senses", records, report.generated.len());
    println!("  Output:  {} ({})", output.display(), format);
    println!("  Elapsed: {:.2?}", report.elapsed);

    if !report.skipped.is_empty() {
        println!();
        println!("  Skipped {} senses:", report.skipped.len());
        for skipped in &report.skipped {
            println!("    {}: {}", skipped.sense_id, skipped.reason);
        }
    }
    println!();
}
