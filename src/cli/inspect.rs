//! Batch file inspection command

use lexiquiz_core::{
    batch::{read_batch, BatchFormat, BatchSummary},
    error::Result,
};
use std::path::Path;

/// Summarize a batch file
pub fn handle(path: &Path, format: Option<BatchFormat>, json: bool, show: usize) -> Result<()> {
    let format = format.unwrap_or_else(|| BatchFormat::from_path(path));
    let records = read_batch(path, format)?;
    let summary = BatchSummary::from_records(&records);

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!();
    println!("Batch {} ({})", path.display(), format);
    println!("  Records:          {}", summary.records);
    println!("  Senses:           {}", summary.senses);
    for (item_type, count) in &summary.by_type {
        println!("  {:<17} {}", format!("{}:", item_type), count);
    }
    println!("  Mean options:     {:.1}", summary.mean_options);
    println!("  Mean pool size:   {:.1}", summary.mean_pool_size);
    println!(
        "  Tier totals:      confused {}, opposite {}, orthographic {}, related {}, band {}",
        summary.tier_totals[0],
        summary.tier_totals[1],
        summary.tier_totals[2],
        summary.tier_totals[3],
        summary.tier_totals[4]
    );

    for record in records.iter().take(show) {
        println!();
        println!("  [{}] {} ({})", record.item_type, record.word, record.sense_id);
        println!("  {}", record.question_text);
        if let Some(context) = &record.context {
            println!("    \"{}\"", context);
        }
        for (index, option) in record.options.iter().enumerate() {
            let marker = if option.is_correct { "*" } else { " " };
            println!("   {} {:>2}. {}", marker, index + 1, option.text);
        }
    }
    println!();
    Ok(())
}
