//! Pool inspection command

use super::helpers::{load_lexicon, LexiconArgs};
use lexiquiz_core::{
    error::Result, ItemFactory, McqConfig, PoolBuilder, SenseId, SenseProvider,
};
use tracing::debug;

/// Build and print the distractor pool of one sense
pub fn handle(
    config: &McqConfig,
    lexicon_args: &LexiconArgs,
    sense_id: &str,
    high_volume: bool,
    json: bool,
) -> Result<()> {
    let lexicon = load_lexicon(lexicon_args)?;
    let sense = lexicon.get_sense(&SenseId::from(sense_id))?;

    let mut pool_config = config.pool.clone();
    pool_config.high_volume |= high_volume;
    debug!("Building pool for {} (cap {})", sense.id, pool_config.pool_cap());

    let pool = PoolBuilder::new(pool_config).build_pool(&sense, &lexicon)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&pool)?);
        return Ok(());
    }

    println!();
    println!(
        "Pool for {} \"{}\" ({}): {} candidates",
        sense.id,
        sense.word,
        sense.pos,
        pool.len()
    );
    println!("  {}", sense.definition);
    println!();
    println!("  {:>3}  {:<12}  {:<14}  {:>6}  definition", "#", "tier", "word", "rank");
    for (index, candidate) in pool.candidates().iter().enumerate() {
        println!(
            "  {:>3}  {:<12}  {:<14}  {:>6}  {}",
            index,
            candidate.tier_name(),
            candidate.source_word,
            candidate.frequency_rank,
            candidate.text
        );
    }

    let items = ItemFactory::new().make_items(&sense, &pool);
    println!();
    println!(
        "  Item types: {}",
        if items.is_empty() {
            "none".to_string()
        } else {
            items
                .iter()
                .map(|item| item.item_type.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        }
    );
    println!();
    Ok(())
}
