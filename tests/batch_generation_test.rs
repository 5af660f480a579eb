//! Batch generation from a lexicon file through to batch files on disk

mod common;

use lexiquiz_core::{
    batch::{read_batch, write_batch, BatchSummary},
    lexicon::fixtures::accept_sense_id,
    BatchFormat, BatchGenerator, InMemoryLexicon, McqConfig, Sense, SenseId,
};
use std::collections::HashSet;
use std::sync::Arc;
use tempfile::TempDir;

/// Write the sample lexicon as a JSON file and load it back
fn lexicon_from_file(dir: &TempDir) -> InMemoryLexicon {
    let senses: Vec<Sense> = common::lexicon().senses().cloned().collect();
    let path = dir.path().join("lexicon.json");
    std::fs::write(&path, serde_json::to_string_pretty(&senses).unwrap()).unwrap();
    InMemoryLexicon::from_json_file(&path).unwrap()
}

#[tokio::test]
async fn test_generate_write_and_read_back() {
    let dir = TempDir::new().unwrap();
    let lexicon = lexicon_from_file(&dir);
    let sense_ids = lexicon.sense_ids();
    let total = sense_ids.len();

    let mut config = McqConfig::default();
    config.generation.workers = 3;
    let generator = BatchGenerator::new(Arc::new(lexicon), &config);
    let report = generator.generate(sense_ids).await.unwrap();

    assert_eq!(report.generated.len() + report.skipped.len(), total);
    let accept = report
        .generated
        .iter()
        .find(|g| g.sense_id == accept_sense_id())
        .expect("accept should generate");
    assert_eq!(accept.items.len(), 3);
    assert_eq!(accept.pool.len(), 15);

    let records = report.records();
    assert_eq!(records.len(), report.item_count());
    for record in &records {
        assert_eq!(record.options.iter().filter(|o| o.is_correct).count(), 1);
        assert!(record.options[record.correct_index].is_correct);
        let texts: HashSet<&str> = record.options.iter().map(|o| o.text.as_str()).collect();
        assert_eq!(texts.len(), record.options.len());
    }

    for (name, format) in [
        ("items.jsonl", BatchFormat::Jsonl),
        ("items.bin", BatchFormat::Bincode),
    ] {
        let path = dir.path().join(name);
        assert_eq!(BatchFormat::from_path(&path), format);
        write_batch(&path, format, &records).unwrap();
        let loaded = read_batch(&path, format).unwrap();
        assert_eq!(loaded, records);
    }

    let summary = BatchSummary::from_records(&records);
    assert_eq!(summary.records, records.len());
    let senses_with_items = report
        .generated
        .iter()
        .filter(|g| !g.items.is_empty())
        .count();
    assert_eq!(summary.senses, senses_with_items);
}

#[tokio::test]
async fn test_generation_is_reproducible_across_runs() {
    let dir = TempDir::new().unwrap();
    let lexicon = Arc::new(lexicon_from_file(&dir));
    let sense_ids = lexicon.sense_ids();

    let one = BatchGenerator::new(lexicon.clone(), &McqConfig::default())
        .generate(sense_ids.clone())
        .await
        .unwrap();
    let two = BatchGenerator::new(lexicon, &McqConfig::default())
        .generate(sense_ids)
        .await
        .unwrap();

    // Item ids are fresh per run; the file contents are not
    assert_eq!(one.records(), two.records());
    assert_eq!(one.skipped, two.skipped);
}

#[tokio::test]
async fn test_unknown_senses_are_reported_not_fatal() {
    let dir = TempDir::new().unwrap();
    let lexicon = lexicon_from_file(&dir);
    let generator = BatchGenerator::new(Arc::new(lexicon), &McqConfig::default());

    let report = generator
        .generate(vec![SenseId::from("missing.n.01"), accept_sense_id()])
        .await
        .unwrap();

    assert_eq!(report.generated.len(), 1);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].sense_id, SenseId::from("missing.n.01"));
}
