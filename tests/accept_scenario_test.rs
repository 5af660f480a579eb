//! End-to-end scenario around the verb "accept"
//!
//! Pool composition, the three item types, serving, and the ability and
//! statistics updates that follow submissions.

mod common;

use lexiquiz_core::{
    lexicon::fixtures::accept_sense_id, CandidateSource, ItemType, LearnerId, McqError,
    PoolBuilder, SenseProvider,
};
use std::collections::HashSet;
use std::time::Duration;

#[test]
fn test_accept_pool_composition() {
    let lexicon = common::lexicon();
    let sense = lexicon.get_sense(&accept_sense_id()).unwrap();
    let pool = PoolBuilder::default().build_pool(&sense, &lexicon).unwrap();

    let words_in = |tier: u8| -> Vec<String> {
        pool.candidates()
            .iter()
            .filter(|c| c.tier() == tier)
            .map(|c| c.source_word.clone())
            .collect()
    };

    assert_eq!(words_in(1), vec!["except", "expect"]);
    assert_eq!(words_in(2), vec!["refuse", "reject"]);
    assert_eq!(words_in(3), vec!["access"]);
    assert_eq!(words_in(4), vec!["receive"]);
    assert_eq!(words_in(5).len(), 9);
    assert_eq!(pool.len(), 15);

    match &pool.candidates()[0].source {
        CandidateSource::Confused { reason } => assert_eq!(reason, "sound-alike"),
        other => panic!("expected a confused candidate, got {:?}", other),
    }

    // The sibling sense shares the word and never appears
    assert!(pool.candidates().iter().all(|c| c.source_word != "accept"));
    assert!(pool
        .candidates()
        .iter()
        .all(|c| c.source_sense_id.as_str() != "accept.v.02"));
}

#[tokio::test]
async fn test_accept_items_and_first_presentation() {
    let (service, items) = common::accept_service().await;
    assert_eq!(items.len(), 3);

    let learner = LearnerId::new("ana");
    let meaning = common::item_of(&items, ItemType::Meaning);
    assert_eq!(meaning.correct_text, "receive willingly something given or offered");
    assert_eq!(meaning.context.as_deref(), Some("She decided to accept the job offer."));

    let p = service.select(meaning.id, &learner, 4).await.unwrap();
    assert_eq!(p.displayed_options.len(), 4);
    assert_eq!(p.displayed_options.iter().filter(|o| o.is_correct).count(), 1);
    let texts: HashSet<&str> = p.displayed_options.iter().map(|o| o.text.as_str()).collect();
    assert_eq!(texts.len(), 4);

    let discrimination = common::item_of(&items, ItemType::Discrimination);
    let p = service.select(discrimination.id, &learner, 4).await.unwrap();
    for option in &p.displayed_options {
        if !option.is_correct {
            assert_ne!(option.text, "accept");
        }
    }
}

#[tokio::test]
async fn test_rotation_varies_subsets_across_presentations() {
    let (service, items) = common::accept_service().await;
    let learner = LearnerId::new("ana");
    let meaning = common::item_of(&items, ItemType::Meaning);

    let mut subsets = HashSet::new();
    for _ in 0..20 {
        let p = service.select(meaning.id, &learner, 4).await.unwrap();
        let mut served = p.served_pool_indices.clone();
        served.sort();
        subsets.insert(served);
    }
    assert!(subsets.len() > 1);
}

/// Ten fresh learners answer `correct` of ten presentations, then `probe` submits
/// a presentation served before any of them.
async fn probe_after_priming(correct: usize, probe_correct: bool) -> f64 {
    let (service, items) = common::accept_service().await;
    let meaning = common::item_of(&items, ItemType::Meaning).id;

    let probe = LearnerId::new("probe");
    let probe_presentation = service.select(meaning, &probe, 4).await.unwrap();

    for i in 0..10 {
        let learner = LearnerId::new(format!("primer-{}", i));
        let p = service.select(meaning, &learner, 4).await.unwrap();
        let choice = if i < correct {
            p.correct_display_index
        } else {
            (p.correct_display_index + 1) % p.displayed_options.len()
        };
        service
            .submit(p.id, choice, Duration::from_secs(2))
            .await
            .unwrap();
    }

    let choice = if probe_correct {
        probe_presentation.correct_display_index
    } else {
        (probe_presentation.correct_display_index + 1) % probe_presentation.displayed_options.len()
    };
    service
        .submit(probe_presentation.id, choice, Duration::from_secs(2))
        .await
        .unwrap()
        .ability_estimate
}

#[tokio::test]
async fn test_correct_on_hard_item_gains_seven_hundredths() {
    // 3 of 10 correct: difficulty index 0.3
    let estimate = probe_after_priming(3, true).await;
    assert!((estimate - 0.57).abs() < 1e-9);
}

#[tokio::test]
async fn test_incorrect_on_easy_item_loses_nine_hundredths() {
    // 9 of 10 correct: difficulty index 0.9
    let estimate = probe_after_priming(9, false).await;
    assert!((estimate - 0.41).abs() < 1e-9);
}

#[tokio::test]
async fn test_statistics_after_priming() {
    let (service, items) = common::accept_service().await;
    let meaning = common::item_of(&items, ItemType::Meaning).id;

    for i in 0..9 {
        let learner = LearnerId::new(format!("learner-{}", i));
        let p = service.select(meaning, &learner, 4).await.unwrap();
        service
            .submit(p.id, p.correct_display_index, Duration::from_secs(1))
            .await
            .unwrap();

        let stats = service
            .stores()
            .statistics
            .get_statistics(meaning)
            .await
            .unwrap()
            .unwrap();
        assert!(stats.discrimination_index.is_none());
    }

    // Tenth attempt defines discrimination; all correct collapses quality
    let learner = LearnerId::new("learner-9");
    let p = service.select(meaning, &learner, 4).await.unwrap();
    service
        .submit(p.id, p.correct_display_index, Duration::from_secs(1))
        .await
        .unwrap();

    let stats = service
        .stores()
        .statistics
        .get_statistics(meaning)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stats.discrimination_index, Some(0.0));
    assert!(stats.needs_review);

    assert!(matches!(
        service.select(meaning, &LearnerId::new("late"), 4).await,
        Err(McqError::ItemInactive(_))
    ));
}

#[tokio::test]
async fn test_duplicate_submission_returns_first_result() {
    let (service, items) = common::accept_service().await;
    let learner = LearnerId::new("ana");
    let usage = common::item_of(&items, ItemType::Usage);

    let p = service.select(usage.id, &learner, 4).await.unwrap();
    let first = service
        .submit(p.id, p.correct_display_index, Duration::from_secs(4))
        .await
        .unwrap();

    match service.submit(p.id, 0, Duration::from_secs(1)).await {
        Err(McqError::DuplicatePresentation { first: stored }) => assert_eq!(*stored, first),
        other => panic!("expected duplicate, got {:?}", other),
    }

    let ability = service
        .stores()
        .abilities
        .get_ability(&learner, &accept_sense_id())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(ability.observations, 1);
}

#[tokio::test]
async fn test_insufficient_pool_for_large_k() {
    let (service, items) = common::accept_service().await;
    let usage = common::item_of(&items, ItemType::Usage);

    assert!(matches!(
        service.select(usage.id, &LearnerId::new("ana"), 10).await,
        Err(McqError::InsufficientPool { requested: 9, .. })
    ));
}
