//! Assessment flow against the SQLite backend

mod common;

use lexiquiz_core::{
    lexicon::fixtures::accept_sense_id, ItemType, LearnerId, McqError,
};
use std::time::Duration;
use tempfile::TempDir;

#[tokio::test]
async fn test_select_and_submit_on_sqlite() {
    let dir = TempDir::new().unwrap();
    let service = common::sqlite_service(&dir.path().join("quiz.db")).await;
    let items = common::publish_accept(&service).await;
    assert_eq!(items.len(), 3);

    let learner = LearnerId::new("ana");
    let meaning = common::item_of(&items, ItemType::Meaning);

    let p = service.select(meaning.id, &learner, 4).await.unwrap();
    let result = service
        .submit(p.id, p.correct_display_index, Duration::from_millis(1500))
        .await
        .unwrap();
    assert!(result.is_correct);
    assert!((result.ability_estimate - 0.55).abs() < 1e-9);
    assert!((result.confidence - 0.05).abs() < 1e-9);

    let attempts = service
        .stores()
        .attempts
        .attempts_for_item(meaning.id)
        .await
        .unwrap();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].response_time_ms, 1500);
    assert!((attempts[0].ability_at_attempt - 0.5).abs() < 1e-9);

    let stats = service
        .stores()
        .statistics
        .get_statistics(meaning.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stats.total_attempts, 1);
    assert_eq!(stats.correct_attempts, 1);
    assert_eq!(stats.exposure_counts.len(), 3);
}

#[tokio::test]
async fn test_state_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("quiz.db");
    let learner = LearnerId::new("ana");

    let item_id = {
        let service = common::sqlite_service(&path).await;
        let items = common::publish_accept(&service).await;
        let usage = common::item_of(&items, ItemType::Usage).id;

        let p = service.select(usage, &learner, 4).await.unwrap();
        let wrong = (p.correct_display_index + 1) % p.displayed_options.len();
        let result = service
            .submit(p.id, wrong, Duration::from_secs(3))
            .await
            .unwrap();
        assert!(!result.is_correct);
        assert!(result.selected_pool_index.is_some());
        usage
    };

    let service = common::sqlite_service(&path).await;
    let item = service.stores().items.get_item(item_id).await.unwrap();
    assert_eq!(item.item_type, ItemType::Usage);
    assert!(item.is_active);

    let pool = service
        .stores()
        .pools
        .get_pool(&accept_sense_id())
        .await
        .unwrap();
    assert_eq!(pool.len(), 15);
    assert_eq!(item.pool_ref, pool.pool_ref());

    let ability = service
        .stores()
        .abilities
        .get_ability(&learner, &accept_sense_id())
        .await
        .unwrap()
        .unwrap();
    assert!((ability.estimate - 0.45).abs() < 1e-9);
    assert_eq!(ability.observations, 1);

    let stats = service
        .stores()
        .statistics
        .get_statistics(item_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stats.total_attempts, 1);
    assert_eq!(stats.correct_attempts, 0);
    assert_eq!(stats.distractor_selection_counts.values().sum::<u64>(), 1);

    // Serving again continues from the recorded attempt
    let p = service.select(item_id, &learner, 4).await.unwrap();
    assert_eq!(p.rotation_offset, 1);
}

#[tokio::test]
async fn test_republish_bumps_pool_version() {
    let dir = TempDir::new().unwrap();
    let service = common::sqlite_service(&dir.path().join("quiz.db")).await;

    let first = common::publish_accept(&service).await;
    let second = common::publish_accept(&service).await;
    assert_eq!(first[0].pool_ref.version, 1);
    assert_eq!(second[0].pool_ref.version, 2);

    // Items published against the old version can no longer be served
    let err = service
        .select(first[0].id, &LearnerId::new("ana"), 4)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        McqError::PoolVersionMismatch {
            expected: 1,
            found: 2,
            ..
        }
    ));
}

#[tokio::test]
async fn test_duplicate_and_unknown_submissions_on_sqlite() {
    let dir = TempDir::new().unwrap();
    let service = common::sqlite_service(&dir.path().join("quiz.db")).await;
    let items = common::publish_accept(&service).await;
    let learner = LearnerId::new("ana");
    let item = common::item_of(&items, ItemType::Discrimination);

    let p = service.select(item.id, &learner, 4).await.unwrap();
    let first = service
        .submit(p.id, p.correct_display_index, Duration::from_secs(1))
        .await
        .unwrap();

    let err = service
        .submit(p.id, p.correct_display_index, Duration::from_secs(1))
        .await
        .unwrap_err();
    match err {
        McqError::DuplicatePresentation { first: stored } => assert_eq!(*stored, first),
        other => panic!("expected duplicate, got {:?}", other),
    }

    let stats = service
        .stores()
        .statistics
        .get_statistics(item.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stats.total_attempts, 1);

    let err = service
        .submit(lexiquiz_core::PresentationId::new(), 0, Duration::from_secs(1))
        .await
        .unwrap_err();
    assert!(matches!(err, McqError::UnknownPresentation(_)));
}
