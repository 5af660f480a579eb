//! Common test utilities and helpers

#![allow(dead_code)]

use lexiquiz_core::{
    lexicon::fixtures::{accept_sense_id, sample_lexicon},
    AssessmentService, InMemoryLexicon, Item, ItemFactory, ItemType, McqConfig, PoolBuilder,
    SenseProvider, ServiceStores, SqliteStore,
};
use std::path::Path;
use std::sync::Arc;

/// The sample lexicon used across integration tests
pub fn lexicon() -> InMemoryLexicon {
    sample_lexicon()
}

/// In-memory service with the "accept" pool and items published
pub async fn accept_service() -> (AssessmentService, Vec<Item>) {
    let config = McqConfig::default();
    let service = AssessmentService::new(ServiceStores::memory(&config), config);
    let items = publish_accept(&service).await;
    (service, items)
}

/// SQLite-backed service at `path`
pub async fn sqlite_service(path: &Path) -> AssessmentService {
    let config = McqConfig::default();
    let store = Arc::new(
        SqliteStore::open(path, &config.storage)
            .await
            .expect("Failed to open test database"),
    );
    AssessmentService::new(ServiceStores::sqlite(store, &config), config)
}

/// Build and publish the "accept" pool and items
pub async fn publish_accept(service: &AssessmentService) -> Vec<Item> {
    let lexicon = lexicon();
    let sense = lexicon
        .get_sense(&accept_sense_id())
        .expect("accept sense missing from fixture");
    let pool = PoolBuilder::new(service.config().pool.clone())
        .build_pool(&sense, &lexicon)
        .expect("accept pool should build");
    let items = ItemFactory::new().make_items(&sense, &pool);
    service
        .publish(pool, items)
        .await
        .expect("Failed to publish accept items")
}

/// The published item of a given type
pub fn item_of(items: &[Item], item_type: ItemType) -> &Item {
    items
        .iter()
        .find(|item| item.item_type == item_type)
        .expect("item type not generated")
}
