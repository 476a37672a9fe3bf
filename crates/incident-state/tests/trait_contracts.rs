//! Trait contract tests for IncidentStore and VectorIndex.
//!
//! Every contract is checked against the in-memory fakes and against the
//! SurrealDB implementations running on `mem://`.

use incident_state::fakes::{MemoryIncidentStore, MemoryVectorIndex};
use incident_state::storage_traits::*;
use incident_state::{StorageError, SurrealHandle};

async fn surreal() -> SurrealHandle {
    SurrealHandle::connect_in_memory().await.unwrap()
}

// ===========================================================================
// IncidentStore contracts
// ===========================================================================

async fn check_insert_assigns_unique_ids(store: &dyn IncidentStore) {
    let a = store.insert("I can't login").await.unwrap();
    let b = store.insert("I can't login").await.unwrap();

    assert_ne!(a.id, b.id);
    assert_eq!(a.description, "I can't login");
    assert!(a.resolution.is_none());
    assert_eq!(a.status(), IncidentStatus::Open);
}

async fn check_get_round_trip(store: &dyn IncidentStore) {
    let created = store.insert("Disk usage at 100%").await.unwrap();
    let fetched = store.get(&created.id).await.unwrap().unwrap();

    assert_eq!(fetched.id, created.id);
    assert_eq!(fetched.description, "Disk usage at 100%");

    let missing = store.get(&IncidentId::new()).await.unwrap();
    assert!(missing.is_none());
}

async fn check_update_resolution_overwrites(store: &dyn IncidentStore) {
    let created = store.insert("Payments API returns 502").await.unwrap();

    let first = store
        .update_resolution(&created.id, "Restart the gateway")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.resolution.as_deref(), Some("Restart the gateway"));
    assert_eq!(first.status(), IncidentStatus::Resolved);

    let second = store
        .update_resolution(&created.id, "Scale the gateway")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(second.resolution.as_deref(), Some("Scale the gateway"));

    let fetched = store.get(&created.id).await.unwrap().unwrap();
    assert_eq!(fetched.resolution.as_deref(), Some("Scale the gateway"));
}

async fn check_update_resolution_unknown_id(store: &dyn IncidentStore) {
    let updated = store
        .update_resolution(&IncidentId::new(), "anything")
        .await
        .unwrap();
    assert!(updated.is_none());
}

async fn check_description_lookups(store: &dyn IncidentStore) {
    let first = store.insert("Queue backlog growing").await.unwrap();
    let _second = store.insert("Queue backlog growing").await.unwrap();
    store.insert("Unrelated").await.unwrap();

    let found = store
        .find_by_description("Queue backlog growing")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, first.id);

    let all = store
        .list_by_description("Queue backlog growing")
        .await
        .unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].id, first.id);

    assert!(store
        .find_by_description("never reported")
        .await
        .unwrap()
        .is_none());
}

async fn check_update_by_description(store: &dyn IncidentStore) {
    store.insert("Cache miss storm").await.unwrap();
    store.insert("Cache miss storm").await.unwrap();
    let other = store.insert("Something else").await.unwrap();

    let updated = store
        .update_by_description("Cache miss storm", "Warm the cache")
        .await
        .unwrap();
    assert_eq!(updated.len(), 2);
    assert!(updated
        .iter()
        .all(|i| i.resolution.as_deref() == Some("Warm the cache")));

    let untouched = store.get(&other.id).await.unwrap().unwrap();
    assert!(untouched.resolution.is_none());

    let none = store
        .update_by_description("never reported", "noop")
        .await
        .unwrap();
    assert!(none.is_empty());
}

async fn check_find_resolutions_omits_unresolved(store: &dyn IncidentStore) {
    let resolved = store.insert("DNS fails").await.unwrap();
    let open = store.insert("DNS slow").await.unwrap();
    let blank = store.insert("DNS flaky").await.unwrap();
    store
        .update_resolution(&resolved.id, "Flush resolver cache")
        .await
        .unwrap();
    store.update_resolution(&blank.id, "  ").await.unwrap();

    let ids = vec![
        resolved.id.clone(),
        open.id.clone(),
        blank.id.clone(),
        IncidentId::new(),
    ];
    let map = store.find_resolutions_by_ids(&ids).await.unwrap();

    assert_eq!(map.len(), 1);
    assert_eq!(map.get(&resolved.id).unwrap(), "Flush resolver cache");

    assert!(store.find_resolutions_by_ids(&[]).await.unwrap().is_empty());
}

async fn run_incident_store_contracts(store: &dyn IncidentStore) {
    check_insert_assigns_unique_ids(store).await;
    check_get_round_trip(store).await;
    check_update_resolution_overwrites(store).await;
    check_update_resolution_unknown_id(store).await;
    check_description_lookups(store).await;
    check_update_by_description(store).await;
    check_find_resolutions_omits_unresolved(store).await;
}

#[tokio::test]
async fn memory_incident_store_contracts() {
    let store = MemoryIncidentStore::new();
    run_incident_store_contracts(&store).await;
}

#[tokio::test]
async fn surreal_incident_store_contracts() {
    let handle = surreal().await;
    let store = handle.incident_store();
    run_incident_store_contracts(&store).await;
}

// ===========================================================================
// VectorIndex contracts
// ===========================================================================

async fn check_upsert_replaces(index: &dyn VectorIndex) {
    let id = IncidentId::new();
    index.upsert(&id, &[1.0, 0.0, 0.0]).await.unwrap();
    index.upsert(&id, &[0.0, 1.0, 0.0]).await.unwrap();

    assert_eq!(index.count().await.unwrap(), 1);

    let hits = index
        .query(&[0.0, 1.0, 0.0], SimilarityQuery::new(0.01, 5))
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].incident_id, id);

    let stale = index
        .query(&[1.0, 0.0, 0.0], SimilarityQuery::new(0.01, 5))
        .await
        .unwrap();
    assert!(stale.is_empty());
}

async fn check_query_orders_and_bounds(index: &dyn VectorIndex) {
    let near = IncidentId::new();
    let nearer = IncidentId::new();
    let far = IncidentId::new();
    index.upsert(&near, &[0.8, 0.6, 0.0]).await.unwrap();
    index.upsert(&nearer, &[0.95, 0.31, 0.0]).await.unwrap();
    index.upsert(&far, &[0.0, 0.0, 1.0]).await.unwrap();

    let hits = index
        .query(&[1.0, 0.0, 0.0], SimilarityQuery::new(0.3, 10))
        .await
        .unwrap();

    let ids: Vec<_> = hits.iter().map(|m| m.incident_id.clone()).collect();
    assert_eq!(ids, vec![nearer.clone(), near.clone()]);
    assert!(hits.iter().all(|m| m.distance() <= 0.3));
    assert!(hits[0].similarity >= hits[1].similarity);

    let capped = index
        .query(&[1.0, 0.0, 0.0], SimilarityQuery::new(0.3, 1))
        .await
        .unwrap();
    assert_eq!(capped.len(), 1);
    assert_eq!(capped[0].incident_id, nearer);

    let none = index
        .query(&[1.0, 0.0, 0.0], SimilarityQuery::new(0.3, 0))
        .await
        .unwrap();
    assert!(none.is_empty());
}

async fn check_dimension_enforced(index: &dyn VectorIndex) {
    let err = index
        .upsert(&IncidentId::new(), &[1.0, 0.0])
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StorageError::DimensionMismatch {
            expected: 3,
            actual: 2
        }
    ));

    let err = index
        .query(&[1.0; 4], SimilarityQuery::new(0.3, 5))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::DimensionMismatch { .. }));

    let err = index
        .upsert(&IncidentId::new(), &[1.0, f32::INFINITY, 0.0])
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::InvalidVector(_)));
}

#[tokio::test]
async fn memory_vector_index_contracts() {
    check_upsert_replaces(&MemoryVectorIndex::new(3)).await;
    check_query_orders_and_bounds(&MemoryVectorIndex::new(3)).await;
    check_dimension_enforced(&MemoryVectorIndex::new(3)).await;
}

#[tokio::test]
async fn surreal_vector_index_upsert_replaces() {
    let handle = surreal().await;
    check_upsert_replaces(&handle.vector_index(3)).await;
}

#[tokio::test]
async fn surreal_vector_index_orders_and_bounds() {
    let handle = surreal().await;
    check_query_orders_and_bounds(&handle.vector_index(3)).await;
}

#[tokio::test]
async fn surreal_vector_index_dimension_enforced() {
    let handle = surreal().await;
    check_dimension_enforced(&handle.vector_index(3)).await;
}

#[tokio::test]
async fn memory_vector_index_ties_keep_insertion_order() {
    let index = MemoryVectorIndex::new(2);
    let first = IncidentId::from("first");
    let second = IncidentId::from("second");
    index.upsert(&first, &[1.0, 1.0]).await.unwrap();
    index.upsert(&second, &[2.0, 2.0]).await.unwrap();

    let hits = index
        .query(&[1.0, 1.0], SimilarityQuery::new(0.1, 5))
        .await
        .unwrap();
    let ids: Vec<_> = hits.into_iter().map(|m| m.incident_id).collect();
    assert_eq!(ids, vec![first, second]);
}
