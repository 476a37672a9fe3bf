//! Full create/resolve/retrieve flow over an in-memory SurrealDB.

use std::sync::Arc;

use incident_memory::fakes::ScriptedEmbedder;
use incident_memory::{EngineConfig, IncidentLifecycle, LifecycleError};
use incident_state::{IncidentStatus, SurrealHandle, VectorIndex};

async fn lifecycle() -> (IncidentLifecycle, Arc<dyn VectorIndex>) {
    let handle = SurrealHandle::connect_in_memory().await.unwrap();
    let embedder = ScriptedEmbedder::new(3)
        .with_vector("I can't login", vec![1.0, 0.0, 0.0])
        .with_vector("Logging in does not work", vec![0.95, 0.12, 0.0])
        .with_vector("Printer is jammed", vec![0.0, 0.0, 1.0]);
    let index: Arc<dyn VectorIndex> = Arc::new(handle.vector_index(3));
    let lifecycle = IncidentLifecycle::new(
        Arc::new(handle.incident_store()),
        index.clone(),
        Arc::new(embedder),
        EngineConfig::default(),
    );
    (lifecycle, index)
}

#[tokio::test]
async fn report_resolve_then_recall() {
    let (lc, index) = lifecycle().await;

    let created = lc.create("I can't login").await.unwrap();
    assert!(created.similar_resolutions.is_empty());

    let resolved = lc
        .resolve_by_description("I can't login", "Try harder")
        .await
        .unwrap();
    assert_eq!(resolved.len(), 1);
    assert!(resolved[0].memory_written);
    assert_eq!(resolved[0].incident.status(), IncidentStatus::Resolved);
    assert_eq!(index.count().await.unwrap(), 1);

    let printer = lc.create("Printer is jammed").await.unwrap();
    assert!(printer.similar_resolutions.is_empty());
    lc.resolve(&printer.incident.id, "Add paper").await.unwrap();

    let next = lc.create("Logging in does not work").await.unwrap();
    assert_eq!(next.similar_resolutions, vec!["Try harder".to_string()]);

    let shown = lc.get(&created.incident.id).await.unwrap();
    assert_eq!(shown.resolution.as_deref(), Some("Try harder"));
}

#[tokio::test]
async fn unknown_description_is_not_found() {
    let (lc, index) = lifecycle().await;

    let err = lc
        .resolve_by_description("never reported", "Try harder")
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::NotFound { .. }));
    assert_eq!(index.count().await.unwrap(), 0);
}
