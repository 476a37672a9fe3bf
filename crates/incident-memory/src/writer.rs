//! Memory writer: embeds a resolved incident's description and upserts it
//! into the vector index.

use std::sync::Arc;
use std::time::Duration;

use incident_state::{IncidentId, IncidentStore, VectorIndex};
use tracing::{debug, info, instrument, warn};

use crate::config::EngineConfig;
use crate::embedding::{EmbedOutcome, Embedder, EmbeddingMode};
use crate::timeout::bounded;

/// Why a memory write did or did not happen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    Written,
    EmptyDescription,
    Disabled,
    IncidentMissing,
    StoreFailed,
    EmbeddingUnavailable,
    EmbeddingInvalid(String),
    IndexFailed(String),
}

impl RecordOutcome {
    pub fn is_written(&self) -> bool {
        matches!(self, Self::Written)
    }
}

/// Writes document embeddings for incidents.
///
/// Never fails: every fault is logged and turned into a non-written outcome,
/// leaving the index untouched.
pub struct MemoryWriter {
    store: Arc<dyn IncidentStore>,
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn Embedder>,
    embed_timeout: Duration,
    index_timeout: Duration,
    store_timeout: Duration,
}

impl MemoryWriter {
    pub fn new(
        store: Arc<dyn IncidentStore>,
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn Embedder>,
        config: &EngineConfig,
    ) -> Self {
        if embedder.dimension() != index.dimension() {
            warn!(
                embedder_dimension = embedder.dimension(),
                index_dimension = index.dimension(),
                "Embedder and vector index disagree on dimensionality; writes will fail"
            );
        }
        Self {
            store,
            index,
            embedder,
            embed_timeout: config.embed_timeout,
            index_timeout: config.index_timeout,
            store_timeout: config.store_timeout,
        }
    }

    /// Record memory for `incident_id`. Returns `true` only on a confirmed write.
    pub async fn record(&self, incident_id: &IncidentId, description: &str) -> bool {
        self.record_outcome(incident_id, description)
            .await
            .is_written()
    }

    /// Same as [`record`](Self::record) but keeps the reason.
    #[instrument(skip(self, description), fields(incident_id = %incident_id, description_len = description.len()))]
    pub async fn record_outcome(&self, incident_id: &IncidentId, description: &str) -> RecordOutcome {
        if description.is_empty() {
            debug!("Empty description, skipping memory write");
            return RecordOutcome::EmptyDescription;
        }
        if !self.embedder.is_enabled() {
            debug!("Embeddings disabled, skipping memory write");
            return RecordOutcome::Disabled;
        }

        match bounded(self.store_timeout, "store.get", self.store.get(incident_id)).await {
            Some(Ok(Some(_))) => {}
            Some(Ok(None)) => {
                warn!("Incident not found, skipping memory write");
                return RecordOutcome::IncidentMissing;
            }
            Some(Err(e)) => {
                warn!(error = %e, "Incident lookup failed");
                return RecordOutcome::StoreFailed;
            }
            None => return RecordOutcome::StoreFailed,
        }

        let outcome = bounded(
            self.embed_timeout,
            "embed",
            self.embedder.embed(description, EmbeddingMode::Document),
        )
        .await
        .unwrap_or(EmbedOutcome::Unavailable);

        let vector = match outcome {
            EmbedOutcome::Ready(vector) => vector,
            EmbedOutcome::Unavailable => {
                warn!("Document embedding unavailable, memory unchanged");
                return RecordOutcome::EmbeddingUnavailable;
            }
            EmbedOutcome::Invalid(reason) => {
                warn!(%reason, "Document embedding invalid, memory unchanged");
                return RecordOutcome::EmbeddingInvalid(reason);
            }
        };

        match bounded(
            self.index_timeout,
            "index.upsert",
            self.index.upsert(incident_id, &vector),
        )
        .await
        {
            Some(Ok(())) => {
                info!(dimension = vector.len(), "Incident memory recorded");
                RecordOutcome::Written
            }
            Some(Err(e)) => {
                warn!(error = %e, "Vector index write failed");
                RecordOutcome::IndexFailed(e.to_string())
            }
            None => RecordOutcome::IndexFailed("timed out".to_string()),
        }
    }
}
