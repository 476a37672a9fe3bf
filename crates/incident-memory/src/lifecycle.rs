//! Incident lifecycle: create and resolve incidents, driving the memory
//! writer and retriever around each store mutation.
//!
//! An incident moves from `Open` to `Resolved` when a non-blank resolution is
//! set. Store failures on the mutation itself are the only errors callers
//! see; everything on the memory side degrades silently.

use std::sync::Arc;
use std::time::Duration;

use incident_state::{Incident, IncidentId, IncidentStore, StorageError, VectorIndex};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::config::{AmbiguityPolicy, EngineConfig};
use crate::embedding::Embedder;
use crate::retriever::{MemoryRetriever, ResolvedMatch};
use crate::timeout::bounded;
use crate::writer::MemoryWriter;

/// Errors surfaced by lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("incident description must not be empty")]
    EmptyDescription,

    #[error("Incident not found: {key}")]
    NotFound { key: String },

    #[error("{count} incidents share the description {description:?}; resolve by id instead")]
    Ambiguous { description: String, count: usize },

    #[error("store error: {0}")]
    Store(#[from] StorageError),

    #[error("store call timed out")]
    Timeout,
}

impl LifecycleError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Result of reporting a new incident.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedIncident {
    pub incident: Incident,
    /// Resolutions of similar past incidents, most similar first
    pub similar_resolutions: Vec<String>,
}

/// Result of resolving one incident.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedIncident {
    pub incident: Incident,
    /// Whether the incident's description is now in the vector index
    pub memory_written: bool,
}

/// Ties the incident store to the memory writer and retriever.
pub struct IncidentLifecycle {
    store: Arc<dyn IncidentStore>,
    writer: MemoryWriter,
    retriever: MemoryRetriever,
    ambiguity: AmbiguityPolicy,
    store_timeout: Duration,
}

impl IncidentLifecycle {
    pub fn new(
        store: Arc<dyn IncidentStore>,
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn Embedder>,
        config: EngineConfig,
    ) -> Self {
        let writer = MemoryWriter::new(store.clone(), index.clone(), embedder.clone(), &config);
        let retriever = MemoryRetriever::new(store.clone(), index, embedder, &config);
        Self {
            store,
            writer,
            retriever,
            ambiguity: config.ambiguity,
            store_timeout: config.store_timeout,
        }
    }

    pub fn writer(&self) -> &MemoryWriter {
        &self.writer
    }

    pub fn retriever(&self) -> &MemoryRetriever {
        &self.retriever
    }

    /// Report a new incident and return what is already known about similar ones.
    #[instrument(skip(self, description), fields(description_len = description.len()))]
    pub async fn create(&self, description: &str) -> Result<CreatedIncident, LifecycleError> {
        if description.trim().is_empty() {
            return Err(LifecycleError::EmptyDescription);
        }

        let incident = bounded(
            self.store_timeout,
            "store.insert",
            self.store.insert(description),
        )
        .await
        .ok_or(LifecycleError::Timeout)??;
        info!(incident_id = %incident.id, "Incident created");

        let similar_resolutions = self.retriever.find(description).await;
        Ok(CreatedIncident {
            incident,
            similar_resolutions,
        })
    }

    /// Resolve a single incident by id.
    #[instrument(skip_all, fields(incident_id = %id))]
    pub async fn resolve(
        &self,
        id: &IncidentId,
        resolution: &str,
    ) -> Result<ResolvedIncident, LifecycleError> {
        let updated = bounded(
            self.store_timeout,
            "store.update_resolution",
            self.store.update_resolution(id, resolution),
        )
        .await
        .ok_or(LifecycleError::Timeout)??;

        match updated {
            Some(incident) => Ok(self.remember(incident).await),
            None => {
                warn!("Incident not found");
                Err(LifecycleError::NotFound {
                    key: id.to_string(),
                })
            }
        }
    }

    /// Resolve the incident(s) reported with `description`.
    ///
    /// A single match is resolved by id. Several matches are refused under
    /// [`AmbiguityPolicy::Reject`] and all resolved under
    /// [`AmbiguityPolicy::ApplyToAll`].
    #[instrument(skip_all, fields(description_len = description.len(), policy = ?self.ambiguity))]
    pub async fn resolve_by_description(
        &self,
        description: &str,
        resolution: &str,
    ) -> Result<Vec<ResolvedIncident>, LifecycleError> {
        let not_found = || LifecycleError::NotFound {
            key: description.to_string(),
        };
        if description.is_empty() {
            return Err(not_found());
        }

        let candidates = bounded(
            self.store_timeout,
            "store.list_by_description",
            self.store.list_by_description(description),
        )
        .await
        .ok_or(LifecycleError::Timeout)??;

        match (candidates.as_slice(), self.ambiguity) {
            ([], _) => {
                warn!("No incident matches description");
                Err(not_found())
            }
            ([only], _) => Ok(vec![self.resolve(&only.id, resolution).await?]),
            (many, AmbiguityPolicy::Reject) => Err(LifecycleError::Ambiguous {
                description: description.to_string(),
                count: many.len(),
            }),
            (_, AmbiguityPolicy::ApplyToAll) => {
                let updated = bounded(
                    self.store_timeout,
                    "store.update_by_description",
                    self.store.update_by_description(description, resolution),
                )
                .await
                .ok_or(LifecycleError::Timeout)??;
                if updated.is_empty() {
                    return Err(not_found());
                }

                let mut resolved = Vec::with_capacity(updated.len());
                for incident in updated {
                    resolved.push(self.remember(incident).await);
                }
                Ok(resolved)
            }
        }
    }

    /// Read-only retrieval with provenance.
    pub async fn similar(&self, description: &str) -> Vec<ResolvedMatch> {
        self.retriever.find_matches(description).await
    }

    /// Point lookup.
    pub async fn get(&self, id: &IncidentId) -> Result<Incident, LifecycleError> {
        bounded(self.store_timeout, "store.get", self.store.get(id))
            .await
            .ok_or(LifecycleError::Timeout)??
            .ok_or_else(|| LifecycleError::NotFound {
                key: id.to_string(),
            })
    }

    async fn remember(&self, incident: Incident) -> ResolvedIncident {
        let memory_written = if incident.resolution_text().is_some() {
            self.writer.record(&incident.id, &incident.description).await
        } else {
            debug!(incident_id = %incident.id, "Blank resolution, no memory to write");
            false
        };
        ResolvedIncident {
            incident,
            memory_written,
        }
    }
}
