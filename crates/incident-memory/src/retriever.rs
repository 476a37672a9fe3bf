//! Memory retriever: finds the resolutions of past incidents whose
//! descriptions are close to a new one.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use incident_state::{IncidentId, IncidentStore, SimilarityMatch, VectorIndex};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::config::{EngineConfig, RetrievalPolicy};
use crate::embedding::{EmbedOutcome, Embedder, EmbeddingMode};
use crate::timeout::bounded;

/// A surfaced resolution with its provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedMatch {
    /// First (most similar) incident that carried this resolution
    pub incident_id: IncidentId,
    pub similarity: f32,
    pub resolution: String,
}

/// Query-side half of the engine.
///
/// Never fails: degraded conditions (empty input, disabled provider, provider
/// or index faults, timeouts) all produce an empty result.
pub struct MemoryRetriever {
    store: Arc<dyn IncidentStore>,
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn Embedder>,
    policy: RetrievalPolicy,
    embed_timeout: Duration,
    index_timeout: Duration,
    store_timeout: Duration,
}

impl MemoryRetriever {
    pub fn new(
        store: Arc<dyn IncidentStore>,
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn Embedder>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            store,
            index,
            embedder,
            policy: config.retrieval,
            embed_timeout: config.embed_timeout,
            index_timeout: config.index_timeout,
            store_timeout: config.store_timeout,
        }
    }

    pub fn policy(&self) -> RetrievalPolicy {
        self.policy
    }

    /// Distinct resolutions of similar incidents, most similar first.
    pub async fn find(&self, description: &str) -> Vec<String> {
        self.find_matches(description)
            .await
            .into_iter()
            .map(|m| m.resolution)
            .collect()
    }

    /// Like [`find`](Self::find), keeping the matched incident and score.
    #[instrument(skip(self, description), fields(description_len = description.len()))]
    pub async fn find_matches(&self, description: &str) -> Vec<ResolvedMatch> {
        if description.is_empty() {
            debug!("Empty description, no retrieval");
            return Vec::new();
        }
        if !self.embedder.is_enabled() {
            debug!("Embeddings disabled, no retrieval");
            return Vec::new();
        }

        let outcome = bounded(
            self.embed_timeout,
            "embed",
            self.embedder.embed(description, EmbeddingMode::Query),
        )
        .await
        .unwrap_or(EmbedOutcome::Unavailable);

        let vector = match outcome {
            EmbedOutcome::Ready(vector) => vector,
            EmbedOutcome::Unavailable => {
                debug!("Query embedding unavailable");
                return Vec::new();
            }
            EmbedOutcome::Invalid(reason) => {
                warn!(%reason, "Query embedding invalid");
                return Vec::new();
            }
        };

        let query = self.policy.as_query();
        let candidates = match bounded(
            self.index_timeout,
            "index.query",
            self.index.query(&vector, query),
        )
        .await
        {
            Some(Ok(candidates)) => candidates,
            Some(Err(e)) => {
                warn!(error = %e, "Vector index query failed");
                return Vec::new();
            }
            None => return Vec::new(),
        };

        let candidates: Vec<SimilarityMatch> = candidates
            .into_iter()
            .filter(|m| query.admits(m))
            .take(self.policy.limit)
            .collect();
        if candidates.is_empty() {
            debug!("No similar incidents");
            return Vec::new();
        }

        let ids: Vec<IncidentId> = candidates.iter().map(|m| m.incident_id.clone()).collect();
        let resolutions = match bounded(
            self.store_timeout,
            "store.find_resolutions_by_ids",
            self.store.find_resolutions_by_ids(&ids),
        )
        .await
        {
            Some(Ok(map)) => map,
            Some(Err(e)) => {
                warn!(error = %e, "Resolution lookup failed");
                return Vec::new();
            }
            None => return Vec::new(),
        };

        let matches = dedupe_in_rank_order(candidates, |id| resolutions.get(id).cloned());
        debug!(matches = matches.len(), "Retrieved similar resolutions");
        matches
    }
}

/// Attach resolutions to ranked candidates, dropping candidates without one
/// and keeping only the first occurrence of each resolution text.
fn dedupe_in_rank_order(
    candidates: Vec<SimilarityMatch>,
    resolution_of: impl Fn(&IncidentId) -> Option<String>,
) -> Vec<ResolvedMatch> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter_map(|m| {
            let resolution = resolution_of(&m.incident_id).filter(|r| !r.trim().is_empty())?;
            seen.insert(resolution.clone()).then(|| ResolvedMatch {
                incident_id: m.incident_id,
                similarity: m.similarity,
                resolution,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: &str, similarity: f32) -> SimilarityMatch {
        SimilarityMatch {
            incident_id: IncidentId::from(id),
            similarity,
        }
    }

    #[test]
    fn test_dedupe_keeps_first_seen_order() {
        let candidates = vec![
            candidate("a", 0.95),
            candidate("b", 0.90),
            candidate("c", 0.85),
            candidate("d", 0.80),
        ];
        let out = dedupe_in_rank_order(candidates, |id| match id.as_str() {
            "a" => Some("Restart the service".to_string()),
            "b" => Some("Clear the cache".to_string()),
            "c" => Some("Restart the service".to_string()),
            _ => None,
        });

        let texts: Vec<_> = out.iter().map(|m| m.resolution.as_str()).collect();
        assert_eq!(texts, vec!["Restart the service", "Clear the cache"]);
        assert_eq!(out[0].incident_id, IncidentId::from("a"));
    }

    #[test]
    fn test_dedupe_drops_blank_resolutions() {
        let out = dedupe_in_rank_order(vec![candidate("a", 0.9)], |_| Some(" \t".to_string()));
        assert!(out.is_empty());
    }

    #[test]
    fn test_dedupe_is_exact_text_equality() {
        let out = dedupe_in_rank_order(
            vec![candidate("a", 0.9), candidate("b", 0.8)],
            |id| match id.as_str() {
                "a" => Some("Restart the service".to_string()),
                _ => Some("restart the service".to_string()),
            },
        );
        assert_eq!(out.len(), 2);
    }
}
