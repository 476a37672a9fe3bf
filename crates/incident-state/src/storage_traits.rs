//! Storage trait definitions for incident memory
//!
//! These traits define the two external collaborators of the engine:
//! - `IncidentStore`: durable incident records (description + resolution)
//! - `VectorIndex`: incident-id → embedding vector, nearest-neighbour queries
//!
//! All traits are async and backend-agnostic. In-memory fakes are provided
//! for testing via the `fakes` module.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StorageError;

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

// ---------------------------------------------------------------------------
// IncidentStore — Incident Records
// ---------------------------------------------------------------------------

/// Opaque incident identifier, assigned by the store on creation
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IncidentId(pub String);

impl IncidentId {
    /// Generate a new random IncidentId
    pub fn new() -> Self {
        IncidentId(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for IncidentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for IncidentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for IncidentId {
    fn from(s: &str) -> Self {
        IncidentId(s.to_string())
    }
}

/// Lifecycle state of an incident
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentStatus {
    /// Created, no resolution yet
    Open,
    /// Carries a non-blank resolution
    Resolved,
}

/// A single incident record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    pub id: IncidentId,
    pub description: String,
    pub resolution: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Incident {
    /// Create a new open incident with a fresh id.
    pub fn open(description: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: IncidentId::new(),
            description: description.into(),
            resolution: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// The resolution, if present and not blank.
    pub fn resolution_text(&self) -> Option<&str> {
        self.resolution
            .as_deref()
            .filter(|r| !r.trim().is_empty())
    }

    pub fn status(&self) -> IncidentStatus {
        if self.resolution_text().is_some() {
            IncidentStatus::Resolved
        } else {
            IncidentStatus::Open
        }
    }
}

/// Durable keyed storage for incident records.
///
/// Guarantees:
/// - `insert` assigns a fresh, unique id and stores no resolution.
/// - Descriptions are not unique; description lookups return the oldest
///   record first.
/// - Updates overwrite the resolution, they never append.
/// - Records are never deleted through this trait.
#[async_trait]
pub trait IncidentStore: Send + Sync {
    /// Create a new open incident.
    async fn insert(&self, description: &str) -> StorageResult<Incident>;

    /// Point lookup by id.
    async fn get(&self, id: &IncidentId) -> StorageResult<Option<Incident>>;

    /// Oldest incident whose description equals `description` exactly.
    async fn find_by_description(&self, description: &str) -> StorageResult<Option<Incident>>;

    /// All incidents whose description equals `description`, oldest first.
    async fn list_by_description(&self, description: &str) -> StorageResult<Vec<Incident>>;

    /// Set the resolution of one incident. Returns `None` if the id is unknown.
    async fn update_resolution(
        &self,
        id: &IncidentId,
        resolution: &str,
    ) -> StorageResult<Option<Incident>>;

    /// Set the resolution of every incident whose description matches.
    /// Returns the updated records (empty when nothing matched).
    async fn update_by_description(
        &self,
        description: &str,
        resolution: &str,
    ) -> StorageResult<Vec<Incident>>;

    /// Map each id to its current resolution. Ids that are unknown or carry no
    /// (or a blank) resolution are omitted.
    async fn find_resolutions_by_ids(
        &self,
        ids: &[IncidentId],
    ) -> StorageResult<HashMap<IncidentId, String>>;
}

// ---------------------------------------------------------------------------
// VectorIndex — Embedding Storage and Nearest-Neighbour Search
// ---------------------------------------------------------------------------

/// A candidate returned by a similarity query. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityMatch {
    pub incident_id: IncidentId,
    /// Cosine similarity in `[-1, 1]`
    pub similarity: f32,
}

impl SimilarityMatch {
    /// Cosine distance (`1 - similarity`); lower is more similar.
    pub fn distance(&self) -> f32 {
        1.0 - self.similarity
    }
}

/// Bounds applied to a nearest-neighbour query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityQuery {
    /// Candidates with a cosine distance above this are discarded
    pub max_distance: f32,
    /// Maximum number of candidates returned
    pub limit: usize,
}

impl SimilarityQuery {
    pub fn new(max_distance: f32, limit: usize) -> Self {
        Self {
            max_distance,
            limit,
        }
    }

    /// Minimum cosine similarity implied by `max_distance`.
    pub fn min_similarity(&self) -> f32 {
        1.0 - self.max_distance
    }

    pub fn admits(&self, m: &SimilarityMatch) -> bool {
        m.distance() <= self.max_distance
    }
}

/// Durable mapping from incident id to a single embedding vector.
///
/// Guarantees:
/// - At most one vector per incident: `upsert` replaces, never duplicates.
/// - Every vector has exactly `dimension()` finite components.
/// - `query` returns matches ordered by ascending cosine distance, all within
///   `max_distance`, at most `limit` of them. Ties keep the index's native order.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Fixed vector length accepted by this index.
    fn dimension(&self) -> usize;

    /// Insert or replace the vector for an incident.
    async fn upsert(&self, id: &IncidentId, vector: &[f32]) -> StorageResult<()>;

    /// Nearest neighbours of `vector` under cosine distance.
    async fn query(
        &self,
        vector: &[f32],
        query: SimilarityQuery,
    ) -> StorageResult<Vec<SimilarityMatch>>;

    /// Number of stored vectors.
    async fn count(&self) -> StorageResult<usize>;
}

/// Check a vector against an index dimensionality before it is written or queried.
pub fn validate_vector(vector: &[f32], dimension: usize) -> StorageResult<()> {
    if vector.len() != dimension {
        return Err(StorageError::DimensionMismatch {
            expected: dimension,
            actual: vector.len(),
        });
    }
    if let Some(pos) = vector.iter().position(|v| !v.is_finite()) {
        return Err(StorageError::InvalidVector(format!(
            "component {pos} is not finite"
        )));
    }
    Ok(())
}

/// Cosine similarity of two vectors.
///
/// Returns `None` for mismatched lengths, empty input or a zero-norm operand.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let x64 = f64::from(x);
        let y64 = f64::from(y);
        dot += x64 * y64;
        norm_a += x64 * x64;
        norm_b += y64 * y64;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom <= f64::EPSILON {
        return None;
    }
    Some((dot / denom) as f32)
}
