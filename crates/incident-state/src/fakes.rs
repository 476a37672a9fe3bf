//! In-memory fakes for storage traits (testing only)
//!
//! Provides `MemoryIncidentStore` and `MemoryVectorIndex` that satisfy the
//! trait contracts without any external dependencies.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::storage_traits::*;

// ---------------------------------------------------------------------------
// MemoryIncidentStore
// ---------------------------------------------------------------------------

/// In-memory incident store. Records are kept in creation order.
#[derive(Debug, Default)]
pub struct MemoryIncidentStore {
    incidents: Mutex<Vec<Incident>>,
}

impl MemoryIncidentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored incidents.
    pub fn len(&self) -> usize {
        self.incidents.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn apply_resolution(incident: &mut Incident, resolution: &str) {
    incident.resolution = Some(resolution.to_string());
    incident.updated_at = Utc::now();
}

#[async_trait]
impl IncidentStore for MemoryIncidentStore {
    async fn insert(&self, description: &str) -> StorageResult<Incident> {
        let incident = Incident::open(description);
        let mut incidents = self.incidents.lock().unwrap();
        incidents.push(incident.clone());
        Ok(incident)
    }

    async fn get(&self, id: &IncidentId) -> StorageResult<Option<Incident>> {
        let incidents = self.incidents.lock().unwrap();
        Ok(incidents.iter().find(|i| &i.id == id).cloned())
    }

    async fn find_by_description(&self, description: &str) -> StorageResult<Option<Incident>> {
        let incidents = self.incidents.lock().unwrap();
        Ok(incidents
            .iter()
            .find(|i| i.description == description)
            .cloned())
    }

    async fn list_by_description(&self, description: &str) -> StorageResult<Vec<Incident>> {
        let incidents = self.incidents.lock().unwrap();
        Ok(incidents
            .iter()
            .filter(|i| i.description == description)
            .cloned()
            .collect())
    }

    async fn update_resolution(
        &self,
        id: &IncidentId,
        resolution: &str,
    ) -> StorageResult<Option<Incident>> {
        let mut incidents = self.incidents.lock().unwrap();
        Ok(incidents.iter_mut().find(|i| &i.id == id).map(|i| {
            apply_resolution(i, resolution);
            i.clone()
        }))
    }

    async fn update_by_description(
        &self,
        description: &str,
        resolution: &str,
    ) -> StorageResult<Vec<Incident>> {
        let mut incidents = self.incidents.lock().unwrap();
        Ok(incidents
            .iter_mut()
            .filter(|i| i.description == description)
            .map(|i| {
                apply_resolution(i, resolution);
                i.clone()
            })
            .collect())
    }

    async fn find_resolutions_by_ids(
        &self,
        ids: &[IncidentId],
    ) -> StorageResult<HashMap<IncidentId, String>> {
        let incidents = self.incidents.lock().unwrap();
        Ok(incidents
            .iter()
            .filter(|i| ids.contains(&i.id))
            .filter_map(|i| {
                i.resolution_text()
                    .map(|r| (i.id.clone(), r.to_string()))
            })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// MemoryVectorIndex
// ---------------------------------------------------------------------------

/// In-memory vector index with brute-force cosine search.
///
/// Insertion order is the native tie order; an upsert of an existing id
/// replaces its vector in place.
#[derive(Debug)]
pub struct MemoryVectorIndex {
    dimension: usize,
    entries: Mutex<Vec<(IncidentId, Vec<f32>)>>,
}

impl MemoryVectorIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Stored vector for an incident, if any.
    pub fn vector(&self, id: &IncidentId) -> Option<Vec<f32>> {
        let entries = self.entries.lock().unwrap();
        entries
            .iter()
            .find(|(eid, _)| eid == id)
            .map(|(_, v)| v.clone())
    }
}

#[async_trait]
impl VectorIndex for MemoryVectorIndex {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn upsert(&self, id: &IncidentId, vector: &[f32]) -> StorageResult<()> {
        validate_vector(vector, self.dimension)?;
        let mut entries = self.entries.lock().unwrap();
        match entries.iter_mut().find(|(eid, _)| eid == id) {
            Some(entry) => entry.1 = vector.to_vec(),
            None => entries.push((id.clone(), vector.to_vec())),
        }
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        query: SimilarityQuery,
    ) -> StorageResult<Vec<SimilarityMatch>> {
        validate_vector(vector, self.dimension)?;
        if query.limit == 0 {
            return Ok(Vec::new());
        }

        let entries = self.entries.lock().unwrap();
        let mut matches: Vec<SimilarityMatch> = entries
            .iter()
            .filter_map(|(id, stored)| {
                cosine_similarity(vector, stored).map(|similarity| SimilarityMatch {
                    incident_id: id.clone(),
                    similarity,
                })
            })
            .filter(|m| query.admits(m))
            .collect();

        // Stable sort keeps insertion order for equal distances
        matches.sort_by(|a, b| {
            a.distance()
                .partial_cmp(&b.distance())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matches.truncate(query.limit);
        Ok(matches)
    }

    async fn count(&self) -> StorageResult<usize> {
        Ok(self.entries.lock().unwrap().len())
    }
}
