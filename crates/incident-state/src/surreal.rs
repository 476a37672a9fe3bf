//! SurrealDB-backed `IncidentStore` and `VectorIndex` implementations
//!
//! Uses `schema` rows for persistence, converting to/from `storage_traits`
//! types at the boundary.

use std::collections::HashMap;

use async_trait::async_trait;
use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, instrument};

use crate::error::StorageError;
use crate::schema::{CountRow, IncidentRow, ResolutionRow, SimilarityRow};
use crate::storage_traits::{
    validate_vector, Incident, IncidentId, IncidentStore, SimilarityMatch, SimilarityQuery,
    StorageResult, VectorIndex,
};

const INCIDENT_FIELDS: &str = "incident_id, description, resolution, created_at, updated_at";

// ---------------------------------------------------------------------------
// SurrealIncidentStore
// ---------------------------------------------------------------------------

/// SurrealDB-backed implementation of [`IncidentStore`].
#[derive(Clone)]
pub struct SurrealIncidentStore {
    db: Surreal<Any>,
}

impl SurrealIncidentStore {
    pub fn new(db: Surreal<Any>) -> Self {
        Self { db }
    }

    async fn select_by_description(&self, description: &str) -> StorageResult<Vec<Incident>> {
        let sql = format!(
            "SELECT {INCIDENT_FIELDS} FROM incidents WHERE description = $description ORDER BY created_at ASC"
        );
        let mut res = self
            .db
            .query(sql)
            .bind(("description", description.to_string()))
            .await?;
        let rows: Vec<IncidentRow> = res.take(0)?;
        Ok(rows.into_iter().map(Incident::from).collect())
    }
}

#[async_trait]
impl IncidentStore for SurrealIncidentStore {
    #[instrument(skip(self, description), fields(description_len = description.len()))]
    async fn insert(&self, description: &str) -> StorageResult<Incident> {
        let incident = Incident::open(description);
        let row = IncidentRow::from(&incident);

        let created: Option<IncidentRow> = self.db.create("incidents").content(row).await?;
        let created = created
            .ok_or_else(|| StorageError::Backend("Failed to create incident".to_string()))?;

        debug!(incident_id = %created.incident_id, "Incident inserted");
        Ok(created.into())
    }

    async fn get(&self, id: &IncidentId) -> StorageResult<Option<Incident>> {
        let sql = format!("SELECT {INCIDENT_FIELDS} FROM incidents WHERE incident_id = $id");
        let mut res = self.db.query(sql).bind(("id", id.0.clone())).await?;
        let rows: Vec<IncidentRow> = res.take(0)?;
        Ok(rows.into_iter().next().map(Incident::from))
    }

    async fn find_by_description(&self, description: &str) -> StorageResult<Option<Incident>> {
        Ok(self
            .select_by_description(description)
            .await?
            .into_iter()
            .next())
    }

    async fn list_by_description(&self, description: &str) -> StorageResult<Vec<Incident>> {
        self.select_by_description(description).await
    }

    #[instrument(skip(self, resolution), fields(incident_id = %id))]
    async fn update_resolution(
        &self,
        id: &IncidentId,
        resolution: &str,
    ) -> StorageResult<Option<Incident>> {
        let mut res = self
            .db
            .query(
                "UPDATE incidents SET resolution = $resolution, updated_at = time::now() \
                 WHERE incident_id = $id RETURN AFTER",
            )
            .bind(("id", id.0.clone()))
            .bind(("resolution", resolution.to_string()))
            .await?;
        let rows: Vec<IncidentRow> = res.take(0)?;
        Ok(rows.into_iter().next().map(Incident::from))
    }

    #[instrument(skip_all, fields(description_len = description.len()))]
    async fn update_by_description(
        &self,
        description: &str,
        resolution: &str,
    ) -> StorageResult<Vec<Incident>> {
        let mut res = self
            .db
            .query(
                "UPDATE incidents SET resolution = $resolution, updated_at = time::now() \
                 WHERE description = $description RETURN AFTER",
            )
            .bind(("description", description.to_string()))
            .bind(("resolution", resolution.to_string()))
            .await?;
        let rows: Vec<IncidentRow> = res.take(0)?;
        debug!(updated = rows.len(), "Incidents updated by description");

        let mut incidents: Vec<Incident> = rows.into_iter().map(Incident::from).collect();
        incidents.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(incidents)
    }

    async fn find_resolutions_by_ids(
        &self,
        ids: &[IncidentId],
    ) -> StorageResult<HashMap<IncidentId, String>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let id_list: Vec<String> = ids.iter().map(|id| id.0.clone()).collect();
        let mut res = self
            .db
            .query("SELECT incident_id, resolution FROM incidents WHERE incident_id INSIDE $ids")
            .bind(("ids", id_list))
            .await?;
        let rows: Vec<ResolutionRow> = res.take(0)?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                row.resolution
                    .filter(|r| !r.trim().is_empty())
                    .map(|r| (IncidentId(row.incident_id), r))
            })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// SurrealVectorIndex
// ---------------------------------------------------------------------------

/// SurrealDB-backed implementation of [`VectorIndex`].
///
/// One row per incident at `incident_embeddings:<incident_id>`; similarity is
/// computed with `vector::similarity::cosine`.
#[derive(Clone)]
pub struct SurrealVectorIndex {
    db: Surreal<Any>,
    dimension: usize,
}

impl SurrealVectorIndex {
    pub fn new(db: Surreal<Any>, dimension: usize) -> Self {
        Self { db, dimension }
    }
}

#[async_trait]
impl VectorIndex for SurrealVectorIndex {
    fn dimension(&self) -> usize {
        self.dimension
    }

    #[instrument(skip(self, vector), fields(incident_id = %id, dimension = vector.len()))]
    async fn upsert(&self, id: &IncidentId, vector: &[f32]) -> StorageResult<()> {
        validate_vector(vector, self.dimension)?;

        self.db
            .query(
                "UPSERT type::thing('incident_embeddings', $id) CONTENT { \
                    incident_id: $id, embedding: $embedding, updated_at: time::now() \
                 }",
            )
            .bind(("id", id.0.clone()))
            .bind(("embedding", vector.to_vec()))
            .await?
            .check()?;

        debug!("Embedding upserted");
        Ok(())
    }

    #[instrument(skip(self, vector), fields(max_distance = query.max_distance, limit = query.limit))]
    async fn query(
        &self,
        vector: &[f32],
        query: SimilarityQuery,
    ) -> StorageResult<Vec<SimilarityMatch>> {
        validate_vector(vector, self.dimension)?;
        if query.limit == 0 {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT incident_id, vector::similarity::cosine(embedding, $vector) AS similarity \
             FROM incident_embeddings \
             WHERE vector::similarity::cosine(embedding, $vector) >= $min_similarity \
             ORDER BY similarity DESC \
             LIMIT {}",
            query.limit
        );
        let mut res = self
            .db
            .query(sql)
            .bind(("vector", vector.to_vec()))
            .bind(("min_similarity", f64::from(query.min_similarity())))
            .await?;
        let rows: Vec<SimilarityRow> = res.take(0)?;

        let matches: Vec<SimilarityMatch> = rows
            .into_iter()
            .map(|row| SimilarityMatch {
                incident_id: IncidentId(row.incident_id),
                similarity: row.similarity as f32,
            })
            .filter(|m| query.admits(m))
            .collect();

        debug!(matches = matches.len(), "Similarity query complete");
        Ok(matches)
    }

    async fn count(&self) -> StorageResult<usize> {
        let mut res = self
            .db
            .query("SELECT count() FROM incident_embeddings GROUP ALL")
            .await?;
        let rows: Vec<CountRow> = res.take(0)?;
        Ok(rows.into_iter().next().map(|r| r.count).unwrap_or(0))
    }
}
