//! SurrealDB schema migrations and initialization
//!
//! Sets up the incident and embedding tables with their indexes.

use crate::Result;
use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, info};

/// Initialize all incident-memory tables in SurrealDB
///
/// Safe to call multiple times (idempotent).
pub async fn init_schema(db: &Surreal<Any>) -> Result<()> {
    info!("Initializing incident-memory SurrealDB schema");

    init_incidents_table(db).await?;
    init_embeddings_table(db).await?;

    info!("Incident-memory schema initialization complete");
    Ok(())
}

/// Initialize `incidents` table
///
/// Schema:
/// ```text
/// TABLE incidents {
///   incident_id:  STRING (unique, assigned on insert)
///   description:  STRING (indexed, not unique)
///   resolution:   STRING? (absent until resolved, overwritten on update)
///   created_at:   DATETIME
///   updated_at:   DATETIME
/// }
/// ```
///
/// Records are never deleted by the engine.
async fn init_incidents_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing incidents table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS incidents
            SCHEMALESS
            PERMISSIONS
                FOR create FULL
                FOR select FULL
                FOR update FULL
                FOR delete NONE;

        DEFINE INDEX IF NOT EXISTS idx_incident_id ON TABLE incidents COLUMNS incident_id UNIQUE;

        -- Description is the lookup key of the update workflow; duplicates are allowed
        DEFINE INDEX IF NOT EXISTS idx_incident_description ON TABLE incidents COLUMNS description;

        DEFINE INDEX IF NOT EXISTS idx_incident_created_at ON TABLE incidents COLUMNS created_at;
    "#;

    db.query(sql).await?.check()?;
    debug!(table = "incidents", "Table ready");
    Ok(())
}

/// Initialize `incident_embeddings` table
///
/// Schema:
/// ```text
/// TABLE incident_embeddings {
///   id:           incident_embeddings:<incident_id> (one row per incident)
///   incident_id:  STRING (foreign key to incidents.incident_id)
///   embedding:    ARRAY<FLOAT> (document-mode embedding)
///   updated_at:   DATETIME
/// }
/// ```
///
/// Vector length is enforced by the caller against the configured dimension.
async fn init_embeddings_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing incident_embeddings table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS incident_embeddings
            SCHEMALESS
            PERMISSIONS
                FOR create FULL
                FOR select FULL
                FOR update FULL
                FOR delete FULL;

        DEFINE INDEX IF NOT EXISTS idx_embedding_incident_id ON TABLE incident_embeddings COLUMNS incident_id UNIQUE;
    "#;

    db.query(sql).await?.check()?;
    debug!(table = "incident_embeddings", "Table ready");
    Ok(())
}
