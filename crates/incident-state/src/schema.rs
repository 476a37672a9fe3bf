//! Row definitions for the incident SurrealDB tables
//!
//! Tables:
//! - incidents: incident records (description + optional resolution)
//! - incident_embeddings: one document embedding per resolved incident

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage_traits::{Incident, IncidentId};

/// Module for serializing chrono DateTime to SurrealDB datetime format
mod surreal_datetime {
    use chrono::{DateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};
    use surrealdb::sql::Datetime as SurrealDatetime;

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let sd = SurrealDatetime::from(*date);
        serde::Serialize::serialize(&sd, serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let sd = SurrealDatetime::deserialize(deserializer)?;
        Ok(DateTime::from(sd))
    }
}

/// Row in the `incidents` table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidentRow {
    pub incident_id: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    #[serde(with = "surreal_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "surreal_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl From<&Incident> for IncidentRow {
    fn from(incident: &Incident) -> Self {
        Self {
            incident_id: incident.id.0.clone(),
            description: incident.description.clone(),
            resolution: incident.resolution.clone(),
            created_at: incident.created_at,
            updated_at: incident.updated_at,
        }
    }
}

impl From<IncidentRow> for Incident {
    fn from(row: IncidentRow) -> Self {
        Incident {
            id: IncidentId(row.incident_id),
            description: row.description,
            resolution: row.resolution,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Projection used when only resolutions are needed
#[derive(Debug, Clone, Deserialize)]
pub struct ResolutionRow {
    pub incident_id: String,
    #[serde(default)]
    pub resolution: Option<String>,
}

/// Projection returned by the cosine similarity query
#[derive(Debug, Clone, Deserialize)]
pub struct SimilarityRow {
    pub incident_id: String,
    pub similarity: f64,
}

/// Aggregate row for `SELECT count() ... GROUP ALL`
#[derive(Debug, Clone, Deserialize)]
pub struct CountRow {
    pub count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incident_row_conversion_keeps_fields() {
        let mut incident = Incident::open("VPN drops every hour");
        incident.resolution = Some("Renew DHCP lease".to_string());

        let row = IncidentRow::from(&incident);
        assert_eq!(row.incident_id, incident.id.0);

        let back = Incident::from(row);
        assert_eq!(back, incident);
    }

    #[test]
    fn test_open_incident_row_omits_resolution() {
        let incident = Incident::open("Printer on fire");
        let json = serde_json::to_value(IncidentRow::from(&incident)).unwrap();
        assert!(json.get("resolution").is_none());
        assert_eq!(json["description"], "Printer on fire");
    }
}
