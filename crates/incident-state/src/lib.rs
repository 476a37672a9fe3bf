//! Incident-State: SurrealDB Backend for Incident Memory
//!
//! This crate provides the persistence layer for the incident memory engine.
//! It owns the two external collaborators the engine talks to:
//!
//! - `IncidentStore`: incident records keyed by an opaque id, with a free-text
//!   description and an optional resolution
//! - `VectorIndex`: one embedding per incident, queried by cosine distance
//!
//! ## Layer 0 - Data/Persistence
//!
//! Both traits have in-memory fakes (`fakes`) and SurrealDB implementations
//! (`surreal`) sharing a single `SurrealHandle` connection.

mod error;
pub mod fakes;
pub mod handle;
pub mod migrations;
mod schema;
pub mod storage_traits;
pub mod surreal;

pub use error::{StateError, StorageError};
pub use handle::{DbTarget, RemoteAuth, RemoteConfig, SurrealHandle};
pub use storage_traits::{
    cosine_similarity, validate_vector, Incident, IncidentId, IncidentStatus, IncidentStore,
    SimilarityMatch, SimilarityQuery, StorageResult, VectorIndex,
};
pub use surreal::{SurrealIncidentStore, SurrealVectorIndex};

/// Result type for incident-state connection and schema operations
pub type Result<T> = std::result::Result<T, StateError>;
