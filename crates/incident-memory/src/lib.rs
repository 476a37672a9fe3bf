//! Incident memory engine.
//!
//! Remembers how past incidents were resolved and suggests those resolutions
//! when a similar incident is reported:
//!
//! - [`MemoryWriter`] embeds a resolved incident's description (document
//!   mode) and upserts it into the vector index
//! - [`MemoryRetriever`] embeds a new description (query mode), finds close
//!   neighbours and returns their distinct resolutions
//! - [`IncidentLifecycle`] drives both around incident creation and resolution
//!
//! Provider and index faults never reach callers; they degrade to empty
//! results or an unwritten memory.

pub mod config;
pub mod embedding;
pub mod fakes;
pub mod lifecycle;
pub mod retriever;
pub mod telemetry;
mod timeout;
pub mod writer;

pub use config::{
    AmbiguityPolicy, ConfigError, EmbeddingConfig, EngineConfig, RetrievalPolicy,
    DEFAULT_BASE_URL, DEFAULT_DIMENSION, DEFAULT_MODEL,
};
pub use embedding::{EmbedOutcome, Embedder, EmbeddingMode, GeminiEmbedder};
pub use lifecycle::{CreatedIncident, IncidentLifecycle, LifecycleError, ResolvedIncident};
pub use retriever::{MemoryRetriever, ResolvedMatch};
pub use telemetry::init_tracing;
pub use writer::{MemoryWriter, RecordOutcome};
