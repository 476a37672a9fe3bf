//! Engine configuration.
//!
//! Everything the engine needs is passed in through these structs at
//! construction time; only the `from_env` constructors read process state.

use std::time::Duration;

use incident_state::SimilarityQuery;
use serde::{Deserialize, Serialize};

/// Default embedding model.
pub const DEFAULT_MODEL: &str = "models/embedding-001";
/// Default embedding dimensionality.
pub const DEFAULT_DIMENSION: usize = 768;
/// Default embedding API base URL.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Errors produced while building or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("max_distance must be within [0, 2], got {0}")]
    MaxDistanceOutOfRange(f32),

    #[error("result limit must be greater than zero")]
    ZeroLimit,

    #[error("embedding dimension must be greater than zero")]
    ZeroDimension,

    #[error("invalid value for {var}: {value}")]
    InvalidEnv { var: String, value: String },
}

/// Embedding provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Provider credential. `None` disables the provider.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub model: String,
    pub dimension: usize,
    pub base_url: String,
    /// Upper bound for a single HTTP request.
    pub request_timeout: Duration,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            dimension: DEFAULT_DIMENSION,
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl EmbeddingConfig {
    /// Config with a credential and all other settings at their defaults.
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..Self::default()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Whether a non-blank credential is configured.
    pub fn is_enabled(&self) -> bool {
        self.api_key
            .as_deref()
            .map(|k| !k.trim().is_empty())
            .unwrap_or(false)
    }

    /// Create from environment variables
    ///
    /// Reads:
    /// - GEMINI_API_KEY (optional; absent disables embeddings)
    /// - GEMINI_EMBEDDING_MODEL (optional, default: "models/embedding-001")
    /// - GEMINI_BASE_URL (optional)
    /// - EMBEDDING_DIMENSION (optional, default: 768)
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let dimension = match std::env::var("EMBEDDING_DIMENSION") {
            Ok(raw) => raw.parse::<usize>().map_err(|_| ConfigError::InvalidEnv {
                var: "EMBEDDING_DIMENSION".to_string(),
                value: raw.clone(),
            })?,
            Err(_) => defaults.dimension,
        };
        if dimension == 0 {
            return Err(ConfigError::ZeroDimension);
        }

        Ok(Self {
            api_key: std::env::var("GEMINI_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
            model: std::env::var("GEMINI_EMBEDDING_MODEL").unwrap_or(defaults.model),
            dimension,
            base_url: std::env::var("GEMINI_BASE_URL").unwrap_or(defaults.base_url),
            request_timeout: defaults.request_timeout,
        })
    }
}

/// Fixed retrieval policy applied to every similarity query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetrievalPolicy {
    /// Maximum cosine distance of a surfaced match (0.30 ⇔ similarity ≥ 0.70)
    pub max_distance: f32,
    /// Maximum number of candidates requested from the index
    pub limit: usize,
}

impl Default for RetrievalPolicy {
    fn default() -> Self {
        Self {
            max_distance: 0.30,
            limit: 5,
        }
    }
}

impl RetrievalPolicy {
    pub fn new(max_distance: f32, limit: usize) -> Result<Self, ConfigError> {
        let policy = Self {
            max_distance,
            limit,
        };
        policy.validate()?;
        Ok(policy)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.max_distance) {
            return Err(ConfigError::MaxDistanceOutOfRange(self.max_distance));
        }
        if self.limit == 0 {
            return Err(ConfigError::ZeroLimit);
        }
        Ok(())
    }

    pub fn as_query(&self) -> SimilarityQuery {
        SimilarityQuery::new(self.max_distance, self.limit)
    }
}

/// How a description-keyed update treats several incidents sharing the description.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmbiguityPolicy {
    /// Refuse the update and report how many incidents matched.
    #[default]
    Reject,
    /// Resolve every matching incident and record memory for each.
    ApplyToAll,
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub retrieval: RetrievalPolicy,
    /// Bound on one embedding call, including the provider round trip.
    pub embed_timeout: Duration,
    /// Bound on one vector index call.
    pub index_timeout: Duration,
    /// Bound on store reads made by the memory writer and retriever.
    pub store_timeout: Duration,
    pub ambiguity: AmbiguityPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retrieval: RetrievalPolicy::default(),
            embed_timeout: Duration::from_secs(10),
            index_timeout: Duration::from_secs(5),
            store_timeout: Duration::from_secs(5),
            ambiguity: AmbiguityPolicy::default(),
        }
    }
}

impl EngineConfig {
    pub fn with_retrieval(mut self, retrieval: RetrievalPolicy) -> Self {
        self.retrieval = retrieval;
        self
    }

    pub fn with_embed_timeout(mut self, timeout: Duration) -> Self {
        self.embed_timeout = timeout;
        self
    }

    pub fn with_index_timeout(mut self, timeout: Duration) -> Self {
        self.index_timeout = timeout;
        self
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    pub fn with_ambiguity(mut self, ambiguity: AmbiguityPolicy) -> Self {
        self.ambiguity = ambiguity;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_is_valid() {
        let policy = RetrievalPolicy::default();
        assert!(policy.validate().is_ok());
        let q = policy.as_query();
        assert_eq!(q.limit, 5);
        assert!((q.min_similarity() - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_policy_rejects_bad_bounds() {
        assert!(matches!(
            RetrievalPolicy::new(2.5, 5),
            Err(ConfigError::MaxDistanceOutOfRange(_))
        ));
        assert!(matches!(
            RetrievalPolicy::new(-0.1, 5),
            Err(ConfigError::MaxDistanceOutOfRange(_))
        ));
        assert!(matches!(
            RetrievalPolicy::new(0.3, 0),
            Err(ConfigError::ZeroLimit)
        ));
    }

    #[test]
    fn test_embedding_config_enabled_only_with_key() {
        assert!(!EmbeddingConfig::default().is_enabled());
        assert!(EmbeddingConfig::with_api_key("k").is_enabled());

        let blank = EmbeddingConfig {
            api_key: Some("   ".to_string()),
            ..EmbeddingConfig::default()
        };
        assert!(!blank.is_enabled());
    }

    #[test]
    fn test_api_key_not_serialized() {
        let json = serde_json::to_string(&EmbeddingConfig::with_api_key("secret")).unwrap();
        assert!(!json.contains("secret"));
    }

    #[test]
    fn test_ambiguity_defaults_to_reject() {
        assert_eq!(EngineConfig::default().ambiguity, AmbiguityPolicy::Reject);
    }
}
