//! Embedding provider adapter.
//!
//! Turns text into fixed-length vectors through an external provider. Every
//! failure is absorbed here and reported as an [`EmbedOutcome`]; nothing in
//! this module returns `Err` or panics on provider misbehaviour.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::config::EmbeddingConfig;

/// Which embedding space to encode into.
///
/// Document vectors are written to the index; query vectors are only ever
/// compared against document vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingMode {
    Document,
    Query,
}

impl EmbeddingMode {
    /// Provider task type for this mode.
    pub fn task_type(&self) -> &'static str {
        match self {
            Self::Document => "RETRIEVAL_DOCUMENT",
            Self::Query => "RETRIEVAL_QUERY",
        }
    }
}

impl std::fmt::Display for EmbeddingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Document => write!(f, "document"),
            Self::Query => write!(f, "query"),
        }
    }
}

/// Result of a single embedding request.
#[derive(Debug, Clone, PartialEq)]
pub enum EmbedOutcome {
    /// A vector of the configured dimensionality.
    Ready(Vec<f32>),
    /// No signal: provider disabled, empty input, transport failure, timeout,
    /// rate limiting or a server-side error. Retrying later may succeed.
    Unavailable,
    /// The provider answered but the answer is unusable (client error,
    /// malformed body, wrong dimensionality).
    Invalid(String),
}

impl EmbedOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    pub fn into_vector(self) -> Option<Vec<f32>> {
        match self {
            Self::Ready(v) => Some(v),
            _ => None,
        }
    }
}

/// Text → vector capability.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Length of every vector this embedder produces.
    fn dimension(&self) -> usize;

    /// `false` when the embedder is configured off; callers short-circuit.
    fn is_enabled(&self) -> bool {
        true
    }

    /// Embed `text` in the given mode. Empty text yields `Unavailable`.
    async fn embed(&self, text: &str, mode: EmbeddingMode) -> EmbedOutcome;
}

/// Validate a provider vector against the expected dimensionality.
pub fn check_vector(values: Vec<f32>, dimension: usize) -> EmbedOutcome {
    if values.len() != dimension {
        return EmbedOutcome::Invalid(format!(
            "expected {dimension}-dim vector, provider returned {}",
            values.len()
        ));
    }
    if values.iter().any(|v| !v.is_finite()) {
        return EmbedOutcome::Invalid("vector contains non-finite values".to_string());
    }
    EmbedOutcome::Ready(values)
}

// ---------------------------------------------------------------------------
// GeminiEmbedder
// ---------------------------------------------------------------------------

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedContentRequest<'a> {
    model: &'a str,
    content: Content<'a>,
    task_type: &'static str,
    output_dimensionality: usize,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct EmbedContentResponse {
    embedding: ContentEmbedding,
}

#[derive(Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

/// Gemini `embedContent` client.
///
/// Constructed disabled (no HTTP client, every call `Unavailable`) when no
/// API key is configured.
pub struct GeminiEmbedder {
    config: EmbeddingConfig,
    http_client: Option<reqwest::Client>,
}

impl GeminiEmbedder {
    pub fn new(config: EmbeddingConfig) -> Self {
        let http_client = if config.is_enabled() {
            match reqwest::Client::builder()
                .user_agent(concat!("incident-memory/", env!("CARGO_PKG_VERSION")))
                .timeout(config.request_timeout)
                .build()
            {
                Ok(client) => Some(client),
                Err(e) => {
                    warn!(error = %e, "Failed to build embedding HTTP client; embeddings disabled");
                    None
                }
            }
        } else {
            debug!("No embedding API key configured; embeddings disabled");
            None
        };

        Self {
            config,
            http_client,
        }
    }

    /// Embedder that never calls out.
    pub fn disabled() -> Self {
        Self::new(EmbeddingConfig::default())
    }

    pub fn config(&self) -> &EmbeddingConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/{}:embedContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }
}

#[async_trait]
impl Embedder for GeminiEmbedder {
    fn dimension(&self) -> usize {
        self.config.dimension
    }

    fn is_enabled(&self) -> bool {
        self.http_client.is_some()
    }

    #[instrument(skip(self, text), fields(text_len = text.len(), mode = %mode))]
    async fn embed(&self, text: &str, mode: EmbeddingMode) -> EmbedOutcome {
        let (Some(client), Some(api_key)) = (&self.http_client, self.config.api_key.as_deref())
        else {
            return EmbedOutcome::Unavailable;
        };
        if text.is_empty() {
            return EmbedOutcome::Unavailable;
        }

        let body = EmbedContentRequest {
            model: &self.config.model,
            content: Content {
                parts: [Part { text }],
            },
            task_type: mode.task_type(),
            output_dimensionality: self.config.dimension,
        };

        let response = match client
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, timeout = e.is_timeout(), "Embedding request failed");
                return EmbedOutcome::Unavailable;
            }
        };

        let status = response.status();
        if !status.is_success() {
            let detail: String = response
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(200)
                .collect();
            if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                warn!(%status, "Embedding provider unavailable");
                return EmbedOutcome::Unavailable;
            }
            warn!(%status, "Embedding provider rejected request");
            return EmbedOutcome::Invalid(format!("provider returned {status}: {detail}"));
        }

        match response.json::<EmbedContentResponse>().await {
            Ok(parsed) => {
                let outcome = check_vector(parsed.embedding.values, self.config.dimension);
                if let EmbedOutcome::Invalid(reason) = &outcome {
                    warn!(%reason, "Embedding rejected");
                } else {
                    debug!(dimension = self.config.dimension, "Generated embedding");
                }
                outcome
            }
            Err(e) => {
                warn!(error = %e, "Malformed embedding response");
                EmbedOutcome::Invalid(format!("malformed response: {e}"))
            }
        }
    }
}
