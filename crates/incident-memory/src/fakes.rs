//! Deterministic embedder for tests.
//!
//! `ScriptedEmbedder` maps known texts to fixed vectors and records every
//! call, so tests can assert which mode was requested and that no provider
//! traffic happened on short-circuit paths.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::embedding::{check_vector, EmbedOutcome, Embedder, EmbeddingMode};

/// Failure mode applied to every call once set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptedFailure {
    Unavailable,
    Invalid,
}

#[derive(Debug, Default)]
struct Script {
    vectors: HashMap<(String, Option<EmbeddingMode>), Vec<f32>>,
    failure: Option<ScriptedFailure>,
    delay: Option<Duration>,
}

/// In-memory [`Embedder`] with scripted answers and a call log.
#[derive(Debug)]
pub struct ScriptedEmbedder {
    dimension: usize,
    enabled: bool,
    script: Mutex<Script>,
    calls: Mutex<Vec<(String, EmbeddingMode)>>,
}

impl ScriptedEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            enabled: true,
            script: Mutex::new(Script::default()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// An embedder that reports itself disabled.
    pub fn disabled(dimension: usize) -> Self {
        Self {
            enabled: false,
            ..Self::new(dimension)
        }
    }

    /// Answer `text` with `vector` in both modes.
    pub fn with_vector(self, text: &str, vector: Vec<f32>) -> Self {
        self.script
            .lock()
            .unwrap()
            .vectors
            .insert((text.to_string(), None), vector);
        self
    }

    /// Answer `text` with `vector` only in `mode`.
    pub fn with_mode_vector(self, text: &str, mode: EmbeddingMode, vector: Vec<f32>) -> Self {
        self.script
            .lock()
            .unwrap()
            .vectors
            .insert((text.to_string(), Some(mode)), vector);
        self
    }

    /// Sleep before answering, to exercise caller timeouts.
    pub fn with_delay(self, delay: Duration) -> Self {
        self.script.lock().unwrap().delay = Some(delay);
        self
    }

    pub fn fail_with(&self, failure: ScriptedFailure) {
        self.script.lock().unwrap().failure = Some(failure);
    }

    /// Every `(text, mode)` received so far, in call order.
    pub fn calls(&self) -> Vec<(String, EmbeddingMode)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Modes of every call so far.
    pub fn modes(&self) -> Vec<EmbeddingMode> {
        self.calls().into_iter().map(|(_, m)| m).collect()
    }
}

#[async_trait]
impl Embedder for ScriptedEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    async fn embed(&self, text: &str, mode: EmbeddingMode) -> EmbedOutcome {
        // Logged before any short-circuit so tests see calls the engine should not make
        self.calls.lock().unwrap().push((text.to_string(), mode));
        if !self.enabled || text.is_empty() {
            return EmbedOutcome::Unavailable;
        }

        let (delay, failure, vector) = {
            let script = self.script.lock().unwrap();
            let vector = script
                .vectors
                .get(&(text.to_string(), Some(mode)))
                .or_else(|| script.vectors.get(&(text.to_string(), None)))
                .cloned();
            (script.delay, script.failure, vector)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match (failure, vector) {
            (Some(ScriptedFailure::Unavailable), _) => EmbedOutcome::Unavailable,
            (Some(ScriptedFailure::Invalid), _) => {
                EmbedOutcome::Invalid("scripted invalid response".to_string())
            }
            (None, Some(vector)) => check_vector(vector, self.dimension),
            (None, None) => EmbedOutcome::Unavailable,
        }
    }
}
