//! Embedding collaborator and the adapter that guards it.
//!
//! - [`Embedder`]: the narrow capability any embedding backend implements
//! - [`FastEmbedder`]: local fastembed-rs backend (feature `local-embeddings`)
//! - [`EmbeddingAdapter`]: batching, cache lookups, deadlines, and shape checks

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::OnceCell;

use crate::config::EmbeddingConfig;
use crate::deadline::run_with_deadline;
use crate::error::Result;
use crate::semantic::preprocess::{content_hash, preprocess_text};
use crate::semantic::storage::EmbeddingCache;

/// Text-to-vector function supplied by the host.
///
/// One call receives the whole batch; implementations must return exactly
/// one vector per input, in input order.
pub trait Embedder: Send + Sync {
    fn embed(&self, texts: &[String]) -> std::result::Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Stable model name, used to key cached vectors.
    fn name(&self) -> &str;
}

/// Error type for embedding operations
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("Model initialization failed: {0}")]
    InitFailed(String),

    #[error("Embedding generation failed: {0}")]
    EmbeddingFailed(String),

    #[error("Invalid model name: {0}")]
    InvalidModel(String),

    #[error("Embedding count mismatch: expected {expected}, got {got}")]
    CountMismatch { expected: usize, got: usize },

    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Embedding {index} is empty")]
    EmptyVector { index: usize },

    #[error("Embedding {index} contains non-finite values")]
    NonFinite { index: usize },
}

/// Wrapper around fastembed's TextEmbedding model.
/// Uses a Mutex because fastembed's embed() requires &mut self.
#[cfg(feature = "local-embeddings")]
pub struct FastEmbedder {
    model: std::sync::Mutex<fastembed::TextEmbedding>,
    model_name: String,
    batch_size: usize,
}

#[cfg(feature = "local-embeddings")]
impl FastEmbedder {
    /// Create a local embedding model.
    ///
    /// The model will be downloaded on first use if not cached.
    /// Models are cached in the `models/` subdirectory of `cache_dir`.
    /// Gives up with [`crate::TopicError::Timeout`] once loading takes
    /// longer than `download_timeout_secs`.
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        use fastembed::{InitOptions, TextEmbedding};

        let model_enum = Self::parse_model_name(&config.model)?;
        let models_dir = config.resolved_cache_dir().join("models");
        std::fs::create_dir_all(&models_dir).map_err(|e| {
            EmbeddingError::InitFailed(format!("Failed to create models directory: {}", e))
        })?;

        log::info!(
            "Loading embedding model '{}' (download timeout {}s)",
            config.model,
            config.download_timeout_secs
        );

        let options = InitOptions::new(model_enum)
            .with_cache_dir(models_dir)
            .with_show_download_progress(true);

        let model = load_model(
            Duration::from_secs(config.download_timeout_secs),
            move || {
                TextEmbedding::try_new(options)
                    .map_err(|e| EmbeddingError::InitFailed(e.to_string()))
            },
        )?;

        Ok(Self {
            model: std::sync::Mutex::new(model),
            model_name: config.model.clone(),
            batch_size: config.batch_size,
        })
    }

    /// Parse model name string to fastembed enum.
    fn parse_model_name(
        name: &str,
    ) -> std::result::Result<fastembed::EmbeddingModel, EmbeddingError> {
        match name.to_lowercase().as_str() {
            "all-minilm-l6-v2" | "allminiml6v2" => {
                Ok(fastembed::EmbeddingModel::AllMiniLML6V2)
            }
            "all-minilm-l6-v2-q" | "allminiml6v2q" => {
                Ok(fastembed::EmbeddingModel::AllMiniLML6V2Q)
            }
            "bge-small-en-v1.5" | "bgesmallenv15" => {
                Ok(fastembed::EmbeddingModel::BGESmallENV15)
            }
            "bge-base-en-v1.5" | "bgebaseenv15" => {
                Ok(fastembed::EmbeddingModel::BGEBaseENV15)
            }
            "paraphrase-multilingual-minilm-l12-v2" | "paraphrasemlminilml12v2" => {
                Ok(fastembed::EmbeddingModel::ParaphraseMLMiniLML12V2)
            }
            _ => Err(EmbeddingError::InvalidModel(format!(
                "Unknown model: {}. Supported models: all-MiniLM-L6-v2, bge-small-en-v1.5, bge-base-en-v1.5, paraphrase-multilingual-MiniLM-L12-v2 (add -q suffix to MiniLM for quantized)",
                name
            ))),
        }
    }
}

#[cfg(feature = "local-embeddings")]
impl Embedder for FastEmbedder {
    fn embed(&self, texts: &[String]) -> std::result::Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let mut model = self.model.lock().map_err(|e| {
            EmbeddingError::EmbeddingFailed(format!("Failed to acquire model lock: {}", e))
        })?;

        model
            .embed(texts.to_vec(), Some(self.batch_size))
            .map_err(|e| EmbeddingError::EmbeddingFailed(e.to_string()))
    }

    fn name(&self) -> &str {
        &self.model_name
    }
}

/// Run a model constructor under the download deadline.
#[cfg_attr(not(feature = "local-embeddings"), allow(dead_code))]
fn load_model<M, F>(timeout: Duration, load: F) -> Result<M>
where
    M: Send + 'static,
    F: FnOnce() -> std::result::Result<M, EmbeddingError> + Send + 'static,
{
    run_with_deadline("model download", Some(timeout), load)
}

/// Session-scoped gatekeeper in front of an [`Embedder`].
///
/// Every request becomes at most one backend call (cache misses only), runs
/// under the configured deadline, and is validated before anything is
/// returned: count must match, every vector must share the session dimension
/// and contain only finite values.
pub struct EmbeddingAdapter {
    embedder: Arc<dyn Embedder>,
    timeout: Option<Duration>,
    max_chars: usize,
    dimensions: OnceCell<usize>,
    cache: Option<EmbeddingCache>,
}

impl EmbeddingAdapter {
    pub fn new(embedder: Arc<dyn Embedder>, config: &EmbeddingConfig) -> Self {
        let cache = if config.cache {
            Some(EmbeddingCache::open(
                Self::cache_path(config.resolved_cache_dir(), embedder.name()),
                embedder.name(),
            ))
        } else {
            None
        };

        Self {
            embedder,
            timeout: config.timeout_secs.map(Duration::from_secs),
            max_chars: config.max_chars,
            dimensions: OnceCell::new(),
            cache,
        }
    }

    /// Name of the wrapped model
    pub fn model_name(&self) -> &str {
        self.embedder.name()
    }

    /// Dimension fixed by the first successful call, if any.
    pub fn dimensions(&self) -> Option<usize> {
        self.dimensions.get().copied()
    }

    /// Embed a batch of texts. All-or-nothing: on any error no vector is
    /// returned and the cache is left untouched.
    pub fn embed(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let prepared: Vec<String> = texts
            .iter()
            .map(|t| preprocess_text(t, self.max_chars))
            .collect();
        let hashes: Vec<u64> = prepared.iter().map(|t| content_hash(t)).collect();

        // Unique misses, first occurrence order
        let mut miss_hashes: Vec<u64> = Vec::new();
        let mut miss_texts: Vec<String> = Vec::new();
        for (hash, text) in hashes.iter().zip(prepared.iter()) {
            let cached = self.cache.as_ref().is_some_and(|c| c.contains(*hash));
            if !cached && !miss_hashes.contains(hash) {
                miss_hashes.push(*hash);
                miss_texts.push(text.clone());
            }
        }

        let fresh = if miss_texts.is_empty() {
            Vec::new()
        } else {
            log::debug!(
                "Embedding {} texts ({} cached) with '{}'",
                texts.len(),
                texts.len() - miss_texts.len(),
                self.embedder.name()
            );
            let embedder = Arc::clone(&self.embedder);
            let batch = miss_texts;
            run_with_deadline("embedding", self.timeout, move || embedder.embed(&batch))?
        };

        let expected_dims = self
            .dimensions()
            .or_else(|| self.cache.as_ref().and_then(|c| c.dimensions()));
        let dims = Self::validate(&fresh, miss_hashes.len(), expected_dims)?;

        let mut fresh_by_hash = std::collections::HashMap::with_capacity(fresh.len());
        for (hash, vector) in miss_hashes.iter().zip(fresh) {
            fresh_by_hash.insert(*hash, vector);
        }

        let mut out = Vec::with_capacity(texts.len());
        for hash in &hashes {
            let vector = match fresh_by_hash.get(hash) {
                Some(v) => v.clone(),
                None => self
                    .cache
                    .as_ref()
                    .and_then(|c| c.get(*hash))
                    .map(|v| v.to_vec())
                    .ok_or_else(|| {
                        EmbeddingError::EmbeddingFailed(format!("missing vector for hash {hash:x}"))
                    })?,
            };
            out.push(vector);
        }

        if let Some(expected) = dims {
            if let Some(bad) = out.iter().find(|v| v.len() != expected) {
                return Err(EmbeddingError::DimensionMismatch {
                    expected,
                    got: bad.len(),
                }
                .into());
            }
        }

        if let Some(dims) = dims {
            let _ = self.dimensions.set(dims);
        }
        if let Some(cache) = self.cache.as_mut() {
            for (hash, vector) in fresh_by_hash {
                cache.insert(hash, vector);
            }
        }

        Ok(out)
    }

    /// Embed a single text.
    pub fn embed_one(&mut self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed(&[text.to_string()])?;
        vectors
            .pop()
            .ok_or_else(|| EmbeddingError::EmbeddingFailed("No embedding returned".to_string()).into())
    }

    /// Write newly embedded vectors to disk. A no-op without a cache.
    pub fn persist(&mut self) -> Result<()> {
        if let Some(cache) = self.cache.as_mut() {
            cache.save()?;
        }
        Ok(())
    }

    /// Check shape of a backend response; returns the common dimension.
    fn validate(
        vectors: &[Vec<f32>],
        expected_count: usize,
        expected_dims: Option<usize>,
    ) -> std::result::Result<Option<usize>, EmbeddingError> {
        if vectors.len() != expected_count {
            return Err(EmbeddingError::CountMismatch {
                expected: expected_count,
                got: vectors.len(),
            });
        }

        let mut dims = expected_dims;
        for (index, vector) in vectors.iter().enumerate() {
            if vector.is_empty() {
                return Err(EmbeddingError::EmptyVector { index });
            }
            match dims {
                Some(expected) if expected != vector.len() => {
                    return Err(EmbeddingError::DimensionMismatch {
                        expected,
                        got: vector.len(),
                    });
                }
                None => dims = Some(vector.len()),
                _ => {}
            }
            if vector.iter().any(|x| !x.is_finite()) {
                return Err(EmbeddingError::NonFinite { index });
            }
        }

        Ok(dims)
    }

    fn cache_path(cache_dir: PathBuf, model_name: &str) -> PathBuf {
        let prefix = format!("{:016x}", content_hash(model_name));
        cache_dir.join(format!("embeddings-{}.bin", &prefix[..12]))
    }
}
