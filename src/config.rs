use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::cluster::ClusterSpace;

/// Default embedding model (small, fast, 384 dimensions)
const DEFAULT_EMBEDDING_MODEL: &str = "all-MiniLM-L6-v2";
/// Default model download timeout in seconds
const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 300;
const DEFAULT_BATCH_SIZE: usize = 256;
const DEFAULT_MAX_CHARS: usize = 2048;

const DEFAULT_SEED: u64 = 42;

const DEFAULT_GENERATION_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_GENERATION_MODEL: &str = "gpt-4o-mini";
const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{field}: {message}")]
    Invalid { field: &'static str, message: String },

    #[error("config i/o: {0}")]
    Io(#[from] std::io::Error),

    #[error("config is malformed: {0}")]
    Yaml(#[from] serde_yml::Error),
}

fn invalid(field: &'static str, message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        message: message.into(),
    }
}

/// Embedding backend and cache settings
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingConfig {
    /// Model name for embeddings (e.g., "all-MiniLM-L6-v2")
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Where models and the embedding cache live, `$HOME/.cache/topica` if unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,

    /// Timeout for model download in seconds
    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,

    /// Deadline for one embedding call, unbounded if unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Documents longer than this are truncated before embedding
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,

    #[serde(default = "default_true")]
    pub cache: bool,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            cache_dir: None,
            download_timeout_secs: DEFAULT_DOWNLOAD_TIMEOUT_SECS,
            timeout_secs: None,
            batch_size: DEFAULT_BATCH_SIZE,
            max_chars: DEFAULT_MAX_CHARS,
            cache: true,
        }
    }
}

impl EmbeddingConfig {
    pub fn resolved_cache_dir(&self) -> PathBuf {
        if let Some(dir) = &self.cache_dir {
            return dir.clone();
        }
        match homedir::my_home() {
            Ok(Some(home)) => home.join(".cache").join("topica"),
            _ => std::env::temp_dir().join("topica"),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ReductionConfig {
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Smallest corpus the reducer accepts
    #[serde(default = "default_min_documents")]
    pub min_documents: usize,

    #[serde(default = "default_reduction_iterations")]
    pub max_iterations: usize,

    #[serde(default = "default_reduction_tolerance")]
    pub tolerance: f32,
}

impl Default for ReductionConfig {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SEED,
            min_documents: default_min_documents(),
            max_iterations: default_reduction_iterations(),
            tolerance: default_reduction_tolerance(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ClusteringConfig {
    #[serde(default = "default_seed")]
    pub seed: u64,

    #[serde(default = "default_clustering_iterations")]
    pub max_iterations: usize,

    /// Lloyd iterations stop once no centroid moves further than this
    #[serde(default = "default_clustering_tolerance")]
    pub tolerance: f32,

    #[serde(default)]
    pub space: ClusterSpace,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SEED,
            max_iterations: default_clustering_iterations(),
            tolerance: default_clustering_tolerance(),
            space: ClusterSpace::default(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TermsConfig {
    #[serde(default = "default_min_token_len")]
    pub min_token_len: usize,

    /// Longest n-gram extracted; 1 means unigrams only
    #[serde(default = "default_ngram_max")]
    pub ngram_max: usize,

    /// Vocabulary size, by corpus frequency
    #[serde(default = "default_top_terms_overall")]
    pub top_terms_overall: usize,

    #[serde(default = "default_terms_per_topic")]
    pub terms_per_topic: usize,

    /// Terms joined into the default topic name
    #[serde(default = "default_name_terms")]
    pub name_terms: usize,
}

impl Default for TermsConfig {
    fn default() -> Self {
        Self {
            min_token_len: default_min_token_len(),
            ngram_max: default_ngram_max(),
            top_terms_overall: default_top_terms_overall(),
            terms_per_topic: default_terms_per_topic(),
            name_terms: default_name_terms(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AxisConfig {
    /// Center and scale axis scores into [-1, 1]
    #[serde(default = "default_true")]
    pub normalize: bool,

    #[serde(default = "default_true")]
    pub explain: bool,

    #[serde(default = "default_explain_terms")]
    pub explain_terms: usize,

    #[serde(default = "default_explain_vocabulary")]
    pub explain_vocabulary: usize,
}

impl Default for AxisConfig {
    fn default() -> Self {
        Self {
            normalize: true,
            explain: true,
            explain_terms: default_explain_terms(),
            explain_vocabulary: default_explain_vocabulary(),
        }
    }
}

/// Chat-completions endpoint used for topic naming and question answering
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_generation_model")]
    pub model: String,

    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub temperature: f32,

    /// Member documents shown to the model when naming a topic
    #[serde(default = "default_context_documents")]
    pub context_documents: usize,

    #[serde(default = "default_max_name_words")]
    pub max_name_words: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_GENERATION_ENDPOINT.to_string(),
            model: DEFAULT_GENERATION_MODEL.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            timeout_secs: default_generation_timeout_secs(),
            temperature: 0.0,
            context_documents: default_context_documents(),
            max_name_words: default_max_name_words(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_embedding_model() -> String {
    DEFAULT_EMBEDDING_MODEL.to_string()
}

fn default_download_timeout_secs() -> u64 {
    DEFAULT_DOWNLOAD_TIMEOUT_SECS
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_max_chars() -> usize {
    DEFAULT_MAX_CHARS
}

fn default_true() -> bool {
    true
}

fn default_seed() -> u64 {
    DEFAULT_SEED
}

fn default_min_documents() -> usize {
    4
}

fn default_reduction_iterations() -> usize {
    200
}

fn default_reduction_tolerance() -> f32 {
    1e-6
}

fn default_clustering_iterations() -> usize {
    300
}

fn default_clustering_tolerance() -> f32 {
    1e-4
}

fn default_min_token_len() -> usize {
    2
}

fn default_ngram_max() -> usize {
    2
}

fn default_top_terms_overall() -> usize {
    1000
}

fn default_terms_per_topic() -> usize {
    10
}

fn default_name_terms() -> usize {
    3
}

fn default_explain_terms() -> usize {
    10
}

fn default_explain_vocabulary() -> usize {
    500
}

fn default_generation_endpoint() -> String {
    DEFAULT_GENERATION_ENDPOINT.to_string()
}

fn default_generation_model() -> String {
    DEFAULT_GENERATION_MODEL.to_string()
}

fn default_api_key_env() -> String {
    DEFAULT_API_KEY_ENV.to_string()
}

fn default_generation_timeout_secs() -> u64 {
    60
}

fn default_context_documents() -> usize {
    5
}

fn default_max_name_words() -> usize {
    6
}

fn default_top_k() -> usize {
    3
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub reduction: ReductionConfig,
    #[serde(default)]
    pub clustering: ClusteringConfig,
    #[serde(default)]
    pub terms: TermsConfig,
    #[serde(default)]
    pub axis: AxisConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(skip_serializing, skip_deserializing)]
    path: Option<PathBuf>,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let emb = &self.embedding;
        if emb.model.trim().is_empty() {
            return Err(invalid("embedding.model", "must not be empty"));
        }
        positive("embedding.download_timeout_secs", emb.download_timeout_secs as usize)?;
        if emb.timeout_secs == Some(0) {
            return Err(invalid("embedding.timeout_secs", "must be greater than 0"));
        }
        positive("embedding.batch_size", emb.batch_size)?;
        if emb.max_chars < 4 {
            return Err(invalid(
                "embedding.max_chars",
                format!("must be at least 4 to fit text before the ellipsis, got {}", emb.max_chars),
            ));
        }

        let red = &self.reduction;
        positive("reduction.min_documents", red.min_documents)?;
        positive("reduction.max_iterations", red.max_iterations)?;
        tolerance("reduction.tolerance", red.tolerance)?;

        let clu = &self.clustering;
        positive("clustering.max_iterations", clu.max_iterations)?;
        tolerance("clustering.tolerance", clu.tolerance)?;

        let terms = &self.terms;
        positive("terms.min_token_len", terms.min_token_len)?;
        positive("terms.ngram_max", terms.ngram_max)?;
        if terms.ngram_max > 2 {
            return Err(invalid(
                "terms.ngram_max",
                format!("must be 1 or 2, got {}", terms.ngram_max),
            ));
        }
        positive("terms.top_terms_overall", terms.top_terms_overall)?;
        positive("terms.terms_per_topic", terms.terms_per_topic)?;
        positive("terms.name_terms", terms.name_terms)?;

        positive("axis.explain_terms", self.axis.explain_terms)?;
        positive("axis.explain_vocabulary", self.axis.explain_vocabulary)?;

        let gen = &self.generation;
        if let Err(e) = url::Url::parse(&gen.endpoint) {
            return Err(invalid(
                "generation.endpoint",
                format!("'{}' is not a valid URL: {}", gen.endpoint, e),
            ));
        }
        if gen.model.trim().is_empty() {
            return Err(invalid("generation.model", "must not be empty"));
        }
        positive("generation.timeout_secs", gen.timeout_secs as usize)?;
        if !gen.temperature.is_finite() || gen.temperature < 0.0 {
            return Err(invalid(
                "generation.temperature",
                format!("must be a non-negative number, got {}", gen.temperature),
            ));
        }
        positive("generation.context_documents", gen.context_documents)?;
        positive("generation.max_name_words", gen.max_name_words)?;

        positive("retrieval.top_k", self.retrieval.top_k)?;

        Ok(())
    }

    /// Load the config at `path`, creating it with defaults when missing.
    pub fn load_with(path: &Path) -> Result<Self, ConfigError> {
        // create new if does not exist
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, serde_yml::to_string(&Self::default())?)?;
            log::info!("Created default config at {}", path.display());
        }

        let config_str = std::fs::read_to_string(path)?;
        let mut config: Self = serde_yml::from_str(&config_str)?;
        config.path = Some(path.to_path_buf());

        config.validate()?;

        // resave in case config version needs an upgrade
        if config_str != serde_yml::to_string(&config)? {
            config.save()?;
        }

        Ok(config)
    }

    /// Write back to the file this config was loaded from; no-op for an
    /// in-memory config.
    pub fn save(&self) -> Result<(), ConfigError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        std::fs::write(path, serde_yml::to_string(&self)?)?;
        Ok(())
    }
}

fn positive(field: &'static str, value: usize) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(invalid(field, "must be greater than 0"));
    }
    Ok(())
}

fn tolerance(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(invalid(
            field,
            format!("must be a positive number, got {}", value),
        ));
    }
    Ok(())
}
