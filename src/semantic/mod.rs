//! Embedding infrastructure for the topic pipeline.
//!
//! - `embeddings`: the `Embedder` capability, the fastembed backend and the
//!   validating, caching adapter in front of it
//! - `index`: exhaustive cosine nearest-neighbor search
//! - `storage`: binary on-disk embedding cache
//! - `preprocess`: text preparation and content hashing for embedding input

pub mod embeddings;
pub mod index;
pub mod preprocess;
pub mod storage;

#[cfg(feature = "local-embeddings")]
pub use embeddings::FastEmbedder;
pub use embeddings::{Embedder, EmbeddingAdapter, EmbeddingError};
pub use index::{cosine_similarity, Neighbor, VectorIndex};
pub use preprocess::{content_hash, preprocess_text};
pub use storage::{CacheError, EmbeddingCache};
