//! Nearest-neighbor lookup over document embeddings.
//!
//! Exhaustive cosine search: every query touches every vector, which keeps
//! results exact and ordering reproducible.

use rayon::prelude::*;

use crate::document::DocumentId;
use crate::error::TopicError;

/// A retrieved document and its cosine distance to the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub id: DocumentId,
    /// `1 - cosine similarity`, in [0, 2]
    pub distance: f32,
}

/// Borrowed view of document embeddings, ids given by insertion order.
pub struct VectorIndex<'a> {
    entries: Vec<&'a [f32]>,
    dimensions: usize,
}

impl<'a> VectorIndex<'a> {
    pub fn new(dimensions: usize) -> Self {
        Self {
            entries: Vec::new(),
            dimensions,
        }
    }

    /// Index `vectors`; the i-th vector gets id `i`.
    pub fn from_vectors(dimensions: usize, vectors: Vec<&'a [f32]>) -> Result<Self, IndexError> {
        let mut index = Self {
            entries: Vec::with_capacity(vectors.len()),
            dimensions,
        };
        for v in vectors {
            index.insert(v)?;
        }
        Ok(index)
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append an embedding and return its id.
    pub fn insert(&mut self, embedding: &'a [f32]) -> Result<DocumentId, IndexError> {
        if embedding.len() != self.dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimensions,
                got: embedding.len(),
            });
        }
        self.entries.push(embedding);
        Ok((self.entries.len() - 1) as DocumentId)
    }

    /// Cosine similarity of `query` to every entry, in id order.
    pub fn similarities(&self, query: &[f32]) -> Result<Vec<f32>, IndexError> {
        if query.len() != self.dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimensions,
                got: query.len(),
            });
        }
        let query_norm = l2_norm(query);
        if query_norm < f32::EPSILON {
            return Err(IndexError::ZeroNormVector);
        }

        Ok(self
            .entries
            .par_iter()
            .map(|entry| cosine_with_norm(query, entry, query_norm))
            .collect())
    }

    /// The `k` entries closest to `query` by ascending cosine distance, ties
    /// by insertion order. Returns every entry when `k` exceeds the size.
    pub fn nearest(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, IndexError> {
        let mut results: Vec<Neighbor> = self
            .similarities(query)?
            .into_iter()
            .enumerate()
            .map(|(i, score)| Neighbor {
                id: i as DocumentId,
                distance: 1.0 - score,
            })
            .collect();

        // Stable sort keeps insertion order among equal distances
        results.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        results.truncate(k);

        Ok(results)
    }
}

/// Cosine similarity; 0 when either vector has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let norm = l2_norm(a);
    if norm < f32::EPSILON {
        return 0.0;
    }
    cosine_with_norm(a, b, norm)
}

fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

fn cosine_with_norm(query: &[f32], target: &[f32], query_norm: f32) -> f32 {
    let target_norm = l2_norm(target);
    if target_norm < f32::EPSILON {
        return 0.0;
    }

    let dot_product: f32 = query.iter().zip(target.iter()).map(|(a, b)| a * b).sum();
    dot_product / (query_norm * target_norm)
}

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Cannot search with zero-norm vector")]
    ZeroNormVector,
}

impl From<IndexError> for TopicError {
    fn from(e: IndexError) -> Self {
        TopicError::configuration(e.to_string())
    }
}
