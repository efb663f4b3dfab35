//! Corpus documents and the store that owns them.
//!
//! Embeddings are written exactly once, when the store is built from a fully
//! embedded batch. Coordinates, topic assignments, and axis scores are
//! replaced wholesale by later pipeline runs and always reflect the latest one.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TopicError};
use crate::topics::TopicId;

/// Position of a document in the input sequence of its fit.
pub type DocumentId = u64;

/// A point in a 2-D plane (reduced space or axis space).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f32,
    pub y: f32,
}

impl Point2 {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn to_vec(self) -> Vec<f32> {
        vec![self.x, self.y]
    }

    /// Mean of a set of points; the origin for an empty set.
    pub fn mean<'a>(points: impl IntoIterator<Item = &'a Point2>) -> Point2 {
        let (mut sx, mut sy, mut n) = (0.0f64, 0.0f64, 0usize);
        for p in points {
            sx += p.x as f64;
            sy += p.y as f64;
            n += 1;
        }
        if n == 0 {
            return Point2::default();
        }
        Point2::new((sx / n as f64) as f32, (sy / n as f64) as f32)
    }
}

/// Position of a document on one or two semantic axes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisScore {
    pub x: f32,
    /// `None` for a single-axis query
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub text: String,
    #[serde(skip)]
    embedding: Vec<f32>,
    /// 2-D projection, set once reduction ran
    pub coord: Option<Point2>,
    /// Topic of the latest clustering run
    pub topic: Option<TopicId>,
    /// Scores of the latest axis query
    pub axis: Option<AxisScore>,
}

impl Document {
    pub fn embedding(&self) -> &[f32] {
        &self.embedding
    }
}

/// Owns every document of one fitted corpus.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    documents: Vec<Document>,
    dimensions: usize,
}

impl DocumentStore {
    /// Build a store from texts and their embeddings, aligned by index.
    pub fn from_embedded(texts: Vec<String>, embeddings: Vec<Vec<f32>>) -> Result<Self> {
        if texts.is_empty() {
            return Err(TopicError::configuration("corpus is empty"));
        }
        if texts.len() != embeddings.len() {
            return Err(TopicError::configuration(format!(
                "{} texts but {} embeddings",
                texts.len(),
                embeddings.len()
            )));
        }

        let dimensions = embeddings[0].len();
        if let Some(bad) = embeddings.iter().find(|e| e.len() != dimensions) {
            return Err(TopicError::configuration(format!(
                "embedding dimension {} differs from {}",
                bad.len(),
                dimensions
            )));
        }

        let documents = texts
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(i, (text, embedding))| Document {
                id: i as DocumentId,
                text,
                embedding,
                coord: None,
                topic: None,
                axis: None,
            })
            .collect();

        Ok(Self {
            documents,
            dimensions,
        })
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn get(&self, id: DocumentId) -> Option<&Document> {
        self.documents.get(id as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Document> {
        self.documents.iter()
    }

    pub fn texts(&self) -> Vec<&str> {
        self.documents.iter().map(|d| d.text.as_str()).collect()
    }

    pub fn embeddings(&self) -> Vec<&[f32]> {
        self.documents.iter().map(|d| d.embedding.as_slice()).collect()
    }

    /// Projected coordinates, `None` until reduction ran for every document.
    pub fn coords(&self) -> Option<Vec<Point2>> {
        self.documents.iter().map(|d| d.coord).collect()
    }

    pub fn set_coords(&mut self, coords: &[Point2]) -> Result<()> {
        self.check_len("coordinates", coords.len())?;
        for (doc, coord) in self.documents.iter_mut().zip(coords) {
            doc.coord = Some(*coord);
        }
        Ok(())
    }

    pub fn set_topics(&mut self, topics: &[TopicId]) -> Result<()> {
        self.check_len("topic assignments", topics.len())?;
        for (doc, topic) in self.documents.iter_mut().zip(topics) {
            doc.topic = Some(*topic);
        }
        Ok(())
    }

    pub fn set_axis_scores(&mut self, scores: &[AxisScore]) -> Result<()> {
        self.check_len("axis scores", scores.len())?;
        for (doc, score) in self.documents.iter_mut().zip(scores) {
            doc.axis = Some(*score);
        }
        Ok(())
    }

    fn check_len(&self, what: &str, got: usize) -> Result<()> {
        if got != self.documents.len() {
            return Err(TopicError::configuration(format!(
                "{} {} for {} documents",
                got,
                what,
                self.documents.len()
            )));
        }
        Ok(())
    }
}
