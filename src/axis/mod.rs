//! Semantic axis projection.
//!
//! An axis is defined by two opposing word sets. Each set is pooled into a
//! pole vector (mean of its member embeddings) and every document gets
//!
//! `score = cos(v, positive_pole) - cos(v, negative_pole)`
//!
//! so positive means closer to the right (X) or top (Y) set. Swapping the
//! two sets negates every score exactly.

pub mod explain;

use rayon::prelude::*;
use serde::Serialize;

use crate::cluster::KMeans;
use crate::config::{AxisConfig, TermsConfig};
use crate::document::{AxisScore, Point2};
use crate::error::{Result, TopicError};
use crate::semantic::cosine_similarity;
use crate::terms::TermIndex;
use crate::topics::{Topic, TopicBuilder};

pub use explain::{AxisTerms, ExplainError, TermEffect};

/// Two opposing word sets; scores grow towards `positive`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AxisDefinition {
    pub negative: Vec<String>,
    pub positive: Vec<String>,
}

impl AxisDefinition {
    /// Fails when either set is empty or holds only blank entries.
    pub fn new(negative: Vec<String>, positive: Vec<String>) -> Result<Self> {
        let clean = |words: Vec<String>, side: &str| -> Result<Vec<String>> {
            let words: Vec<String> = words
                .into_iter()
                .map(|w| w.trim().to_string())
                .filter(|w| !w.is_empty())
                .collect();
            if words.is_empty() {
                return Err(TopicError::configuration(format!(
                    "axis word set '{}' is empty",
                    side
                )));
            }
            Ok(words)
        };

        Ok(Self {
            negative: clean(negative, "negative")?,
            positive: clean(positive, "positive")?,
        })
    }

    /// Same axis with its ends swapped.
    pub fn reversed(&self) -> Self {
        Self {
            negative: self.positive.clone(),
            positive: self.negative.clone(),
        }
    }
}

/// Pooled embeddings of both ends of an axis.
#[derive(Debug, Clone, PartialEq)]
pub struct AxisPoles {
    pub negative: Vec<f32>,
    pub positive: Vec<f32>,
}

/// Two-axis projection request.
#[derive(Debug, Clone)]
pub struct AxisRequest {
    pub x_left: Vec<String>,
    pub x_right: Vec<String>,
    pub y_top: Vec<String>,
    pub y_bottom: Vec<String>,
    /// Re-cluster documents in axis space
    pub clustering: bool,
    pub n_clusters: usize,
    pub min_count_terms: usize,
}

impl Default for AxisRequest {
    fn default() -> Self {
        Self {
            x_left: vec!["past".to_string()],
            x_right: vec!["future".to_string()],
            y_top: vec!["men".to_string()],
            y_bottom: vec!["women".to_string()],
            clustering: true,
            n_clusters: 5,
            min_count_terms: 1,
        }
    }
}

impl AxisRequest {
    pub fn x_axis(&self) -> Result<AxisDefinition> {
        AxisDefinition::new(self.x_left.clone(), self.x_right.clone())
    }

    pub fn y_axis(&self) -> Result<AxisDefinition> {
        AxisDefinition::new(self.y_bottom.clone(), self.y_top.clone())
    }
}

/// Share of documents per quadrant; a zero coordinate counts as positive.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct QuadrantShares {
    pub top_right: f64,
    pub top_left: f64,
    pub bottom_left: f64,
    pub bottom_right: f64,
}

/// Regression summary per axis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AxisExplanation {
    pub x: AxisTerms,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<AxisTerms>,
}

/// Everything one axis query produces.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AxisProjection {
    /// One score per document, by document id
    pub scores: Vec<AxisScore>,
    pub shares: QuadrantShares,
    /// Topics found in axis space, when clustering was requested
    pub regions: Option<Vec<Topic>>,
    /// `None` when not requested or when it could not be fitted
    pub explanation: Option<AxisExplanation>,
}

/// Mean of the given vectors.
pub fn pool(vectors: &[Vec<f32>]) -> Result<Vec<f32>> {
    let first = vectors
        .first()
        .ok_or_else(|| TopicError::configuration("cannot pool an empty word set"))?;
    let mut out = vec![0.0f32; first.len()];
    for v in vectors {
        for (o, x) in out.iter_mut().zip(v) {
            *o += x;
        }
    }
    let n = vectors.len() as f32;
    for o in out.iter_mut() {
        *o /= n;
    }
    Ok(out)
}

/// Raw score of every document on one axis.
pub fn score_axis(documents: &[&[f32]], poles: &AxisPoles) -> Vec<f32> {
    documents
        .par_iter()
        .map(|v| cosine_similarity(v, &poles.positive) - cosine_similarity(v, &poles.negative))
        .collect()
}

/// Center on the mean, then scale by the largest magnitude into [-1, 1].
pub fn normalize(scores: &mut [f32]) {
    if scores.is_empty() {
        return;
    }
    let mean = (scores.iter().map(|s| *s as f64).sum::<f64>() / scores.len() as f64) as f32;
    for s in scores.iter_mut() {
        *s -= mean;
    }
    let max = scores.iter().fold(0.0f32, |m, s| m.max(s.abs()));
    if max > 0.0 {
        for s in scores.iter_mut() {
            *s /= max;
        }
    }
}

pub fn quadrant_shares(scores: &[AxisScore]) -> QuadrantShares {
    if scores.is_empty() {
        return QuadrantShares::default();
    }
    let mut counts = [0usize; 4];
    for s in scores {
        let right = s.x >= 0.0;
        let top = s.y.unwrap_or(0.0) >= 0.0;
        let slot = match (top, right) {
            (true, true) => 0,
            (true, false) => 1,
            (false, false) => 2,
            (false, true) => 3,
        };
        counts[slot] += 1;
    }
    let n = scores.len() as f64;
    QuadrantShares {
        top_right: counts[0] as f64 / n,
        top_left: counts[1] as f64 / n,
        bottom_left: counts[2] as f64 / n,
        bottom_right: counts[3] as f64 / n,
    }
}

/// Projects documents onto one or two axes, with optional regions and
/// explanation.
pub struct AxisScorer<'a> {
    config: &'a AxisConfig,
    terms: &'a TermsConfig,
    index: &'a TermIndex,
    kmeans: &'a KMeans,
}

impl<'a> AxisScorer<'a> {
    pub fn new(
        config: &'a AxisConfig,
        terms: &'a TermsConfig,
        index: &'a TermIndex,
        kmeans: &'a KMeans,
    ) -> Self {
        Self {
            config,
            terms,
            index,
            kmeans,
        }
    }

    /// Score `documents` on `x` and optionally `y`. `regions` asks for
    /// `(n_clusters, min_count_terms)` clustering in axis space.
    pub fn project(
        &self,
        documents: &[&[f32]],
        x: &AxisPoles,
        y: Option<&AxisPoles>,
        regions: Option<(usize, usize)>,
        run: u64,
    ) -> Result<AxisProjection> {
        if documents.len() < 2 {
            return Err(TopicError::configuration(format!(
                "axis projection needs at least 2 documents, got {}",
                documents.len()
            )));
        }

        let mut xs = score_axis(documents, x);
        let mut ys = y.map(|poles| score_axis(documents, poles));
        if self.config.normalize {
            normalize(&mut xs);
            if let Some(ys) = ys.as_mut() {
                normalize(ys);
            }
        }

        let scores: Vec<AxisScore> = match &ys {
            Some(ys) => xs
                .iter()
                .zip(ys)
                .map(|(x, y)| AxisScore { x: *x, y: Some(*y) })
                .collect(),
            None => xs.iter().map(|x| AxisScore { x: *x, y: None }).collect(),
        };
        let plane: Vec<Point2> = scores
            .iter()
            .map(|s| Point2::new(s.x, s.y.unwrap_or(0.0)))
            .collect();

        let regions = match regions {
            Some((k, min_count)) => Some(self.regions(&plane, k, min_count, run)?),
            None => None,
        };

        let explanation = if self.config.explain {
            self.explain(&xs, ys.as_deref())
        } else {
            None
        };

        Ok(AxisProjection {
            shares: quadrant_shares(&scores),
            scores,
            regions,
            explanation,
        })
    }

    fn regions(&self, plane: &[Point2], k: usize, min_count: usize, run: u64) -> Result<Vec<Topic>> {
        let points: Vec<Vec<f32>> = plane.iter().map(|p| p.to_vec()).collect();
        let refs: Vec<&[f32]> = points.iter().map(|p| p.as_slice()).collect();
        let clustering = self.kmeans.cluster(&refs, k)?;

        let builder = TopicBuilder::new(self.index, self.terms);
        Ok(builder.assemble(&clustering, plane, min_count, run))
    }

    fn explain(&self, xs: &[f32], ys: Option<&[f32]>) -> Option<AxisExplanation> {
        let fit = |scores: &[f32]| {
            explain::explain(
                self.index,
                scores,
                self.config.explain_vocabulary,
                self.config.explain_terms,
            )
        };

        let result = fit(xs).and_then(|x| {
            let y = ys.map(fit).transpose()?;
            Ok(AxisExplanation { x, y })
        });

        match result {
            Ok(explanation) => Some(explanation),
            Err(e) => {
                log::warn!("Axis explanation skipped: {}", e);
                None
            }
        }
    }
}
