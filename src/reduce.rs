//! Projection of embeddings onto a 2-D plane.
//!
//! Linear projection onto the first two principal components, found by
//! seeded power iteration with deflation on the centered data. Only
//! matrix-vector products are computed, so no D×D covariance is built.
//!
//! Small corpora are rejected below a configurable size instead of producing
//! a projection that would be mostly noise.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::config::ReductionConfig;
use crate::document::Point2;
use crate::error::{Result, TopicError};

/// Norm below which a component is treated as absent (zero variance left).
const DEGENERATE_NORM: f64 = 1e-12;

/// Stateless 2-D reducer; every call fits on the full input.
#[derive(Debug, Clone)]
pub struct Reducer {
    seed: u64,
    min_documents: usize,
    max_iterations: usize,
    tolerance: f64,
}

impl Reducer {
    pub fn new(config: &ReductionConfig) -> Self {
        Self {
            seed: config.seed,
            min_documents: config.min_documents,
            max_iterations: config.max_iterations,
            tolerance: config.tolerance as f64,
        }
    }

    /// Project `vectors` to 2-D, preserving input order.
    pub fn reduce(&self, vectors: &[&[f32]]) -> Result<Vec<Point2>> {
        let n = vectors.len();
        if n < self.min_documents {
            return Err(TopicError::configuration(format!(
                "dimensionality reduction needs at least {} documents, got {}",
                self.min_documents, n
            )));
        }
        if n == 0 {
            return Ok(vec![]);
        }

        let dims = vectors[0].len();
        if vectors.iter().any(|v| v.len() != dims) {
            return Err(TopicError::Reduction(
                "input vectors differ in dimension".to_string(),
            ));
        }

        let centered = center(vectors, dims);
        let mut rng = StdRng::seed_from_u64(self.seed);

        let first = self.component(&centered, dims, &[], &mut rng);
        let previous: Vec<Vec<f64>> = first.iter().cloned().collect();
        let second = self.component(&centered, dims, &previous, &mut rng);

        let xs = project(&centered, first.as_deref());
        let ys = project(&centered, second.as_deref());

        log::debug!(
            "Reduced {} vectors of dimension {} (components found: {})",
            n,
            dims,
            first.is_some() as usize + second.is_some() as usize
        );

        Ok(xs
            .into_iter()
            .zip(ys)
            .map(|(x, y)| Point2::new(x as f32, y as f32))
            .collect())
    }

    /// Leading eigenvector of XᵀX orthogonal to `previous`, or `None` when
    /// no variance is left in that subspace.
    fn component(
        &self,
        data: &[Vec<f64>],
        dims: usize,
        previous: &[Vec<f64>],
        rng: &mut StdRng,
    ) -> Option<Vec<f64>> {
        let mut v: Vec<f64> = (0..dims).map(|_| rng.random_range(-1.0..1.0)).collect();
        orthogonalize(&mut v, previous);
        if normalize(&mut v) < DEGENERATE_NORM {
            return None;
        }

        for _ in 0..self.max_iterations {
            let mut w = covariance_product(data, &v, dims);
            orthogonalize(&mut w, previous);
            if normalize(&mut w) < DEGENERATE_NORM {
                return None;
            }

            let shift: f64 = w
                .iter()
                .zip(&v)
                .map(|(a, b)| (a - b) * (a - b))
                .sum::<f64>()
                .sqrt();
            v = w;
            if shift < self.tolerance {
                break;
            }
        }

        fix_sign(&mut v);
        Some(v)
    }
}

fn center(vectors: &[&[f32]], dims: usize) -> Vec<Vec<f64>> {
    let n = vectors.len() as f64;
    let mut mean = vec![0.0f64; dims];
    for v in vectors {
        for (m, x) in mean.iter_mut().zip(v.iter()) {
            *m += *x as f64;
        }
    }
    for m in mean.iter_mut() {
        *m /= n;
    }

    vectors
        .iter()
        .map(|v| v.iter().zip(&mean).map(|(x, m)| *x as f64 - m).collect())
        .collect()
}

/// Xᵀ(Xv) without materializing XᵀX.
fn covariance_product(data: &[Vec<f64>], v: &[f64], dims: usize) -> Vec<f64> {
    let scores: Vec<f64> = data.par_iter().map(|row| dot(row, v)).collect();

    let mut out = vec![0.0f64; dims];
    for (row, s) in data.iter().zip(scores) {
        for (o, x) in out.iter_mut().zip(row) {
            *o += x * s;
        }
    }
    out
}

fn project(data: &[Vec<f64>], component: Option<&[f64]>) -> Vec<f64> {
    match component {
        Some(c) => data.par_iter().map(|row| dot(row, c)).collect(),
        None => vec![0.0; data.len()],
    }
}

fn orthogonalize(v: &mut [f64], basis: &[Vec<f64>]) {
    for b in basis {
        let p = dot(v, b);
        for (x, y) in v.iter_mut().zip(b) {
            *x -= p * y;
        }
    }
}

/// Scale to unit length in place; returns the norm before scaling.
fn normalize(v: &mut [f64]) -> f64 {
    let norm = dot(v, v).sqrt();
    if norm >= DEGENERATE_NORM {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
    norm
}

/// Make the largest-magnitude loading positive.
fn fix_sign(v: &mut [f64]) {
    let pivot = v
        .iter()
        .copied()
        .fold(0.0f64, |acc, x| if x.abs() > acc.abs() { x } else { acc });
    if pivot < 0.0 {
        for x in v.iter_mut() {
            *x = -*x;
        }
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reducer(min_documents: usize) -> Reducer {
        Reducer::new(&ReductionConfig {
            min_documents,
            ..ReductionConfig::default()
        })
    }

    fn refs(vectors: &[Vec<f32>]) -> Vec<&[f32]> {
        vectors.iter().map(|v| v.as_slice()).collect()
    }

    #[test]
    fn test_rejects_small_corpus() {
        let vectors = vec![vec![1.0, 0.0, 0.0]; 3];
        let result = reducer(4).reduce(&refs(&vectors));
        assert!(matches!(result, Err(TopicError::Configuration(_))));
    }

    #[test]
    fn test_preserves_order_and_length() {
        let vectors: Vec<Vec<f32>> = (0..10)
            .map(|i| vec![i as f32, (i * 2) as f32, 1.0])
            .collect();
        let points = reducer(4).reduce(&refs(&vectors)).unwrap();
        assert_eq!(points.len(), 10);

        // Data lies on a line: first axis is monotonic, second is flat
        for pair in points.windows(2) {
            assert!(pair[1].x > pair[0].x);
        }
        for p in &points {
            assert!(p.y.abs() < 1e-3, "unexpected spread on y: {}", p.y);
        }
    }

    #[test]
    fn test_separates_main_direction() {
        // Two blobs far apart on dimension 2, noise elsewhere
        let mut vectors = Vec::new();
        for i in 0..8 {
            let jitter = i as f32 * 0.01;
            vectors.push(vec![jitter, 0.0, 10.0, jitter]);
            vectors.push(vec![0.0, jitter, -10.0, jitter]);
        }
        let points = reducer(4).reduce(&refs(&vectors)).unwrap();
        for (i, p) in points.iter().enumerate() {
            if i % 2 == 0 {
                assert!(p.x > 5.0);
            } else {
                assert!(p.x < -5.0);
            }
        }
    }

    #[test]
    fn test_deterministic_for_seed() {
        let vectors: Vec<Vec<f32>> = (0..20)
            .map(|i| {
                let f = i as f32;
                vec![f.sin(), f.cos(), (f * 0.3).sin(), f * 0.01]
            })
            .collect();
        let a = reducer(4).reduce(&refs(&vectors)).unwrap();
        let b = reducer(4).reduce(&refs(&vectors)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_identical_points_map_to_origin() {
        let vectors = vec![vec![0.5, 0.5]; 6];
        let points = reducer(4).reduce(&refs(&vectors)).unwrap();
        assert!(points.iter().all(|p| *p == Point2::default()));
    }

    #[test]
    fn test_one_dimensional_input() {
        let vectors: Vec<Vec<f32>> = (0..5).map(|i| vec![i as f32]).collect();
        let points = reducer(4).reduce(&refs(&vectors)).unwrap();
        assert!(points.iter().all(|p| p.y == 0.0));
        assert!((points[4].x - points[0].x).abs() > 3.9);
    }
}
