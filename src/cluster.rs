//! K-means clustering with k-means++ seeding.
//!
//! Works on any vector space: the 2-D reduced coordinates, the full
//! embeddings, or axis scores. Output is fully determined by the input, `k`
//! and the seed; parallel assignment collects in input order, so the thread
//! count never changes a label.

use std::fmt;
use std::str::FromStr;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::ClusteringConfig;
use crate::error::{Result, TopicError};

/// Which representation of the documents gets clustered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterSpace {
    /// 2-D projected coordinates
    #[default]
    Reduced,
    /// Full embedding vectors
    Embedding,
}

impl fmt::Display for ClusterSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClusterSpace::Reduced => write!(f, "reduced"),
            ClusterSpace::Embedding => write!(f, "embedding"),
        }
    }
}

impl FromStr for ClusterSpace {
    type Err = TopicError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "reduced" => Ok(ClusterSpace::Reduced),
            "embedding" => Ok(ClusterSpace::Embedding),
            other => Err(TopicError::configuration(format!(
                "unknown cluster space '{}', expected 'reduced' or 'embedding'",
                other
            ))),
        }
    }
}

/// Result of one clustering run.
#[derive(Debug, Clone, PartialEq)]
pub struct Clustering {
    /// Cluster label per input point, in `0..k`
    pub labels: Vec<usize>,
    pub centroids: Vec<Vec<f32>>,
    /// Within-cluster sum of squared distances
    pub inertia: f64,
    pub iterations: usize,
}

impl Clustering {
    /// Indices of the points in each cluster, in input order.
    pub fn members(&self) -> Vec<Vec<usize>> {
        let mut members = vec![Vec::new(); self.centroids.len()];
        for (i, &label) in self.labels.iter().enumerate() {
            members[label].push(i);
        }
        members
    }
}

#[derive(Debug, Clone)]
pub struct KMeans {
    seed: u64,
    max_iterations: usize,
    tolerance: f64,
}

impl KMeans {
    pub fn new(config: &ClusteringConfig) -> Self {
        Self {
            seed: config.seed,
            max_iterations: config.max_iterations,
            tolerance: config.tolerance as f64,
        }
    }

    /// Partition `points` into exactly `k` non-empty clusters.
    pub fn cluster(&self, points: &[&[f32]], k: usize) -> Result<Clustering> {
        let n = points.len();
        if k == 0 {
            return Err(TopicError::configuration("n_clusters must be at least 1"));
        }
        if k > n {
            return Err(TopicError::configuration(format!(
                "n_clusters ({}) exceeds the number of documents ({})",
                k, n
            )));
        }
        let dims = points[0].len();
        if points.iter().any(|p| p.len() != dims) {
            return Err(TopicError::configuration(
                "points to cluster differ in dimension",
            ));
        }

        let data: Vec<Vec<f64>> = points
            .iter()
            .map(|p| p.iter().map(|x| *x as f64).collect())
            .collect();

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut centroids = plus_plus_init(&data, k, &mut rng);
        let mut labels = vec![0usize; n];
        let mut iterations = 0;

        while iterations < self.max_iterations {
            iterations += 1;

            labels = assign(&data, &centroids);
            repair_empty(&data, &mut labels, &centroids, k);

            let updated = compute_centroids(&data, &labels, k, dims);
            let shift = centroids
                .iter()
                .zip(&updated)
                .map(|(a, b)| squared_distance(a, b).sqrt())
                .fold(0.0f64, f64::max);
            centroids = updated;

            if shift < self.tolerance {
                break;
            }
        }

        let inertia = labels
            .iter()
            .zip(&data)
            .map(|(&label, point)| squared_distance(point, &centroids[label]))
            .sum();

        log::debug!(
            "k-means k={} n={} iterations={} inertia={:.4}",
            k,
            n,
            iterations,
            inertia
        );

        Ok(Clustering {
            labels,
            centroids: centroids
                .into_iter()
                .map(|c| c.into_iter().map(|x| x as f32).collect())
                .collect(),
            inertia,
            iterations,
        })
    }
}

/// Choose initial centroids with probability proportional to the squared
/// distance from the nearest centroid already chosen.
fn plus_plus_init(data: &[Vec<f64>], k: usize, rng: &mut StdRng) -> Vec<Vec<f64>> {
    let n = data.len();
    let mut chosen = vec![rng.random_range(0..n)];
    let mut min_distances = vec![f64::MAX; n];

    while chosen.len() < k {
        let last = &data[chosen[chosen.len() - 1]];
        for (d, point) in min_distances.iter_mut().zip(data) {
            *d = d.min(squared_distance(point, last));
        }

        let total: f64 = min_distances.iter().sum();
        let next = if total > 0.0 {
            let target = rng.random::<f64>() * total;
            let mut cumulative = 0.0;
            let mut pick = None;
            for (i, d) in min_distances.iter().enumerate() {
                if *d <= 0.0 {
                    continue;
                }
                cumulative += d;
                pick = Some(i);
                if cumulative > target {
                    break;
                }
            }
            pick
        } else {
            None
        };

        // Every point sits on a centroid: take the first unused index
        let next = next
            .or_else(|| (0..n).find(|i| !chosen.contains(i)))
            .unwrap_or(0);
        chosen.push(next);
    }

    chosen.into_iter().map(|i| data[i].clone()).collect()
}

fn assign(data: &[Vec<f64>], centroids: &[Vec<f64>]) -> Vec<usize> {
    data.par_iter()
        .map(|point| nearest(point, centroids))
        .collect()
}

/// Index of the closest centroid, ties by lowest index.
fn nearest(point: &[f64], centroids: &[Vec<f64>]) -> usize {
    let mut best = 0;
    let mut best_distance = f64::MAX;
    for (i, c) in centroids.iter().enumerate() {
        let d = squared_distance(point, c);
        if d < best_distance {
            best = i;
            best_distance = d;
        }
    }
    best
}

/// Give every empty cluster the point farthest from its own centroid, taken
/// from a cluster that keeps at least one member.
fn repair_empty(data: &[Vec<f64>], labels: &mut [usize], centroids: &[Vec<f64>], k: usize) {
    let mut counts = vec![0usize; k];
    for &label in labels.iter() {
        counts[label] += 1;
    }

    for empty in 0..k {
        if counts[empty] > 0 {
            continue;
        }

        let mut donor: Option<(usize, f64)> = None;
        for (i, point) in data.iter().enumerate() {
            let label = labels[i];
            if counts[label] < 2 {
                continue;
            }
            let d = squared_distance(point, &centroids[label]);
            if donor.map_or(true, |(_, best)| d > best) {
                donor = Some((i, d));
            }
        }

        // Unreachable while k <= n
        let Some((i, _)) = donor else {
            return;
        };
        counts[labels[i]] -= 1;
        labels[i] = empty;
        counts[empty] = 1;
    }
}

fn compute_centroids(data: &[Vec<f64>], labels: &[usize], k: usize, dims: usize) -> Vec<Vec<f64>> {
    let mut sums = vec![vec![0.0f64; dims]; k];
    let mut counts = vec![0usize; k];

    for (point, &label) in data.iter().zip(labels) {
        counts[label] += 1;
        for (s, x) in sums[label].iter_mut().zip(point) {
            *s += x;
        }
    }

    for (sum, count) in sums.iter_mut().zip(counts) {
        if count > 0 {
            for s in sum.iter_mut() {
                *s /= count as f64;
            }
        }
    }
    sums
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kmeans() -> KMeans {
        KMeans::new(&ClusteringConfig::default())
    }

    fn refs(points: &[Vec<f32>]) -> Vec<&[f32]> {
        points.iter().map(|p| p.as_slice()).collect()
    }

    fn blobs() -> Vec<Vec<f32>> {
        let mut points = Vec::new();
        for i in 0..10 {
            let j = i as f32 * 0.05;
            points.push(vec![0.0 + j, 0.0]);
            points.push(vec![10.0 + j, 10.0]);
            points.push(vec![-10.0, 10.0 + j]);
        }
        points
    }

    #[test]
    fn test_invalid_k() {
        let points = blobs();
        assert!(matches!(
            kmeans().cluster(&refs(&points), 0),
            Err(TopicError::Configuration(_))
        ));
        assert!(matches!(
            kmeans().cluster(&refs(&points), points.len() + 1),
            Err(TopicError::Configuration(_))
        ));
    }

    #[test]
    fn test_separates_blobs() {
        let points = blobs();
        let result = kmeans().cluster(&refs(&points), 3).unwrap();
        assert_eq!(result.labels.len(), points.len());

        // Points generated in the same blob share a label
        for i in 0..points.len() {
            assert_eq!(result.labels[i], result.labels[i % 3]);
        }
        let mut distinct = result.labels[..3].to_vec();
        distinct.sort();
        distinct.dedup();
        assert_eq!(distinct.len(), 3);
    }

    #[test]
    fn test_plus_plus_never_repeats_a_chosen_point() {
        let data: Vec<Vec<f64>> = blobs()
            .into_iter()
            .map(|p| p.into_iter().map(f64::from).collect())
            .collect();
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let centroids = plus_plus_init(&data, 6, &mut rng);
            assert_eq!(centroids.len(), 6);
            for (i, a) in centroids.iter().enumerate() {
                for b in &centroids[i + 1..] {
                    assert_ne!(a, b, "seed {seed} picked a point twice");
                }
            }
        }
    }

    #[test]
    fn test_deterministic() {
        let points = blobs();
        let a = kmeans().cluster(&refs(&points), 4).unwrap();
        let b = kmeans().cluster(&refs(&points), 4).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_identical_points_still_fill_every_cluster() {
        let points = vec![vec![1.0, 1.0]; 5];
        let result = kmeans().cluster(&refs(&points), 3).unwrap();
        let members = result.members();
        assert_eq!(members.len(), 3);
        assert!(members.iter().all(|m| !m.is_empty()));
        assert_eq!(members.iter().map(|m| m.len()).sum::<usize>(), 5);
        assert_eq!(result.inertia, 0.0);
    }

    #[test]
    fn test_k_equals_n() {
        let points = vec![vec![0.0], vec![1.0], vec![5.0], vec![9.0]];
        let result = kmeans().cluster(&refs(&points), 4).unwrap();
        let mut labels = result.labels.clone();
        labels.sort();
        assert_eq!(labels, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_single_cluster_centroid_is_mean() {
        let points = vec![vec![0.0, 0.0], vec![2.0, 4.0]];
        let result = kmeans().cluster(&refs(&points), 1).unwrap();
        assert_eq!(result.labels, vec![0, 0]);
        assert_eq!(result.centroids[0], vec![1.0, 2.0]);
    }

    #[test]
    fn test_cluster_space_parse() {
        assert_eq!("Embedding".parse::<ClusterSpace>().unwrap(), ClusterSpace::Embedding);
        assert_eq!(ClusterSpace::Reduced.to_string(), "reduced");
        assert!("tsne".parse::<ClusterSpace>().is_err());
    }
}
