//! Topic assembly from clustering and term ranking output.
//!
//! Every clustering run produces a fresh, immutable [`TopicSet`]. Topic ids
//! are positions in that set, ordered by descending size, so they carry no
//! identity across runs.

use serde::{Deserialize, Serialize};

use crate::cluster::{ClusterSpace, Clustering};
use crate::config::TermsConfig;
use crate::document::{DocumentId, Point2};
use crate::terms::{TermIndex, TermScore};

pub type TopicId = usize;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    pub id: TopicId,
    /// Term-based until replaced by a generated name
    pub name: String,
    pub terms: Vec<TermScore>,
    /// Mean of member coordinates
    pub centroid: Point2,
    pub members: Vec<DocumentId>,
    /// Run of the set this topic belongs to
    pub run: u64,
}

impl Topic {
    pub fn size(&self) -> usize {
        self.members.len()
    }
}

/// One topic's share of the corpus.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicShare {
    pub id: TopicId,
    pub name: String,
    pub size: usize,
    pub share: f64,
}

/// Result of one `get_topics` call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicSet {
    pub run: u64,
    pub n_clusters: usize,
    pub space: ClusterSpace,
    pub min_count_terms: usize,
    pub inertia: f64,
    pub topics: Vec<Topic>,
}

impl TopicSet {
    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    pub fn get(&self, id: TopicId) -> Option<&Topic> {
        self.topics.get(id)
    }

    /// Topic id per document, indexed by document id.
    pub fn assignments(&self, n_documents: usize) -> Vec<TopicId> {
        let mut out = vec![0; n_documents];
        for topic in &self.topics {
            for &doc in &topic.members {
                if let Some(slot) = out.get_mut(doc as usize) {
                    *slot = topic.id;
                }
            }
        }
        out
    }

    /// Size and share of every topic; shares sum to 1.
    pub fn distribution(&self) -> Vec<TopicShare> {
        let total: usize = self.topics.iter().map(|t| t.size()).sum();
        self.topics
            .iter()
            .map(|t| TopicShare {
                id: t.id,
                name: t.name.clone(),
                size: t.size(),
                share: if total == 0 {
                    0.0
                } else {
                    t.size() as f64 / total as f64
                },
            })
            .collect()
    }
}

/// Turns clusters into named topics with ranked terms.
pub struct TopicBuilder<'a> {
    index: &'a TermIndex,
    terms_per_topic: usize,
    name_terms: usize,
}

impl<'a> TopicBuilder<'a> {
    pub fn new(index: &'a TermIndex, config: &TermsConfig) -> Self {
        Self {
            index,
            terms_per_topic: config.terms_per_topic,
            name_terms: config.name_terms,
        }
    }

    /// Build one topic per cluster. `coords` gives the plane the centroids
    /// are computed in, indexed like the clustered points.
    pub fn assemble(
        &self,
        clustering: &Clustering,
        coords: &[Point2],
        min_count: usize,
        run: u64,
    ) -> Vec<Topic> {
        let mut groups = clustering.members();
        // Largest first, ties by smallest member
        groups.sort_by(|a, b| {
            b.len()
                .cmp(&a.len())
                .then_with(|| a.first().cmp(&b.first()))
        });

        groups
            .into_iter()
            .enumerate()
            .map(|(id, members)| {
                let terms = self.index.rank(&members, min_count, self.terms_per_topic);
                let centroid = Point2::mean(members.iter().filter_map(|&i| coords.get(i)));
                Topic {
                    id,
                    name: self.default_name(id, &terms),
                    terms,
                    centroid,
                    members: members.into_iter().map(|i| i as DocumentId).collect(),
                    run,
                }
            })
            .collect()
    }

    fn default_name(&self, id: TopicId, terms: &[TermScore]) -> String {
        if terms.is_empty() {
            return format!("topic-{}", id);
        }
        terms
            .iter()
            .take(self.name_terms)
            .map(|t| t.term.as_str())
            .collect::<Vec<_>>()
            .join(" | ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terms::Tokenizer;

    fn clustering(labels: Vec<usize>, k: usize) -> Clustering {
        Clustering {
            labels,
            centroids: vec![vec![0.0]; k],
            inertia: 0.0,
            iterations: 1,
        }
    }

    fn index(texts: &[&str]) -> TermIndex {
        TermIndex::build(texts, &Tokenizer::default(), 1000)
    }

    #[test]
    fn test_topics_ordered_by_size() {
        let texts = ["ocean waves", "mountain snow", "ocean tide", "ocean fish"];
        let index = index(&texts);
        let builder = TopicBuilder::new(&index, &TermsConfig::default());
        let coords = vec![
            Point2::new(0.0, 0.0),
            Point2::new(5.0, 5.0),
            Point2::new(2.0, 0.0),
            Point2::new(1.0, 3.0),
        ];

        let topics = builder.assemble(&clustering(vec![1, 0, 1, 1], 2), &coords, 1, 7);
        assert_eq!(topics.len(), 2);
        assert_eq!(topics[0].id, 0);
        assert_eq!(topics[0].members, vec![0, 2, 3]);
        assert_eq!(topics[0].centroid, Point2::new(1.0, 1.0));
        assert_eq!(topics[0].terms[0].term, "ocean");
        assert!(topics[0].name.starts_with("ocean"));
        assert_eq!(topics[1].members, vec![1]);
        assert!(topics.iter().all(|t| t.run == 7));
    }

    #[test]
    fn test_name_falls_back_without_terms() {
        let texts = ["the and of", "a an the"];
        let index = index(&texts);
        let builder = TopicBuilder::new(&index, &TermsConfig::default());
        let coords = vec![Point2::default(); 2];

        let topics = builder.assemble(&clustering(vec![0, 1], 2), &coords, 1, 1);
        assert_eq!(topics[0].name, "topic-0");
        assert_eq!(topics[1].name, "topic-1");
    }

    #[test]
    fn test_distribution_and_assignments() {
        let texts = ["alpha", "beta", "alpha", "gamma"];
        let index = index(&texts);
        let builder = TopicBuilder::new(&index, &TermsConfig::default());
        let coords = vec![Point2::default(); 4];
        let set = TopicSet {
            run: 1,
            n_clusters: 2,
            space: ClusterSpace::Reduced,
            min_count_terms: 1,
            inertia: 0.0,
            topics: builder.assemble(&clustering(vec![0, 1, 0, 0], 2), &coords, 1, 1),
        };

        let shares = set.distribution();
        assert_eq!(shares[0].size, 3);
        assert!((shares.iter().map(|s| s.share).sum::<f64>() - 1.0).abs() < 1e-12);
        assert_eq!(set.assignments(4), vec![0, 1, 0, 0]);
    }
}
