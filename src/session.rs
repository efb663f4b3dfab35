//! One corpus, one session.
//!
//! [`TopicModel`] owns every piece of derived state for a fitted corpus: the
//! document store, corpus term statistics, the latest topic set and cached
//! axis poles. Independent corpora get independent sessions; nothing is
//! shared between them.
//!
//! Every operation validates first and commits last, so a failed call
//! leaves state from earlier calls exactly as it was.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::axis::{AxisDefinition, AxisPoles, AxisProjection, AxisRequest, AxisScorer};
use crate::cluster::{ClusterSpace, KMeans};
use crate::config::Config;
use crate::deadline::run_with_deadline;
use crate::document::{Document, DocumentId, DocumentStore, Point2};
use crate::error::{Result, TopicError};
use crate::generate::{clean_name, naming_prompt, rag_prompt, Generator};
use crate::reduce::Reducer;
use crate::semantic::{EmbeddingAdapter, Embedder, VectorIndex};
use crate::terms::{TermIndex, Tokenizer};
use crate::topics::{Topic, TopicBuilder, TopicId, TopicSet, TopicShare};

/// Outcome of topic naming. Topics whose name could not be generated keep
/// their term-based name and are listed in `failures`.
#[derive(Debug, Clone, Serialize)]
pub struct NamingReport {
    pub topics: Vec<Topic>,
    pub renamed: Vec<TopicId>,
    pub failures: Vec<NamingFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NamingFailure {
    pub topic: TopicId,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Answer {
    Generated { text: String },
    /// The generator failed; retrieval results are still valid
    Unavailable { reason: String },
}

impl Answer {
    pub fn text(&self) -> Option<&str> {
        match self {
            Answer::Generated { text } => Some(text),
            Answer::Unavailable { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RagAnswer {
    pub answer: Answer,
    /// Retrieved documents, nearest first
    pub sources: Vec<Document>,
    /// Cosine distance of each source to the query
    pub distances: Vec<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DocumentSimilarity {
    pub id: DocumentId,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimilarityReport {
    /// Every document, by id
    pub scores: Vec<DocumentSimilarity>,
    /// Share of documents scoring at or above the threshold
    pub share: f64,
}

/// One point of the document map, the shape plotting layers consume.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MapPoint {
    pub id: DocumentId,
    pub x: f32,
    pub y: f32,
    pub topic: Option<TopicId>,
}

pub struct TopicModel {
    config: Config,
    adapter: EmbeddingAdapter,
    reducer: Reducer,
    kmeans: KMeans,
    tokenizer: Tokenizer,
    store: Option<DocumentStore>,
    term_index: TermIndex,
    topics: Option<TopicSet>,
    runs: u64,
    /// Pooled embedding per exact word list
    poles: HashMap<Vec<String>, Vec<f32>>,
}

impl TopicModel {
    pub fn new(config: Config, embedder: Arc<dyn Embedder>) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            adapter: EmbeddingAdapter::new(embedder, &config.embedding),
            reducer: Reducer::new(&config.reduction),
            kmeans: KMeans::new(&config.clustering),
            tokenizer: Tokenizer::new(&config.terms),
            config,
            store: None,
            term_index: TermIndex::default(),
            topics: None,
            runs: 0,
            poles: HashMap::new(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Embed, project and index `documents`, replacing any earlier corpus.
    ///
    /// All or nothing: on any error the previous corpus, topics and scores
    /// stay in place.
    pub fn fit(&mut self, documents: Vec<String>) -> Result<()> {
        if documents.is_empty() {
            return Err(TopicError::configuration("cannot fit an empty corpus"));
        }

        log::info!("Fitting {} documents with '{}'", documents.len(), self.adapter.model_name());
        let embeddings = self.adapter.embed(&documents)?;
        let mut store = DocumentStore::from_embedded(documents, embeddings)?;

        let coords = self.reducer.reduce(&store.embeddings())?;
        store.set_coords(&coords)?;

        let term_index = TermIndex::build(
            &store.texts(),
            &self.tokenizer,
            self.config.terms.top_terms_overall,
        );

        if let Err(e) = self.adapter.persist() {
            log::warn!("Could not save embedding cache: {}", e);
        }

        log::info!(
            "Fitted {} documents, dimension {}, vocabulary {}",
            store.len(),
            store.dimensions(),
            term_index.vocabulary().len()
        );

        self.store = Some(store);
        self.term_index = term_index;
        self.topics = None;
        Ok(())
    }

    pub fn is_fitted(&self) -> bool {
        self.store.is_some()
    }

    pub fn documents(&self) -> Result<&DocumentStore> {
        self.store
            .as_ref()
            .ok_or_else(|| TopicError::configuration("model is not fitted; call fit first"))
    }

    /// Latest topic set, if `get_topics` ran since the last fit.
    pub fn topics(&self) -> Option<&TopicSet> {
        self.topics.as_ref()
    }

    /// Cluster in the configured space.
    pub fn get_topics(&mut self, n_clusters: usize, min_count_terms: usize) -> Result<&TopicSet> {
        let space = self.config.clustering.space;
        self.get_topics_in(space, n_clusters, min_count_terms)
    }

    /// Cluster the corpus into `n_clusters` topics, replacing the previous
    /// topic set.
    pub fn get_topics_in(
        &mut self,
        space: ClusterSpace,
        n_clusters: usize,
        min_count_terms: usize,
    ) -> Result<&TopicSet> {
        let store = self.documents()?;
        let coords = store
            .coords()
            .ok_or_else(|| TopicError::Reduction("documents have no coordinates".to_string()))?;

        let reduced: Vec<Vec<f32>>;
        let points: Vec<&[f32]> = match space {
            ClusterSpace::Reduced => {
                reduced = coords.iter().map(|p| p.to_vec()).collect();
                reduced.iter().map(|p| p.as_slice()).collect()
            }
            ClusterSpace::Embedding => store.embeddings(),
        };

        let clustering = self.kmeans.cluster(&points, n_clusters)?;

        let run = self.runs + 1;
        let builder = TopicBuilder::new(&self.term_index, &self.config.terms);
        let set = TopicSet {
            run,
            n_clusters,
            space,
            min_count_terms,
            inertia: clustering.inertia,
            topics: builder.assemble(&clustering, &coords, min_count_terms, run),
        };
        let assignments = set.assignments(store.len());

        log::info!(
            "Topic run {}: {} topics in {} space (inertia {:.4})",
            run,
            set.len(),
            space,
            set.inertia
        );

        let store = self
            .store
            .as_mut()
            .ok_or_else(|| TopicError::configuration("model is not fitted; call fit first"))?;
        store.set_topics(&assignments)?;
        self.runs = run;
        Ok(self.topics.insert(set))
    }

    /// Ask `generator` for a name per topic. Failures keep the term-based
    /// name; topic membership and terms are never touched.
    pub fn get_clean_topic_name(&mut self, generator: Arc<dyn Generator>) -> Result<NamingReport> {
        let store = self.documents()?;
        let mut set = self
            .topics
            .clone()
            .ok_or_else(|| TopicError::configuration("no topics yet; call get_topics first"))?;

        let gen_config = &self.config.generation;
        let timeout = Some(Duration::from_secs(gen_config.timeout_secs));
        let mut renamed = Vec::new();
        let mut failures = Vec::new();

        for topic in set.topics.iter_mut() {
            let examples = closest_members(store, topic, gen_config.context_documents);
            let prompt = naming_prompt(&topic.terms, &examples, gen_config.max_name_words);

            let gen = Arc::clone(&generator);
            let reply = run_with_deadline("generation", timeout, move || gen.generate(&prompt));

            let reason = match reply {
                Ok(reply) => match clean_name(&reply, gen_config.max_name_words) {
                    Some(name) => {
                        topic.name = name;
                        renamed.push(topic.id);
                        continue;
                    }
                    None => "model returned an empty name".to_string(),
                },
                Err(e) => e.to_string(),
            };

            log::warn!("Keeping term-based name for topic {}: {}", topic.id, reason);
            failures.push(NamingFailure {
                topic: topic.id,
                reason,
            });
        }

        log::info!("Named {} of {} topics", renamed.len(), set.len());

        let topics = set.topics.clone();
        self.topics = Some(set);
        Ok(NamingReport {
            topics,
            renamed,
            failures,
        })
    }

    /// Project every document on two axes, optionally finding regions in
    /// the resulting plane.
    pub fn query_axis(&mut self, request: &AxisRequest) -> Result<AxisProjection> {
        let x = request.x_axis()?;
        let y = request.y_axis()?;
        let regions = request
            .clustering
            .then_some((request.n_clusters, request.min_count_terms));

        self.project(&x, Some(&y), regions, self.config.axis.explain)
    }

    /// Project every document on a single left/right axis.
    pub fn query_axis_1d(
        &mut self,
        left: Vec<String>,
        right: Vec<String>,
        explain: bool,
    ) -> Result<AxisProjection> {
        let x = AxisDefinition::new(left, right)?;
        self.project(&x, None, None, explain)
    }

    fn project(
        &mut self,
        x: &AxisDefinition,
        y: Option<&AxisDefinition>,
        regions: Option<(usize, usize)>,
        explain: bool,
    ) -> Result<AxisProjection> {
        self.documents()?;

        let mut axes = vec![x];
        axes.extend(y);
        let mut poles = self.resolve_poles(&axes)?.into_iter();
        let (Some(x_poles), y_poles) = (poles.next(), poles.next()) else {
            return Err(TopicError::configuration("axis poles could not be resolved"));
        };

        let store = self.documents()?;
        let run = self.runs + 1;
        let mut axis_config = self.config.axis.clone();
        axis_config.explain = explain;
        let scorer = AxisScorer::new(&axis_config, &self.config.terms, &self.term_index, &self.kmeans);
        let projection =
            scorer.project(&store.embeddings(), &x_poles, y_poles.as_ref(), regions, run)?;

        if let Some(store) = self.store.as_mut() {
            store.set_axis_scores(&projection.scores)?;
        }
        if projection.regions.is_some() {
            self.runs = run;
        }

        log::info!(
            "Axis query on {} documents ({} axes, regions: {})",
            projection.scores.len(),
            if y.is_some() { 2 } else { 1 },
            projection.regions.as_ref().map_or(0, |r| r.len())
        );
        Ok(projection)
    }

    /// Pole vectors for `axes`, embedding every uncached word set in one
    /// call.
    fn resolve_poles(&mut self, axes: &[&AxisDefinition]) -> Result<Vec<AxisPoles>> {
        let mut missing_words: Vec<String> = Vec::new();
        for axis in axes {
            for set in [&axis.negative, &axis.positive] {
                if self.poles.contains_key(set) {
                    continue;
                }
                for word in set {
                    if !missing_words.contains(word) {
                        missing_words.push(word.clone());
                    }
                }
            }
        }

        if !missing_words.is_empty() {
            let vectors = self.adapter.embed(&missing_words)?;
            let by_word: HashMap<&str, Vec<f32>> = missing_words
                .iter()
                .map(String::as_str)
                .zip(vectors)
                .collect();

            for axis in axes {
                for set in [&axis.negative, &axis.positive] {
                    if self.poles.contains_key(set) {
                        continue;
                    }
                    let members: Vec<Vec<f32>> = set
                        .iter()
                        .filter_map(|w| by_word.get(w.as_str()).cloned())
                        .collect();
                    let pooled = crate::axis::pool(&members)?;
                    self.poles.insert(set.clone(), pooled);
                }
            }
        }

        axes.iter()
            .map(|axis| {
                let pole = |set: &Vec<String>| {
                    self.poles.get(set).cloned().ok_or_else(|| {
                        TopicError::configuration(format!("no pole for word set {:?}", set))
                    })
                };
                Ok(AxisPoles {
                    negative: pole(&axis.negative)?,
                    positive: pole(&axis.positive)?,
                })
            })
            .collect()
    }

    /// Answer `query` from the `top_k` nearest documents. Generator failure
    /// yields [`Answer::Unavailable`] with the sources still filled in.
    pub fn rag_query(
        &mut self,
        query: &str,
        generator: Arc<dyn Generator>,
        top_k: usize,
    ) -> Result<RagAnswer> {
        if top_k == 0 {
            return Err(TopicError::configuration("top_k must be at least 1"));
        }
        if query.trim().is_empty() {
            return Err(TopicError::configuration("query is empty"));
        }
        self.documents()?;

        let query_vector = self.adapter.embed_one(query)?;
        let store = self.documents()?;
        let index = VectorIndex::from_vectors(store.dimensions(), store.embeddings())?;
        let neighbors = index.nearest(&query_vector, top_k)?;

        let sources: Vec<Document> = neighbors
            .iter()
            .filter_map(|n| store.get(n.id).cloned())
            .collect();
        let distances: Vec<f32> = neighbors.iter().map(|n| n.distance).collect();

        let context: Vec<&str> = sources.iter().map(|d| d.text.as_str()).collect();
        let prompt = rag_prompt(query, &context);
        let timeout = Some(Duration::from_secs(self.config.generation.timeout_secs));
        let answer = match run_with_deadline("generation", timeout, move || generator.generate(&prompt)) {
            Ok(text) if !text.trim().is_empty() => Answer::Generated {
                text: text.trim().to_string(),
            },
            Ok(_) => Answer::Unavailable {
                reason: "model returned an empty answer".to_string(),
            },
            Err(e) => {
                log::warn!("Answer unavailable: {}", e);
                Answer::Unavailable {
                    reason: e.to_string(),
                }
            }
        };

        Ok(RagAnswer {
            answer,
            sources,
            distances,
        })
    }

    /// Cosine similarity of every document to `query`.
    pub fn query_similarity(&mut self, query: &str, min_score: f32) -> Result<SimilarityReport> {
        if query.trim().is_empty() {
            return Err(TopicError::configuration("query is empty"));
        }
        self.documents()?;

        let query_vector = self.adapter.embed_one(query)?;
        let store = self.documents()?;
        let index = VectorIndex::from_vectors(store.dimensions(), store.embeddings())?;
        let similarities = index.similarities(&query_vector)?;

        let above = similarities.iter().filter(|s| **s >= min_score).count();
        Ok(SimilarityReport {
            share: above as f64 / similarities.len() as f64,
            scores: similarities
                .into_iter()
                .enumerate()
                .map(|(i, score)| DocumentSimilarity {
                    id: i as DocumentId,
                    score,
                })
                .collect(),
        })
    }

    pub fn topic_distribution(&self) -> Result<Vec<TopicShare>> {
        self.topics
            .as_ref()
            .map(|t| t.distribution())
            .ok_or_else(|| TopicError::configuration("no topics yet; call get_topics first"))
    }

    /// Coordinates and topic of every document.
    pub fn document_map(&self) -> Result<Vec<MapPoint>> {
        let store = self.documents()?;
        Ok(store
            .iter()
            .map(|d| {
                let coord = d.coord.unwrap_or_default();
                MapPoint {
                    id: d.id,
                    x: coord.x,
                    y: coord.y,
                    topic: d.topic,
                }
            })
            .collect())
    }
}

/// Up to `limit` member texts nearest to the topic centroid, ties by id.
fn closest_members<'a>(store: &'a DocumentStore, topic: &Topic, limit: usize) -> Vec<&'a str> {
    let mut members: Vec<(f32, &Document)> = topic
        .members
        .iter()
        .filter_map(|id| store.get(*id))
        .map(|d| {
            let p = d.coord.unwrap_or_default();
            (distance(p, topic.centroid), d)
        })
        .collect();
    members.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.id.cmp(&b.1.id)));
    members
        .into_iter()
        .take(limit)
        .map(|(_, d)| d.text.as_str())
        .collect()
}

fn distance(a: Point2, b: Point2) -> f32 {
    ((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt()
}
