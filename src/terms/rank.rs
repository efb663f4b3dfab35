//! Discriminative term ranking.
//!
//! A term scores high in a group of documents when it is frequent inside the
//! group and rare across the corpus:
//!
//! `score(t, c) = count_c(t) / total_c * (ln((1 + N) / (1 + df(t))) + 1)`

use std::cmp::Ordering;
use std::collections::HashMap;

use super::tokenize::Tokenizer;
use super::TermScore;
use crate::config::TermsConfig;

/// Corpus term statistics, built once per fit.
#[derive(Debug, Clone, Default)]
pub struct TermIndex {
    /// Term counts per document, restricted to the vocabulary
    doc_terms: Vec<HashMap<String, usize>>,
    document_frequency: HashMap<String, usize>,
    /// Vocabulary ordered by corpus frequency, ties by term
    vocabulary: Vec<String>,
}

impl TermIndex {
    /// Index `texts`, keeping the `top_terms` most frequent terms.
    pub fn build(texts: &[&str], tokenizer: &Tokenizer, top_terms: usize) -> Self {
        let raw: Vec<HashMap<String, usize>> = texts
            .iter()
            .map(|text| {
                let mut counts = HashMap::new();
                for term in tokenizer.terms(text) {
                    *counts.entry(term).or_insert(0) += 1;
                }
                counts
            })
            .collect();

        let mut totals: HashMap<&str, usize> = HashMap::new();
        for counts in &raw {
            for (term, count) in counts {
                *totals.entry(term.as_str()).or_insert(0) += count;
            }
        }

        let mut ranked: Vec<(&str, usize)> = totals.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        let vocabulary: Vec<String> = ranked
            .into_iter()
            .take(top_terms)
            .map(|(term, _)| term.to_string())
            .collect();

        let keep: HashMap<&str, ()> = vocabulary.iter().map(|t| (t.as_str(), ())).collect();
        let doc_terms: Vec<HashMap<String, usize>> = raw
            .iter()
            .map(|counts| {
                counts
                    .iter()
                    .filter(|(term, _)| keep.contains_key(term.as_str()))
                    .map(|(term, count)| (term.clone(), *count))
                    .collect()
            })
            .collect();

        let mut document_frequency = HashMap::new();
        for counts in &doc_terms {
            for term in counts.keys() {
                *document_frequency.entry(term.clone()).or_insert(0) += 1;
            }
        }

        log::debug!(
            "Indexed {} documents, vocabulary of {} terms",
            texts.len(),
            vocabulary.len()
        );

        Self {
            doc_terms,
            document_frequency,
            vocabulary,
        }
    }

    pub fn n_documents(&self) -> usize {
        self.doc_terms.len()
    }

    pub fn vocabulary(&self) -> &[String] {
        &self.vocabulary
    }

    /// Whether `term` occurs in document `doc`.
    pub fn contains(&self, doc: usize, term: &str) -> bool {
        self.doc_terms
            .get(doc)
            .is_some_and(|counts| counts.contains_key(term))
    }

    /// The `limit` terms found in the most documents, ties by term.
    pub fn most_widespread(&self, limit: usize) -> Vec<&str> {
        let mut terms: Vec<(&str, usize)> = self
            .document_frequency
            .iter()
            .map(|(term, df)| (term.as_str(), *df))
            .collect();
        terms.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        terms.into_iter().take(limit).map(|(term, _)| term).collect()
    }

    /// Rank the terms of the documents in `members`.
    ///
    /// Terms seen fewer than `min_count` times inside the group are dropped;
    /// at most `limit` terms are returned. An empty group yields no terms.
    pub fn rank(&self, members: &[usize], min_count: usize, limit: usize) -> Vec<TermScore> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        let mut total = 0usize;
        for &doc in members {
            let Some(doc_counts) = self.doc_terms.get(doc) else {
                continue;
            };
            for (term, count) in doc_counts {
                *counts.entry(term.as_str()).or_insert(0) += count;
                total += count;
            }
        }
        if total == 0 {
            return vec![];
        }

        let n = self.n_documents() as f64;
        let mut scored: Vec<(&str, f64)> = counts
            .into_iter()
            .filter(|(_, count)| *count >= min_count)
            .map(|(term, count)| {
                let df = self.document_frequency.get(term).copied().unwrap_or(0) as f64;
                let idf = ((1.0 + n) / (1.0 + df)).ln() + 1.0;
                (term, count as f64 / total as f64 * idf)
            })
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(b.0))
        });

        scored
            .into_iter()
            .take(limit)
            .map(|(term, score)| TermScore {
                term: term.to_string(),
                score,
            })
            .collect()
    }
}

/// Rank the terms of `documents` taken as one group, with corpus statistics
/// drawn from those same documents.
pub fn rank_terms(documents: &[&str], min_count: usize) -> Vec<TermScore> {
    let config = TermsConfig::default();
    let index = TermIndex::build(documents, &Tokenizer::new(&config), config.top_terms_overall);
    let all: Vec<usize> = (0..documents.len()).collect();
    index.rank(&all, min_count, usize::MAX)
}
