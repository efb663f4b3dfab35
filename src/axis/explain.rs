//! Which terms go with which end of an axis.
//!
//! For every candidate term, the least-squares slope of axis score on term
//! presence (0/1) is `cov(presence, score) / var(presence)`, i.e. the mean
//! score of documents containing the term minus the mean of those that do
//! not. Terms with the largest positive and negative slopes are reported.

use std::cmp::Ordering;

use serde::Serialize;

use crate::terms::TermIndex;

#[derive(Debug, thiserror::Error)]
pub enum ExplainError {
    #[error("{scores} axis scores for {documents} documents")]
    Misaligned { scores: usize, documents: usize },

    #[error("axis scores have no variance")]
    NoVariance,

    #[error("no term splits the corpus")]
    EmptyVocabulary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TermEffect {
    pub term: String,
    pub coefficient: f64,
}

/// Terms most associated with each end of one axis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AxisTerms {
    /// Strongest first
    pub positive: Vec<TermEffect>,
    pub negative: Vec<TermEffect>,
}

/// Explain `scores` (one per indexed document) with the `vocabulary` most
/// widespread terms, keeping `top` terms per end.
pub fn explain(
    index: &TermIndex,
    scores: &[f32],
    vocabulary: usize,
    top: usize,
) -> Result<AxisTerms, ExplainError> {
    let n = index.n_documents();
    if scores.len() != n {
        return Err(ExplainError::Misaligned {
            scores: scores.len(),
            documents: n,
        });
    }

    let mean = scores.iter().map(|s| *s as f64).sum::<f64>() / n.max(1) as f64;
    let spread = scores
        .iter()
        .map(|s| (*s as f64 - mean).powi(2))
        .sum::<f64>();
    if spread <= f64::EPSILON {
        return Err(ExplainError::NoVariance);
    }

    let effects: Vec<TermEffect> = index
        .most_widespread(vocabulary)
        .into_iter()
        .filter_map(|term| {
            let (mut with, mut with_sum, mut without_sum) = (0usize, 0.0f64, 0.0f64);
            for (doc, score) in scores.iter().enumerate() {
                if index.contains(doc, term) {
                    with += 1;
                    with_sum += *score as f64;
                } else {
                    without_sum += *score as f64;
                }
            }
            // Present everywhere or nowhere: slope undefined
            if with == 0 || with == n {
                return None;
            }
            let coefficient = with_sum / with as f64 - without_sum / (n - with) as f64;
            Some(TermEffect {
                term: term.to_string(),
                coefficient,
            })
        })
        .collect();

    if effects.is_empty() {
        return Err(ExplainError::EmptyVocabulary);
    }

    let (mut positive, mut negative): (Vec<TermEffect>, Vec<TermEffect>) = effects
        .into_iter()
        .filter(|e| e.coefficient != 0.0)
        .partition(|e| e.coefficient > 0.0);

    // Strongest first at each end, ties by term
    sort_by_strength(&mut positive);
    sort_by_strength(&mut negative);
    positive.truncate(top);
    negative.truncate(top);

    Ok(AxisTerms { positive, negative })
}

fn sort_by_strength(effects: &mut [TermEffect]) {
    effects.sort_by(|a, b| {
        b.coefficient
            .abs()
            .partial_cmp(&a.coefficient.abs())
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.term.cmp(&b.term))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terms::Tokenizer;

    fn index(texts: &[&str]) -> TermIndex {
        TermIndex::build(texts, &Tokenizer::default(), 1000)
    }

    #[test]
    fn test_terms_follow_score_sign() {
        let index = index(&[
            "rockets launch orbit",
            "rockets orbit moon",
            "bread flour oven",
            "bread oven yeast",
        ]);
        let terms = explain(&index, &[1.0, 0.8, -0.9, -1.0], 50, 2).unwrap();

        let positive: Vec<&str> = terms.positive.iter().map(|e| e.term.as_str()).collect();
        let negative: Vec<&str> = terms.negative.iter().map(|e| e.term.as_str()).collect();
        assert_eq!(positive, vec!["orbit", "rockets"]);
        assert_eq!(negative, vec!["bread", "oven"]);
        assert!(terms.negative[0].coefficient < 0.0);
    }

    #[test]
    fn test_flat_scores_fail() {
        let index = index(&["alpha beta", "gamma delta"]);
        assert!(matches!(
            explain(&index, &[0.5, 0.5], 50, 5),
            Err(ExplainError::NoVariance)
        ));
    }

    #[test]
    fn test_no_splitting_term() {
        let index = index(&["same words", "same words"]);
        assert!(matches!(
            explain(&index, &[1.0, -1.0], 50, 5),
            Err(ExplainError::EmptyVocabulary)
        ));
    }

    #[test]
    fn test_misaligned_scores() {
        let index = index(&["one doc"]);
        assert!(matches!(
            explain(&index, &[1.0, 2.0], 50, 5),
            Err(ExplainError::Misaligned { .. })
        ));
    }
}
