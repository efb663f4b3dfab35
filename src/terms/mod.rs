//! Term extraction and ranking, independent of the embedding model.

pub mod rank;
pub mod tokenize;

pub use rank::{rank_terms, TermIndex};
pub use tokenize::Tokenizer;

use serde::{Deserialize, Serialize};

/// A representative term with its relevance score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermScore {
    pub term: String,
    pub score: f64,
}
