use std::collections::HashSet;

use once_cell::sync::Lazy;

use crate::config::TermsConfig;

/// Common English words that carry no topical signal.
const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "also", "am", "an", "and",
    "any", "are", "as", "at", "be", "because", "been", "before", "being", "below",
    "between", "both", "but", "by", "can", "could", "did", "do", "does", "doing", "down",
    "during", "each", "even", "few", "for", "from", "further", "had", "has", "have",
    "having", "he", "her", "here", "hers", "herself", "him", "himself", "his", "how", "i",
    "if", "in", "into", "is", "it", "its", "itself", "just", "me", "more", "most", "much",
    "my", "myself", "no", "nor", "not", "now", "of", "off", "on", "once", "only", "or",
    "other", "our", "ours", "ourselves", "out", "over", "own", "same", "she", "should",
    "so", "some", "such", "than", "that", "the", "their", "theirs", "them", "themselves",
    "then", "there", "these", "they", "this", "those", "through", "to", "too", "under",
    "until", "up", "us", "very", "was", "we", "were", "what", "when", "where", "which",
    "while", "who", "whom", "why", "will", "with", "would", "you", "your", "yours",
    "yourself", "yourselves",
];

static STOP_WORD_SET: Lazy<HashSet<&'static str>> =
    Lazy::new(|| STOP_WORDS.iter().copied().collect());

/// Splits text into normalized terms: lowercase unigrams with stop words,
/// short tokens and numbers removed, plus bigrams of adjacent survivors.
#[derive(Debug, Clone)]
pub struct Tokenizer {
    min_token_len: usize,
    ngram_max: usize,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new(&TermsConfig::default())
    }
}

impl Tokenizer {
    pub fn new(config: &TermsConfig) -> Self {
        Self {
            min_token_len: config.min_token_len,
            ngram_max: config.ngram_max,
        }
    }

    pub fn tokens(&self, text: &str) -> Vec<String> {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_lowercase())
            .filter(|s| {
                s.chars().count() >= self.min_token_len
                    && !s.chars().all(|c| c.is_numeric())
                    && !STOP_WORD_SET.contains(s.as_str())
            })
            .collect()
    }

    /// Unigrams followed by bigrams, in text order.
    pub fn terms(&self, text: &str) -> Vec<String> {
        let tokens = self.tokens(text);
        if self.ngram_max < 2 || tokens.len() < 2 {
            return tokens;
        }

        let bigrams: Vec<String> = tokens
            .windows(2)
            .map(|pair| format!("{} {}", pair[0], pair[1]))
            .collect();
        let mut terms = tokens;
        terms.extend(bigrams);
        terms
    }
}
