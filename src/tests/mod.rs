//! Scenario tests across the whole pipeline, driven by deterministic
//! in-process doubles for the embedding and generative models.

mod axis;
mod pipeline;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::Config;
use crate::generate::{GenerationError, Generator};
use crate::semantic::{Embedder, EmbeddingError};
use crate::session::TopicModel;

pub const THEMES: [[&str; 5]; 10] = [
    ["ocean", "wave", "tide", "coral", "reef"],
    ["rocket", "orbit", "launch", "mars", "comet"],
    ["bread", "oven", "flour", "yeast", "crust"],
    ["guitar", "chord", "melody", "drum", "rhythm"],
    ["forest", "pine", "moss", "fern", "trail"],
    ["stock", "market", "bond", "equity", "trader"],
    ["soccer", "goal", "striker", "league", "pitch"],
    ["virus", "vaccine", "immune", "cell", "fever"],
    ["castle", "knight", "sword", "throne", "siege"],
    ["python", "compiler", "syntax", "kernel", "runtime"],
];

pub const AXIS_WORDS: [&str; 4] = ["past", "future", "men", "women"];

/// Bag-of-words embedder over a fixed lexicon: one dimension per known
/// word, one shared bucket for unknown words, and a small constant so no
/// vector is ever zero.
pub struct LexiconEmbedder {
    name: String,
    positions: HashMap<String, usize>,
    dimensions: usize,
    calls: AtomicUsize,
    slow: AtomicBool,
    delay: Duration,
}

impl LexiconEmbedder {
    pub fn new() -> Self {
        Self::named("lexicon-test")
    }

    pub fn named(name: &str) -> Self {
        let mut positions = HashMap::new();
        let words = THEMES.iter().flatten().chain(AXIS_WORDS.iter());
        for (i, word) in words.enumerate() {
            positions.insert(word.to_string(), i + 2);
        }
        let dimensions = positions.len() + 2;
        Self {
            name: name.to_string(),
            positions,
            dimensions,
            calls: AtomicUsize::new(0),
            slow: AtomicBool::new(false),
            delay: Duration::from_millis(1500),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Make every following call outlast a one-second deadline.
    pub fn set_slow(&self, slow: bool) {
        self.slow.store(slow, Ordering::SeqCst);
    }

    pub fn vector(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dimensions];
        v[0] = 0.1;
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let slot = self.positions.get(&token.to_lowercase()).copied().unwrap_or(1);
            v[slot] += 1.0;
        }
        v
    }
}

impl Embedder for LexiconEmbedder {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.slow.load(Ordering::SeqCst) {
            std::thread::sleep(self.delay);
        }
        Ok(texts.iter().map(|t| self.vector(t)).collect())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Returns one vector too few.
pub struct ShortEmbedder;

impl Embedder for ShortEmbedder {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().skip(1).map(|_| vec![1.0, 0.0]).collect())
    }

    fn name(&self) -> &str {
        "short-test"
    }
}

/// Replays scripted replies in order, repeating the last one.
pub struct ScriptedGenerator {
    replies: Vec<Result<String, String>>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new(replies: Vec<Result<&str, &str>>) -> Self {
        Self {
            replies: replies
                .into_iter()
                .map(|r| r.map(str::to_string).map_err(str::to_string))
                .collect(),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn always(reply: &str) -> Self {
        Self::new(vec![Ok(reply)])
    }

    pub fn failing(reason: &str) -> Self {
        Self::new(vec![Err(reason)])
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl Generator for ScriptedGenerator {
    fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = self
            .replies
            .get(call)
            .or_else(|| self.replies.last())
            .cloned()
            .unwrap_or_else(|| Err("no reply scripted".to_string()));
        reply.map_err(GenerationError::Failed)
    }
}

/// Sleeps past a one-second deadline before answering.
pub struct SlowGenerator;

impl Generator for SlowGenerator {
    fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
        std::thread::sleep(Duration::from_millis(1500));
        Ok("too late".to_string())
    }
}

/// Config with the on-disk embedding cache disabled.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.embedding.cache = false;
    config
}

/// `n` short documents cycling through the themes; document `i` belongs to
/// theme `i % 10`.
pub fn corpus(n: usize) -> Vec<String> {
    (0..n)
        .map(|i| {
            let theme = &THEMES[i % THEMES.len()];
            let j = i / THEMES.len();
            format!(
                "The {} and the {} near a {}",
                theme[j % 5],
                theme[(j + 1) % 5],
                theme[(j + 2) % 5]
            )
        })
        .collect()
}

pub fn fitted_model(n: usize) -> (TopicModel, Arc<LexiconEmbedder>) {
    let embedder = Arc::new(LexiconEmbedder::new());
    let mut model = TopicModel::new(test_config(), embedder.clone()).unwrap();
    model.fit(corpus(n)).unwrap();
    (model, embedder)
}
