//! Generative-model collaborator: topic naming and grounded answers.

use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};

use crate::config::GenerationConfig;
use crate::terms::TermScore;

/// "Name:", "Topic name -", "Title:" and similar lead-ins models like to add
static LABEL_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(topic\s+name|topic|name|title|label)\s*[:\-]\s*").unwrap());

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("API key not found in environment variable {0}")]
    MissingApiKey(String),

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("endpoint returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("model returned an empty reply")]
    Empty,

    #[error("{0}")]
    Failed(String),
}

/// Anything that turns a prompt into text.
pub trait Generator: Send + Sync {
    fn generate(&self, prompt: &str) -> Result<String, GenerationError>;

    fn name(&self) -> &str {
        "generator"
    }
}

/// OpenAI-compatible chat completions backend.
pub struct OpenAiGenerator {
    client: reqwest::blocking::Client,
    endpoint: String,
    model: String,
    api_key: String,
    temperature: f32,
}

impl OpenAiGenerator {
    /// Build a client from config; the API key is read from the configured
    /// environment variable.
    pub fn new(config: &GenerationConfig) -> Result<Self, GenerationError> {
        let api_key = std::env::var(&config.api_key_env)
            .map_err(|_| GenerationError::MissingApiKey(config.api_key_env.clone()))?;

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key,
            temperature: config.temperature,
        })
    }
}

impl Generator for OpenAiGenerator {
    fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        log::debug!("Requesting completion from {} ({})", self.endpoint, self.model);

        let response = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&json!({
                "model": self.model,
                "temperature": self.temperature,
                "messages": [{ "role": "user", "content": prompt }],
            }))
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = response.json()?;
        let content = body
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .ok_or_else(|| GenerationError::Malformed("no choices[0].message.content".to_string()))?;

        if content.trim().is_empty() {
            return Err(GenerationError::Empty);
        }
        Ok(content.to_string())
    }

    fn name(&self) -> &str {
        &self.model
    }
}

/// Prompt asking for a short topic name from its terms and sample documents.
pub fn naming_prompt(terms: &[TermScore], documents: &[&str], max_words: usize) -> String {
    let keywords = terms
        .iter()
        .map(|t| t.term.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    let mut prompt = format!(
        "The following keywords and documents describe one topic of a corpus.\n\n\
         Keywords: {}\n\nDocuments:\n",
        keywords
    );
    for doc in documents {
        prompt.push_str(&format!("- {}\n", doc.replace('\n', " ")));
    }
    prompt.push_str(&format!(
        "\nGive a name for this topic of at most {} words. Reply with the name only.",
        max_words
    ));
    prompt
}

/// Prompt answering `question` from numbered context documents.
pub fn rag_prompt(question: &str, sources: &[&str]) -> String {
    let mut prompt = String::from(
        "Answer the question using only the context below. \
         If the context does not contain the answer, say so.\n\nContext:\n",
    );
    for (i, doc) in sources.iter().enumerate() {
        prompt.push_str(&format!("[{}] {}\n", i + 1, doc.replace('\n', " ")));
    }
    prompt.push_str(&format!("\nQuestion: {}\nAnswer:", question));
    prompt
}

/// Reduce a model reply to a usable topic name, `None` if nothing is left.
pub fn clean_name(reply: &str, max_words: usize) -> Option<String> {
    let line = reply.lines().map(str::trim).find(|l| !l.is_empty())?;
    let line = LABEL_PREFIX.replace(line, "");
    let line = line
        .trim_matches(|c: char| matches!(c, '"' | '\'' | '`' | '*' | '#') || c.is_whitespace())
        .trim_end_matches(|c: char| matches!(c, '.' | ',' | ';' | ':' | '!'));

    let name = line
        .split_whitespace()
        .take(max_words)
        .collect::<Vec<_>>()
        .join(" ");

    (!name.is_empty()).then_some(name)
}
