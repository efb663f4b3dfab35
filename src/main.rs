use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use homedir::my_home;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use topica::axis::AxisRequest;
use topica::{dataset, ClusterSpace, Config, Embedder, OpenAiGenerator, TopicModel};

mod cli;

use cli::{parse_words, Command};

/// Seed for `--sample`
const SAMPLE_SEED: u64 = 42;

fn default_config_path() -> PathBuf {
    match my_home() {
        Ok(Some(home)) => home.join(".config").join("topica").join("config.yaml"),
        _ => PathBuf::from("config.yaml"),
    }
}

#[cfg(feature = "local-embeddings")]
fn embedder(config: &Config) -> anyhow::Result<Arc<dyn Embedder>> {
    let model = topica::semantic::FastEmbedder::new(&config.embedding)?;
    Ok(Arc::new(model))
}

#[cfg(not(feature = "local-embeddings"))]
fn embedder(_config: &Config) -> anyhow::Result<Arc<dyn Embedder>> {
    anyhow::bail!("built without the local-embeddings feature; no embedding backend available")
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = cli::Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_path = args.config.clone().unwrap_or_else(default_config_path);
    let config = Config::load_with(&config_path)
        .with_context(|| format!("loading config {}", config_path.display()))?;

    let input = args.command.input();
    let mut documents = dataset::load_documents(&input.input, &input.column)?;
    if let Some(size) = input.sample {
        documents = dataset::sample(documents, size, SAMPLE_SEED);
    }

    let mut model = TopicModel::new(config.clone(), embedder(&config)?)?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner} {msg} [{elapsed}]")?);
    spinner.set_message(format!("Fitting {} documents", documents.len()));
    spinner.enable_steady_tick(Duration::from_millis(100));
    let fitted = model.fit(documents);
    spinner.finish_and_clear();
    fitted?;

    match args.command {
        Command::Topics {
            n_clusters,
            min_count,
            space,
            ..
        } => {
            let space = match space {
                Some(space) => space.parse::<ClusterSpace>()?,
                None => config.clustering.space,
            };
            let topics = model.get_topics_in(space, n_clusters, min_count)?;
            print_json(topics)?;
        }

        Command::NameTopics {
            n_clusters,
            min_count,
            ..
        } => {
            model.get_topics(n_clusters, min_count)?;
            let generator = Arc::new(OpenAiGenerator::new(&config.generation)?);
            let report = model.get_clean_topic_name(generator)?;
            print_json(&report)?;
        }

        Command::Axis {
            x_left,
            x_right,
            y_top,
            y_bottom,
            no_clustering,
            n_clusters,
            min_count,
            ..
        } => {
            let request = AxisRequest {
                x_left: parse_words(&x_left),
                x_right: parse_words(&x_right),
                y_top: parse_words(&y_top),
                y_bottom: parse_words(&y_bottom),
                clustering: !no_clustering,
                n_clusters,
                min_count_terms: min_count,
            };
            let projection = model.query_axis(&request)?;
            print_json(&projection)?;
        }

        Command::Axis1d {
            left,
            right,
            no_explain,
            ..
        } => {
            let projection =
                model.query_axis_1d(parse_words(&left), parse_words(&right), !no_explain)?;
            print_json(&projection)?;
        }

        Command::Query {
            query, min_score, ..
        } => {
            let report = model.query_similarity(&query, min_score)?;
            print_json(&report)?;
        }

        Command::Rag { query, top_k, .. } => {
            let top_k = top_k.unwrap_or(config.retrieval.top_k);
            let generator = Arc::new(OpenAiGenerator::new(&config.generation)?);
            let answer = model.rag_query(&query, generator, top_k)?;
            if answer.answer.text().is_none() {
                tracing::warn!("The model could not answer; printing sources only");
            }
            print_json(&answer)?;
        }
    }

    Ok(())
}
