use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Config file, created with defaults when missing
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct InputArgs {
    /// CSV file, or any text file with one document per line
    #[clap(short, long)]
    pub input: PathBuf,

    /// CSV column holding the document text
    #[clap(long, default_value = "text")]
    pub column: String,

    /// Fit on a seeded random sample of this many documents
    #[clap(long)]
    pub sample: Option<usize>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Cluster documents into topics
    Topics {
        #[command(flatten)]
        input: InputArgs,

        /// Number of topics
        #[clap(short = 'k', long, default_value = "10")]
        n_clusters: usize,

        /// Minimum occurrences of a term inside a topic
        #[clap(long, default_value = "1")]
        min_count: usize,

        /// Cluster on "reduced" coordinates or full "embedding" vectors
        #[clap(long)]
        space: Option<String>,
    },
    /// Cluster documents, then name topics with the generative model
    NameTopics {
        #[command(flatten)]
        input: InputArgs,

        #[clap(short = 'k', long, default_value = "10")]
        n_clusters: usize,

        #[clap(long, default_value = "1")]
        min_count: usize,
    },
    /// Place documents on two semantic axes
    Axis {
        #[command(flatten)]
        input: InputArgs,

        /// Comma-separated words for the left end of the x axis
        #[clap(long, default_value = "past")]
        x_left: String,

        #[clap(long, default_value = "future")]
        x_right: String,

        #[clap(long, default_value = "men")]
        y_top: String,

        #[clap(long, default_value = "women")]
        y_bottom: String,

        /// Skip clustering in axis space
        #[clap(long, default_value = "false")]
        no_clustering: bool,

        #[clap(short = 'k', long, default_value = "5")]
        n_clusters: usize,

        #[clap(long, default_value = "1")]
        min_count: usize,
    },
    /// Place documents on one left/right axis
    Axis1d {
        #[command(flatten)]
        input: InputArgs,

        #[clap(long)]
        left: String,

        #[clap(long)]
        right: String,

        /// Skip the term explanation
        #[clap(long, default_value = "false")]
        no_explain: bool,
    },
    /// Similarity of every document to a query
    Query {
        #[command(flatten)]
        input: InputArgs,

        #[clap(short, long)]
        query: String,

        /// Threshold for the reported share of matching documents
        #[clap(long, default_value = "0.5")]
        min_score: f32,
    },
    /// Answer a question from the nearest documents
    Rag {
        #[command(flatten)]
        input: InputArgs,

        #[clap(short, long)]
        query: String,

        /// Number of documents given to the model
        #[clap(long)]
        top_k: Option<usize>,
    },
}

impl Command {
    pub fn input(&self) -> &InputArgs {
        match self {
            Command::Topics { input, .. }
            | Command::NameTopics { input, .. }
            | Command::Axis { input, .. }
            | Command::Axis1d { input, .. }
            | Command::Query { input, .. }
            | Command::Rag { input, .. } => input,
        }
    }
}

/// Split a comma-separated word list.
pub fn parse_words(words: &str) -> Vec<String> {
    words
        .split(',')
        .map(str::trim)
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}
