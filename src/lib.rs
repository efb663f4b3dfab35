//! Topic discovery and semantic projection over free-text corpora.
//!
//! Documents are embedded, projected to 2-D, clustered into topics with
//! ranked terms, and can be placed on semantic axes defined by opposing word
//! sets or queried through retrieval-augmented generation. A
//! [`TopicModel`] session owns all state for one corpus.

pub mod axis;
pub mod cluster;
pub mod config;
pub mod dataset;
pub mod deadline;
pub mod document;
pub mod error;
pub mod generate;
pub mod reduce;
pub mod semantic;
pub mod session;
pub mod terms;
pub mod topics;

#[cfg(test)]
mod tests;

pub use axis::{AxisProjection, AxisRequest};
pub use cluster::ClusterSpace;
pub use config::Config;
pub use document::{Document, DocumentId, DocumentStore};
pub use error::{Result, TopicError};
pub use generate::{Generator, OpenAiGenerator};
pub use semantic::Embedder;
pub use session::{Answer, NamingReport, RagAnswer, TopicModel};
pub use topics::{Topic, TopicId, TopicSet};
