//! Loading corpora from disk.
//!
//! `.csv` files are read with a header row and one column taken as the
//! document text; any other file is one document per non-empty line.

use std::path::Path;

use rand::rngs::StdRng;
use rand::SeedableRng;

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("column '{column}' not found, available: {available}")]
    MissingColumn { column: String, available: String },

    #[error("no documents in {0}")]
    Empty(String),
}

/// Read the documents of `path`, skipping blank entries.
pub fn load_documents(path: &Path, column: &str) -> Result<Vec<String>, DatasetError> {
    let is_csv = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));

    let documents = if is_csv {
        load_csv(path, column)?
    } else {
        let content = std::fs::read_to_string(path).map_err(|source| DatasetError::Io {
            path: path.display().to_string(),
            source,
        })?;
        content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect()
    };

    if documents.is_empty() {
        return Err(DatasetError::Empty(path.display().to_string()));
    }
    log::info!("Loaded {} documents from {}", documents.len(), path.display());
    Ok(documents)
}

fn load_csv(path: &Path, column: &str) -> Result<Vec<String>, DatasetError> {
    let mut csv_reader = csv::Reader::from_path(path)?;
    let headers = csv_reader.headers()?.clone();
    let index = headers
        .iter()
        .position(|h| h == column)
        .ok_or_else(|| DatasetError::MissingColumn {
            column: column.to_string(),
            available: headers.iter().collect::<Vec<_>>().join(", "),
        })?;

    let mut documents = Vec::new();
    let mut skipped = 0usize;
    for record in csv_reader.records() {
        let record = record?;
        match record.get(index).map(str::trim) {
            Some(text) if !text.is_empty() => documents.push(text.to_string()),
            _ => skipped += 1,
        }
    }
    if skipped > 0 {
        log::debug!("Skipped {} rows with empty '{}'", skipped, column);
    }
    Ok(documents)
}

/// Keep a seeded random subset of `size` documents, in their original order.
pub fn sample(documents: Vec<String>, size: usize, seed: u64) -> Vec<String> {
    if size >= documents.len() {
        return documents;
    }
    let mut rng = StdRng::seed_from_u64(seed);
    let mut keep = rand::seq::index::sample(&mut rng, documents.len(), size).into_vec();
    keep.sort_unstable();

    let mut keep = keep.into_iter().peekable();
    documents
        .into_iter()
        .enumerate()
        .filter_map(|(i, doc)| {
            if keep.peek() == Some(&i) {
                keep.next();
                Some(doc)
            } else {
                None
            }
        })
        .collect()
}
