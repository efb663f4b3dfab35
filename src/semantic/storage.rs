//! On-disk cache of document embeddings.
//!
//! File format: embeddings-<model>.bin
//!
//! Header (47 bytes):
//! - version: u8 (1)
//! - model_id: [u8; 32] (SHA256 hash of model name)
//! - dimensions: u16 (little-endian)
//! - entry_count: u64 (little-endian)
//! - checksum: u32 (CRC32 of header fields before checksum)
//!
//! Entries (repeated):
//! - content_hash: u64 (little-endian)
//! - embedding: [f32; dimensions] (little-endian)

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

/// Current file format version
const FORMAT_VERSION: u8 = 1;

/// Header size in bytes: version(1) + model_id(32) + dimensions(2) + entry_count(8) + checksum(4)
const HEADER_SIZE: usize = 47;

/// Errors that can occur during cache I/O.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Version mismatch: file version {0}, supported version {1}")]
    VersionMismatch(u8, u8),

    #[error("Model mismatch: file uses different model")]
    ModelMismatch,

    #[error("Checksum mismatch: file may be corrupted")]
    ChecksumMismatch,

    #[error("Dimension {0} does not fit the file format")]
    DimensionOverflow(usize),

    #[error("Header claims {claimed} entries, file holds at most {fits}")]
    Corrupt { claimed: u64, fits: u64 },
}

/// Embeddings keyed by content hash, backed by one file per model.
pub struct EmbeddingCache {
    path: PathBuf,
    model_id: [u8; 32],
    dimensions: Option<usize>,
    entries: HashMap<u64, Vec<f32>>,
    dirty: bool,
}

impl EmbeddingCache {
    /// Open the cache at `path`, starting empty when the file is missing or
    /// unusable. Problems with an existing file are logged, never fatal.
    pub fn open(path: PathBuf, model_name: &str) -> Self {
        let model_id = model_id_hash(model_name);
        let mut cache = Self {
            path,
            model_id,
            dimensions: None,
            entries: HashMap::new(),
            dirty: false,
        };

        if cache.path.exists() {
            match cache.load() {
                Ok(count) => log::info!("Loaded {} cached embeddings from {}", count, cache.path.display()),
                Err(CacheError::ModelMismatch) => {
                    log::warn!("Embedding cache belongs to another model, starting fresh")
                }
                Err(e) => log::warn!("Ignoring embedding cache {}: {}", cache.path.display(), e),
            }
        }

        cache
    }

    /// Get the storage file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Dimension of cached vectors, known once anything is cached.
    pub fn dimensions(&self) -> Option<usize> {
        self.dimensions
    }

    pub fn contains(&self, hash: u64) -> bool {
        self.entries.contains_key(&hash)
    }

    pub fn get(&self, hash: u64) -> Option<&[f32]> {
        self.entries.get(&hash).map(|v| v.as_slice())
    }

    /// Insert a vector. Vectors of a different dimension than the cache are
    /// skipped; the adapter has already rejected those.
    pub fn insert(&mut self, hash: u64, embedding: Vec<f32>) {
        match self.dimensions {
            Some(d) if d != embedding.len() => return,
            None => self.dimensions = Some(embedding.len()),
            _ => {}
        }
        if self.entries.insert(hash, embedding).is_none() {
            self.dirty = true;
        }
    }

    /// Persist to disk if anything changed.
    ///
    /// Uses atomic write: temp file -> fsync -> rename
    pub fn save(&mut self) -> Result<(), CacheError> {
        if !self.dirty {
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let temp_path = self.path.with_extension("tmp");
        let result = self.write_to_file(&temp_path);

        if result.is_err() {
            // Clean up temp file on error
            let _ = std::fs::remove_file(&temp_path);
            return result;
        }

        std::fs::rename(&temp_path, &self.path)?;
        self.dirty = false;
        log::debug!("Saved {} embeddings to {}", self.entries.len(), self.path.display());

        Ok(())
    }

    fn load(&mut self) -> Result<usize, CacheError> {
        let file = File::open(&self.path)?;
        let file_len = file.metadata()?.len();
        let mut reader = BufReader::new(file);

        let header = read_header(&mut reader)?;
        if header.model_id != self.model_id {
            return Err(CacheError::ModelMismatch);
        }

        let dimensions = header.dimensions as usize;
        // Never trust the header count beyond what the body can hold
        let entry_size = 8 + 4 * dimensions as u64;
        let fits = file_len.saturating_sub(HEADER_SIZE as u64) / entry_size;
        if header.entry_count > fits {
            return Err(CacheError::Corrupt {
                claimed: header.entry_count,
                fits,
            });
        }

        let mut entries = HashMap::with_capacity(header.entry_count as usize);
        for _ in 0..header.entry_count {
            let (hash, embedding) = read_entry(&mut reader, dimensions)?;
            entries.insert(hash, embedding);
        }

        self.dimensions = (dimensions > 0).then_some(dimensions);
        self.entries = entries;
        Ok(self.entries.len())
    }

    fn write_to_file(&self, path: &Path) -> Result<(), CacheError> {
        let dimensions = self.dimensions.unwrap_or(0);
        let dimensions =
            u16::try_from(dimensions).map_err(|_| CacheError::DimensionOverflow(dimensions))?;

        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        write_header(
            &mut writer,
            &Header {
                version: FORMAT_VERSION,
                model_id: self.model_id,
                dimensions,
                entry_count: self.entries.len() as u64,
            },
        )?;

        // Sorted so identical caches produce identical files
        let mut hashes: Vec<&u64> = self.entries.keys().collect();
        hashes.sort_unstable();
        for hash in hashes {
            writer.write_all(&hash.to_le_bytes())?;
            for value in &self.entries[hash] {
                writer.write_all(&value.to_le_bytes())?;
            }
        }

        writer.flush()?;
        let file = writer
            .into_inner()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        file.sync_all()?;

        Ok(())
    }
}

/// SHA256 of the model name, identifying which model produced a file.
pub fn model_id_hash(model_name: &str) -> [u8; 32] {
    Sha256::digest(model_name.as_bytes()).into()
}

#[derive(Debug)]
struct Header {
    version: u8,
    model_id: [u8; 32],
    dimensions: u16,
    entry_count: u64,
}

fn read_header(reader: &mut impl Read) -> Result<Header, CacheError> {
    let mut header_bytes = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header_bytes)?;

    let version = header_bytes[0];
    if version > FORMAT_VERSION {
        return Err(CacheError::VersionMismatch(version, FORMAT_VERSION));
    }

    let stored_checksum = u32::from_le_bytes([
        header_bytes[43],
        header_bytes[44],
        header_bytes[45],
        header_bytes[46],
    ]);
    if stored_checksum != crc32fast::hash(&header_bytes[0..43]) {
        return Err(CacheError::ChecksumMismatch);
    }

    let mut model_id = [0u8; 32];
    model_id.copy_from_slice(&header_bytes[1..33]);

    let mut count_bytes = [0u8; 8];
    count_bytes.copy_from_slice(&header_bytes[35..43]);

    Ok(Header {
        version,
        model_id,
        dimensions: u16::from_le_bytes([header_bytes[33], header_bytes[34]]),
        entry_count: u64::from_le_bytes(count_bytes),
    })
}

fn write_header(writer: &mut impl Write, header: &Header) -> Result<(), CacheError> {
    let mut header_bytes = [0u8; HEADER_SIZE];

    header_bytes[0] = header.version;
    header_bytes[1..33].copy_from_slice(&header.model_id);
    header_bytes[33..35].copy_from_slice(&header.dimensions.to_le_bytes());
    header_bytes[35..43].copy_from_slice(&header.entry_count.to_le_bytes());

    let checksum = crc32fast::hash(&header_bytes[0..43]);
    header_bytes[43..47].copy_from_slice(&checksum.to_le_bytes());

    writer.write_all(&header_bytes)?;
    Ok(())
}

fn read_entry(reader: &mut impl Read, dimensions: usize) -> Result<(u64, Vec<f32>), CacheError> {
    let mut hash_bytes = [0u8; 8];
    reader.read_exact(&mut hash_bytes)?;

    let mut embedding = Vec::with_capacity(dimensions);
    for _ in 0..dimensions {
        let mut float_bytes = [0u8; 4];
        reader.read_exact(&mut float_bytes)?;
        embedding.push(f32::from_le_bytes(float_bytes));
    }

    Ok((u64::from_le_bytes(hash_bytes), embedding))
}
