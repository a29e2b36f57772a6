//! Persistence for the vector index (`vectors.bin`).
//!
//! Layout, all little-endian:
//!
//! header: version u8 | model_id [u8;32] | dimensions u16 | entry_count u64 | crc32 u32
//! entry:  isbn13 u64 | content_hash u64 | embedding [f32; dimensions]
//!
//! The crc covers the header bytes before the checksum field. The model id
//! is the SHA-256 of the embedding model name, so an index built with one
//! model can never be served by another.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::semantic::index::VectorIndex;

const FORMAT_VERSION: u8 = 1;

/// version(1) + model_id(32) + dimensions(2) + entry_count(8) + crc(4)
const HEADER_SIZE: usize = 47;

#[derive(Debug, thiserror::Error)]
pub enum VectorStorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported vectors.bin version {0} (supported: {1})")]
    VersionMismatch(u8, u8),

    #[error("vectors.bin was built with a different embedding model")]
    ModelMismatch,

    #[error("vectors.bin header checksum mismatch, file may be corrupted")]
    ChecksumMismatch,

    #[error("vectors.bin dimension mismatch: expected {expected}, file has {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

pub struct VectorStorage {
    path: PathBuf,
}

impl VectorStorage {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load a persisted index, verifying version, checksum, model identity
    /// and dimensions before trusting any entry.
    pub fn load(
        &self,
        expected_model_id: &[u8; 32],
        expected_dimensions: usize,
    ) -> Result<VectorIndex, VectorStorageError> {
        let mut reader = BufReader::new(File::open(&self.path)?);

        let mut header = [0u8; HEADER_SIZE];
        reader.read_exact(&mut header)?;

        let version = header[0];
        if version != FORMAT_VERSION {
            return Err(VectorStorageError::VersionMismatch(version, FORMAT_VERSION));
        }

        let stored_crc = u32::from_le_bytes(header[43..47].try_into().expect("4 bytes"));
        if stored_crc != crc32fast::hash(&header[..43]) {
            return Err(VectorStorageError::ChecksumMismatch);
        }

        if header[1..33] != expected_model_id[..] {
            return Err(VectorStorageError::ModelMismatch);
        }

        let dimensions = u16::from_le_bytes(header[33..35].try_into().expect("2 bytes")) as usize;
        if dimensions != expected_dimensions {
            return Err(VectorStorageError::DimensionMismatch {
                expected: expected_dimensions,
                got: dimensions,
            });
        }

        let entry_count = u64::from_le_bytes(header[35..43].try_into().expect("8 bytes"));

        let mut index = VectorIndex::new(dimensions);
        for _ in 0..entry_count {
            let mut fixed = [0u8; 16];
            reader.read_exact(&mut fixed)?;
            let isbn13 = u64::from_le_bytes(fixed[..8].try_into().expect("8 bytes"));
            let content_hash = u64::from_le_bytes(fixed[8..].try_into().expect("8 bytes"));

            let mut embedding = Vec::with_capacity(dimensions);
            let mut float = [0u8; 4];
            for _ in 0..dimensions {
                reader.read_exact(&mut float)?;
                embedding.push(f32::from_le_bytes(float));
            }

            // A stored zero-norm vector can't be searched; drop it quietly
            // and let reconciliation re-embed the line.
            let _ = index.insert(isbn13, content_hash, embedding);
        }

        Ok(index)
    }

    /// Save the index atomically: write a temp file, fsync, rename.
    pub fn save(&self, index: &VectorIndex, model_id: &[u8; 32]) -> Result<(), VectorStorageError> {
        let temp_path = self.path.with_extension("tmp");

        if let Err(err) = self.write_to(&temp_path, index, model_id) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(err);
        }

        std::fs::rename(&temp_path, &self.path)?;
        Ok(())
    }

    fn write_to(
        &self,
        path: &Path,
        index: &VectorIndex,
        model_id: &[u8; 32],
    ) -> Result<(), VectorStorageError> {
        let mut writer = BufWriter::new(File::create(path)?);

        let mut header = [0u8; HEADER_SIZE];
        header[0] = FORMAT_VERSION;
        header[1..33].copy_from_slice(model_id);
        header[33..35].copy_from_slice(&(index.dimensions() as u16).to_le_bytes());
        header[35..43].copy_from_slice(&(index.len() as u64).to_le_bytes());
        let crc = crc32fast::hash(&header[..43]);
        header[43..47].copy_from_slice(&crc.to_le_bytes());
        writer.write_all(&header)?;

        for (isbn13, entry) in index.iter() {
            writer.write_all(&isbn13.to_le_bytes())?;
            writer.write_all(&entry.content_hash.to_le_bytes())?;
            for &value in &entry.embedding {
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
