//! In-memory vector index over tagged-description embeddings.
//!
//! A flat cosine-similarity scan is plenty at catalog scale (a few
//! thousand books); relevance order is defined by descending score.

use std::collections::HashMap;

/// An indexed embedding plus the hash of the corpus line it came from.
/// The hash lets startup skip re-embedding unchanged lines.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorEntry {
    pub content_hash: u64,
    pub embedding: Vec<f32>,
}

/// A single ranked hit.
#[derive(Debug, Clone)]
pub struct RankedHit {
    pub isbn13: u64,
    pub score: f32,
}

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("cannot store or search with a zero-norm vector")]
    ZeroNormVector,
}

/// Book id -> embedding map with top-k cosine search.
pub struct VectorIndex {
    entries: HashMap<u64, VectorEntry>,
    dimensions: usize,
}

fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

impl VectorIndex {
    pub fn new(dimensions: usize) -> Self {
        Self {
            entries: HashMap::new(),
            dimensions,
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, isbn13: u64) -> Option<&VectorEntry> {
        self.entries.get(&isbn13)
    }

    pub fn remove(&mut self, isbn13: u64) -> Option<VectorEntry> {
        self.entries.remove(&isbn13)
    }

    pub fn ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.entries.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, &VectorEntry)> {
        self.entries.iter().map(|(k, v)| (*k, v))
    }

    /// Insert or replace the embedding for a book.
    pub fn insert(
        &mut self,
        isbn13: u64,
        content_hash: u64,
        embedding: Vec<f32>,
    ) -> Result<(), IndexError> {
        if embedding.len() != self.dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimensions,
                got: embedding.len(),
            });
        }
        if l2_norm(&embedding) < f32::EPSILON {
            return Err(IndexError::ZeroNormVector);
        }

        self.entries.insert(
            isbn13,
            VectorEntry {
                content_hash,
                embedding,
            },
        );
        Ok(())
    }

    /// Rank every indexed book against `query` and keep the top `k`.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<RankedHit>, IndexError> {
        if query.len() != self.dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimensions,
                got: query.len(),
            });
        }

        let query_norm = l2_norm(query);
        if query_norm < f32::EPSILON {
            return Err(IndexError::ZeroNormVector);
        }

        let mut hits: Vec<RankedHit> = self
            .entries
            .iter()
            .map(|(&isbn13, entry)| {
                let target_norm = l2_norm(&entry.embedding);
                let dot: f32 = query
                    .iter()
                    .zip(entry.embedding.iter())
                    .map(|(a, b)| a * b)
                    .sum();
                RankedHit {
                    isbn13,
                    score: dot / (query_norm * target_norm),
                }
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(k);

        Ok(hits)
    }
}
