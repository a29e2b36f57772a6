//! Nearest-neighbor search over tagged-description embeddings.
//!
//! Embeddings are generated locally with fastembed; search is an in-memory
//! cosine scan. The concrete backend hides behind the [`EmbeddingIndex`]
//! trait so the recommendation engine stays testable with fakes.
//!
//! # Architecture
//!
//! - `corpus`: parses the `"<isbn13> <description>"` corpus file
//! - `embeddings`: wraps fastembed for embedding generation
//! - `index`: in-memory vector index with cosine ranking
//! - `storage`: vectors.bin persistence
//! - `service`: ties the pieces together behind `EmbeddingIndex`

pub mod corpus;
pub mod embeddings;
mod index;
mod service;
mod storage;

pub use embeddings::EmbeddingModel;
pub use index::{RankedHit, VectorIndex};
pub use service::{ReconcileResult, SemanticSearchError, SemanticSearchService};
pub use storage::{VectorStorage, VectorStorageError};

/// Default embedding model. MiniLM is small (~23MB) and good enough for
/// book-description similarity.
pub const DEFAULT_MODEL: &str = "all-MiniLM-L6-v2";

/// The capability the recommendation engine depends on: rank the corpus
/// against a free-text query, return up to `k` identifiers in descending
/// similarity order.
pub trait EmbeddingIndex: Send + Sync {
    fn search(&self, query: &str, k: usize) -> Result<Vec<u64>, SemanticSearchError>;

    /// Whether the backing model and index are loaded.
    fn is_ready(&self) -> bool;
}
