//! High-level semantic search over the tagged-description corpus.
//!
//! Ties together the embedding model, the in-memory index, and the
//! persisted vectors. Initialization is lazy and happens once: load the
//! model, load the corpus, reuse persisted vectors where the corpus line
//! is unchanged, embed the rest, and save the result.

use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Instant;

use crate::config::EmbeddingConfig;
use crate::semantic::corpus::{self, TaggedDescription};
use crate::semantic::embeddings::{EmbeddingError, EmbeddingModel};
use crate::semantic::index::{IndexError, VectorIndex};
use crate::semantic::storage::{VectorStorage, VectorStorageError};
use crate::semantic::EmbeddingIndex;

/// Corpus lines embedded per fastembed call.
const EMBED_BATCH_SIZE: usize = 256;

#[derive(Debug, thiserror::Error)]
pub enum SemanticSearchError {
    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("index error: {0}")]
    Index(#[from] IndexError),

    #[error("storage error: {0}")]
    Storage(#[from] VectorStorageError),

    #[error("corpus error: {0}")]
    Corpus(#[from] std::io::Error),

    #[error("semantic search is not initialized yet")]
    NotInitialized,

    #[error("internal error: {0}")]
    Internal(String),
}

/// Outcome of reconciling persisted vectors against the corpus file.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileResult {
    pub embedded: usize,
    pub removed: usize,
    pub reused: usize,
}

struct SemanticState {
    model: EmbeddingModel,
    index: VectorIndex,
}

/// Lazily-initialized search service. Uses `Mutex<Option<_>>` because
/// `OnceLock::get_or_try_init` is unstable.
pub struct SemanticSearchService {
    config: EmbeddingConfig,
    base_path: PathBuf,
    corpus_path: PathBuf,
    state: Mutex<Option<SemanticState>>,
}

impl SemanticSearchService {
    /// Create the service in an uninitialized state.
    ///
    /// `base_path` holds `models/` and `vectors.bin`; `corpus_path` is the
    /// tagged-description file the index is built from.
    pub fn new(config: EmbeddingConfig, base_path: PathBuf, corpus_path: PathBuf) -> Self {
        Self {
            config,
            base_path,
            corpus_path,
            state: Mutex::new(None),
        }
    }

    /// Eagerly load the model and build/refresh the index.
    pub fn initialize(&self) -> Result<ReconcileResult, SemanticSearchError> {
        let mut guard = self.lock_state()?;
        if guard.is_some() {
            return Ok(ReconcileResult::default());
        }

        let (state, report) = self.do_init()?;
        *guard = Some(state);
        Ok(report)
    }

    /// Number of indexed books, 0 while uninitialized.
    pub fn indexed_count(&self) -> usize {
        self.state
            .lock()
            .ok()
            .and_then(|guard| guard.as_ref().map(|s| s.index.len()))
            .unwrap_or(0)
    }

    fn lock_state(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, Option<SemanticState>>, SemanticSearchError> {
        self.state
            .lock()
            .map_err(|e| SemanticSearchError::Internal(format!("lock poisoned: {e}")))
    }

    fn do_init(&self) -> Result<(SemanticState, ReconcileResult), SemanticSearchError> {
        log::info!("initializing semantic search with model '{}'", self.config.model);
        let now = Instant::now();

        let model = EmbeddingModel::new(&self.config.model, self.base_path.clone())?;
        let model_id = model.model_id_hash();
        let dimensions = model.dimensions();

        let storage = VectorStorage::new(self.base_path.join("vectors.bin"));
        let entries = corpus::load(&self.corpus_path)?;

        let mut index = if storage.exists() {
            match storage.load(&model_id, dimensions) {
                Ok(index) => {
                    log::info!("loaded {} vectors from {:?}", index.len(), storage.path());
                    index
                }
                Err(VectorStorageError::ModelMismatch) => {
                    log::warn!("embedding model changed, rebuilding index");
                    VectorIndex::new(dimensions)
                }
                Err(VectorStorageError::VersionMismatch(file_version, _)) => {
                    log::warn!("vectors.bin version {file_version} unsupported, rebuilding index");
                    VectorIndex::new(dimensions)
                }
                Err(err) => {
                    log::error!("failed to load vectors: {err}");
                    return Err(err.into());
                }
            }
        } else {
            VectorIndex::new(dimensions)
        };

        let report = reconcile(&mut index, &entries, |texts| model.embed_batch(texts))?;

        if report.embedded > 0 || report.removed > 0 {
            storage.save(&index, &model_id)?;
        }

        log::info!(
            "semantic index ready: {} books ({} embedded, {} reused, {} removed) in {:.1}s",
            index.len(),
            report.embedded,
            report.reused,
            report.removed,
            now.elapsed().as_secs_f64()
        );

        Ok((SemanticState { model, index }, report))
    }
}

/// Bring the index in line with the corpus: embed new/changed lines, drop
/// ids the corpus no longer contains, keep everything else as-is.
///
/// `embed` is the batch embedding step, injected so the reconciliation
/// branches are testable without loading a model.
fn reconcile<F>(
    index: &mut VectorIndex,
    entries: &[TaggedDescription],
    embed: F,
) -> Result<ReconcileResult, SemanticSearchError>
where
    F: Fn(&[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>,
{
    let mut report = ReconcileResult::default();

    let corpus_ids: std::collections::HashSet<u64> =
        entries.iter().map(|e| e.isbn13).collect();
    let stale: Vec<u64> = index.ids().filter(|id| !corpus_ids.contains(id)).collect();
    for id in stale {
        index.remove(id);
        report.removed += 1;
    }

    let mut pending: Vec<(u64, u64, &str)> = Vec::new();
    for entry in entries {
        let hash = corpus::content_hash(&entry.text);
        match index.get(entry.isbn13) {
            Some(existing) if existing.content_hash == hash => report.reused += 1,
            _ => pending.push((entry.isbn13, hash, &entry.text)),
        }
    }

    for chunk in pending.chunks(EMBED_BATCH_SIZE) {
        let texts: Vec<String> = chunk.iter().map(|(_, _, text)| text.to_string()).collect();
        let embeddings = embed(&texts)?;

        for ((isbn13, hash, _), embedding) in chunk.iter().zip(embeddings) {
            match index.insert(*isbn13, *hash, embedding) {
                Ok(()) => report.embedded += 1,
                Err(err) => {
                    // a degenerate embedding for one line should not sink
                    // the whole index
                    log::warn!("skipping isbn13 {isbn13}: {err}");
                }
            }
        }
    }

    Ok(report)
}

impl EmbeddingIndex for SemanticSearchService {
    /// Embed the query and return up to `k` book ids in relevance order.
    fn search(&self, query: &str, k: usize) -> Result<Vec<u64>, SemanticSearchError> {
        let guard = self.lock_state()?;
        let state = guard.as_ref().ok_or(SemanticSearchError::NotInitialized)?;

        let query_embedding = state.model.embed(query)?;
        let hits = state.index.search(&query_embedding, k)?;

        Ok(hits.into_iter().map(|hit| hit.isbn13).collect())
    }

    fn is_ready(&self) -> bool {
        self.state
            .lock()
            .ok()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> EmbeddingConfig {
        EmbeddingConfig {
            model: "all-MiniLM-L6-v2".to_string(),
        }
    }

    fn entry(isbn13: u64, text: &str) -> TaggedDescription {
        TaggedDescription {
            isbn13,
            text: text.to_string(),
        }
    }

    fn no_embed(texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        panic!("unexpected embed call for {texts:?}");
    }

    #[test]
    fn test_reconcile_embeds_new_lines() {
        let mut index = VectorIndex::new(2);
        let entries = vec![entry(1, "1 first book"), entry(2, "2 second book")];

        let report = reconcile(&mut index, &entries, |texts| {
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        })
        .unwrap();

        assert_eq!(
            report,
            ReconcileResult {
                embedded: 2,
                reused: 0,
                removed: 0
            }
        );
        assert_eq!(index.len(), 2);
        assert_eq!(
            index.get(1).unwrap().content_hash,
            corpus::content_hash("1 first book")
        );
    }

    #[test]
    fn test_reconcile_reembeds_changed_lines_only() {
        let mut index = VectorIndex::new(2);
        index
            .insert(1, corpus::content_hash("1 old description"), vec![1.0, 0.0])
            .unwrap();
        index
            .insert(2, corpus::content_hash("2 unchanged"), vec![0.0, 1.0])
            .unwrap();

        let entries = vec![entry(1, "1 new description"), entry(2, "2 unchanged")];
        let report = reconcile(&mut index, &entries, |texts| {
            assert_eq!(texts, ["1 new description"]);
            Ok(vec![vec![0.5, 0.5]])
        })
        .unwrap();

        assert_eq!(
            report,
            ReconcileResult {
                embedded: 1,
                reused: 1,
                removed: 0
            }
        );
        let changed = index.get(1).unwrap();
        assert_eq!(changed.embedding, vec![0.5, 0.5]);
        assert_eq!(changed.content_hash, corpus::content_hash("1 new description"));
        assert_eq!(index.get(2).unwrap().embedding, vec![0.0, 1.0]);
    }

    #[test]
    fn test_reconcile_removes_ids_absent_from_corpus() {
        let mut index = VectorIndex::new(2);
        index
            .insert(1, corpus::content_hash("1 kept"), vec![1.0, 0.0])
            .unwrap();
        index
            .insert(9, corpus::content_hash("9 dropped"), vec![0.0, 1.0])
            .unwrap();

        let entries = vec![entry(1, "1 kept")];
        let report = reconcile(&mut index, &entries, no_embed).unwrap();

        assert_eq!(
            report,
            ReconcileResult {
                embedded: 0,
                reused: 1,
                removed: 1
            }
        );
        assert_eq!(index.len(), 1);
        assert!(index.get(9).is_none());
    }

    #[test]
    fn test_reconcile_unchanged_corpus_is_a_no_op() {
        let mut index = VectorIndex::new(2);
        index
            .insert(1, corpus::content_hash("1 same"), vec![1.0, 0.0])
            .unwrap();

        let entries = vec![entry(1, "1 same")];
        let report = reconcile(&mut index, &entries, no_embed).unwrap();

        assert_eq!(
            report,
            ReconcileResult {
                embedded: 0,
                reused: 1,
                removed: 0
            }
        );
    }

    #[test]
    fn test_reconcile_skips_degenerate_embeddings() {
        let mut index = VectorIndex::new(2);
        let entries = vec![entry(1, "1 fine"), entry(2, "2 degenerate")];

        let report = reconcile(&mut index, &entries, |_| {
            Ok(vec![vec![1.0, 0.0], vec![0.0, 0.0]])
        })
        .unwrap();

        // the zero-norm vector is dropped, the healthy one lands
        assert_eq!(report.embedded, 1);
        assert_eq!(index.len(), 1);
        assert!(index.get(2).is_none());
    }

    #[test]
    fn test_uninitialized_search_is_not_ready() {
        let tmp = tempfile::tempdir().unwrap();
        let service = SemanticSearchService::new(
            test_config(),
            tmp.path().to_path_buf(),
            tmp.path().join("tagged_description.txt"),
        );

        assert!(!service.is_ready());
        assert_eq!(service.indexed_count(), 0);

        let result = service.search("wartime romance", 10);
        assert!(matches!(result, Err(SemanticSearchError::NotInitialized)));
    }

    #[test]
    #[ignore = "requires model download"]
    fn test_initialize_builds_and_persists_index() {
        let tmp = tempfile::tempdir().unwrap();
        let corpus_path = tmp.path().join("tagged_description.txt");
        std::fs::write(
            &corpus_path,
            "9780001 A story about machine intelligence and the future\n\
             9780002 A cookbook full of chocolate dessert recipes\n",
        )
        .unwrap();

        let service = SemanticSearchService::new(
            test_config(),
            tmp.path().to_path_buf(),
            corpus_path.clone(),
        );

        let report = service.initialize().unwrap();
        assert_eq!(report.embedded, 2);
        assert!(service.is_ready());
        assert_eq!(service.indexed_count(), 2);
        assert!(tmp.path().join("vectors.bin").exists());

        let hits = service.search("artificial intelligence", 1).unwrap();
        assert_eq!(hits, vec![9780001]);

        // a fresh service over the same dir reuses every vector
        let service2 =
            SemanticSearchService::new(test_config(), tmp.path().to_path_buf(), corpus_path);
        let report2 = service2.initialize().unwrap();
        assert_eq!(report2.embedded, 0);
        assert_eq!(report2.reused, 2);
    }
}
