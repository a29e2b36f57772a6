//! fastembed model wrapper.
//!
//! Loads a local ONNX embedding model (downloaded on first use) and exposes
//! single and batch embedding. fastembed's `embed()` takes `&mut self`, so
//! the model sits behind a Mutex; the rest of the crate only ever needs
//! shared access.

use fastembed::{InitOptions, TextEmbedding};
use std::path::PathBuf;
use std::sync::Mutex;

pub struct EmbeddingModel {
    model: Mutex<TextEmbedding>,
    model_name: String,
    dimensions: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("model initialization failed: {0}")]
    InitFailed(String),

    #[error("embedding generation failed: {0}")]
    EmbeddingFailed(String),

    #[error("unknown embedding model '{0}' (supported: all-MiniLM-L6-v2, bge-small-en-v1.5, bge-base-en-v1.5, add -q for quantized)")]
    InvalidModel(String),
}

/// Map a human-readable model name onto fastembed's enum.
fn resolve_model(name: &str) -> Result<fastembed::EmbeddingModel, EmbeddingError> {
    use fastembed::EmbeddingModel as M;

    match name.to_lowercase().as_str() {
        "all-minilm-l6-v2" => Ok(M::AllMiniLML6V2),
        "all-minilm-l6-v2-q" => Ok(M::AllMiniLML6V2Q),
        "bge-small-en-v1.5" => Ok(M::BGESmallENV15),
        "bge-small-en-v1.5-q" => Ok(M::BGESmallENV15Q),
        "bge-base-en-v1.5" => Ok(M::BGEBaseENV15),
        "bge-base-en-v1.5-q" => Ok(M::BGEBaseENV15Q),
        _ => Err(EmbeddingError::InvalidModel(name.to_string())),
    }
}

impl EmbeddingModel {
    /// Load (downloading if needed) the named model, caching model files
    /// under `cache_dir/models`.
    pub fn new(model_name: &str, cache_dir: PathBuf) -> Result<Self, EmbeddingError> {
        let resolved = resolve_model(model_name)?;

        let models_dir = cache_dir.join("models");
        std::fs::create_dir_all(&models_dir)
            .map_err(|e| EmbeddingError::InitFailed(format!("creating models dir: {e}")))?;

        let options = InitOptions::new(resolved)
            .with_cache_dir(models_dir)
            .with_show_download_progress(true);

        let mut model = TextEmbedding::try_new(options)
            .map_err(|e| EmbeddingError::InitFailed(e.to_string()))?;

        // fastembed doesn't expose dimensions; probe with a throwaway embed.
        let dimensions = model
            .embed(vec!["probe"], None)
            .map_err(|e| EmbeddingError::InitFailed(format!("probing dimensions: {e}")))?
            .first()
            .map(|v| v.len())
            .ok_or_else(|| EmbeddingError::InitFailed("model returned no embedding".into()))?;

        Ok(Self {
            model: Mutex::new(model),
            model_name: model_name.to_string(),
            dimensions,
        })
    }

    pub fn name(&self) -> &str {
        &self.model_name
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Embed a single text (the query path).
    pub fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.embed_batch(&[text.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::EmbeddingFailed("no embedding returned".into()))
    }

    /// Embed a batch of texts (the corpus path).
    pub fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let mut model = self
            .model
            .lock()
            .map_err(|e| EmbeddingError::EmbeddingFailed(format!("model lock poisoned: {e}")))?;

        model
            .embed(texts.to_vec(), None)
            .map_err(|e| EmbeddingError::EmbeddingFailed(e.to_string()))
    }

    /// SHA-256 of the model name; stored in vectors.bin so an index built
    /// with one model is never served with another.
    pub fn model_id_hash(&self) -> [u8; 32] {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(self.model_name.as_bytes());
        hasher.finalize().into()
    }
}
