//! Recommendation engine: vector search, catalog lookup, filter, sort.
//!
//! The pipeline is deliberately rigid about ordering: the embedding
//! index's relevance order is the ranking signal, and every later step
//! either preserves it or (for tone) reorders only the already-selected
//! top-k.

use std::str::FromStr;
use std::sync::Arc;

use crate::catalog::{Book, Catalog, EmotionScores};
use crate::semantic::{EmbeddingIndex, SemanticSearchError};

/// Category value meaning "no category filter". Same sentinel for tones.
pub const ALL: &str = "All";

/// The fixed tone vocabulary, each mapped to one emotion score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tone {
    #[default]
    All,
    Happy,
    Surprising,
    Angry,
    Suspenseful,
    Sad,
}

impl Tone {
    pub const NAMES: [&'static str; 6] =
        ["All", "Happy", "Surprising", "Angry", "Suspenseful", "Sad"];

    /// The emotion score this tone sorts by. `None` for `All`.
    fn score_of(self, emotions: &EmotionScores) -> Option<f32> {
        match self {
            Tone::All => None,
            Tone::Happy => Some(emotions.joy),
            Tone::Surprising => Some(emotions.surprise),
            Tone::Angry => Some(emotions.anger),
            Tone::Suspenseful => Some(emotions.fear),
            Tone::Sad => Some(emotions.sadness),
        }
    }
}

impl FromStr for Tone {
    type Err = UnknownTone;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "All" => Ok(Tone::All),
            "Happy" => Ok(Tone::Happy),
            "Surprising" => Ok(Tone::Surprising),
            "Angry" => Ok(Tone::Angry),
            "Suspenseful" => Ok(Tone::Suspenseful),
            "Sad" => Ok(Tone::Sad),
            other => Err(UnknownTone(other.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown tone '{0}'")]
pub struct UnknownTone(pub String);

#[derive(Debug, thiserror::Error)]
pub enum RecommendError {
    #[error("recommender is not ready yet")]
    NotReady,

    #[error("semantic search error: {0}")]
    Search(SemanticSearchError),
}

impl From<SemanticSearchError> for RecommendError {
    fn from(err: SemanticSearchError) -> Self {
        match err {
            SemanticSearchError::NotInitialized => RecommendError::NotReady,
            other => RecommendError::Search(other),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RecommendOpts {
    /// Candidates fetched from the embedding index.
    pub initial_k: usize,
    /// Records returned after filtering and truncation.
    pub final_k: usize,
}

impl Default for RecommendOpts {
    fn default() -> Self {
        Self {
            initial_k: 50,
            final_k: 16,
        }
    }
}

/// Read-only engine over an immutable catalog and embedding index.
pub struct Recommender {
    catalog: Arc<Catalog>,
    index: Arc<dyn EmbeddingIndex>,
    opts: RecommendOpts,
}

impl Recommender {
    pub fn new(catalog: Arc<Catalog>, index: Arc<dyn EmbeddingIndex>, opts: RecommendOpts) -> Self {
        Self {
            catalog,
            index,
            opts,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Recommend with the configured top-k values.
    pub fn recommend(
        &self,
        query: &str,
        category: &str,
        tone: Tone,
    ) -> Result<Vec<Book>, RecommendError> {
        self.recommend_with(query, category, tone, self.opts)
    }

    /// Recommend with explicit top-k values.
    ///
    /// An empty query is forwarded as-is; the index's answer for it is
    /// whatever "similar to nothing in particular" means for the model.
    pub fn recommend_with(
        &self,
        query: &str,
        category: &str,
        tone: Tone,
        opts: RecommendOpts,
    ) -> Result<Vec<Book>, RecommendError> {
        if !self.index.is_ready() {
            return Err(RecommendError::NotReady);
        }

        let ranked_ids = self.index.search(query, opts.initial_k)?;

        // Order-preserving lookup: candidates missing from the catalog are
        // dropped (index and catalog may drift), but survivors keep the
        // index's relevance order. Never a set intersection.
        let mut candidates: Vec<&Book> = ranked_ids
            .iter()
            .filter_map(|&id| self.catalog.get(id))
            .collect();

        // Best-effort category filter: applied only if it leaves at least
        // one candidate. An empty filtered set means the filter is skipped
        // entirely, not an empty response.
        if category != ALL {
            let filtered: Vec<&Book> = candidates
                .iter()
                .copied()
                .filter(|book| book.category == category)
                .collect();
            if filtered.is_empty() {
                log::debug!("category filter '{category}' matched nothing, ignoring it");
            } else {
                candidates = filtered;
            }
        }

        candidates.truncate(opts.final_k);

        // Tone sorting happens after truncation: it reshuffles the selected
        // top-k, it never pulls in lower-relevance candidates.
        let mut result: Vec<Book> = candidates.into_iter().cloned().collect();
        if tone != Tone::All {
            result.sort_by(|a, b| {
                let sa = tone.score_of(&a.emotions).unwrap_or(0.0);
                let sb = tone.score_of(&b.emotions).unwrap_or(0.0);
                sb.partial_cmp(&sa).unwrap_or(std::cmp::Ordering::Equal)
            });
        }

        Ok(result)
    }
}
