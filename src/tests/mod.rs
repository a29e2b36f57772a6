//! Integration-style tests for the recommendation pipeline and HTTP
//! surface, using a fake embedding index so nothing downloads a model.


use crate::catalog::{Book, Catalog, EmotionScores};
use crate::semantic::{EmbeddingIndex, SemanticSearchError};

/// Embedding index fake: returns a fixed relevance order regardless of
/// the query, truncated to `k`.
pub struct FakeIndex {
    pub ranked_ids: Vec<u64>,
    pub ready: bool,
}

impl FakeIndex {
    pub fn ranked(ranked_ids: Vec<u64>) -> Self {
        Self {
            ranked_ids,
            ready: true,
        }
    }

    pub fn unready() -> Self {
        Self {
            ranked_ids: vec![],
            ready: false,
        }
    }
}

impl EmbeddingIndex for FakeIndex {
    fn search(&self, _query: &str, k: usize) -> Result<Vec<u64>, SemanticSearchError> {
        if !self.ready {
            return Err(SemanticSearchError::NotInitialized);
        }
        Ok(self.ranked_ids.iter().copied().take(k).collect())
    }

    fn is_ready(&self) -> bool {
        self.ready
    }
}

pub fn book(isbn13: u64, category: &str, joy: f32) -> Book {
    Book {
        isbn13,
        title: format!("Book {isbn13}"),
        authors: "Some Author".to_string(),
        description: format!("Description of book {isbn13}"),
        category: category.to_string(),
        thumbnail: "cover-not-found.jpg".to_string(),
        emotions: EmotionScores {
            joy,
            ..Default::default()
        },
        rating: None,
        published_year: None,
    }
}

/// The catalog from the end-to-end scenario: ids 1/2 are Fiction, 3 is
/// Drama, joy scores 0.1 / 0.9 / 0.5.
pub fn scenario_catalog() -> Catalog {
    Catalog::from_books(vec![
        book(1, "Fiction", 0.1),
        book(2, "Fiction", 0.9),
        book(3, "Drama", 0.5),
    ])
}
