//! Display formatting for recommendation results.
//!
//! Pure functions from a catalog row to the wire shape the UI consumes.

use serde::Serialize;

use crate::catalog::{Book, EmotionScores};

/// Words kept when truncating a description for the result card.
const DESCRIPTION_WORDS: usize = 30;

/// One recommendation as served to the UI.
#[derive(Debug, Clone, Serialize)]
pub struct DisplayRecord {
    pub isbn13: u64,
    pub title: String,
    pub authors: String,
    pub description: String,
    pub full_description: String,
    pub thumbnail: String,
    pub categories: String,
    pub publication_date: Option<i32>,
    pub emotional_tones: EmotionScores,
}

/// Format a catalog row for display.
pub fn format_record(book: &Book) -> DisplayRecord {
    DisplayRecord {
        isbn13: book.isbn13,
        title: book.title.clone(),
        authors: format_authors(&book.authors),
        description: truncate_description(&book.description),
        full_description: book.description.clone(),
        thumbnail: book.thumbnail.clone(),
        categories: book.category.clone(),
        publication_date: book.published_year,
        emotional_tones: book.emotions,
    }
}

/// Join a semicolon-separated author list for display.
///
/// One author is passed through, two get "and", three or more get an
/// Oxford-comma join.
pub fn format_authors(raw: &str) -> String {
    let authors: Vec<&str> = raw.split(';').collect();
    match authors.as_slice() {
        [] | [_] => raw.to_string(),
        [a, b] => format!("{a} and {b}"),
        [head @ .., last] => format!("{}, and {last}", head.join(", ")),
    }
}

/// Keep the first 30 whitespace-delimited words and append an ellipsis.
///
/// The ellipsis lands on short descriptions too, matching the observed
/// behavior of the UI this feeds.
pub fn truncate_description(description: &str) -> String {
    let words: Vec<&str> = description
        .split_whitespace()
        .take(DESCRIPTION_WORDS)
        .collect();
    format!("{}...", words.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_single_author() {
        assert_eq!(format_authors("Ursula K. Le Guin"), "Ursula K. Le Guin");
    }

    #[test]
    fn test_format_two_authors() {
        assert_eq!(format_authors("A;B"), "A and B");
    }

    #[test]
    fn test_format_three_authors_oxford_comma() {
        assert_eq!(format_authors("A;B;C"), "A, B, and C");
        assert_eq!(format_authors("A;B;C;D"), "A, B, C, and D");
    }

    #[test]
    fn test_truncate_short_description_still_gets_ellipsis() {
        assert_eq!(
            truncate_description("A short five word blurb"),
            "A short five word blurb..."
        );
    }

    #[test]
    fn test_truncate_long_description_keeps_thirty_words() {
        let words: Vec<String> = (0..40).map(|i| format!("w{i}")).collect();
        let description = words.join(" ");

        let truncated = truncate_description(&description);
        assert!(truncated.ends_with("w29..."));
        assert_eq!(truncated.split_whitespace().count(), 30);
    }

    #[test]
    fn test_truncate_collapses_whitespace() {
        assert_eq!(truncate_description("two\n  words"), "two words...");
    }

    #[test]
    fn test_format_record_fields() {
        let book = Book {
            isbn13: 9780001,
            title: "The Test".into(),
            authors: "A;B".into(),
            description: "A short description".into(),
            category: "Fiction".into(),
            thumbnail: "http://x&fife=w800".into(),
            emotions: EmotionScores {
                joy: 0.9,
                ..Default::default()
            },
            rating: Some(4.2),
            published_year: Some(1998),
        };

        let record = format_record(&book);
        assert_eq!(record.isbn13, 9780001);
        assert_eq!(record.authors, "A and B");
        assert_eq!(record.description, "A short description...");
        assert_eq!(record.full_description, "A short description");
        assert_eq!(record.publication_date, Some(1998));
        assert_eq!(record.emotional_tones.joy, 0.9);
    }
}
