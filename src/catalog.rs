//! Book catalog loaded from a CSV file.
//!
//! The catalog is read once at startup and never mutated afterwards. Rows
//! are addressed by ISBN-13; a lookup map over the row vector keeps the
//! original file order while giving O(1) access by id.

use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;

/// Placeholder shown when a book has no thumbnail URL.
const COVER_NOT_FOUND: &str = "cover-not-found.jpg";

/// Google Books thumbnail URLs accept a size hint; request a large cover.
const LARGE_THUMBNAIL_SUFFIX: &str = "&fife=w800";

/// Per-book emotion scores produced by the sentiment pass over descriptions.
/// Absent columns default to zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize)]
pub struct EmotionScores {
    pub joy: f32,
    pub anger: f32,
    pub sadness: f32,
    pub fear: f32,
    pub surprise: f32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Book {
    pub isbn13: u64,
    pub title: String,
    /// Semicolon-joined author list, exactly as stored in the CSV.
    pub authors: String,
    pub description: String,
    pub category: String,
    /// Derived large-thumbnail URL, or the placeholder when absent.
    pub thumbnail: String,
    pub emotions: EmotionScores,
    pub rating: Option<f32>,
    pub published_year: Option<i32>,
}

#[derive(thiserror::Error, Debug)]
pub enum CatalogError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("missing required column '{0}'")]
    MissingColumn(&'static str),
}

/// Immutable in-memory book table.
#[derive(Debug, Default)]
pub struct Catalog {
    books: Vec<Book>,
    by_isbn: HashMap<u64, usize>,
}

/// Column positions resolved from the CSV header row. The data files carry
/// far more columns than we use, and their order varies between exports.
struct Columns {
    isbn13: usize,
    title: Option<usize>,
    authors: Option<usize>,
    description: Option<usize>,
    category: Option<usize>,
    thumbnail: Option<usize>,
    joy: Option<usize>,
    anger: Option<usize>,
    sadness: Option<usize>,
    fear: Option<usize>,
    surprise: Option<usize>,
    rating: Option<usize>,
    published_year: Option<usize>,
}

impl Columns {
    fn resolve(headers: &csv::StringRecord) -> Result<Self, CatalogError> {
        let find = |name: &str| headers.iter().position(|h| h == name);

        Ok(Columns {
            isbn13: find("isbn13").ok_or(CatalogError::MissingColumn("isbn13"))?,
            title: find("title"),
            authors: find("authors"),
            description: find("description"),
            category: find("simple_categories"),
            thumbnail: find("thumbnail"),
            joy: find("joy"),
            anger: find("anger"),
            sadness: find("sadness"),
            fear: find("fear"),
            surprise: find("surprise"),
            rating: find("average_rating"),
            published_year: find("published_year"),
        })
    }
}

fn field<'a>(record: &'a csv::StringRecord, idx: Option<usize>) -> &'a str {
    idx.and_then(|i| record.get(i)).unwrap_or("")
}

fn float_field(record: &csv::StringRecord, idx: Option<usize>) -> f32 {
    field(record, idx).trim().parse().unwrap_or(0.0)
}

fn large_thumbnail(thumbnail: &str) -> String {
    let thumbnail = thumbnail.trim();
    if thumbnail.is_empty() {
        COVER_NOT_FOUND.to_string()
    } else {
        format!("{thumbnail}{LARGE_THUMBNAIL_SUFFIX}")
    }
}

impl Catalog {
    /// Load the catalog from a CSV file.
    ///
    /// Rows without a parseable `isbn13` are skipped with a warning, as are
    /// duplicates of an already-seen id (first row wins). Every other field
    /// falls back to empty/zero so a sparse export still loads.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let now = Instant::now();
        let mut reader = csv::Reader::from_path(path)?;
        let columns = Columns::resolve(reader.headers()?)?;

        let mut books = Vec::new();
        let mut by_isbn = HashMap::new();

        for (line, record) in reader.records().enumerate() {
            let record = record?;

            let raw_id = record.get(columns.isbn13).unwrap_or("").trim();
            let isbn13: u64 = match raw_id.parse() {
                Ok(id) => id,
                Err(_) => {
                    log::warn!("skipping catalog row {}: bad isbn13 {raw_id:?}", line + 2);
                    continue;
                }
            };

            if by_isbn.contains_key(&isbn13) {
                log::warn!("skipping catalog row {}: duplicate isbn13 {isbn13}", line + 2);
                continue;
            }

            let book = Book {
                isbn13,
                title: field(&record, columns.title).to_string(),
                authors: field(&record, columns.authors).to_string(),
                description: field(&record, columns.description).to_string(),
                category: field(&record, columns.category).to_string(),
                thumbnail: large_thumbnail(field(&record, columns.thumbnail)),
                emotions: EmotionScores {
                    joy: float_field(&record, columns.joy),
                    anger: float_field(&record, columns.anger),
                    sadness: float_field(&record, columns.sadness),
                    fear: float_field(&record, columns.fear),
                    surprise: float_field(&record, columns.surprise),
                },
                rating: field(&record, columns.rating).trim().parse().ok(),
                published_year: field(&record, columns.published_year)
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .map(|y| y as i32),
            };

            by_isbn.insert(isbn13, books.len());
            books.push(book);
        }

        log::debug!(
            "loaded {} books in {}ms",
            books.len(),
            now.elapsed().as_micros() as f64 / 1000.0
        );

        Ok(Catalog { books, by_isbn })
    }

    /// Build a catalog directly from records. Test seam.
    pub fn from_books(books: Vec<Book>) -> Self {
        let by_isbn = books
            .iter()
            .enumerate()
            .map(|(idx, b)| (b.isbn13, idx))
            .collect();
        Catalog { books, by_isbn }
    }

    pub fn get(&self, isbn13: u64) -> Option<&Book> {
        self.by_isbn.get(&isbn13).map(|&idx| &self.books[idx])
    }

    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Book> {
        self.books.iter()
    }

    /// Sorted distinct category labels. The synthetic "All" entry is the
    /// web layer's concern, not the catalog's.
    pub fn categories(&self) -> Vec<String> {
        let mut categories: Vec<String> = self
            .books
            .iter()
            .map(|b| b.category.clone())
            .filter(|c| !c.is_empty())
            .collect();
        categories.sort();
        categories.dedup();
        categories
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_large_thumbnail_appends_size_hint() {
        assert_eq!(
            large_thumbnail("http://books.google.com/x?zoom=1"),
            "http://books.google.com/x?zoom=1&fife=w800"
        );
    }

    #[test]
    fn test_large_thumbnail_placeholder_when_empty() {
        assert_eq!(large_thumbnail(""), COVER_NOT_FOUND);
        assert_eq!(large_thumbnail("   "), COVER_NOT_FOUND);
    }

    #[test]
    fn test_from_books_lookup() {
        let catalog = Catalog::from_books(vec![
            Book {
                isbn13: 11,
                title: "First".into(),
                ..Default::default()
            },
            Book {
                isbn13: 22,
                title: "Second".into(),
                ..Default::default()
            },
        ]);

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.get(22).unwrap().title, "Second");
        assert!(catalog.get(33).is_none());
    }

    #[test]
    fn test_categories_sorted_distinct() {
        let mk = |id: u64, cat: &str| Book {
            isbn13: id,
            category: cat.to_string(),
            ..Default::default()
        };
        let catalog =
            Catalog::from_books(vec![mk(1, "Fiction"), mk(2, "Drama"), mk(3, "Fiction"), mk(4, "")]);

        assert_eq!(catalog.categories(), vec!["Drama", "Fiction"]);
    }
}
