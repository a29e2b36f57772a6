//! Tagged-description corpus parsing.
//!
//! The embedding corpus is a flat text file with one book per line in the
//! form `"<isbn13> <description text>"`. The leading token is the book id,
//! possibly wrapped in double quotes by the CSV export that produced the
//! file. The whole line, id prefix included, is the unit of embedding.

use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// One parsed corpus line.
#[derive(Debug, Clone, PartialEq)]
pub struct TaggedDescription {
    pub isbn13: u64,
    /// The full tagged line as it appeared in the file (quotes stripped).
    /// This is the text that gets embedded.
    pub text: String,
}

/// Parse a single corpus line.
///
/// Strips surrounding double quotes, then takes the first
/// whitespace-delimited token as the identifier. Returns `None` for blank
/// lines and lines whose leading token is not a number.
pub fn parse_line(line: &str) -> Option<TaggedDescription> {
    let stripped = line.trim().trim_matches('"').trim();
    if stripped.is_empty() {
        return None;
    }

    let lead = stripped.split_whitespace().next()?;
    let isbn13: u64 = lead.parse().ok()?;

    Some(TaggedDescription {
        isbn13,
        text: stripped.to_string(),
    })
}

/// Load the corpus file, skipping malformed lines with a warning.
pub fn load(path: &Path) -> std::io::Result<Vec<TaggedDescription>> {
    let file = std::fs::File::open(path)?;
    let reader = BufReader::new(file);

    let mut entries = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        match parse_line(&line) {
            Some(entry) => entries.push(entry),
            None => {
                log::warn!(
                    "skipping corpus line {}: no leading identifier token",
                    idx + 1
                );
            }
        }
    }

    log::info!("loaded {} tagged descriptions from {path:?}", entries.len());
    Ok(entries)
}

/// Derive the corpus file from catalog rows: one `"<isbn13> <description>"`
/// line per book, written atomically. Internal whitespace (including
/// newlines from the CSV) is collapsed so every book stays on one line.
/// Rows without a description are skipped. Returns the number of lines
/// written.
pub fn write<'a>(
    path: &Path,
    rows: impl Iterator<Item = (u64, &'a str)>,
) -> std::io::Result<usize> {
    let temp_path = path.with_extension("tmp");
    let mut writer = BufWriter::new(std::fs::File::create(&temp_path)?);

    let mut written = 0;
    for (isbn13, description) in rows {
        let description = description.split_whitespace().collect::<Vec<_>>().join(" ");
        if description.is_empty() {
            log::debug!("skipping isbn13 {isbn13}: no description to embed");
            continue;
        }
        writeln!(writer, "{isbn13} {description}")?;
        written += 1;
    }

    writer.flush()?;
    std::fs::rename(&temp_path, path)?;

    log::info!("wrote {written} tagged descriptions to {path:?}");
    Ok(written)
}

/// Hash of a corpus line, used to detect changed descriptions between runs
/// so only new or edited lines get re-embedded.
pub fn content_hash(text: &str) -> u64 {
    use std::hash::{Hash, Hasher};

    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    text.trim().hash(&mut hasher);
    hasher.finish()
}
