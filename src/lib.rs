//! # filex: desktop file search engine
//!
//! In-memory content and filename inverted indexes over scanned folders,
//! fed by a concurrent extraction pipeline and persisted as LZ4-compressed
//! snapshots that can be merged, updated against the filesystem, and compared.
//!
//! ## Library usage
//!
//! The `filex` binary is the primary consumer, but every component is exposed
//! here so a GUI front-end (or benchmarks and tests) can drive scans, searches
//! and lifecycle tools directly.

use std::collections::BTreeSet;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

pub mod config;
pub mod error;
pub mod extract;
pub mod index;
pub mod lifecycle;
pub mod pipeline;
pub mod search;
pub mod store;

pub use config::Config;
pub use error::{LoadFailure, SearchError};
pub use extract::{Extracted, Extractor};
pub use index::{Snapshot, SnapshotBody, SnapshotHeader};
pub use pipeline::{ScanEvent, ScanFailure, ScanHandle, ScanJob};
pub use search::{MatchType, SearchResult};
pub use store::IndexStore;

/// Minimum token length (in chars) kept by the tokenizer.
pub const MIN_TOKEN_LEN: usize = 2;

/// Maximum token length (in chars) kept by the tokenizer.
pub const MAX_TOKEN_LEN: usize = 50;

/// Characters treated as word separators in extracted content.
pub const CONTENT_DELIMITERS: &[char] = &[
    ' ', '\n', '\t', '.', ',', ';', ':', '!', '?', '"', '\'', '(', ')', '[', ']', '{', '}',
];

/// Characters treated as word separators in file stems.
pub const FILENAME_DELIMITERS: &[char] = &[' ', '_', '-', '.', '(', ')', '[', ']'];

// ─── Tokenization ────────────────────────────────────────────────────

/// Tokenize text into a set of normalized words.
///
/// Every delimiter is replaced with a space, the text is lowercased and split
/// on whitespace. Only purely alphanumeric tokens of 2..=50 chars survive.
///
/// # Examples
///
/// ```
/// use filex::{tokenize, CONTENT_DELIMITERS};
///
/// let tokens = tokenize("Quarterly report (final), v2!", CONTENT_DELIMITERS);
/// assert!(tokens.contains("quarterly"));
/// assert!(tokens.contains("v2"));
/// assert!(!tokens.contains("(final)"));
/// ```
#[must_use]
pub fn tokenize(text: &str, delimiters: &[char]) -> BTreeSet<String> {
    let normalized: String = text
        .chars()
        .map(|c| if delimiters.contains(&c) { ' ' } else { c })
        .collect::<String>()
        .to_lowercase();

    normalized
        .split_whitespace()
        .filter(|word| {
            let len = word.chars().count();
            (MIN_TOKEN_LEN..=MAX_TOKEN_LEN).contains(&len) && word.chars().all(char::is_alphanumeric)
        })
        .map(str::to_string)
        .collect()
}

/// Content keywords for a block of extracted text.
#[must_use]
pub fn content_tokens(content: &str) -> BTreeSet<String> {
    tokenize(content, CONTENT_DELIMITERS)
}

/// Filename keywords: tokens of the file stem (name without extension).
#[must_use]
pub fn filename_tokens(path: &str) -> BTreeSet<String> {
    let stem = Path::new(path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("");
    tokenize(stem, FILENAME_DELIMITERS)
}

/// Query tokens, in first-seen order without duplicates.
///
/// Queries are split on both delimiter sets so `report_final` matches the
/// filename tokens `report` and `final`.
#[must_use]
pub fn query_tokens(query: &str) -> Vec<String> {
    let mut delimiters: Vec<char> = CONTENT_DELIMITERS.to_vec();
    delimiters.extend(FILENAME_DELIMITERS.iter().filter(|c| !CONTENT_DELIMITERS.contains(c)));

    let normalized: String = query
        .chars()
        .map(|c| if delimiters.contains(&c) { ' ' } else { c })
        .collect::<String>()
        .to_lowercase();

    let mut seen = BTreeSet::new();
    normalized
        .split_whitespace()
        .filter(|word| {
            let len = word.chars().count();
            (MIN_TOKEN_LEN..=MAX_TOKEN_LEN).contains(&len) && word.chars().all(char::is_alphanumeric)
        })
        .filter(|word| seen.insert(word.to_string()))
        .map(str::to_string)
        .collect()
}

// ─── Paths and time ──────────────────────────────────────────────────

/// Strip the `\\?\` extended-length path prefix that Windows canonicalize adds.
#[must_use]
pub fn clean_path(p: &str) -> String {
    p.strip_prefix(r"\\?\").unwrap_or(p).to_string()
}

/// Seconds since the Unix epoch, saturating to 0 for pre-epoch clocks.
#[must_use]
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn system_time_secs(t: std::io::Result<SystemTime>) -> Option<u64> {
    t.ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
}

/// Lowercased extension with a leading dot (`".pdf"`), or empty.
#[must_use]
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_lowercase()))
        .unwrap_or_default()
}

// ─── Core data model ─────────────────────────────────────────────────

/// Filesystem facts captured for an indexed file.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FileMetadata {
    pub filename: String,
    /// Lowercased, with leading dot.
    pub extension: String,
    pub size: u64,
    /// Modification time, seconds since epoch.
    pub modified: u64,
    /// Creation time, seconds since epoch (falls back to `modified`).
    pub created: u64,
}

impl FileMetadata {
    /// Stat a file and capture its metadata.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let meta = std::fs::metadata(path)?;
        let modified = system_time_secs(meta.modified()).unwrap_or(0);
        let created = system_time_secs(meta.created()).unwrap_or(modified);
        Ok(FileMetadata {
            filename: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            extension: extension_of(path),
            size: meta.len(),
            modified,
            created,
        })
    }

    /// The `(size, modified)` pair used for change detection.
    #[must_use]
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint { size: self.size, modified: self.modified }
    }
}

/// Size and mtime of a file: the only facts change detection looks at.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fingerprint {
    pub size: u64,
    pub modified: u64,
}

/// One entry per scanned path. The path itself is the key of the owning map.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct IndexedFile {
    /// Extracted text, capped at the configured char limit.
    pub content: String,
    pub metadata: FileMetadata,
    #[serde(rename = "keywords")]
    pub content_keywords: BTreeSet<String>,
    pub filename_keywords: BTreeSet<String>,
    /// Seconds since epoch at ingestion.
    pub indexed_time: u64,
}

/// Aggregate counters, always derived from the store's contents.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Stats {
    pub total_files: u64,
    pub total_words: u64,
    pub total_filename_words: u64,
    pub total_size: u64,
    pub last_update: Option<u64>,
}

/// Which inverted index a query runs against.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    Content,
    Filename,
    #[default]
    Both,
}

impl SearchMode {
    pub fn uses_content(self) -> bool {
        matches!(self, SearchMode::Content | SearchMode::Both)
    }

    pub fn uses_filename(self) -> bool {
        matches!(self, SearchMode::Filename | SearchMode::Both)
    }
}

impl std::str::FromStr for SearchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "content" => Ok(SearchMode::Content),
            "filename" | "name" => Ok(SearchMode::Filename),
            "both" | "all" => Ok(SearchMode::Both),
            other => Err(format!("unknown search mode '{}' (expected content, filename or both)", other)),
        }
    }
}

impl std::fmt::Display for SearchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SearchMode::Content => "content",
            SearchMode::Filename => "filename",
            SearchMode::Both => "both",
        };
        f.write_str(s)
    }
}


// ─── Property-based tests (proptest) ─────────────────────────────────

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Every token is lowercase, alphanumeric, and within the length bounds.
        #[test]
        fn tokens_are_normalized(input in "\\PC{0,300}") {
            for token in content_tokens(&input) {
                let len = token.chars().count();
                prop_assert!((MIN_TOKEN_LEN..=MAX_TOKEN_LEN).contains(&len), "bad length: {}", token);
                prop_assert!(token.chars().all(char::is_alphanumeric), "non-alnum: {}", token);
                prop_assert_eq!(&token, &token.to_lowercase());
            }
        }

        /// Tokenizing is insensitive to ASCII case.
        #[test]
        fn tokenize_case_insensitive(input in "[a-zA-Z0-9 .,;]{0,200}") {
            prop_assert_eq!(content_tokens(&input), content_tokens(&input.to_uppercase()));
        }

        /// A single ASCII word of valid length is its own token.
        #[test]
        fn tokenize_single_word(word in "[a-zA-Z0-9]{2,50}") {
            let tokens = content_tokens(&word);
            prop_assert!(tokens.contains(&word.to_lowercase()));
            prop_assert_eq!(tokens.len(), 1);
        }

        /// Query tokens never repeat.
        #[test]
        fn query_tokens_unique(input in "[a-c ]{0,60}") {
            let tokens = query_tokens(&input);
            let unique: BTreeSet<_> = tokens.iter().cloned().collect();
            prop_assert_eq!(tokens.len(), unique.len());
        }
    }
}
