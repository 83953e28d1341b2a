//! Engine configuration, injected into every component at construction.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::SearchError;

const MB: u64 = 1024 * 1024;

/// Default extension allow-list used by scans.
pub const DEFAULT_EXTENSIONS: &[&str] = &[
    // text and code
    ".txt", ".py", ".js", ".html", ".css", ".json", ".xml", ".md", ".log", ".csv", ".java", ".c",
    ".cpp", ".h", ".cs", ".pdf", ".php", ".rb", ".go", ".rs", ".swift", ".kt", ".yaml", ".yml",
    ".ini", ".cfg", ".conf", ".toml",
    // office
    ".docx", ".doc", ".pptx", ".ppt", ".xlsx", ".xls",
    // archives
    ".zip", ".rar", ".7z", ".tar", ".gz", ".bz2",
    // korean word processors
    ".hwp", ".hwpx",
    // mail and rich text
    ".pst", ".eml", ".msg", ".rtf",
    // images
    ".jpg", ".jpeg", ".png", ".gif", ".bmp", ".tiff", ".webp", ".ico", ".svg",
];

/// Per-type size ceilings in bytes. Files above the ceiling are ineligible
/// for extraction and get indexed by name only.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct SizeLimits {
    pub text: u64,
    pub pdf: u64,
    pub office: u64,
    pub archive: u64,
    pub image: u64,
    pub korean_doc: u64,
}

impl Default for SizeLimits {
    fn default() -> Self {
        SizeLimits {
            text: 10 * MB,
            pdf: 50 * MB,
            office: 100 * MB,
            archive: 500 * MB,
            image: 20 * MB,
            korean_doc: 50 * MB,
        }
    }
}

/// Every tunable the engine recognizes. Unknown keys in a config file are
/// rejected; missing keys take their defaults.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Max chars of extracted content kept per file.
    pub content_cap_chars: usize,
    /// Bytes read from the head of plain-text files.
    pub text_read_bytes: usize,
    pub size_limits: SizeLimits,
    pub pdf_max_pages: usize,
    pub word_max_paragraphs: usize,
    pub excel_max_sheets: usize,
    pub excel_max_rows: usize,
    pub pptx_max_slides: usize,
    pub archive_max_entries: usize,
    /// Extraction cache entries before oldest-first eviction.
    pub cache_capacity: usize,
    /// Worker threads used by the indexing pipeline.
    pub workers: usize,
    pub max_batch_size: usize,
    /// Hard cap on files collected from a single root folder.
    pub per_folder_file_cap: usize,
    pub snippet_len: usize,
    pub default_max_results: usize,
    /// Extension allow-list (lowercase, leading dot).
    pub extensions: Vec<String>,
    /// Where snapshots are written by default. `None` = platform data dir.
    pub index_dir: Option<PathBuf>,
    /// Snapshots larger than this are refused with an out-of-memory failure.
    pub max_snapshot_bytes: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            content_cap_chars: 10_000,
            text_read_bytes: 10_000,
            size_limits: SizeLimits::default(),
            pdf_max_pages: 5,
            word_max_paragraphs: 20,
            excel_max_sheets: 3,
            excel_max_rows: 50,
            pptx_max_slides: 20,
            archive_max_entries: 100,
            cache_capacity: 500,
            workers: 4,
            max_batch_size: 50,
            per_folder_file_cap: 10_000,
            snippet_len: 200,
            default_max_results: 500,
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            index_dir: None,
            max_snapshot_bytes: 2048 * MB,
        }
    }
}

impl Config {
    /// Read a JSON config file. Missing keys fall back to defaults.
    pub fn from_file(path: &Path) -> Result<Config, SearchError> {
        let text = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&text).map_err(|e| SearchError::Config {
            path: path.display().to_string(),
            source: e,
        })?;
        debug!(path = %path.display(), "Loaded config file");
        Ok(config.normalized())
    }

    /// Load `path` if given, else `<data dir>/filex/config.json` when it
    /// exists, else defaults.
    pub fn load(path: Option<&Path>) -> Result<Config, SearchError> {
        if let Some(p) = path {
            return Config::from_file(p);
        }
        let default_path = data_dir().join("config.json");
        if default_path.is_file() {
            Config::from_file(&default_path)
        } else {
            Ok(Config::default())
        }
    }

    /// Snapshot directory, resolving the platform default.
    pub fn index_dir(&self) -> PathBuf {
        self.index_dir
            .clone()
            .unwrap_or_else(|| data_dir().join("indexes"))
    }

    /// Clamp values that would stall the pipeline and normalize extensions.
    #[must_use]
    pub fn normalized(mut self) -> Config {
        self.workers = self.workers.max(1);
        self.max_batch_size = self.max_batch_size.max(1);
        self.cache_capacity = self.cache_capacity.max(1);
        self.content_cap_chars = self.content_cap_chars.max(1);
        self.extensions = normalize_extensions(self.extensions.iter().map(String::as_str));
        self
    }
}

/// `"PDF"`, `".pdf"`, `" pdf "` all become `".pdf"`. Empty entries are dropped.
pub fn normalize_extensions<'a>(exts: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for ext in exts {
        let trimmed = ext.trim().trim_start_matches('.').to_lowercase();
        if trimmed.is_empty() {
            continue;
        }
        let dotted = format!(".{}", trimmed);
        if !out.contains(&dotted) {
            out.push(dotted);
        }
    }
    out
}

/// Application data directory: `<data_local_dir>/filex`.
pub fn data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    base.join("filex")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_limits() {
        let c = Config::default();
        assert_eq!(c.content_cap_chars, 10_000);
        assert_eq!(c.size_limits.pdf, 50 * MB);
        assert_eq!(c.size_limits.office, 100 * MB);
        assert_eq!(c.size_limits.archive, 500 * MB);
        assert_eq!(c.size_limits.image, 20 * MB);
        assert_eq!(c.cache_capacity, 500);
        assert_eq!(c.workers, 4);
        assert!(c.extensions.contains(&".pdf".to_string()));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");
        std::fs::write(&path, r#"{ "workers": 8, "extensions": ["TXT", ".md", "txt"] }"#).unwrap();
        let c = Config::from_file(&path).unwrap();
        assert_eq!(c.workers, 8);
        assert_eq!(c.extensions, vec![".txt", ".md"]);
        assert_eq!(c.snippet_len, 200);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");
        std::fs::write(&path, r#"{ "dark_mode": true }"#).unwrap();
        let err = Config::from_file(&path).unwrap_err();
        assert!(matches!(err, SearchError::Config { .. }));
    }

    #[test]
    fn test_normalized_clamps_zero_workers() {
        let c = Config { workers: 0, max_batch_size: 0, content_cap_chars: 0, ..Config::default() }.normalized();
        assert_eq!(c.workers, 1);
        assert_eq!(c.max_batch_size, 1);
        assert_eq!(c.content_cap_chars, 1);
    }

    #[test]
    fn test_explicit_index_dir() {
        let c = Config { index_dir: Some(PathBuf::from("/tmp/idx")), ..Config::default() };
        assert_eq!(c.index_dir(), PathBuf::from("/tmp/idx"));
    }
}
