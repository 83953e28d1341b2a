//! Content extraction: decide whether a file is eligible and turn it into
//! searchable text plus filesystem metadata.
//!
//! Extraction never fails outward. Readers that error or return nothing are
//! replaced by a filename-derived stub, so every eligible file stays
//! searchable by name.

mod cache;
mod documents;

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use tracing::{debug, warn};

use crate::config::Config;
use crate::{extension_of, FileMetadata};
use cache::ExtractionCache;

const TEXT_EXTENSIONS: &[&str] = &[
    ".txt", ".md", ".log", ".csv", ".json", ".xml", ".html", ".css", ".js", ".py", ".java", ".c",
    ".cpp", ".h", ".cs", ".php", ".rb", ".go", ".rs", ".swift", ".kt", ".sql", ".sh", ".bat",
    ".ps1", ".yaml", ".yml", ".ini", ".cfg", ".conf", ".toml", ".rtf", ".tex", ".scss", ".less",
    ".vue", ".tsx", ".jsx",
];
const OFFICE_EXTENSIONS: &[&str] = &[".docx", ".doc", ".pptx", ".ppt", ".xlsx", ".xls"];
const ARCHIVE_EXTENSIONS: &[&str] = &[".zip", ".rar", ".7z", ".tar", ".gz", ".bz2"];
const IMAGE_EXTENSIONS: &[&str] = &[
    ".jpg", ".jpeg", ".png", ".gif", ".bmp", ".tiff", ".webp", ".ico", ".svg",
];
const KOREAN_DOC_EXTENSIONS: &[&str] = &[".hwp", ".hwpx"];
const MAIL_EXTENSIONS: &[&str] = &[".pst", ".eml", ".msg"];

/// Extraction class of a recognized extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Text,
    Pdf,
    Office,
    Archive,
    Image,
    KoreanDoc,
    Mail,
}

impl FileKind {
    /// Classify a lowercased, dotted extension. `None` = not recognized.
    pub fn from_extension(ext: &str) -> Option<FileKind> {
        let kind = if ext == ".pdf" {
            FileKind::Pdf
        } else if TEXT_EXTENSIONS.contains(&ext) {
            FileKind::Text
        } else if OFFICE_EXTENSIONS.contains(&ext) {
            FileKind::Office
        } else if ARCHIVE_EXTENSIONS.contains(&ext) {
            FileKind::Archive
        } else if IMAGE_EXTENSIONS.contains(&ext) {
            FileKind::Image
        } else if KOREAN_DOC_EXTENSIONS.contains(&ext) {
            FileKind::KoreanDoc
        } else if MAIL_EXTENSIONS.contains(&ext) {
            FileKind::Mail
        } else {
            return None;
        };
        Some(kind)
    }

    fn size_limit(self, config: &Config) -> u64 {
        let limits = &config.size_limits;
        match self {
            FileKind::Text | FileKind::Mail => limits.text,
            FileKind::Pdf => limits.pdf,
            FileKind::Office => limits.office,
            FileKind::Archive => limits.archive,
            FileKind::Image => limits.image,
            FileKind::KoreanDoc => limits.korean_doc,
        }
    }
}

/// Successful extraction: capped content (never empty) and metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Extracted {
    pub content: String,
    pub metadata: FileMetadata,
}

/// Thread-safe extractor shared by all pipeline workers.
pub struct Extractor {
    config: Config,
    cache: Mutex<ExtractionCache>,
}

impl Extractor {
    pub fn new(config: &Config) -> Self {
        Extractor {
            config: config.clone(),
            cache: Mutex::new(ExtractionCache::new(config.cache_capacity)),
        }
    }

    fn lock_cache(&self) -> MutexGuard<'_, ExtractionCache> {
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Number of cached extraction results.
    pub fn cached(&self) -> usize {
        self.lock_cache().len()
    }

    pub fn clear_cache(&self) {
        self.lock_cache().clear();
    }

    /// Exists, is a regular file, has a recognized extension and fits under
    /// the ceiling for its type.
    pub fn can_extract_fast(&self, path: &Path) -> bool {
        self.eligible_kind(path).is_some()
    }

    fn eligible_kind(&self, path: &Path) -> Option<FileKind> {
        let meta = std::fs::metadata(path).ok()?;
        if !meta.is_file() {
            return None;
        }
        let kind = FileKind::from_extension(&extension_of(path))?;
        let limit = kind.size_limit(&self.config);
        if meta.len() > limit {
            debug!(path = %path.display(), size = meta.len(), limit, "File too large, skipping extraction");
            return None;
        }
        Some(kind)
    }

    /// Extract content and metadata. `None` when the file is ineligible;
    /// callers index the bare filename instead.
    pub fn extract_fast(&self, path: &Path) -> Option<Extracted> {
        let kind = self.eligible_kind(path)?;
        let metadata = match FileMetadata::from_path(path) {
            Ok(m) => m,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Stat failed after eligibility check");
                return None;
            }
        };

        let key = (path.to_string_lossy().into_owned(), metadata.modified);
        if let Some(hit) = self.lock_cache().get(&key) {
            return Some(hit);
        }

        let raw = self.extract_kind(kind, path, &metadata);
        let content = finish_content(raw, &metadata.filename, self.config.content_cap_chars);
        debug!(path = %path.display(), chars = content.chars().count(), "Extracted content");

        let extracted = Extracted { content, metadata };
        self.lock_cache().insert(key, extracted.clone());
        Some(extracted)
    }

    fn extract_kind(&self, kind: FileKind, path: &Path, meta: &FileMetadata) -> String {
        let cfg = &self.config;
        let name = meta.filename.as_str();
        let ext = meta.extension.as_str();

        let result = match kind {
            FileKind::Text => read_text_head(path, cfg.text_read_bytes).map_err(documents::ExtractError::from),
            FileKind::Pdf => documents::pdf_text(path, cfg.pdf_max_pages),
            FileKind::Office => match ext {
                ".docx" => documents::docx_text(path, cfg.word_max_paragraphs),
                ".xlsx" => documents::xlsx_text(path, cfg.excel_max_sheets, cfg.excel_max_rows),
                ".pptx" => documents::pptx_text(path, cfg.pptx_max_slides),
                _ => Ok(typed_stub(ext, name)),
            },
            FileKind::Archive if ext == ".zip" => documents::zip_listing(path, cfg.archive_max_entries),
            FileKind::Archive => Ok(typed_stub(ext, name)),
            FileKind::Image => Ok(image_keywords(name)),
            FileKind::KoreanDoc | FileKind::Mail => Ok(document_stub(name)),
        };

        match result {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => {
                debug!(path = %path.display(), "No text extracted");
                typed_stub(ext, name)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Extraction failed, using filename stub");
                typed_stub(ext, name)
            }
        }
    }
}

/// Empty content becomes `File: <name>`; the result is capped at `cap` chars
/// but never below one.
pub(crate) fn finish_content(raw: String, filename: &str, cap: usize) -> String {
    let cap = cap.max(1);
    if raw.trim().is_empty() {
        return truncate_chars(format!("File: {}", filename), cap);
    }
    truncate_chars(raw, cap)
}

fn truncate_chars(mut s: String, cap: usize) -> String {
    if let Some((idx, _)) = s.char_indices().nth(cap) {
        s.truncate(idx);
    }
    s
}

// ─── Stubs ───────────────────────────────────────────────────────────

/// Per-type label used when a document yields no text.
fn typed_stub(ext: &str, name: &str) -> String {
    let label = match ext {
        ".pdf" => "PDF document",
        ".docx" | ".doc" => "Word document",
        ".xlsx" | ".xls" => "Excel document",
        ".pptx" | ".ppt" => "PowerPoint document",
        e if ARCHIVE_EXTENSIONS.contains(&e) => "Archive",
        _ => "File",
    };
    format!("{}: {}", label, name)
}

fn stem_words(name: &str) -> String {
    Path::new(name)
        .file_stem()
        .map(|s| s.to_string_lossy().to_lowercase())
        .unwrap_or_default()
        .replace(['_', '-'], " ")
}

/// Mail and Korean word-processor files: name plus stem words.
pub fn document_stub(name: &str) -> String {
    format!("Document file: {} {}", name, stem_words(name))
}

/// Images are never decoded; the stem is mined for category keywords.
pub fn image_keywords(name: &str) -> String {
    const CATEGORIES: &[(&[&str], &str)] = &[
        (&["photo", "pic", "image", "img"], "photo"),
        (&["screen", "shot", "capture"], "screenshot"),
        (&["logo", "icon", "symbol"], "graphic"),
        (&["wall", "paper", "background"], "wallpaper"),
    ];

    let base = stem_words(name);
    let extra: Vec<&str> = CATEGORIES
        .iter()
        .filter(|(needles, _)| needles.iter().any(|n| base.contains(n)))
        .map(|(_, keyword)| *keyword)
        .collect();

    format!("Image file: {} {} {} picture visual graphic", name, base, extra.join(" "))
}

// ─── Plain text ──────────────────────────────────────────────────────

fn read_text_head(path: &Path, limit: usize) -> std::io::Result<String> {
    let mut buf = Vec::with_capacity(limit.min(64 * 1024));
    File::open(path)?.take(limit as u64).read_to_end(&mut buf)?;
    Ok(decode_text(&buf))
}

/// Decode a byte prefix of a text file.
///
/// UTF-16 with BOM, then strict UTF-8 (a multibyte char cut off by the read
/// limit is dropped), then lossy UTF-8. When more than a tenth of the chars
/// would be replacement chars the bytes are read as Latin-1 instead.
pub fn decode_text(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFF, 0xFE]) {
        return decode_utf16(rest, u16::from_le_bytes);
    }
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        return decode_utf16(rest, u16::from_be_bytes);
    }
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);

    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(e) if e.error_len().is_none() => {
            String::from_utf8_lossy(&bytes[..e.valid_up_to()]).into_owned()
        }
        Err(_) => {
            let lossy = String::from_utf8_lossy(bytes);
            let total = lossy.chars().count().max(1);
            let replaced = lossy.chars().filter(|&c| c == char::REPLACEMENT_CHARACTER).count();
            if replaced * 10 > total {
                bytes.iter().map(|&b| b as char).collect()
            } else {
                lossy.into_owned()
            }
        }
    }
}

fn decode_utf16(bytes: &[u8], to_u16: fn([u8; 2]) -> u16) -> String {
    let units = bytes.chunks_exact(2).map(|pair| to_u16([pair[0], pair[1]]));
    char::decode_utf16(units)
        .map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MB: u64 = 1024 * 1024;

    fn extractor() -> Extractor {
        Extractor::new(&Config::default())
    }

    #[test]
    fn test_pdf_size_ceiling() {
        let tmp = tempfile::tempdir().unwrap();
        let big = tmp.path().join("big.pdf");
        let ok = tmp.path().join("ok.pdf");
        File::create(&big).unwrap().set_len(60 * MB).unwrap();
        File::create(&ok).unwrap().set_len(40 * MB).unwrap();

        let ex = extractor();
        assert!(!ex.can_extract_fast(&big));
        assert!(ex.can_extract_fast(&ok));
    }

    #[test]
    fn test_unrecognized_extension_and_directory_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let odd = tmp.path().join("data.xyz");
        std::fs::write(&odd, "hello").unwrap();
        let ex = extractor();
        assert!(!ex.can_extract_fast(&odd));
        assert!(!ex.can_extract_fast(tmp.path()));
        assert!(!ex.can_extract_fast(&tmp.path().join("missing.txt")));
        assert!(ex.extract_fast(&odd).is_none());
    }

    #[test]
    fn test_text_extraction_and_metadata() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("Notes.txt");
        std::fs::write(&path, "quarterly budget review").unwrap();

        let got = extractor().extract_fast(&path).unwrap();
        assert_eq!(got.content, "quarterly budget review");
        assert_eq!(got.metadata.filename, "Notes.txt");
        assert_eq!(got.metadata.extension, ".txt");
        assert_eq!(got.metadata.size, 23);
    }

    #[test]
    fn test_empty_file_gets_filename_stub() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("empty.md");
        std::fs::write(&path, "   \n").unwrap();
        let got = extractor().extract_fast(&path).unwrap();
        assert_eq!(got.content, "File: empty.md");
    }

    #[test]
    fn test_content_capped_at_limit() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("long.txt");
        std::fs::write(&path, "é".repeat(8000)).unwrap();
        let config = Config { content_cap_chars: 100, ..Config::default() };
        let got = Extractor::new(&config).extract_fast(&path).unwrap();
        assert_eq!(got.content.chars().count(), 100);
    }

    #[test]
    fn test_text_read_limit() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("big.log");
        std::fs::write(&path, format!("{}tailword", "x ".repeat(20_000))).unwrap();
        let got = extractor().extract_fast(&path).unwrap();
        assert!(!got.content.contains("tailword"));
    }

    #[test]
    fn test_broken_docx_falls_back_to_typed_stub() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("report.docx");
        std::fs::write(&path, b"not a zip").unwrap();
        let got = extractor().extract_fast(&path).unwrap();
        assert_eq!(got.content, "Word document: report.docx");
    }

    #[test]
    fn test_legacy_office_and_archive_stubs() {
        let tmp = tempfile::tempdir().unwrap();
        let doc = tmp.path().join("old.xls");
        let rar = tmp.path().join("backup.rar");
        std::fs::write(&doc, b"\xD0\xCF\x11\xE0").unwrap();
        std::fs::write(&rar, b"Rar!").unwrap();
        let ex = extractor();
        assert_eq!(ex.extract_fast(&doc).unwrap().content, "Excel document: old.xls");
        assert_eq!(ex.extract_fast(&rar).unwrap().content, "Archive: backup.rar");
    }

    #[test]
    fn test_image_keywords() {
        let text = image_keywords("Screen_Shot-logo.png");
        assert!(text.starts_with("Image file: Screen_Shot-logo.png screen shot logo"));
        assert!(text.contains("screenshot"));
        assert!(text.contains("graphic"));
        assert!(!text.contains("wallpaper"));
        assert!(text.ends_with("picture visual graphic"));
    }

    #[test]
    fn test_document_stub() {
        assert_eq!(document_stub("Meeting_Notes-2024.hwp"), "Document file: Meeting_Notes-2024.hwp meeting notes 2024");
    }

    #[test]
    fn test_cache_hit_until_mtime_changes() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("a.txt");
        std::fs::write(&path, "first").unwrap();
        let ex = extractor();
        assert_eq!(ex.extract_fast(&path).unwrap().content, "first");
        assert_eq!(ex.cached(), 1);

        // New mtime means a new key, never a stale hit
        std::fs::write(&path, "again").unwrap();
        let f = File::options().write(true).open(&path).unwrap();
        f.set_modified(std::time::UNIX_EPOCH + std::time::Duration::from_secs(1_000)).unwrap();
        drop(f);
        assert_eq!(ex.extract_fast(&path).unwrap().content, "again");
        assert_eq!(ex.cached(), 2);

        ex.clear_cache();
        assert_eq!(ex.cached(), 0);
    }

    #[test]
    fn test_zero_cap_keeps_content_non_empty() {
        assert_eq!(finish_content(String::new(), "a.txt", 0), "F");
        assert_eq!(finish_content("body".to_string(), "a.txt", 0), "b");
    }

    #[test]
    fn test_decode_utf8_truncated_tail() {
        let mut bytes = "héllo".as_bytes().to_vec();
        bytes.extend_from_slice(&"é".as_bytes()[..1]);
        assert_eq!(decode_text(&bytes), "héllo");
    }

    #[test]
    fn test_decode_latin1_fallback() {
        let bytes = [b'c', b'a', b'f', 0xE9, b' ', 0xE0, 0xE8];
        assert_eq!(decode_text(&bytes), "café àè");
    }

    #[test]
    fn test_decode_utf16_bom() {
        let mut bytes = vec![0xFF, 0xFE];
        for unit in "hi".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        assert_eq!(decode_text(&bytes), "hi");
    }

    #[test]
    fn test_decode_mostly_utf8_stays_lossy() {
        let mut bytes = "a long enough line of ordinary text".as_bytes().to_vec();
        bytes.push(0xFF);
        let text = decode_text(&bytes);
        assert!(text.starts_with("a long enough line"));
        assert!(text.ends_with(char::REPLACEMENT_CHARACTER));
    }
}
