//! Snapshot persistence: save/load of the full store state and snapshot
//! file naming.
//!
//! On-disk layout: magic bytes, then one LZ4 frame holding two bincode
//! values, a [`SnapshotHeader`] followed by a [`SnapshotBody`]. The header is
//! decoded first so an unknown version is rejected before the body is read.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use bincode::Options;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{LoadFailure, SearchError};
use crate::{filename_tokens, IndexedFile, Stats};

// ─── Format constants ────────────────────────────────────────────────

/// Magic bytes identifying a snapshot file.
pub const SNAPSHOT_MAGIC: &[u8; 4] = b"FXS1";

/// File extension used for snapshots (without the dot).
pub const SNAPSHOT_EXTENSION: &str = "fxidx";

/// Version written by [`save_snapshot`].
pub const CURRENT_VERSION: &str = "1.1";

/// Index-only schema: no filename index, no filename keywords.
pub const LEGACY_VERSION: &str = "1.0";

pub const SUPPORTED_VERSIONS: &[&str] = &[LEGACY_VERSION, CURRENT_VERSION];

/// Upper bound of decoded size relative to the on-disk size.
const DECODE_EXPANSION: u64 = 8;

/// Token -> sorted list of paths.
pub type Postings = BTreeMap<String, Vec<String>>;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SnapshotHeader {
    pub version: String,
    /// ISO-8601 creation timestamp.
    pub created: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct SnapshotBody {
    pub index_data: BTreeMap<String, IndexedFile>,
    pub word_index: Postings,
    /// `None` in version 1.0 snapshots until rebuilt on load.
    pub filename_index: Option<Postings>,
    pub stats: Stats,
}

/// A decoded snapshot. After [`load_snapshot`] the filename index is always
/// present, whatever the on-disk version.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub header: SnapshotHeader,
    pub body: SnapshotBody,
}

impl Snapshot {
    /// Wrap a body with a fresh current-version header.
    pub fn new(body: SnapshotBody) -> Self {
        Snapshot {
            header: SnapshotHeader {
                version: CURRENT_VERSION.to_string(),
                created: chrono::Local::now().to_rfc3339(),
            },
            body,
        }
    }

    pub fn file_count(&self) -> usize {
        self.body.index_data.len()
    }

    /// Filename postings, empty when absent.
    pub fn filename_postings(&self) -> &Postings {
        static EMPTY: Postings = BTreeMap::new();
        self.body.filename_index.as_ref().unwrap_or(&EMPTY)
    }
}

fn codec() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .allow_trailing_bytes()
}

// ─── Save ────────────────────────────────────────────────────────────

/// Write a snapshot, always at [`CURRENT_VERSION`].
///
/// Data goes to a sibling temp file first and is renamed into place, so a
/// failed save never leaves a truncated snapshot behind.
pub fn save_snapshot(path: &Path, snapshot: &Snapshot) -> Result<(), SearchError> {
    let start = Instant::now();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let header = SnapshotHeader {
        version: CURRENT_VERSION.to_string(),
        created: snapshot.header.created.clone(),
    };

    let tmp = path.with_extension(format!("{}.tmp", SNAPSHOT_EXTENSION));
    let write = || -> Result<(), SearchError> {
        let file = fs::File::create(&tmp)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(SNAPSHOT_MAGIC)?;
        let mut encoder = lz4_flex::frame::FrameEncoder::new(writer);
        codec().serialize_into(&mut encoder, &header)?;
        codec().serialize_into(&mut encoder, &snapshot.body)?;
        let mut writer = encoder
            .finish()
            .map_err(|e| SearchError::SaveFailed(format!("LZ4 finish failed: {}", e)))?;
        writer.flush()?;
        Ok(())
    };

    if let Err(e) = write() {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    fs::rename(&tmp, path)?;

    let size = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    info!(
        path = %path.display(),
        files = snapshot.body.index_data.len(),
        size_bytes = size,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Saved snapshot"
    );
    Ok(())
}

// ─── Load ────────────────────────────────────────────────────────────

/// Read and validate a snapshot.
///
/// Every failure maps to a [`LoadFailure`] kind. Nothing outside the returned
/// value is touched, so a caller can load first and swap state only on success.
pub fn load_snapshot(path: &Path, max_bytes: u64) -> Result<Snapshot, SearchError> {
    let start = Instant::now();
    let fail = |kind: LoadFailure| SearchError::IndexLoad {
        path: path.display().to_string(),
        kind,
    };

    let meta = match fs::metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(fail(LoadFailure::NotFound)),
        Err(e) => return Err(SearchError::Io(e)),
    };
    if !meta.is_file() {
        return Err(fail(LoadFailure::NotAFile));
    }
    let size = meta.len();
    if size == 0 {
        return Err(fail(LoadFailure::Empty));
    }
    if size > max_bytes {
        return Err(fail(LoadFailure::OutOfMemory { size, limit: max_bytes }));
    }

    let mut reader = BufReader::new(fs::File::open(path)?);
    let mut magic = [0u8; 4];
    if reader.read_exact(&mut magic).is_err() || &magic != SNAPSHOT_MAGIC {
        return Err(fail(LoadFailure::Corrupt("missing snapshot magic bytes".to_string())));
    }

    let limit = max_bytes.saturating_mul(DECODE_EXPANSION);
    let decode_err = |e: bincode::Error| match *e {
        bincode::ErrorKind::SizeLimit => fail(LoadFailure::OutOfMemory { size, limit }),
        other => fail(LoadFailure::Corrupt(other.to_string())),
    };

    let mut decoder = lz4_flex::frame::FrameDecoder::new(reader);
    let header: SnapshotHeader = codec()
        .with_limit(limit)
        .deserialize_from(&mut decoder)
        .map_err(decode_err)?;
    if !SUPPORTED_VERSIONS.contains(&header.version.as_str()) {
        return Err(fail(LoadFailure::UnsupportedVersion(header.version)));
    }

    let mut body: SnapshotBody = codec()
        .with_limit(limit)
        .deserialize_from(&mut decoder)
        .map_err(decode_err)?;

    if header.version == LEGACY_VERSION || body.filename_index.is_none() {
        rebuild_filename_index(&mut body);
        debug!(path = %path.display(), version = %header.version, "Rebuilt filename index from stems");
    }

    info!(
        path = %path.display(),
        version = %header.version,
        files = body.index_data.len(),
        size_bytes = size,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Loaded snapshot"
    );
    Ok(Snapshot { header, body })
}

/// Re-tokenize every stem into filename keywords and postings.
fn rebuild_filename_index(body: &mut SnapshotBody) {
    let mut postings: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for (path, entry) in body.index_data.iter_mut() {
        entry.filename_keywords = filename_tokens(path);
        for token in &entry.filename_keywords {
            postings.entry(token.clone()).or_default().insert(path.clone());
        }
    }
    body.filename_index = Some(
        postings
            .into_iter()
            .map(|(token, paths)| (token, paths.into_iter().collect()))
            .collect(),
    );
    body.stats.total_filename_words = body.filename_index.as_ref().map_or(0, |f| f.len() as u64);
}

// ─── File naming ─────────────────────────────────────────────────────

const FORBIDDEN_NAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];
const MAX_SEGMENT_CHARS: usize = 20;
const MAX_SCAN_LABEL_CHARS: usize = 50;
const MAX_MERGE_LABEL_CHARS: usize = 40;

/// Timestamp prefix of snapshot filenames, `YYMMDD_HHMM`.
pub fn timestamp_prefix() -> String {
    chrono::Local::now().format("%y%m%d_%H%M").to_string()
}

/// Make a folder name safe for a filename: drop reserved characters, turn
/// spaces and dots into `_`, collapse repeats, cap at 20 chars.
pub fn sanitize_folder_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if FORBIDDEN_NAME_CHARS.contains(&c) {
            continue;
        }
        let c = if c == ' ' || c == '.' { '_' } else { c };
        if c == '_' && out.ends_with('_') {
            continue;
        }
        out.push(c);
    }
    out.trim_matches('_').chars().take(MAX_SEGMENT_CHARS).collect()
}

fn cap_label(label: String, max: usize) -> String {
    if label.chars().count() <= max {
        return label;
    }
    let head: String = label.chars().take(max - 3).collect();
    format!("{}...", head)
}

fn folder_label(folder: &Path) -> String {
    folder
        .components()
        .next_back()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .map(|n| sanitize_folder_name(&n))
        .unwrap_or_default()
}

/// `YYMMDD_HHMM_<folders>.fxidx` for a scan of `folders`.
pub fn snapshot_filename(folders: &[PathBuf]) -> String {
    snapshot_filename_at(&timestamp_prefix(), folders)
}

pub(crate) fn snapshot_filename_at(stamp: &str, folders: &[PathBuf]) -> String {
    let mut names: Vec<String> = Vec::new();
    for folder in folders {
        let name = folder_label(folder);
        if !name.is_empty() && !names.contains(&name) {
            names.push(name);
        }
    }
    if names.is_empty() {
        return format!("{}.{}", stamp, SNAPSHOT_EXTENSION);
    }
    let label = cap_label(names.join("-"), MAX_SCAN_LABEL_CHARS);
    format!("{}_{}.{}", stamp, label, SNAPSHOT_EXTENSION)
}

/// `YYMMDD_HHMM_<a+b+...>.fxidx` from the folder part of each input's name.
pub fn merged_filename(inputs: &[PathBuf]) -> String {
    merged_filename_at(&timestamp_prefix(), inputs)
}

pub(crate) fn merged_filename_at(stamp: &str, inputs: &[PathBuf]) -> String {
    let mut names: Vec<String> = Vec::new();
    for input in inputs {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let parts: Vec<&str> = stem.split('_').collect();
        if parts.len() >= 3 {
            let name = parts[2..].join("_");
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }
    if names.is_empty() {
        return format!("{}_merged.{}", stamp, SNAPSHOT_EXTENSION);
    }
    let label = cap_label(names.join("+"), MAX_MERGE_LABEL_CHARS);
    format!("{}_{}.{}", stamp, label, SNAPSHOT_EXTENSION)
}

/// Snapshot files in `dir`, sorted by name.
pub fn list_snapshots(dir: &Path) -> Result<Vec<PathBuf>, SearchError> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut found: Vec<PathBuf> = fs::read_dir(dir)?
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().and_then(|e| e.to_str()) == Some(SNAPSHOT_EXTENSION))
        .collect();
    found.sort();
    Ok(found)
}

#[cfg(test)]
#[path = "index_tests.rs"]
mod tests;
