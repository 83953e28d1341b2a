//! Bring a saved snapshot in line with the filesystem.
//!
//! The snapshot's `(size, mtime)` view is diffed against a fresh discovery of
//! the given folders. Removed paths are unlinked, added and modified paths are
//! re-extracted, and the result is written back to the same file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::time::Instant;

use tracing::{debug, info, warn};

use super::changes::ChangeSet;
use crate::config::Config;
use crate::error::SearchError;
use crate::extract::Extractor;
use crate::pipeline::{discover_files, path_key};
use crate::store::{make_entry, IndexStore};
use crate::{FileMetadata, Fingerprint};

/// How added and modified files get their content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateMode {
    /// Run the extractor on every added or modified file.
    #[default]
    Reextract,
    /// Refresh metadata only. Modified files keep their old content and
    /// keywords; added files are indexed by name.
    MetadataOnly,
}

#[derive(Debug, Clone)]
pub struct UpdateReport {
    pub changes: ChangeSet,
    /// Files in the snapshot after the update.
    pub total_files: usize,
    pub path: PathBuf,
}

impl UpdateReport {
    pub fn summary(&self) -> String {
        let c = self.changes.counts();
        let mut out = format!(
            "Update summary:\n  Added: {} files\n  Removed: {} files\n  Modified: {} files\n  Unchanged: {} files\n",
            c.added, c.removed, c.modified, c.unchanged
        );
        self.changes.write_details(&mut out, Some(super::SUMMARY_DETAIL_LIMIT));
        out
    }
}

/// Current metadata for every eligible file under `folders`, keyed like the
/// store keys them. Files that vanish mid-scan are skipped.
pub fn current_view(folders: &[PathBuf], config: &Config) -> BTreeMap<String, (PathBuf, FileMetadata)> {
    let stop = AtomicBool::new(false);
    let mut view = BTreeMap::new();
    for path in discover_files(folders, &config.extensions, config.per_folder_file_cap, &stop) {
        match FileMetadata::from_path(&path) {
            Ok(meta) => {
                view.insert(path_key(&path), (path, meta));
            }
            Err(e) => debug!(path = %path.display(), error = %e, "Stat failed, skipping"),
        }
    }
    view
}

/// Diff `store` against `current` and apply the changes in place.
pub fn apply_changes(
    store: &IndexStore,
    current: &BTreeMap<String, (PathBuf, FileMetadata)>,
    extractor: &Extractor,
    mode: UpdateMode,
) -> ChangeSet {
    let fingerprints: BTreeMap<String, Fingerprint> = current
        .iter()
        .map(|(k, (_, m))| (k.clone(), m.fingerprint()))
        .collect();
    let changes = ChangeSet::between(&store.fingerprints(), &fingerprints);

    for path in &changes.removed {
        store.remove(path);
    }

    let upserts = changes
        .added
        .iter()
        .map(|p| (p.as_str(), false))
        .chain(changes.modified_paths().map(|p| (p, true)));

    for (key, was_indexed) in upserts {
        let Some((path, meta)) = current.get(key) else { continue };
        match mode {
            UpdateMode::Reextract => match extractor.extract_fast(path) {
                Some(extracted) => store.add(key, extracted.content, extracted.metadata),
                None => store.add(key, format!("File: {}", meta.filename), meta.clone()),
            },
            UpdateMode::MetadataOnly => match store.get(key).filter(|_| was_indexed) {
                Some(mut entry) => {
                    entry.metadata = meta.clone();
                    store.add_entry(key, entry);
                }
                None => store.add_entry(key, make_entry(key, format!("File: {}", meta.filename), meta.clone())),
            },
        }
    }
    changes
}

/// Load the snapshot at `path`, refresh it against `folders`, and save it
/// back in place. A load failure aborts before anything is written.
pub fn update_snapshot(
    path: &Path,
    folders: &[PathBuf],
    config: &Config,
    mode: UpdateMode,
) -> Result<UpdateReport, SearchError> {
    if folders.is_empty() {
        return Err(SearchError::InvalidArgs("update needs at least one folder".to_string()));
    }
    let start = Instant::now();
    let store = IndexStore::open(path, config.max_snapshot_bytes)?;
    let before = store.len();

    let existing: Vec<PathBuf> = folders.iter().filter(|f| f.is_dir()).cloned().collect();
    if existing.len() < folders.len() {
        warn!(missing = folders.len() - existing.len(), "Some update folders do not exist");
    }
    if existing.is_empty() {
        return Err(SearchError::DirNotFound(
            folders.iter().map(|f| f.display().to_string()).collect::<Vec<_>>().join(", "),
        ));
    }

    let current = current_view(&existing, config);
    let extractor = Extractor::new(config);
    let changes = apply_changes(&store, &current, &extractor, mode);

    store.save(path)?;
    let c = changes.counts();
    info!(
        path = %path.display(),
        before,
        after = store.len(),
        added = c.added,
        removed = c.removed,
        modified = c.modified,
        unchanged = c.unchanged,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Updated snapshot"
    );

    Ok(UpdateReport { total_files: store.len(), changes, path: path.to_path_buf() })
}
