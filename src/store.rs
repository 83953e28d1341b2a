//! In-memory index store: file entries plus content and filename inverted
//! indexes, behind a single read-write lock.
//!
//! Every mutation runs under the write lock for its whole read-modify-write,
//! so a concurrent search never observes a half-applied file.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info};

use crate::error::SearchError;
use crate::index::{self, Postings, Snapshot, SnapshotBody, SnapshotHeader};
use crate::search::{self, SearchOptions, SearchResult};
use crate::{content_tokens, filename_tokens, unix_now, FileMetadata, Fingerprint, IndexedFile, Stats};

/// Token -> paths.
pub(crate) type PostingSets = HashMap<String, HashSet<String>>;

#[derive(Default)]
pub(crate) struct StoreState {
    pub(crate) files: HashMap<String, IndexedFile>,
    pub(crate) word_index: PostingSets,
    pub(crate) filename_index: PostingSets,
    pub(crate) last_update: Option<u64>,
    pub(crate) backing: Option<PathBuf>,
}

impl StoreState {
    fn unlink(&mut self, path: &str) -> Option<IndexedFile> {
        let old = self.files.remove(path)?;
        drop_postings(&mut self.word_index, &old.content_keywords, path);
        drop_postings(&mut self.filename_index, &old.filename_keywords, path);
        Some(old)
    }

    fn link(&mut self, path: String, entry: IndexedFile) {
        for token in &entry.content_keywords {
            self.word_index.entry(token.clone()).or_default().insert(path.clone());
        }
        for token in &entry.filename_keywords {
            self.filename_index.entry(token.clone()).or_default().insert(path.clone());
        }
        self.files.insert(path, entry);
    }

    fn stats(&self) -> Stats {
        Stats {
            total_files: self.files.len() as u64,
            total_words: self.word_index.len() as u64,
            total_filename_words: self.filename_index.len() as u64,
            total_size: self.files.values().map(|f| f.metadata.size).sum(),
            last_update: self.last_update,
        }
    }
}

fn drop_postings(index: &mut PostingSets, tokens: &std::collections::BTreeSet<String>, path: &str) {
    for token in tokens {
        if let Some(paths) = index.get_mut(token) {
            paths.remove(path);
            if paths.is_empty() {
                index.remove(token);
            }
        }
    }
}

fn to_postings(index: &PostingSets) -> Postings {
    index
        .iter()
        .map(|(token, paths)| {
            let mut sorted: Vec<String> = paths.iter().cloned().collect();
            sorted.sort();
            (token.clone(), sorted)
        })
        .collect()
}

/// Posting lists back into sets, dropping paths with no entry.
fn from_postings(postings: &Postings, files: &HashMap<String, IndexedFile>) -> PostingSets {
    postings
        .iter()
        .filter_map(|(token, paths)| {
            let set: HashSet<String> = paths.iter().filter(|p| files.contains_key(*p)).cloned().collect();
            (!set.is_empty()).then(|| (token.clone(), set))
        })
        .collect()
}

/// Build an entry from extracted content, tokenizing content and stem.
pub fn make_entry(path: &str, content: String, metadata: FileMetadata) -> IndexedFile {
    IndexedFile {
        content_keywords: content_tokens(&content),
        filename_keywords: filename_tokens(path),
        content,
        metadata,
        indexed_time: unix_now(),
    }
}

pub struct IndexStore {
    state: RwLock<StoreState>,
}

impl Default for IndexStore {
    fn default() -> Self {
        IndexStore::new()
    }
}

impl IndexStore {
    pub fn new() -> Self {
        IndexStore { state: RwLock::new(StoreState::default()) }
    }

    /// Empty store whose `clear()` also deletes `path`.
    pub fn with_backing(path: impl Into<PathBuf>) -> Self {
        let store = IndexStore::new();
        store.write().backing = Some(path.into());
        store
    }

    /// Load a snapshot into a fresh store backed by that file.
    pub fn open(path: &Path, max_bytes: u64) -> Result<IndexStore, SearchError> {
        let snapshot = index::load_snapshot(path, max_bytes)?;
        let store = IndexStore::from_snapshot(snapshot);
        store.write().backing = Some(path.to_path_buf());
        Ok(store)
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    // ─── Mutation ────────────────────────────────────────────────────

    /// Tokenize and upsert one file. Re-adding a path replaces the previous
    /// entry and its postings.
    pub fn add(&self, path: &str, content: String, metadata: FileMetadata) {
        let entry = make_entry(path, content, metadata);
        self.add_entry(path, entry);
    }

    /// Upsert a prepared entry, keeping its keyword sets as given.
    pub fn add_entry(&self, path: &str, entry: IndexedFile) {
        let mut state = self.write();
        state.unlink(path);
        state.link(path.to_string(), entry);
        state.last_update = Some(unix_now());
    }

    /// Remove a path and every posting pointing at it.
    pub fn remove(&self, path: &str) -> Option<IndexedFile> {
        let mut state = self.write();
        let old = state.unlink(path);
        if old.is_some() {
            state.last_update = Some(unix_now());
        }
        old
    }

    /// Drop all in-memory state and delete the backing snapshot, if any.
    pub fn clear(&self) -> Result<(), SearchError> {
        let mut state = self.write();
        let backing = state.backing.clone();
        *state = StoreState { backing: backing.clone(), ..StoreState::default() };
        drop(state);

        if let Some(path) = backing {
            match std::fs::remove_file(&path) {
                Ok(()) => info!(path = %path.display(), "Removed backing snapshot"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    // ─── Queries ─────────────────────────────────────────────────────

    pub fn search(&self, query: &str, options: &SearchOptions) -> Vec<SearchResult> {
        let state = self.read();
        search::execute(&state, query, options)
    }

    pub fn stats(&self) -> Stats {
        self.read().stats()
    }

    pub fn len(&self) -> usize {
        self.read().files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().files.is_empty()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.read().files.contains_key(path)
    }

    pub fn get(&self, path: &str) -> Option<IndexedFile> {
        self.read().files.get(path).cloned()
    }

    /// `(size, mtime)` per path, for change detection.
    pub fn fingerprints(&self) -> BTreeMap<String, Fingerprint> {
        self.read()
            .files
            .iter()
            .map(|(p, f)| (p.clone(), f.metadata.fingerprint()))
            .collect()
    }

    /// Paths posted under `token` in the content index, sorted.
    pub fn content_postings(&self, token: &str) -> Vec<String> {
        sorted_postings(&self.read().word_index, token)
    }

    /// Paths posted under `token` in the filename index, sorted.
    pub fn filename_postings(&self, token: &str) -> Vec<String> {
        sorted_postings(&self.read().filename_index, token)
    }

    pub fn backing_path(&self) -> Option<PathBuf> {
        self.read().backing.clone()
    }

    // ─── Persistence ─────────────────────────────────────────────────

    pub fn to_snapshot(&self) -> Snapshot {
        let state = self.read();
        let body = SnapshotBody {
            index_data: state.files.iter().map(|(p, f)| (p.clone(), f.clone())).collect(),
            word_index: to_postings(&state.word_index),
            filename_index: Some(to_postings(&state.filename_index)),
            stats: state.stats(),
        };
        Snapshot::new(body)
    }

    pub fn from_snapshot(snapshot: Snapshot) -> IndexStore {
        let store = IndexStore::new();
        store.replace_with(snapshot);
        store
    }

    fn replace_with(&self, snapshot: Snapshot) {
        let body = snapshot.body;
        let files: HashMap<String, IndexedFile> = body.index_data.into_iter().collect();
        let word_index = from_postings(&body.word_index, &files);
        let filename_index = body
            .filename_index
            .as_ref()
            .map(|f| from_postings(f, &files))
            .unwrap_or_default();

        let mut state = self.write();
        let backing = state.backing.take();
        *state = StoreState {
            files,
            word_index,
            filename_index,
            last_update: body.stats.last_update,
            backing,
        };
    }

    /// Persist to `path` and make it the backing file.
    pub fn save(&self, path: &Path) -> Result<(), SearchError> {
        let snapshot = self.to_snapshot();
        index::save_snapshot(path, &snapshot)?;
        self.write().backing = Some(path.to_path_buf());
        Ok(())
    }

    /// Replace the store's contents with a snapshot. The file is fully
    /// decoded and validated before anything in memory changes; on error the
    /// store is untouched.
    pub fn load(&self, path: &Path, max_bytes: u64) -> Result<SnapshotHeader, SearchError> {
        let snapshot = index::load_snapshot(path, max_bytes)?;
        let header = snapshot.header.clone();
        self.replace_with(snapshot);
        self.write().backing = Some(path.to_path_buf());
        debug!(path = %path.display(), files = self.len(), "Store replaced from snapshot");
        Ok(header)
    }
}

fn sorted_postings(index: &PostingSets, token: &str) -> Vec<String> {
    let mut paths: Vec<String> = index.get(token).map(|s| s.iter().cloned().collect()).unwrap_or_default();
    paths.sort();
    paths
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
