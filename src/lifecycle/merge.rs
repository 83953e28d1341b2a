//! Merge several snapshots into one.
//!
//! Entries collide on path; the entry with the strictly newer mtime wins and
//! ties keep the earlier input. Postings are unioned across inputs and then
//! pruned so every posted path's winning entry still carries the token.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

use crate::error::SearchError;
use crate::index::{self, Postings, Snapshot, SnapshotBody};
use crate::{unix_now, IndexedFile, Stats};

/// One input's contribution, as recorded in the merge summary.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct SourceSummary {
    /// Base name of the input file.
    pub file: String,
    pub files: u64,
    pub size: u64,
}

#[derive(Debug, Clone)]
pub struct MergeReport {
    pub snapshot: Snapshot,
    pub sources: Vec<SourceSummary>,
    /// Paths present in more than one input.
    pub collisions: usize,
}

impl MergeReport {
    pub fn stats(&self) -> &Stats {
        &self.snapshot.body.stats
    }
}

fn source_summary(label: &str, snapshot: &Snapshot) -> SourceSummary {
    let stats = &snapshot.body.stats;
    SourceSummary {
        file: label.to_string(),
        files: if stats.total_files > 0 { stats.total_files } else { snapshot.file_count() as u64 },
        size: stats.total_size,
    }
}

fn union_into(acc: &mut BTreeMap<String, BTreeSet<String>>, postings: &Postings) {
    for (token, paths) in postings {
        acc.entry(token.clone()).or_default().extend(paths.iter().cloned());
    }
}

/// Keep `(token, path)` only when `path` has a winning entry whose keyword
/// set (picked by `keywords`) contains `token`.
fn prune(
    acc: BTreeMap<String, BTreeSet<String>>,
    files: &BTreeMap<String, IndexedFile>,
    keywords: impl Fn(&IndexedFile) -> &BTreeSet<String>,
) -> Postings {
    acc.into_iter()
        .filter_map(|(token, paths)| {
            let kept: Vec<String> = paths
                .into_iter()
                .filter(|p| files.get(p).is_some_and(|f| keywords(f).contains(&token)))
                .collect();
            (!kept.is_empty()).then_some((token, kept))
        })
        .collect()
}

/// Merge in-memory snapshots. `inputs` pairs each snapshot with the label
/// used in the summary; order decides mtime ties.
pub fn merge(inputs: Vec<(String, Snapshot)>) -> MergeReport {
    let mut sources = Vec::with_capacity(inputs.len());
    let mut files: BTreeMap<String, IndexedFile> = BTreeMap::new();
    let mut words: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut names: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut collisions = 0usize;

    for (label, snapshot) in inputs {
        sources.push(source_summary(&label, &snapshot));
        union_into(&mut words, &snapshot.body.word_index);
        union_into(&mut names, snapshot.filename_postings());

        for (path, entry) in snapshot.body.index_data {
            match files.get(&path) {
                None => {
                    files.insert(path, entry);
                }
                Some(existing) => {
                    collisions += 1;
                    if entry.metadata.modified > existing.metadata.modified {
                        debug!(path = %path, source = %label, "Newer entry replaces earlier input");
                        files.insert(path, entry);
                    }
                }
            }
        }
    }

    let word_index = prune(words, &files, |f| &f.content_keywords);
    let filename_index = prune(names, &files, |f| &f.filename_keywords);
    let stats = Stats {
        total_files: files.len() as u64,
        total_words: word_index.len() as u64,
        total_filename_words: filename_index.len() as u64,
        total_size: files.values().map(|f| f.metadata.size).sum(),
        last_update: Some(unix_now()),
    };

    let body = SnapshotBody {
        index_data: files,
        word_index,
        filename_index: Some(filename_index),
        stats,
    };
    MergeReport { snapshot: Snapshot::new(body), sources, collisions }
}

fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Load every input and merge them. Needs at least two paths; the first
/// load failure aborts the merge and names the offending file.
pub fn merge_files(paths: &[PathBuf], max_bytes: u64) -> Result<MergeReport, SearchError> {
    if paths.len() < 2 {
        return Err(SearchError::InvalidArgs(format!(
            "merge needs at least 2 snapshots, got {}",
            paths.len()
        )));
    }

    let mut inputs = Vec::with_capacity(paths.len());
    for path in paths {
        let snapshot = index::load_snapshot(path, max_bytes)?;
        inputs.push((base_name(path), snapshot));
    }

    let report = merge(inputs);
    info!(
        inputs = paths.len(),
        files = report.snapshot.file_count(),
        collisions = report.collisions,
        "Merged snapshots"
    );
    Ok(report)
}

/// Merge `paths` and save the result to `output`, or to an auto-named file
/// in `dir` when no output is given. Returns the report and the written path.
pub fn merge_to_file(
    paths: &[PathBuf],
    output: Option<&Path>,
    dir: &Path,
    max_bytes: u64,
) -> Result<(MergeReport, PathBuf), SearchError> {
    let report = merge_files(paths, max_bytes)?;
    let target = match output {
        Some(p) => p.to_path_buf(),
        None => dir.join(index::merged_filename(paths)),
    };
    index::save_snapshot(&target, &report.snapshot)?;
    Ok((report, target))
}
