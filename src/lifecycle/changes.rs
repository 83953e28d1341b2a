//! Four-way change partition between two `(size, mtime)` views of a file set.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::Serialize;

use crate::{Fingerprint, IndexedFile};

/// A path present on both sides whose size or mtime differs.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ModifiedEntry {
    pub path: String,
    pub old_size: u64,
    pub new_size: u64,
    pub old_mtime: u64,
    pub new_mtime: u64,
}

impl ModifiedEntry {
    pub fn size_delta(&self) -> i128 {
        self.new_size as i128 - self.old_size as i128
    }
}

/// Paths relative to a baseline. Every list is sorted.
#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// Only in the current view.
    pub added: Vec<String>,
    /// Only in the baseline.
    pub removed: Vec<String>,
    pub modified: Vec<ModifiedEntry>,
    pub unchanged: Vec<String>,
}

#[derive(Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeCounts {
    pub added: usize,
    pub removed: usize,
    pub modified: usize,
    pub unchanged: usize,
}

impl ChangeSet {
    /// Partition by set algebra over the two key sets; common keys compare
    /// fingerprints. File contents are never consulted.
    pub fn between(baseline: &BTreeMap<String, Fingerprint>, current: &BTreeMap<String, Fingerprint>) -> ChangeSet {
        let mut changes = ChangeSet::default();
        for (path, old) in baseline {
            match current.get(path) {
                None => changes.removed.push(path.clone()),
                Some(new) if new == old => changes.unchanged.push(path.clone()),
                Some(new) => changes.modified.push(ModifiedEntry {
                    path: path.clone(),
                    old_size: old.size,
                    new_size: new.size,
                    old_mtime: old.modified,
                    new_mtime: new.modified,
                }),
            }
        }
        changes.added = current
            .keys()
            .filter(|p| !baseline.contains_key(*p))
            .cloned()
            .collect();
        changes
    }

    /// True when nothing was added, removed or modified.
    pub fn is_clean(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }

    pub fn counts(&self) -> ChangeCounts {
        ChangeCounts {
            added: self.added.len(),
            removed: self.removed.len(),
            modified: self.modified.len(),
            unchanged: self.unchanged.len(),
        }
    }

    pub fn modified_paths(&self) -> impl Iterator<Item = &str> {
        self.modified.iter().map(|m| m.path.as_str())
    }

    /// Per-category detail lines. `limit` caps each category.
    pub fn write_details(&self, out: &mut String, limit: Option<usize>) {
        let cap = limit.unwrap_or(usize::MAX);
        let heading = |label: &str| match limit {
            Some(n) => format!("\n{} files (first {}):\n", label, n),
            None => format!("\n{} Files:\n", label),
        };

        if !self.added.is_empty() {
            out.push_str(&heading("Added"));
            for p in self.added.iter().take(cap) {
                let _ = writeln!(out, "  + {}", p);
            }
        }
        if !self.removed.is_empty() {
            out.push_str(&heading("Removed"));
            for p in self.removed.iter().take(cap) {
                let _ = writeln!(out, "  - {}", p);
            }
        }
        if !self.modified.is_empty() {
            out.push_str(&heading("Modified"));
            for m in self.modified.iter().take(cap) {
                let _ = writeln!(out, "  * {}", m.path);
                let _ = writeln!(
                    out,
                    "    Size: {} -> {} ({} bytes)",
                    group_thousands(m.old_size as i128),
                    group_thousands(m.new_size as i128),
                    signed(m.size_delta())
                );
            }
        }
    }
}

/// `(size, mtime)` for every entry of a snapshot's index data.
pub fn fingerprints_of(index_data: &BTreeMap<String, IndexedFile>) -> BTreeMap<String, Fingerprint> {
    index_data
        .iter()
        .map(|(p, f)| (p.clone(), f.metadata.fingerprint()))
        .collect()
}

/// `1234567` -> `1,234,567`.
pub fn group_thousands(n: i128) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if n < 0 {
        out.push('-');
    }
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn signed(n: i128) -> String {
    if n >= 0 {
        format!("+{}", group_thousands(n))
    } else {
        group_thousands(n)
    }
}
