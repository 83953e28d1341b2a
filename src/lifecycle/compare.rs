//! Compare two snapshots and render the differences.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use super::changes::{fingerprints_of, group_thousands, ChangeSet};
use super::SUMMARY_DETAIL_LIMIT;
use crate::error::SearchError;
use crate::index::{self, Snapshot};

/// File count and total size of one side of a comparison.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct SnapshotSummary {
    pub path: String,
    pub files: u64,
    pub size: u64,
}

impl SnapshotSummary {
    fn of(path: &str, snapshot: &Snapshot) -> Self {
        SnapshotSummary {
            path: path.to_string(),
            files: snapshot.file_count() as u64,
            size: snapshot.body.index_data.values().map(|f| f.metadata.size).sum(),
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct CompareReport {
    pub index1: SnapshotSummary,
    pub index2: SnapshotSummary,
    /// Changes going from `index1` to `index2`.
    pub changes: ChangeSet,
}

/// Diff two decoded snapshots. Only `(size, mtime)` per path is compared.
pub fn compare(first: (&str, &Snapshot), second: (&str, &Snapshot)) -> CompareReport {
    let changes = ChangeSet::between(
        &fingerprints_of(&first.1.body.index_data),
        &fingerprints_of(&second.1.body.index_data),
    );
    CompareReport {
        index1: SnapshotSummary::of(first.0, first.1),
        index2: SnapshotSummary::of(second.0, second.1),
        changes,
    }
}

/// Load both files and compare them. Either load failing aborts.
pub fn compare_files(first: &Path, second: &Path, max_bytes: u64) -> Result<CompareReport, SearchError> {
    let a = index::load_snapshot(first, max_bytes)?;
    let b = index::load_snapshot(second, max_bytes)?;
    let (first_name, second_name) = (first.display().to_string(), second.display().to_string());
    let report = compare((first_name.as_str(), &a), (second_name.as_str(), &b));
    let c = report.changes.counts();
    info!(
        added = c.added,
        removed = c.removed,
        modified = c.modified,
        unchanged = c.unchanged,
        "Compared snapshots"
    );
    Ok(report)
}

/// Default report name: `comparison_report_<YYMMDD_HHMM>.txt`.
pub fn default_report_name() -> String {
    format!("comparison_report_{}.txt", index::timestamp_prefix())
}

impl CompareReport {
    fn write_stats(&self, out: &mut String) {
        let c = self.changes.counts();
        let _ = writeln!(out, "Statistics:");
        let _ = writeln!(out, "  Index 1: {} files, {} bytes", group_thousands(self.index1.files as i128), group_thousands(self.index1.size as i128));
        let _ = writeln!(out, "  Index 2: {} files, {} bytes", group_thousands(self.index2.files as i128), group_thousands(self.index2.size as i128));
        let _ = writeln!(out, "\nChanges:");
        let _ = writeln!(out, "  Added: {} files", c.added);
        let _ = writeln!(out, "  Removed: {} files", c.removed);
        let _ = writeln!(out, "  Modified: {} files", c.modified);
        let _ = writeln!(out, "  Unchanged: {} files", c.unchanged);
    }

    /// Console summary: statistics plus the first few paths per category.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        self.write_stats(&mut out);
        self.changes.write_details(&mut out, Some(SUMMARY_DETAIL_LIMIT));
        out
    }

    /// Full text report with every changed path.
    pub fn render_text(&self, generated: &str) -> String {
        let rule = "=".repeat(60);
        let mut out = String::new();
        let _ = writeln!(out, "Index Comparison Report");
        let _ = writeln!(out, "{}", rule);
        let _ = writeln!(out, "Generated: {}", generated);
        let _ = writeln!(out, "Index 1: {}", self.index1.path);
        let _ = writeln!(out, "Index 2: {}", self.index2.path);
        let _ = writeln!(out);
        self.write_stats(&mut out);
        self.changes.write_details(&mut out, None);
        out
    }

    pub fn to_json(&self) -> Result<String, SearchError> {
        serde_json::to_string_pretty(self).map_err(|e| SearchError::InvalidArgs(format!("JSON encoding failed: {}", e)))
    }

    /// Write the text report to `path`, or to the default name in `dir`.
    pub fn write_report(&self, path: Option<&Path>, dir: &Path) -> Result<PathBuf, SearchError> {
        let target = match path {
            Some(p) => p.to_path_buf(),
            None => dir.join(default_report_name()),
        };
        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let generated = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        fs::write(&target, self.render_text(&generated))?;
        info!(path = %target.display(), "Wrote comparison report");
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::IndexStore;
    use crate::FileMetadata;

    fn snapshot_of(files: &[(&str, u64, u64)]) -> Snapshot {
        let store = IndexStore::new();
        for (path, size, mtime) in files {
            let meta = FileMetadata {
                filename: path.rsplit('/').next().unwrap_or_default().to_string(),
                extension: ".txt".to_string(),
                size: *size,
                modified: *mtime,
                created: *mtime,
            };
            store.add(path, "body text".to_string(), meta);
        }
        store.to_snapshot()
    }

    fn scenario() -> CompareReport {
        let a = snapshot_of(&[("/d/same.txt", 10, 1), ("/d/grow.txt", 100, 1), ("/d/old.txt", 5, 1)]);
        let b = snapshot_of(&[("/d/same.txt", 10, 1), ("/d/grow.txt", 2500, 2), ("/d/new.txt", 7, 3)]);
        compare(("a.fxidx", &a), ("b.fxidx", &b))
    }

    #[test]
    fn test_compare_counts_and_sizes() {
        let report = scenario();
        let c = report.changes.counts();
        assert_eq!((c.added, c.removed, c.modified, c.unchanged), (1, 1, 1, 1));
        assert_eq!(report.index1.files, 3);
        assert_eq!(report.index1.size, 115);
        assert_eq!(report.index2.size, 2517);
    }

    #[test]
    fn test_compare_with_itself_only_unchanged() {
        let a = snapshot_of(&[("/d/x.txt", 1, 1), ("/d/y.txt", 2, 2)]);
        let report = compare(("a", &a), ("a", &a));
        assert!(report.changes.is_clean());
        assert_eq!(report.changes.unchanged.len(), 2);
    }

    #[test]
    fn test_summary_lists_changes() {
        let text = scenario().summary();
        assert!(text.contains("Added: 1 files"));
        assert!(text.contains("+ /d/new.txt"));
        assert!(text.contains("- /d/old.txt"));
        assert!(text.contains("* /d/grow.txt"));
        assert!(text.contains("Size: 100 -> 2,500 (+2,400 bytes)"));
    }

    #[test]
    fn test_render_text_layout() {
        let text = scenario().render_text("2024-01-02 03:04:05");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Index Comparison Report");
        assert_eq!(lines[2], "Generated: 2024-01-02 03:04:05");
        assert_eq!(lines[3], "Index 1: a.fxidx");
        assert_eq!(lines[4], "Index 2: b.fxidx");
        assert!(text.contains("Statistics:"));
        assert!(text.contains("Added Files:"));
        assert!(text.contains("Modified Files:"));
    }

    #[test]
    fn test_json_shape() {
        let json: serde_json::Value = serde_json::from_str(&scenario().to_json().unwrap()).unwrap();
        assert_eq!(json["index1"]["files"], 3);
        assert_eq!(json["changes"]["added"][0], "/d/new.txt");
        assert_eq!(json["changes"]["modified"][0]["new_size"], 2500);
    }

    #[test]
    fn test_write_report_default_name() {
        let tmp = tempfile::tempdir().unwrap();
        let path = scenario().write_report(None, tmp.path()).unwrap();
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("comparison_report_"));
        assert!(name.ends_with(".txt"));
        assert!(fs::read_to_string(&path).unwrap().contains("Index Comparison Report"));
    }

    #[test]
    fn test_compare_files_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let one = tmp.path().join("one.fxidx");
        let two = tmp.path().join("two.fxidx");
        index::save_snapshot(&one, &snapshot_of(&[("/d/a.txt", 1, 1)])).unwrap();
        index::save_snapshot(&two, &snapshot_of(&[("/d/a.txt", 1, 1), ("/d/b.txt", 1, 1)])).unwrap();
        let report = compare_files(&one, &two, u64::MAX).unwrap();
        assert_eq!(report.changes.added, vec!["/d/b.txt"]);
        assert!(compare_files(&one, &tmp.path().join("nope.fxidx"), u64::MAX).is_err());
    }
}
