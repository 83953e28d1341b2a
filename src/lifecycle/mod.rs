//! Snapshot lifecycle tools: merge several snapshots, update one against the
//! filesystem, and compare two.

pub mod changes;
pub mod compare;
pub mod merge;
pub mod update;

pub use changes::{ChangeCounts, ChangeSet, ModifiedEntry};
pub use compare::{compare, compare_files, CompareReport, SnapshotSummary};
pub use merge::{merge, merge_files, merge_to_file, MergeReport, SourceSummary};
pub use update::{update_snapshot, UpdateMode, UpdateReport};

/// Paths shown per change category in console summaries.
pub const SUMMARY_DETAIL_LIMIT: usize = 5;
