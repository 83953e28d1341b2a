//! CLI argument structs for all subcommands.

use std::path::PathBuf;

use clap::Parser;

use filex::SearchMode;

#[derive(Parser, Debug)]
#[command(after_long_help = r#"EXAMPLES:
  One folder:        filex scan ~/Documents
  Several folders:   filex scan ~/Documents ~/Desktop -o all.fxidx
  Only some types:   filex scan ~/Projects -e pdf,docx,txt
  More workers:      filex scan D:\Archive --workers 8

NOTES:
  - Progress goes to stderr; Ctrl-C stops the scan and keeps what was indexed
  - Without -o the snapshot is named YYMMDD_HHMM_<folders>.fxidx in the index directory
  - Files over their type's size limit are indexed by name only
"#)]
pub struct ScanArgs {
    /// Root folders to scan
    #[arg(required = true)]
    pub folders: Vec<PathBuf>,

    /// Extensions to index, comma-separated (default: configured allow-list)
    #[arg(short, long)]
    pub ext: Option<String>,

    /// Snapshot file to write
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Worker threads (default: from config)
    #[arg(long)]
    pub workers: Option<usize>,
}

#[derive(Parser, Debug)]
#[command(after_long_help = r#"EXAMPLES:
  Both indexes:      filex search docs.fxidx "quarterly report"
  Names only:        filex search docs.fxidx report_final --mode filename
  PDFs only:         filex search docs.fxidx budget --ext pdf
  Top 10 as JSON:    filex search docs.fxidx budget --max-results 10 --json

NOTES:
  - Every query word must be present (AND); results are ranked by
    content hits + 2 x filename hits
  - With --ext in both mode, files matched by name alone are kept whatever their type
"#)]
pub struct SearchArgs {
    /// Snapshot to search
    pub snapshot: PathBuf,

    /// Query words
    pub query: String,

    /// Which index to query: content, filename or both
    #[arg(short, long, default_value = "both")]
    pub mode: SearchMode,

    /// Maximum results (default: from config)
    #[arg(long)]
    pub max_results: Option<usize>,

    /// Keep only this file type (e.g. pdf)
    #[arg(short, long)]
    pub ext: Option<String>,

    /// Print results as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
pub struct StatsArgs {
    /// Snapshot to describe
    pub snapshot: PathBuf,

    /// Print as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
#[command(after_long_help = r#"NOTES:
  - When two snapshots hold the same path, the entry with the newer
    modification time wins; ties keep the earlier snapshot on the command line
  - Without -o the result is named YYMMDD_HHMM_<a+b>.fxidx in the index directory
"#)]
pub struct MergeArgs {
    /// Snapshots to merge (at least two)
    #[arg(required = true, num_args = 2..)]
    pub snapshots: Vec<PathBuf>,

    /// Merged snapshot file to write
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct UpdateArgs {
    /// Snapshot to update in place
    pub snapshot: PathBuf,

    /// Folders to rescan
    #[arg(required = true)]
    pub folders: Vec<PathBuf>,

    /// Refresh sizes and dates without re-reading file contents
    #[arg(long)]
    pub metadata_only: bool,
}

#[derive(Parser, Debug)]
pub struct CompareArgs {
    /// Baseline snapshot
    pub first: PathBuf,

    /// Snapshot compared against the baseline
    pub second: PathBuf,

    /// Write a full text report. Without a value, writes
    /// comparison_report_<YYMMDD_HHMM>.txt in the current directory
    #[arg(long, num_args = 0..=1, default_missing_value = "")]
    pub report: Option<PathBuf>,

    /// Print the comparison as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Print as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
pub struct ClearArgs {
    /// Snapshot file to delete
    pub snapshot: PathBuf,
}
