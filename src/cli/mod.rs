//! CLI layer: argument parsing, logging setup, command dispatch, and
//! subcommand implementations.

pub mod args;
mod info;

pub use args::*;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use filex::index;
use filex::lifecycle::{self, UpdateMode};
use filex::search::SearchOptions;
use filex::{Config, IndexStore, ScanEvent, ScanFailure, ScanJob, SearchError};

// ─── CLI ─────────────────────────────────────────────────────────────

/// Desktop file search: index folders, then search file contents and names
#[derive(Parser, Debug)]
#[command(name = "filex", version, about, after_help = "\
Run 'filex <COMMAND> --help' for detailed options and examples.\n\
Logs go to stderr; set RUST_LOG to override --log-level.")]
pub(crate) struct Cli {
    /// JSON config file (default: <data dir>/filex/config.json if present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level for stderr output (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Commands {
    /// Scan folders and save a snapshot
    Scan(ScanArgs),

    /// Search a snapshot by content and filename
    Search(SearchArgs),

    /// Show counters of a snapshot
    Stats(StatsArgs),

    /// Merge several snapshots into one
    Merge(MergeArgs),

    /// Update a snapshot in place against the filesystem
    Update(UpdateArgs),

    /// Compare two snapshots
    Compare(CompareArgs),

    /// List snapshots in the index directory
    Info(InfoArgs),

    /// Delete a snapshot file
    Clear(ClearArgs),
}

// ─── Main entry point ───────────────────────────────────────────────

pub fn run() {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.log_json);

    let result = Config::load(cli.config.as_deref()).and_then(|config| dispatch(cli.command, &config));
    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn dispatch(command: Commands, config: &Config) -> Result<(), SearchError> {
    match command {
        Commands::Scan(args) => cmd_scan(args, config),
        Commands::Search(args) => cmd_search(args, config),
        Commands::Stats(args) => cmd_stats(args, config),
        Commands::Merge(args) => cmd_merge(args, config),
        Commands::Update(args) => cmd_update(args, config),
        Commands::Compare(args) => cmd_compare(args, config),
        Commands::Info(args) if args.json => info::cmd_info_json(config),
        Commands::Info(_) => info::cmd_info(config),
        Commands::Clear(args) => cmd_clear(args),
    }
}

fn level_directive(level: &str) -> &'static str {
    match level.to_lowercase().as_str() {
        "error" => "error",
        "info" => "info",
        "debug" => "debug",
        "trace" => "trace",
        _ => "warn",
    }
}

fn init_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_directive(level)));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

// ─── scan ────────────────────────────────────────────────────────────

fn install_stop_handler(stop: &Arc<AtomicBool>) {
    let flag = Arc::clone(stop);
    if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst)) {
        warn!(error = %e, "Could not install Ctrl-C handler");
    }
}

fn print_progress(event: &ScanEvent) {
    match event {
        ScanEvent::Progress { percent, message, time_estimate, .. } => {
            eprint!("\r[{:>3}%] {} | ETA {}        ", percent, message, time_estimate);
            let _ = std::io::stderr().flush();
        }
        ScanEvent::Completed { message, failed, .. } => {
            eprintln!();
            eprintln!("{}", message);
            if *failed > 0 {
                eprintln!("{} files could not be processed (see logs)", failed);
            }
        }
        ScanEvent::Cancelled { indexed } => {
            eprintln!();
            eprintln!("Indexing cancelled after {} files.", indexed);
        }
        ScanEvent::NoFiles => eprintln!("No files found to index."),
        ScanEvent::Failed(_) => {}
    }
}

/// Where a scan's snapshot goes when `-o` is not given.
fn scan_output(args: &ScanArgs, config: &Config) -> PathBuf {
    match &args.output {
        Some(p) => p.clone(),
        None => config.index_dir().join(index::snapshot_filename(&args.folders)),
    }
}

fn cmd_scan(args: ScanArgs, config: &Config) -> Result<(), SearchError> {
    let mut config = config.clone();
    if let Some(workers) = args.workers {
        config.workers = workers.max(1);
    }

    let mut job = ScanJob::new(args.folders.clone(), &config);
    if let Some(ext) = &args.ext {
        job = job.with_extensions(ext.split(','));
    }

    let store = Arc::new(IndexStore::new());
    let stop = Arc::new(AtomicBool::new(false));
    install_stop_handler(&stop);

    let handle = job.start_with_stop(Arc::clone(&store), Arc::clone(&stop));
    match handle.wait(print_progress) {
        ScanEvent::Completed { .. } | ScanEvent::Cancelled { .. } => {}
        ScanEvent::NoFiles => return Ok(()),
        ScanEvent::Failed(ScanFailure::MissingFolders(dirs)) => return Err(SearchError::DirNotFound(dirs)),
        ScanEvent::Failed(other) => return Err(other.into()),
        ScanEvent::Progress { .. } => {}
    }

    let out = scan_output(&args, &config);
    store.save(&out)?;
    let size = std::fs::metadata(&out).map(|m| m.len()).unwrap_or(0);
    eprintln!(
        "Snapshot saved to {} ({} files, {:.1} MB)",
        out.display(),
        store.len(),
        size as f64 / 1_048_576.0
    );
    Ok(())
}

// ─── search / stats ──────────────────────────────────────────────────

fn cmd_search(args: SearchArgs, config: &Config) -> Result<(), SearchError> {
    let store = IndexStore::open(&args.snapshot, config.max_snapshot_bytes)?;
    let mut options = SearchOptions::from_config(config, args.mode).with_extension(args.ext.as_deref());
    if let Some(n) = args.max_results {
        options.max_results = n;
    }

    let results = store.search(&args.query, &options);
    info!(query = %args.query, mode = %args.mode, results = results.len(), "Search finished");

    if args.json {
        let text = serde_json::to_string_pretty(&results)
            .map_err(|e| SearchError::InvalidArgs(format!("JSON encoding failed: {}", e)))?;
        println!("{}", text);
        return Ok(());
    }

    for (i, r) in results.iter().enumerate() {
        println!("[{}] {}  ({}, relevance {})", i + 1, r.filename, r.match_type, r.relevance);
        println!("    {}", r.path);
        let snippet = r.snippet.replace(['\n', '\r', '\t'], " ");
        if !snippet.trim().is_empty() {
            println!("    {}", snippet.trim());
        }
    }
    eprintln!("{} result(s) for '{}' in {} files", results.len(), args.query, store.len());
    Ok(())
}

fn cmd_stats(args: StatsArgs, config: &Config) -> Result<(), SearchError> {
    let snapshot = index::load_snapshot(&args.snapshot, config.max_snapshot_bytes)?;
    let store = IndexStore::from_snapshot(snapshot.clone());
    let stats = store.stats();

    if args.json {
        let value = serde_json::json!({
            "version": snapshot.header.version,
            "created": snapshot.header.created,
            "stats": stats,
        });
        let text = serde_json::to_string_pretty(&value)
            .map_err(|e| SearchError::InvalidArgs(format!("JSON encoding failed: {}", e)))?;
        println!("{}", text);
        return Ok(());
    }

    println!("Snapshot:        {}", args.snapshot.display());
    println!("Version:         {}", snapshot.header.version);
    println!("Created:         {}", snapshot.header.created);
    println!("Files:           {}", stats.total_files);
    println!("Content words:   {}", stats.total_words);
    println!("Filename words:  {}", stats.total_filename_words);
    println!("Total size:      {:.1} MB", stats.total_size as f64 / 1_048_576.0);
    if let Some(ts) = stats.last_update {
        let when = chrono::DateTime::from_timestamp(ts as i64, 0)
            .map(|t| t.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| ts.to_string());
        println!("Last update:     {}", when);
    }
    Ok(())
}

// ─── lifecycle ───────────────────────────────────────────────────────

fn cmd_merge(args: MergeArgs, config: &Config) -> Result<(), SearchError> {
    let (report, written) = lifecycle::merge_to_file(
        &args.snapshots,
        args.output.as_deref(),
        &config.index_dir(),
        config.max_snapshot_bytes,
    )?;

    for source in &report.sources {
        eprintln!("  {} -- {} files, {:.1} MB", source.file, source.files, source.size as f64 / 1_048_576.0);
    }
    let stats = report.stats();
    eprintln!(
        "Merged {} snapshots into {} ({} files, {:.1} MB, {} overlapping paths)",
        report.sources.len(),
        written.display(),
        stats.total_files,
        stats.total_size as f64 / 1_048_576.0,
        report.collisions
    );
    Ok(())
}

fn cmd_update(args: UpdateArgs, config: &Config) -> Result<(), SearchError> {
    let mode = if args.metadata_only { UpdateMode::MetadataOnly } else { UpdateMode::Reextract };
    let report = lifecycle::update_snapshot(&args.snapshot, &args.folders, config, mode)?;
    print!("{}", report.summary());
    eprintln!("Snapshot updated: {} ({} files)", report.path.display(), report.total_files);
    Ok(())
}

fn cmd_compare(args: CompareArgs, config: &Config) -> Result<(), SearchError> {
    let report = lifecycle::compare_files(&args.first, &args.second, config.max_snapshot_bytes)?;

    if args.json {
        println!("{}", report.to_json()?);
    } else {
        print!("{}", report.summary());
    }

    if let Some(path) = &args.report {
        let explicit = (!path.as_os_str().is_empty()).then_some(path.as_path());
        let written = report.write_report(explicit, Path::new("."))?;
        eprintln!("Report written to {}", written.display());
    }
    Ok(())
}

fn cmd_clear(args: ClearArgs) -> Result<(), SearchError> {
    let existed = args.snapshot.is_file();
    IndexStore::with_backing(&args.snapshot).clear()?;
    if existed {
        eprintln!("Removed {}", args.snapshot.display());
    } else {
        eprintln!("No snapshot at {}", args.snapshot.display());
    }
    Ok(())
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
