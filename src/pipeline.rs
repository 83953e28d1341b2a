//! Indexing pipeline: folder discovery, batched extraction on a fixed worker
//! pool, store insertion, progress events and cooperative cancellation.
//!
//! A [`ScanJob`] runs on its own coordinator thread and reports through an
//! mpsc channel of [`ScanEvent`]s. Within each batch, workers pull paths from
//! a shared cursor and send per-file outcomes back to the coordinator, which
//! alone emits progress, so processed counts are monotonic.

use std::collections::{BTreeMap, HashSet};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use ignore::WalkBuilder;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::extract::{Extractor, FileKind};
use crate::store::IndexStore;
use crate::{clean_path, extension_of, FileMetadata};

// ─── Events ──────────────────────────────────────────────────────────

/// Why a scan stopped before indexing anything useful.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanFailure {
    #[error("No folders to scan")]
    NoFolders,

    /// None of the requested folders exist; carries their joined paths.
    #[error("Directory does not exist: {0}")]
    MissingFolders(String),

    #[error("Indexing failed: {0}")]
    Aborted(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScanEvent {
    Progress {
        processed: usize,
        total: usize,
        percent: u8,
        message: String,
        /// `"Starting..."`, `"Calculating..."` or a formatted duration.
        time_estimate: String,
    },
    Completed {
        indexed: usize,
        failed: usize,
        message: String,
        elapsed: Duration,
    },
    NoFiles,
    Failed(ScanFailure),
    /// Stopped early. Files committed before the stop stay in the store.
    Cancelled { indexed: usize },
}

impl ScanEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ScanEvent::Progress { .. })
    }
}

// ─── Time formatting ─────────────────────────────────────────────────

/// Human-readable duration: `4.2s`, `42s`, `3m 5s`, `2h 10m`.
pub fn format_time(seconds: f64) -> String {
    if seconds < 0.0 || seconds.is_nan() {
        return "0s".to_string();
    }
    if seconds < 10.0 {
        return format!("{:.1}s", seconds);
    }
    if seconds < 60.0 {
        return format!("{}s", seconds as u64);
    }
    let whole = seconds as u64;
    if seconds < 3600.0 {
        let (m, s) = (whole / 60, whole % 60);
        return if s > 0 { format!("{}m {}s", m, s) } else { format!("{}m", m) };
    }
    let (h, m) = (whole / 3600, (whole % 3600) / 60);
    if m > 0 { format!("{}h {}m", h, m) } else { format!("{}h", h) }
}

/// Rate and remaining-time text once enough samples exist.
///
/// Returns `(speed_info, time_estimate)`.
pub fn estimate(indexed: usize, total: usize, elapsed: Duration) -> (String, String) {
    let secs = elapsed.as_secs_f64();
    if indexed > 5 && secs > 2.0 {
        let rate = indexed as f64 / secs;
        let remaining = total.saturating_sub(indexed) as f64 / rate;
        (format!("{:.1} files/sec", rate), format_time(remaining))
    } else if indexed > 0 {
        ("Analyzing speed...".to_string(), "Calculating...".to_string())
    } else {
        ("Initializing...".to_string(), "Starting...".to_string())
    }
}

/// Adaptive batch size: a twentieth of the job, clamped to `1..=max`.
pub fn batch_size(total: usize, max: usize) -> usize {
    (total / 20).max(1).min(max.max(1))
}

// ─── Discovery ───────────────────────────────────────────────────────

/// Walk one root, skipping hidden entries, and collect files whose extension
/// is allowed. Stops at `cap` files or when `stop` is set.
pub fn discover_folder(root: &Path, extensions: &[String], cap: usize, stop: &AtomicBool) -> Vec<PathBuf> {
    let mut builder = WalkBuilder::new(root);
    builder.standard_filters(false);
    builder.hidden(true);
    builder.follow_links(false);

    let mut files = Vec::new();
    let mut by_ext: BTreeMap<String, usize> = BTreeMap::new();
    let mut images = 0usize;

    for result in builder.build() {
        if stop.load(Ordering::Relaxed) {
            break;
        }
        let entry = match result {
            Ok(e) => e,
            Err(e) => {
                debug!(root = %root.display(), error = %e, "Skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }
        let ext = extension_of(entry.path());
        if !extensions.iter().any(|e| *e == ext) {
            continue;
        }
        if FileKind::from_extension(&ext) == Some(FileKind::Image) {
            images += 1;
        }
        *by_ext.entry(ext).or_default() += 1;
        files.push(entry.into_path());
        if files.len() >= cap {
            warn!(root = %root.display(), cap, "Reached per-folder file limit");
            break;
        }
    }

    info!(root = %root.display(), files = files.len(), images, "Discovered files");
    for (ext, count) in &by_ext {
        debug!(root = %root.display(), ext = %ext, count, "File type breakdown");
    }
    files
}

/// Discover files under every folder, deduplicated across overlapping roots.
/// Missing folders are logged and skipped.
pub fn discover_files(folders: &[PathBuf], extensions: &[String], cap: usize, stop: &AtomicBool) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    let mut all = Vec::new();
    for folder in folders {
        if stop.load(Ordering::Relaxed) {
            break;
        }
        if !folder.is_dir() {
            warn!(folder = %folder.display(), "Folder does not exist, skipping");
            continue;
        }
        let root = std::fs::canonicalize(folder).unwrap_or_else(|_| folder.clone());
        for path in discover_folder(&root, extensions, cap, stop) {
            if seen.insert(path.clone()) {
                all.push(path);
            }
        }
    }
    all
}

/// Store key for a discovered path.
pub fn path_key(path: &Path) -> String {
    clean_path(&path.to_string_lossy())
}

// ─── Per-file processing ─────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
enum FileOutcome {
    Extracted,
    /// Ineligible for extraction; indexed by name only.
    NameOnly,
    Failed(String),
}

/// Extract and insert one file. Ineligible files are indexed as `File: <name>`.
fn process_file(path: &Path, store: &IndexStore, extractor: &Extractor) -> FileOutcome {
    let key = path_key(path);
    match extractor.extract_fast(path) {
        Some(extracted) => {
            store.add(&key, extracted.content, extracted.metadata);
            FileOutcome::Extracted
        }
        None => match FileMetadata::from_path(path) {
            Ok(metadata) => {
                debug!(path = %key, "Extraction skipped, indexing filename");
                let content = format!("File: {}", metadata.filename);
                store.add(&key, content, metadata);
                FileOutcome::NameOnly
            }
            Err(e) => FileOutcome::Failed(format!("{}: {}", key, e)),
        },
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// A panicking reader takes down only its own file.
fn process_guarded(path: &Path, store: &IndexStore, extractor: &Extractor) -> FileOutcome {
    match panic::catch_unwind(AssertUnwindSafe(|| process_file(path, store, extractor))) {
        Ok(outcome) => outcome,
        Err(payload) => FileOutcome::Failed(format!("{}: panic: {}", path.display(), panic_message(&*payload))),
    }
}

// ─── Job ─────────────────────────────────────────────────────────────

fn finish(emit: &mut dyn FnMut(ScanEvent), event: ScanEvent) -> ScanEvent {
    emit(event.clone());
    event
}

/// A batch indexing job over a set of root folders.
#[derive(Debug, Clone)]
pub struct ScanJob {
    folders: Vec<PathBuf>,
    extensions: Vec<String>,
    config: Config,
}

/// Running job: event stream, stop flag and the coordinator thread.
pub struct ScanHandle {
    pub events: Receiver<ScanEvent>,
    stop: Arc<AtomicBool>,
    join: JoinHandle<()>,
}

impl ScanHandle {
    /// Request cancellation. The job stops at its next check.
    pub fn cancel(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Drain events until the terminal one, calling `on_event` for each.
    /// Returns the terminal event.
    pub fn wait(self, mut on_event: impl FnMut(&ScanEvent)) -> ScanEvent {
        let mut last = ScanEvent::Failed(ScanFailure::Aborted("scan ended without a result".to_string()));
        for event in self.events.iter() {
            on_event(&event);
            if event.is_terminal() {
                last = event;
                break;
            }
        }
        if self.join.join().is_err() {
            return ScanEvent::Failed(ScanFailure::Aborted("scan thread panicked".to_string()));
        }
        last
    }
}

impl ScanJob {
    /// Job over `folders` using the config's extension allow-list.
    pub fn new(folders: Vec<PathBuf>, config: &Config) -> Self {
        ScanJob {
            folders,
            extensions: config.extensions.clone(),
            config: config.clone(),
        }
    }

    #[must_use]
    pub fn with_extensions<'a>(mut self, extensions: impl IntoIterator<Item = &'a str>) -> Self {
        self.extensions = crate::config::normalize_extensions(extensions);
        self
    }

    pub fn folders(&self) -> &[PathBuf] {
        &self.folders
    }

    /// Run on a background thread.
    pub fn start(self, store: Arc<IndexStore>) -> ScanHandle {
        self.start_with_stop(store, Arc::new(AtomicBool::new(false)))
    }

    /// Run on a background thread, observing an externally owned stop flag.
    pub fn start_with_stop(self, store: Arc<IndexStore>, stop: Arc<AtomicBool>) -> ScanHandle {
        let (tx, rx) = mpsc::channel();
        let thread_stop = Arc::clone(&stop);
        let join = std::thread::spawn(move || {
            let extractor = Extractor::new(&self.config);
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                self.run(&store, &extractor, &thread_stop, &mut |event| {
                    let _ = tx.send(event);
                })
            }));
            if let Err(payload) = outcome {
                let _ = tx.send(ScanEvent::Failed(ScanFailure::Aborted(panic_message(&*payload))));
            }
        });
        ScanHandle { events: rx, stop, join }
    }

    /// Run to completion on the calling thread. Every event, including the
    /// terminal one, goes to `emit` on this thread; the terminal event is
    /// also returned.
    pub fn run(
        &self,
        store: &IndexStore,
        extractor: &Extractor,
        stop: &AtomicBool,
        emit: &mut dyn FnMut(ScanEvent),
    ) -> ScanEvent {
        if self.folders.is_empty() {
            return finish(emit, ScanEvent::Failed(ScanFailure::NoFolders));
        }
        let missing: Vec<String> = self
            .folders
            .iter()
            .filter(|f| !f.is_dir())
            .map(|f| f.display().to_string())
            .collect();
        if missing.len() == self.folders.len() {
            return finish(emit, ScanEvent::Failed(ScanFailure::MissingFolders(missing.join(", "))));
        }

        let start = Instant::now();
        info!(folders = self.folders.len(), extensions = self.extensions.len(), "Starting file discovery");
        let files = discover_files(&self.folders, &self.extensions, self.config.per_folder_file_cap, stop);

        if stop.load(Ordering::SeqCst) {
            return finish(emit, ScanEvent::Cancelled { indexed: 0 });
        }
        if files.is_empty() {
            info!("No files found to index");
            return finish(emit, ScanEvent::NoFiles);
        }

        let total = files.len();
        emit(ScanEvent::Progress {
            processed: 0,
            total,
            percent: 0,
            message: format!("Found {} files. Starting indexing...", total),
            time_estimate: "Calculating...".to_string(),
        });

        let size = batch_size(total, self.config.max_batch_size);
        let workers = self.config.workers.max(1);
        let mut processed = 0usize;
        let mut indexed = 0usize;
        let mut failed = 0usize;

        for batch in files.chunks(size) {
            if stop.load(Ordering::SeqCst) {
                info!(indexed, total, "Indexing cancelled");
                return finish(emit, ScanEvent::Cancelled { indexed });
            }

            let cursor = AtomicUsize::new(0);
            std::thread::scope(|s| {
                let (tx, rx) = mpsc::channel::<FileOutcome>();
                for _ in 0..workers.min(batch.len()) {
                    let tx = tx.clone();
                    let cursor = &cursor;
                    s.spawn(move || loop {
                        if stop.load(Ordering::Relaxed) {
                            break;
                        }
                        let i = cursor.fetch_add(1, Ordering::Relaxed);
                        let Some(path) = batch.get(i) else { break };
                        if tx.send(process_guarded(path, store, extractor)).is_err() {
                            break;
                        }
                    });
                }
                drop(tx);

                for outcome in rx {
                    processed += 1;
                    match outcome {
                        FileOutcome::Extracted | FileOutcome::NameOnly => indexed += 1,
                        FileOutcome::Failed(reason) => {
                            failed += 1;
                            warn!(reason = %reason, "File processing error");
                        }
                    }
                    let (speed, time_estimate) = estimate(indexed, total, start.elapsed());
                    emit(ScanEvent::Progress {
                        processed,
                        total,
                        percent: (processed * 100 / total) as u8,
                        message: format!("Processing: {}/{} files ({})", processed, total, speed),
                        time_estimate,
                    });
                }
            });
        }

        if stop.load(Ordering::SeqCst) && processed < total {
            info!(indexed, total, "Indexing cancelled");
            return finish(emit, ScanEvent::Cancelled { indexed });
        }

        let elapsed = start.elapsed();
        let took = format_time(elapsed.as_secs_f64());
        info!(indexed, failed, total, elapsed = %took, "Indexing completed");
        finish(emit, ScanEvent::Completed {
            indexed,
            failed,
            message: format!("Indexing complete! {} files indexed in {}.", indexed, took),
            elapsed,
        })
    }
}
