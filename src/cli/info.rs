//! info command: list snapshots in the index directory.

use std::fs;
use std::path::Path;

use serde::Serialize;

use filex::index::{self, Snapshot};
use filex::{Config, SearchError};

#[derive(Serialize, Debug)]
struct SnapshotInfo {
    file: String,
    files: usize,
    total_size: u64,
    size_bytes: u64,
    version: String,
    created: String,
    age_hours: Option<f64>,
}

fn age_hours(created: &str) -> Option<f64> {
    let created = chrono::DateTime::parse_from_rfc3339(created).ok()?;
    let secs = chrono::Local::now().signed_duration_since(created).num_seconds().max(0);
    Some(secs as f64 / 3600.0)
}

fn describe(path: &Path, snapshot: &Snapshot) -> SnapshotInfo {
    SnapshotInfo {
        file: path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default(),
        files: snapshot.file_count(),
        total_size: snapshot.body.index_data.values().map(|f| f.metadata.size).sum(),
        size_bytes: fs::metadata(path).map(|m| m.len()).unwrap_or(0),
        version: snapshot.header.version.clone(),
        created: snapshot.header.created.clone(),
        age_hours: age_hours(&snapshot.header.created),
    }
}

fn collect(config: &Config) -> Result<Vec<SnapshotInfo>, SearchError> {
    let mut out = Vec::new();
    for path in index::list_snapshots(&config.index_dir())? {
        match index::load_snapshot(&path, config.max_snapshot_bytes) {
            Ok(snapshot) => out.push(describe(&path, &snapshot)),
            Err(e) => eprintln!("  Warning: failed to load {}: {}", path.display(), e),
        }
    }
    Ok(out)
}

pub fn cmd_info(config: &Config) -> Result<(), SearchError> {
    let dir = config.index_dir();
    let infos = collect(config)?;
    if infos.is_empty() {
        eprintln!("No snapshots found in {}. Use 'filex scan <FOLDER>' to create one.", dir.display());
        return Ok(());
    }

    eprintln!("Index directory: {}", dir.display());
    eprintln!();
    for info in &infos {
        let age = info
            .age_hours
            .map(|h| format!(", {:.1}h ago", h))
            .unwrap_or_default();
        println!(
            "  {} -- {} files, {:.1} MB indexed, {:.1} MB on disk, v{}{}",
            info.file,
            info.files,
            info.total_size as f64 / 1_048_576.0,
            info.size_bytes as f64 / 1_048_576.0,
            info.version,
            age
        );
    }
    Ok(())
}

pub fn cmd_info_json(config: &Config) -> Result<(), SearchError> {
    let infos = collect(config)?;
    let value = serde_json::json!({
        "directory": config.index_dir().display().to_string(),
        "snapshots": infos,
    });
    match serde_json::to_string_pretty(&value) {
        Ok(text) => println!("{}", text),
        Err(e) => return Err(SearchError::InvalidArgs(format!("JSON encoding failed: {}", e))),
    }
    Ok(())
}
