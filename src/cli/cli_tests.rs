use super::*;
use std::fs;

fn parse(argv: &[&str]) -> Cli {
    Cli::try_parse_from(argv).unwrap()
}

fn test_config(dir: &Path) -> Config {
    Config {
        index_dir: Some(dir.join("indexes")),
        workers: 2,
        ..Config::default()
    }
}

fn sample_tree(root: &Path) -> PathBuf {
    let docs = root.join("docs");
    fs::create_dir_all(&docs).unwrap();
    fs::write(docs.join("report_final.txt"), "quarterly revenue summary").unwrap();
    fs::write(docs.join("notes.md"), "meeting notes about the report").unwrap();
    docs
}

// ─── Parsing ─────────────────────────────────────────────────────────

#[test]
fn test_parse_scan_with_options() {
    let cli = parse(&["filex", "scan", "/a", "/b", "-e", "pdf,txt", "-o", "out.fxidx", "--workers", "8"]);
    match cli.command {
        Commands::Scan(args) => {
            assert_eq!(args.folders, vec![PathBuf::from("/a"), PathBuf::from("/b")]);
            assert_eq!(args.ext.as_deref(), Some("pdf,txt"));
            assert_eq!(args.output, Some(PathBuf::from("out.fxidx")));
            assert_eq!(args.workers, Some(8));
        }
        other => panic!("unexpected command: {:?}", other),
    }
}

#[test]
fn test_parse_scan_requires_folder() {
    assert!(Cli::try_parse_from(["filex", "scan"]).is_err());
}

#[test]
fn test_parse_search_mode() {
    let cli = parse(&["filex", "search", "idx.fxidx", "budget", "--mode", "filename", "--json"]);
    match cli.command {
        Commands::Search(args) => {
            assert_eq!(args.mode, filex::SearchMode::Filename);
            assert!(args.json);
            assert_eq!(args.max_results, None);
        }
        other => panic!("unexpected command: {:?}", other),
    }
    assert!(Cli::try_parse_from(["filex", "search", "i", "q", "--mode", "fuzzy"]).is_err());
}

#[test]
fn test_parse_merge_needs_two() {
    assert!(Cli::try_parse_from(["filex", "merge", "one.fxidx"]).is_err());
    assert!(Cli::try_parse_from(["filex", "merge", "one.fxidx", "two.fxidx"]).is_ok());
}

#[test]
fn test_parse_compare_report_optional_value() {
    match parse(&["filex", "compare", "a", "b", "--report"]).command {
        Commands::Compare(args) => assert_eq!(args.report, Some(PathBuf::new())),
        other => panic!("unexpected command: {:?}", other),
    }
    match parse(&["filex", "compare", "a", "b", "--report", "r.txt"]).command {
        Commands::Compare(args) => assert_eq!(args.report, Some(PathBuf::from("r.txt"))),
        other => panic!("unexpected command: {:?}", other),
    }
}

#[test]
fn test_parse_global_flags_after_subcommand() {
    let cli = parse(&["filex", "info", "--log-level", "debug", "--log-json"]);
    assert_eq!(cli.log_level, "debug");
    assert!(cli.log_json);
}

#[test]
fn test_level_directive_defaults_to_warn() {
    assert_eq!(level_directive("DEBUG"), "debug");
    assert_eq!(level_directive("loud"), "warn");
}

// ─── Commands ────────────────────────────────────────────────────────

#[test]
fn test_scan_then_search_and_stats() {
    let tmp = tempfile::tempdir().unwrap();
    let docs = sample_tree(tmp.path());
    let config = test_config(tmp.path());
    let out = tmp.path().join("docs.fxidx");

    let scan = ScanArgs { folders: vec![docs], ext: None, output: Some(out.clone()), workers: Some(1) };
    cmd_scan(scan, &config).unwrap();
    assert!(out.is_file());

    let store = IndexStore::open(&out, u64::MAX).unwrap();
    assert_eq!(store.len(), 2);
    let results = store.search("report", &SearchOptions::new(filex::SearchMode::Both, 10));
    assert_eq!(results[0].filename, "report_final.txt");

    let search = SearchArgs {
        snapshot: out.clone(),
        query: "report".to_string(),
        mode: filex::SearchMode::Both,
        max_results: Some(5),
        ext: None,
        json: true,
    };
    cmd_search(search, &config).unwrap();
    cmd_stats(StatsArgs { snapshot: out, json: false }, &config).unwrap();
}

#[test]
fn test_scan_default_output_name() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(tmp.path());
    let args = ScanArgs { folders: vec![PathBuf::from("/data/My Docs")], ext: None, output: None, workers: None };
    let out = scan_output(&args, &config);
    assert_eq!(out.parent(), Some(tmp.path().join("indexes").as_path()));
    let name = out.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.ends_with("_My_Docs.fxidx"), "{name}");
}

#[test]
fn test_scan_missing_folder_fails() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(tmp.path());
    let args = ScanArgs {
        folders: vec![tmp.path().join("absent")],
        ext: None,
        output: Some(tmp.path().join("x.fxidx")),
        workers: None,
    };
    let err = cmd_scan(args, &config).unwrap_err();
    assert!(matches!(err, SearchError::DirNotFound(_)));
    assert_eq!(
        err.to_string(),
        format!("Directory does not exist: {}", tmp.path().join("absent").display())
    );
    assert!(!tmp.path().join("x.fxidx").exists());
}

#[test]
fn test_scan_without_folders_is_not_a_missing_directory() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(tmp.path());
    let args = ScanArgs { folders: Vec::new(), ext: None, output: Some(tmp.path().join("x.fxidx")), workers: None };
    let err = cmd_scan(args, &config).unwrap_err();
    assert!(matches!(err, SearchError::Scan(ScanFailure::NoFolders)));
    assert_eq!(err.to_string(), "No folders to scan");
}

#[test]
fn test_search_missing_snapshot_reports_load_failure() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(tmp.path());
    let args = SearchArgs {
        snapshot: tmp.path().join("none.fxidx"),
        query: "x".to_string(),
        mode: filex::SearchMode::Both,
        max_results: None,
        ext: None,
        json: false,
    };
    let err = cmd_search(args, &config).unwrap_err();
    assert_eq!(err.load_failure(), Some(&filex::LoadFailure::NotFound));
}

#[test]
fn test_merge_compare_and_clear() {
    let tmp = tempfile::tempdir().unwrap();
    let docs = sample_tree(tmp.path());
    let config = test_config(tmp.path());
    let first = tmp.path().join("first.fxidx");
    cmd_scan(ScanArgs { folders: vec![docs.clone()], ext: None, output: Some(first.clone()), workers: None }, &config)
        .unwrap();

    fs::write(docs.join("extra.txt"), "late addition").unwrap();
    let second = tmp.path().join("second.fxidx");
    cmd_scan(ScanArgs { folders: vec![docs], ext: None, output: Some(second.clone()), workers: None }, &config)
        .unwrap();

    let merged = tmp.path().join("merged.fxidx");
    cmd_merge(MergeArgs { snapshots: vec![first.clone(), second.clone()], output: Some(merged.clone()) }, &config)
        .unwrap();
    assert_eq!(IndexStore::open(&merged, u64::MAX).unwrap().len(), 3);

    let report = tmp.path().join("report.txt");
    let compare = CompareArgs { first: first.clone(), second, report: Some(report.clone()), json: false };
    cmd_compare(compare, &config).unwrap();
    let text = fs::read_to_string(&report).unwrap();
    assert!(text.contains("Added: 1 files"));

    cmd_clear(ClearArgs { snapshot: first.clone() }).unwrap();
    assert!(!first.exists());
    cmd_clear(ClearArgs { snapshot: first }).unwrap();
}

#[test]
fn test_update_command_refreshes_snapshot() {
    let tmp = tempfile::tempdir().unwrap();
    let docs = sample_tree(tmp.path());
    let config = test_config(tmp.path());
    let snap = tmp.path().join("docs.fxidx");
    cmd_scan(ScanArgs { folders: vec![docs.clone()], ext: None, output: Some(snap.clone()), workers: None }, &config)
        .unwrap();

    fs::remove_file(docs.join("notes.md")).unwrap();
    cmd_update(UpdateArgs { snapshot: snap.clone(), folders: vec![docs], metadata_only: false }, &config).unwrap();
    assert_eq!(IndexStore::open(&snap, u64::MAX).unwrap().len(), 1);
}
