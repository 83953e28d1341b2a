//! Criterion benchmarks for the store's core operations.
//!
//! Run with: `cargo bench`
//!
//! Synthetic data only, so numbers are reproducible across machines.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use filex::search::SearchOptions;
use filex::{content_tokens, query_tokens, FileMetadata, IndexStore, SearchMode};

// ─── Helpers ─────────────────────────────────────────────────────────

fn metadata(i: usize) -> FileMetadata {
    FileMetadata {
        filename: format!("report_{}.txt", i),
        extension: ".txt".to_string(),
        size: 1_000 + i as u64,
        modified: 1_700_000_000 + i as u64,
        created: 1_700_000_000,
    }
}

/// Content with ~`words` tokens: 500 shared words, a few common ones in every
/// file, and a rare word in 1% of files.
fn synthetic_content(i: usize, words: usize) -> String {
    let mut text = String::with_capacity(words * 8);
    for w in 0..words {
        text.push_str(&format!("word{} ", (i + w) % 500));
    }
    text.push_str("quarterly revenue summary budget ");
    if i % 100 == 0 {
        text.push_str("invoicerare ");
    }
    text
}

fn build_store(files: usize, words: usize) -> IndexStore {
    let store = IndexStore::new();
    for i in 0..files {
        let path = format!("/data/dept_{}/report_{}.txt", i % 20, i);
        store.add(&path, synthetic_content(i, words), metadata(i));
    }
    store
}

// ─── Tokenize ────────────────────────────────────────────────────────

fn bench_tokenize(c: &mut Criterion) {
    let mut group = c.benchmark_group("tokenize");
    let short = "Quarterly report (final), v2!";
    let page = synthetic_content(7, 1_500);

    group.bench_function("short_line", |b| b.iter(|| content_tokens(black_box(short))));
    group.bench_function("content_page", |b| b.iter(|| content_tokens(black_box(&page))));
    group.bench_function("query", |b| b.iter(|| query_tokens(black_box("report_final budget 2024"))));
    group.finish();
}

// ─── Add ─────────────────────────────────────────────────────────────

fn bench_add(c: &mut Criterion) {
    let mut group = c.benchmark_group("add");
    group.sample_size(10);

    for files in [100usize, 1_000] {
        group.bench_with_input(BenchmarkId::new("fresh_store", files), &files, |b, &n| {
            b.iter(|| black_box(build_store(n, 200)))
        });
    }

    let store = build_store(1_000, 200);
    let content = synthetic_content(3, 200);
    group.bench_function("reindex_existing_path", |b| {
        b.iter(|| store.add("/data/dept_3/report_3.txt", black_box(content.clone()), metadata(3)))
    });
    group.finish();
}

// ─── Search ──────────────────────────────────────────────────────────

fn bench_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("search");

    for files in [1_000usize, 10_000] {
        let store = build_store(files, 100);
        let both = SearchOptions::new(SearchMode::Both, 500);
        let content = SearchOptions::new(SearchMode::Content, 500);

        group.bench_with_input(BenchmarkId::new("common_word", files), &store, |b, s| {
            b.iter(|| s.search(black_box("budget"), &both))
        });
        group.bench_with_input(BenchmarkId::new("rare_word", files), &store, |b, s| {
            b.iter(|| s.search(black_box("invoicerare"), &content))
        });
        group.bench_with_input(BenchmarkId::new("two_word_and", files), &store, |b, s| {
            b.iter(|| s.search(black_box("report budget"), &both))
        });
        group.bench_with_input(BenchmarkId::new("no_match", files), &store, |b, s| {
            b.iter(|| s.search(black_box("nonexistentword"), &both))
        });
    }
    group.finish();
}

// ─── Snapshot ────────────────────────────────────────────────────────

fn bench_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapshot");
    group.sample_size(10);

    let store = build_store(5_000, 100);
    let dir = std::env::temp_dir().join("filex-bench");
    let path = dir.join("bench.fxidx");

    group.bench_function("save_5k_files", |b| b.iter(|| store.save(&path)));
    let _ = store.save(&path);
    group.bench_function("load_5k_files", |b| b.iter(|| IndexStore::open(&path, u64::MAX)));
    group.finish();

    let _ = std::fs::remove_dir_all(&dir);
}

criterion_group!(benches, bench_tokenize, bench_add, bench_search, bench_snapshot);
criterion_main!(benches);
