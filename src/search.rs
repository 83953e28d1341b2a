//! Query resolution and ranking over the store's inverted indexes.

use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use serde::Serialize;

use crate::config::Config;
use crate::store::{PostingSets, StoreState};
use crate::{query_tokens, FileMetadata, SearchMode};

/// Which keyword sets a result fully matched.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchType {
    #[serde(rename = "Filename")]
    Filename,
    #[serde(rename = "Content")]
    Content,
    #[serde(rename = "Filename + Content")]
    Both,
}

impl MatchType {
    fn from_flags(filename: bool, content: bool) -> Option<MatchType> {
        match (filename, content) {
            (true, true) => Some(MatchType::Both),
            (true, false) => Some(MatchType::Filename),
            (false, true) => Some(MatchType::Content),
            (false, false) => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            MatchType::Filename => "Filename",
            MatchType::Content => "Content",
            MatchType::Both => "Filename + Content",
        }
    }
}

impl std::fmt::Display for MatchType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub path: String,
    pub filename: String,
    pub snippet: String,
    pub metadata: FileMetadata,
    pub relevance: usize,
    pub match_type: MatchType,
    pub filename_match: bool,
    pub content_match: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchOptions {
    pub mode: SearchMode,
    pub max_results: usize,
    pub snippet_len: usize,
    /// Keep only this extension (`".pdf"`). In `both` mode, pure filename
    /// matches pass regardless.
    pub extension: Option<String>,
}

impl SearchOptions {
    pub fn new(mode: SearchMode, max_results: usize) -> Self {
        SearchOptions { mode, max_results, snippet_len: 200, extension: None }
    }

    pub fn from_config(config: &Config, mode: SearchMode) -> Self {
        SearchOptions {
            mode,
            max_results: config.default_max_results,
            snippet_len: config.snippet_len,
            extension: None,
        }
    }

    #[must_use]
    pub fn with_extension(mut self, ext: Option<&str>) -> Self {
        self.extension = ext
            .map(|e| format!(".{}", e.trim().trim_start_matches('.').to_lowercase()))
            .filter(|e| e.len() > 1);
        self
    }
}

/// Paths containing every token, or nothing if any token is missing.
fn intersect<'a>(index: &'a PostingSets, tokens: &[String]) -> HashSet<&'a str> {
    let mut sets: Vec<&HashSet<String>> = Vec::with_capacity(tokens.len());
    for token in tokens {
        match index.get(token) {
            Some(paths) => sets.push(paths),
            None => return HashSet::new(),
        }
    }
    sets.sort_by_key(|s| s.len());
    let (smallest, rest): (&'a HashSet<String>, _) = match sets.split_first() {
        Some((first, rest)) => (*first, rest),
        None => return HashSet::new(),
    };
    smallest
        .iter()
        .filter(|p| rest.iter().all(|s| s.contains(*p)))
        .map(String::as_str)
        .collect()
}

pub(crate) fn execute(state: &StoreState, query: &str, options: &SearchOptions) -> Vec<SearchResult> {
    let tokens = query_tokens(query);
    if tokens.is_empty() || state.files.is_empty() || options.max_results == 0 {
        return Vec::new();
    }

    let mut candidates: BTreeSet<&str> = BTreeSet::new();
    if options.mode.uses_content() {
        candidates.extend(intersect(&state.word_index, &tokens));
    }
    if options.mode.uses_filename() {
        candidates.extend(intersect(&state.filename_index, &tokens));
    }

    struct Scored<'a> {
        path: &'a str,
        relevance: usize,
        match_type: MatchType,
        filename_match: bool,
        content_match: bool,
    }

    let mut scored: Vec<Scored<'_>> = Vec::new();
    for path in candidates {
        let Some(file) = state.files.get(path) else { continue };
        let content_hits = tokens.iter().filter(|t| file.content_keywords.contains(*t)).count();
        let filename_hits = tokens.iter().filter(|t| file.filename_keywords.contains(*t)).count();
        let content_match = content_hits == tokens.len();
        let filename_match = filename_hits == tokens.len();
        let Some(match_type) = MatchType::from_flags(filename_match, content_match) else {
            continue;
        };

        if let Some(ext) = &options.extension {
            let pure_filename = options.mode == SearchMode::Both && filename_match && !content_match;
            if !pure_filename && &file.metadata.extension != ext {
                continue;
            }
        }

        // A side only scores when every token matched there.
        let content_score = if content_match { content_hits } else { 0 };
        let filename_score = if filename_match { filename_hits } else { 0 };
        let relevance = content_score + 2 * filename_score;

        scored.push(Scored {
            path,
            relevance,
            match_type,
            filename_match,
            content_match,
        });
    }

    // Candidates arrive in path order; the stable sort keeps that for ties.
    scored.sort_by(|a, b| {
        b.relevance
            .cmp(&a.relevance)
            .then(b.filename_match.cmp(&a.filename_match))
    });
    scored.truncate(options.max_results);

    scored
        .into_iter()
        .filter_map(|s| {
            let file = state.files.get(s.path)?;
            Some(SearchResult {
                path: s.path.to_string(),
                filename: Path::new(s.path)
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| file.metadata.filename.clone()),
                snippet: extract_snippet(&file.content, &tokens, options.snippet_len),
                metadata: file.metadata.clone(),
                relevance: s.relevance,
                match_type: s.match_type,
                filename_match: s.filename_match,
                content_match: s.content_match,
            })
        })
        .collect()
}

/// Window of `max_len` chars starting `max_len / 2` before the earliest
/// token occurrence, with `...` on truncated sides. Without an occurrence,
/// the leading `max_len` chars.
pub fn extract_snippet(content: &str, tokens: &[String], max_len: usize) -> String {
    let chars: Vec<char> = content.chars().collect();
    // One lowercase char per source char keeps indexes aligned.
    let lower: Vec<char> = chars
        .iter()
        .map(|c| c.to_lowercase().next().unwrap_or(*c))
        .collect();

    let best = tokens
        .iter()
        .filter_map(|t| find_chars(&lower, &t.chars().collect::<Vec<char>>()))
        .min();

    let Some(pos) = best else {
        if chars.len() > max_len {
            let head: String = chars[..max_len].iter().collect();
            return format!("{}...", head);
        }
        return content.to_string();
    };

    let start = pos.saturating_sub(max_len / 2);
    let end = (start + max_len).min(chars.len());
    let mut snippet = String::new();
    if start > 0 {
        snippet.push_str("...");
    }
    snippet.extend(&chars[start..end]);
    if end < chars.len() {
        snippet.push_str("...");
    }
    snippet
}

fn find_chars(haystack: &[char], needle: &[char]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}
