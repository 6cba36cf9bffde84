//! Digest parsing
//!
//! A digest is one text blob holding many files, each introduced by a header
//! block:
//!
//! ```text
//! ================================================
//! File: src/main.py
//! ================================================
//! <file content>
//! ```
//!
//! Splitting on the separator lines leaves headers and contents in
//! alternating fragments, which are paired back up here.

use super::tokens::estimate_tokens;
use regex::Regex;
use std::sync::OnceLock;
use tracing::{debug, info, warn};

/// Path used when nothing in the input looks like a file header.
pub const FALLBACK_PATH: &str = "entire_repo_digest.txt";

const HEADER_PREFIX: &str = "file: ";

/// One file recovered from a digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub path: String,
    pub content: String,
    /// Estimated tokens of `content` (0 for an empty file).
    pub tokens: usize,
}

impl FileRecord {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        let content = content.into();
        let tokens = if content.is_empty() {
            0
        } else {
            estimate_tokens(&content)
        };
        Self {
            path: path.into(),
            content,
            tokens,
        }
    }
}

/// A fragment that was neither a header, a preamble, nor a header's content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseAnomaly {
    /// Index of the fragment among the non-empty fragments.
    pub position: usize,
    pub first_line: String,
}

/// Parse outcome with diagnostics.
#[derive(Debug, Clone, Default)]
pub struct DigestParse {
    pub files: Vec<FileRecord>,
    pub anomalies: Vec<ParseAnomaly>,
    pub skipped_preambles: usize,
    pub used_fallback: bool,
}

impl DigestParse {
    pub fn total_tokens(&self) -> usize {
        self.files.iter().map(|f| f.tokens).sum()
    }
}

fn separator_regex() -> &'static Regex {
    static SEPARATOR: OnceLock<Regex> = OnceLock::new();
    SEPARATOR.get_or_init(|| Regex::new(r"(?m)^={20,}\r?$").expect("valid separator regex"))
}

fn first_line(fragment: &str) -> &str {
    fragment.lines().next().unwrap_or("").trim()
}

fn header_path(fragment: &str) -> Option<&str> {
    let line = first_line(fragment);
    let prefix = line.get(..HEADER_PREFIX.len())?;
    if prefix.eq_ignore_ascii_case(HEADER_PREFIX) {
        Some(line[HEADER_PREFIX.len()..].trim())
    } else {
        None
    }
}

fn is_preamble(fragment: &str) -> bool {
    first_line(fragment).to_lowercase().starts_with("directory:")
        || fragment.to_lowercase().contains("files analyzed:")
}

/// Parse a digest into its files, in header order.
pub fn parse_digest(blob: &str) -> Vec<FileRecord> {
    parse_digest_detailed(blob).files
}

/// Parse a digest, keeping track of everything that was skipped.
///
/// Malformed fragments are dropped rather than failing the parse. When no
/// header is found in non-blank input, the whole input becomes a single
/// [`FALLBACK_PATH`] file so callers always have something to chunk.
pub fn parse_digest_detailed(blob: &str) -> DigestParse {
    let fragments: Vec<&str> = separator_regex()
        .split(blob)
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .collect();

    let mut parse = DigestParse::default();
    let mut idx = 0;

    while idx < fragments.len() {
        let fragment = fragments[idx];

        if let Some(path) = header_path(fragment) {
            let content = match fragments.get(idx + 1) {
                Some(next) if header_path(next).is_none() => {
                    idx += 1;
                    *next
                }
                _ => "",
            };
            parse.files.push(FileRecord::new(path, content));
        } else if is_preamble(fragment) {
            debug!("Skipping preamble fragment: '{}'", truncate_line(fragment));
            parse.skipped_preambles += 1;
        } else {
            debug!(
                "Dropping orphan fragment at {}: '{}'",
                idx,
                truncate_line(fragment)
            );
            parse.anomalies.push(ParseAnomaly {
                position: idx,
                first_line: first_line(fragment).to_string(),
            });
        }

        idx += 1;
    }

    if parse.files.is_empty() && !blob.trim().is_empty() {
        warn!("Digest contained no file headers, treating the whole input as one file");
        parse.files.push(FileRecord::new(FALLBACK_PATH, blob));
        parse.used_fallback = true;
    }

    info!(
        "Parsed {} files from digest (~{} tokens)",
        parse.files.len(),
        parse.total_tokens()
    );
    parse
}

fn truncate_line(fragment: &str) -> String {
    crate::util::truncate(first_line(fragment), 60)
}
