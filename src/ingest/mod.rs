//! Repository ingestion
//!
//! Walks a source tree and concatenates its text files into one digest:
//! a summary preamble, then a `File: <path>` block per file, each framed by
//! separator lines that the digest parser understands.

mod filter;

pub use filter::{IngestOptions, DEFAULT_EXCLUDE_PATTERNS, DEFAULT_MAX_FILE_BYTES, ROOT_DOTFILES};

use crate::analysis::estimate_tokens;
use crate::git_ops::{clone_repo, repo_name_from_url};
use crate::util::round_tenths;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

const SEPARATOR_WIDTH: usize = 48;

/// An ingested corpus and its size metadata
#[derive(Debug, Clone)]
pub struct Digest {
    pub content: String,
    pub token_estimate: usize,
    pub char_count: usize,
    pub line_count: usize,
    pub file_count: usize,
    pub repo_name: String,
    pub elapsed_seconds: f64,
}

impl Digest {
    fn new(content: String, file_count: usize, repo_name: &str, elapsed_seconds: f64) -> Self {
        Self {
            token_estimate: estimate_tokens(&content),
            char_count: content.chars().count(),
            line_count: content.matches('\n').count(),
            file_count,
            repo_name: repo_name.to_string(),
            elapsed_seconds,
            content,
        }
    }
}

struct IngestedFile {
    path: String,
    content: String,
}

/// Build a digest of the text files under `root`, in path order
pub fn ingest_directory(root: &Path, repo_name: &str, options: &IngestOptions) -> Result<Digest> {
    let start = Instant::now();
    if !root.is_dir() {
        anyhow::bail!("'{}' is not a directory", root.display());
    }
    let excludes = filter::build_globset(&options.exclude_patterns)?;

    let mut files = Vec::new();
    for entry in WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| filter::keep_entry(root, e))
    {
        let entry = match entry {
            Ok(e) => e,
            Err(err) => {
                warn!("Skipping unreadable entry: {}", err);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let rel = filter::relative_path(root, entry.path());
        if filter::is_excluded(&excludes, &rel) {
            debug!("Excluded by pattern: {}", rel);
            continue;
        }

        let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
        if size > options.max_file_bytes {
            debug!("Skipping {} ({} bytes over limit)", rel, size);
            continue;
        }

        let bytes = match fs::read(entry.path()) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!("Could not read '{}': {}", rel, err);
                continue;
            }
        };
        if bytes.contains(&0) {
            debug!("Skipping binary file {}", rel);
            continue;
        }
        let Ok(content) = String::from_utf8(bytes) else {
            debug!("Skipping non-UTF-8 file {}", rel);
            continue;
        };

        files.push(IngestedFile { path: rel, content });
    }

    let content = render_digest(repo_name, &files);
    let digest = Digest::new(
        content,
        files.len(),
        repo_name,
        round_tenths(start.elapsed().as_secs_f64()),
    );

    info!(
        "Digest built: {} chars, ~{} tokens, {} files, {:.1}s",
        digest.char_count, digest.token_estimate, digest.file_count, digest.elapsed_seconds
    );
    Ok(digest)
}

fn render_digest(repo_name: &str, files: &[IngestedFile]) -> String {
    let separator = "=".repeat(SEPARATOR_WIDTH);

    let mut out = format!(
        "Repository: {}\nFiles analyzed: {}\n\nDirectory structure:\n",
        repo_name,
        files.len()
    );
    for file in files {
        out.push_str("    ");
        out.push_str(&file.path);
        out.push('\n');
    }

    for file in files {
        out.push('\n');
        out.push_str(&separator);
        out.push_str("\nFile: ");
        out.push_str(&file.path);
        out.push('\n');
        out.push_str(&separator);
        out.push('\n');
        out.push_str(&file.content);
        if !file.content.ends_with('\n') {
            out.push('\n');
        }
    }
    out
}

/// Clone `url` into a scratch directory, ingest it, and remove the clone
pub fn clone_and_ingest(url: &str, options: &IngestOptions) -> Result<Digest> {
    let start = Instant::now();
    let repo_name = repo_name_from_url(url)?;
    info!("Starting clone & ingest for '{}'", url);

    let scratch = tempfile::tempdir().context("Failed to create a temporary directory")?;
    let local_path = clone_repo(url, scratch.path())?;
    let mut digest = ingest_directory(&local_path, &repo_name, options)
        .with_context(|| format!("Failed to ingest repository '{}'", url))?;
    digest.elapsed_seconds = round_tenths(start.elapsed().as_secs_f64());

    Ok(digest)
}
