use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;
use walkdir::DirEntry;

/// Heavy files with no value for a code audit
pub const DEFAULT_EXCLUDE_PATTERNS: &[&str] = &[
    "uv.lock",
    "poetry.lock",
    "package-lock.json",
    "yarn.lock",
    "*.docx",
    "*.pdf",
    "*.xlsx",
    "*.pptx",
    "*.bin",
    "*.exe",
    "*.zip",
    "*.tar.gz",
    "*.png",
    "*.jpg",
    "*.jpeg",
    "*.gif",
    "*.svg",
    "*.woff",
    "*.woff2",
    "*.ttf",
    "*.eot",
];

/// Dotfiles at the repository root that are kept despite being hidden
pub const ROOT_DOTFILES: &[&str] = &[
    ".gitignore",
    ".env",
    ".env.example",
    ".python-version",
    ".flake8",
    ".editorconfig",
    ".pre-commit-config.yaml",
    ".gitattributes",
    ".dockerignore",
    ".nvmrc",
    ".tool-versions",
];

const IGNORE_DIRS: &[&str] = &[
    ".git",
    "node_modules",
    "target",
    "vendor",
    "dist",
    "build",
    ".next",
    "__pycache__",
    ".venv",
    "venv",
];

const WORKFLOWS_DIR: &str = ".github/workflows";

pub const DEFAULT_MAX_FILE_BYTES: u64 = 1024 * 1024;

/// What `ingest_directory` picks up
#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Globs matched against both the relative path and the file name
    pub exclude_patterns: Vec<String>,
    /// Larger files are skipped
    pub max_file_bytes: u64,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            exclude_patterns: DEFAULT_EXCLUDE_PATTERNS
                .iter()
                .map(|p| p.to_string())
                .collect(),
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
        }
    }
}

pub(crate) fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(
            Glob::new(pattern).with_context(|| format!("Invalid exclude pattern '{}'", pattern))?,
        );
    }
    Ok(builder.build()?)
}

/// Path relative to `root` with `/` separators
pub(crate) fn relative_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Whether the walker should descend into / yield `entry`
pub(crate) fn keep_entry(root: &Path, entry: &DirEntry) -> bool {
    if entry.depth() == 0 {
        return true;
    }

    let name = entry.file_name().to_string_lossy();
    if entry.file_type().is_dir() && IGNORE_DIRS.contains(&name.as_ref()) {
        return false;
    }

    let rel = relative_path(root, entry.path());
    if rel == ".github" {
        return entry.file_type().is_dir();
    }
    if let Some(rest) = rel.strip_prefix(".github/") {
        return rest == "workflows" || rel.starts_with(&format!("{}/", WORKFLOWS_DIR));
    }

    if name.starts_with('.') {
        return entry.depth() == 1
            && entry.file_type().is_file()
            && ROOT_DOTFILES.contains(&name.as_ref());
    }

    true
}

pub(crate) fn is_excluded(excludes: &GlobSet, rel_path: &str) -> bool {
    let file_name = rel_path.rsplit('/').next().unwrap_or(rel_path);
    excludes.is_match(rel_path) || excludes.is_match(file_name)
}
