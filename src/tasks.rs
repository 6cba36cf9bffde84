//! The three assistant workflows: audit, code review and merge request
//!
//! Loading is blocking (filesystem and git); callers on an async runtime
//! should run it on a blocking thread. Analysis itself is async.

use crate::analysis::{AnalysisEvent, AnalysisSettings, Analyzer};
use crate::git_ops::{clone_repo, diff_branches, remote_branches};
use crate::ingest::{clone_and_ingest, ingest_directory, IngestOptions};
use crate::llm::{AnalysisResult, ChatBackend};
use crate::prompts::{render_prompt, PromptLibrary};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const EMPTY_DIFF_MESSAGE: &str = "No differences found between the selected branches.";
pub const EMPTY_CODE_MESSAGE: &str = "The submitted code is empty, nothing to analyze.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    Audit,
    Review,
    MergeRequest,
}

impl Task {
    pub fn title(&self) -> &'static str {
        match self {
            Task::Audit => "Audit",
            Task::Review => "Code review",
            Task::MergeRequest => "Merge request description",
        }
    }

    pub fn prompt_name(&self) -> &'static str {
        match self {
            Task::Audit => "audit",
            Task::Review => "code_review",
            Task::MergeRequest => "merge_request",
        }
    }

    fn empty_input_message(&self) -> &'static str {
        match self {
            Task::MergeRequest => EMPTY_DIFF_MESSAGE,
            _ => EMPTY_CODE_MESSAGE,
        }
    }
}

/// Where the code to audit or review comes from
#[derive(Debug, Clone)]
pub enum CodeSource {
    /// A text file, typically a digest produced elsewhere
    File(PathBuf),
    Directory(PathBuf),
    /// Clone URL of a public repository
    Repository(String),
}

/// Where the merge request diff comes from
#[derive(Debug, Clone)]
pub enum DiffSource {
    File(PathBuf),
    Branches {
        url: String,
        source: String,
        target: String,
    },
}

/// Input text plus the label used to name it in prompts
#[derive(Debug, Clone)]
pub struct Loaded {
    pub content: String,
    pub label: Option<String>,
}

#[derive(Debug, Clone)]
pub enum TaskOutcome {
    Completed(AnalysisResult),
    /// Nothing was sent to the model; the message says why
    NothingToAnalyze(&'static str),
}

fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read '{}'", path.display()))
}

pub fn load_code(source: &CodeSource, options: &IngestOptions) -> Result<Loaded> {
    match source {
        CodeSource::File(path) => Ok(Loaded {
            content: read_text(path)?,
            label: None,
        }),
        CodeSource::Directory(path) => {
            let name = path
                .canonicalize()
                .ok()
                .and_then(|p| p.file_name().map(|n| n.to_string_lossy().to_string()))
                .unwrap_or_else(|| path.display().to_string());
            let digest = ingest_directory(path, &name, options)?;
            Ok(Loaded {
                content: digest.content,
                label: Some(path.display().to_string()),
            })
        }
        CodeSource::Repository(url) => {
            let digest = clone_and_ingest(url, options)?;
            Ok(Loaded {
                content: digest.content,
                label: Some(url.clone()),
            })
        }
    }
}

pub fn load_diff(source: &DiffSource) -> Result<Loaded> {
    match source {
        DiffSource::File(path) => Ok(Loaded {
            content: read_text(path)?,
            label: None,
        }),
        DiffSource::Branches {
            url,
            source,
            target,
        } => {
            let scratch = tempfile::tempdir().context("Failed to create a temporary directory")?;
            let local_path = clone_repo(url, scratch.path())?;
            let content = diff_branches(&local_path, source, target)?;
            Ok(Loaded {
                content,
                label: Some(url.clone()),
            })
        }
    }
}

/// Remote branches of the repository at `url`, from a throwaway clone
pub fn list_branches(url: &str) -> Result<Vec<String>> {
    let scratch = tempfile::tempdir().context("Failed to create a temporary directory")?;
    let local_path = clone_repo(url, scratch.path())?;
    remote_branches(&local_path)
}

/// Render the task's prompt and analyse `loaded` with it
pub async fn run_task<'a>(
    task: Task,
    loaded: &Loaded,
    settings: AnalysisSettings,
    backend: &'a dyn ChatBackend,
    prompts: &PromptLibrary,
    observer: impl FnMut(&AnalysisEvent) + Send + 'a,
) -> Result<TaskOutcome> {
    if loaded.content.trim().is_empty() {
        info!("{}: empty input, skipping the model call", task.title());
        return Ok(TaskOutcome::NothingToAnalyze(task.empty_input_message()));
    }

    let template = prompts.load(task.prompt_name())?;
    let prompt = render_prompt(&template, &settings.model, loaded.label.as_deref());
    info!(
        "Running {} with model='{}' ({} chars of input)",
        task.title(),
        settings.model,
        loaded.content.len()
    );

    let result = Analyzer::new(backend, settings)
        .with_observer(observer)
        .analyze(&prompt, &loaded.content, loaded.label.as_deref())
        .await?;
    Ok(TaskOutcome::Completed(result))
}
