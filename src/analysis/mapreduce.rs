//! Single-pass or map-reduce analysis of a corpus
//!
//! Small inputs go to the model in one call. Large ones are parsed into
//! files, packed into chunks, analysed chunk by chunk (map), and the partial
//! findings are merged by one final call (reduce). Calls run one at a time,
//! in chunk order.

use super::chunk::build_chunks;
use super::digest::parse_digest;
use super::tokens::estimate_tokens;
use crate::llm::{AnalysisResult, ChatBackend, ChatRequest, LlmError, Usage, DEFAULT_MODEL};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};

/// Inputs estimated at or above this many tokens switch to map-reduce.
pub const DEFAULT_SINGLE_PASS_THRESHOLD: usize = 6000;

/// Token budget for each map-phase chunk.
pub const DEFAULT_CHUNK_MAX_TOKENS: usize = 6000;

/// Joins partial findings in the reduce prompt.
pub const PARTIAL_FINDING_SEPARATOR: &str = "\n\n=== PARTIAL FINDING ===\n";

const DEFAULT_LABEL: &str = "the submitted code";

/// Per-run knobs, passed in explicitly by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisSettings {
    pub model: String,
    pub single_pass_threshold: usize,
    pub chunk_max_tokens: usize,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            single_pass_threshold: DEFAULT_SINGLE_PASS_THRESHOLD,
            chunk_max_tokens: DEFAULT_CHUNK_MAX_TOKENS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    SinglePass,
    MapReduce,
}

/// Progress notifications for whoever is driving the analysis.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisEvent {
    StrategyChosen {
        strategy: Strategy,
        estimated_tokens: usize,
    },
    ChunksPlanned {
        files: usize,
        chunks: usize,
        max_tokens: usize,
    },
    /// `index` is 1-based.
    ChunkStarted { index: usize, total: usize },
    ChunkFailed {
        index: usize,
        total: usize,
        error: String,
    },
    Synthesizing { partials: usize },
}

/// A failure that aborts the analysis.
#[derive(Error, Debug)]
pub enum AnalyzeError {
    #[error("Analysis request failed: {0}")]
    SinglePass(#[source] LlmError),

    #[error("Final synthesis request failed: {0}")]
    Reduce(#[source] LlmError),
}

/// Pick single-pass when the corpus is estimated below `threshold` tokens.
pub fn choose_strategy(corpus: &str, threshold: usize) -> Strategy {
    if estimate_tokens(corpus) < threshold {
        Strategy::SinglePass
    } else {
        Strategy::MapReduce
    }
}

fn map_system_prompt(prompt: &str, label: &str, index: usize, total: usize) -> String {
    format!(
        "You are analyzing PART {index} of {total} of {label}.\n\n\
         {prompt}\n\n\
         INSTRUCTIONS FOR PARTIAL ANALYSIS:\n\
         - Identify key findings in THIS chunk only.\n\
         - Be concise but specific.\n\
         - If you see partial implementations, note them.\n\
         - DO NOT generate the final fully formatted report yet; \
         provide a structured summary of observations."
    )
}

fn reduce_system_prompt(label: &str) -> String {
    format!(
        "You are a Lead Tech Auditor. Synthesize the provided partial findings \
         into a final report for {label}."
    )
}

fn reduce_user_prompt(prompt: &str, label: &str, total: usize, findings: &str) -> String {
    format!(
        "You have analyzed {label} in {total} parts. Below are the partial findings \
         from each part. Synthesize these into a SINGLE, COHERENT final report \
         following the original requested format exactly.\n\n\
         ORIGINAL PROMPT:\n{prompt}\n\n\
         PARTIAL FINDINGS TO SYNTHESIZE:\n{findings}"
    )
}

type Observer<'a> = Box<dyn FnMut(&AnalysisEvent) + Send + 'a>;

/// Drives one analysis run against a [`ChatBackend`].
pub struct Analyzer<'a> {
    backend: &'a dyn ChatBackend,
    settings: AnalysisSettings,
    observer: Option<Observer<'a>>,
}

impl<'a> Analyzer<'a> {
    pub fn new(backend: &'a dyn ChatBackend, settings: AnalysisSettings) -> Self {
        Self {
            backend,
            settings,
            observer: None,
        }
    }

    /// Receive an [`AnalysisEvent`] at each step.
    pub fn with_observer(mut self, observer: impl FnMut(&AnalysisEvent) + Send + 'a) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    fn emit(&mut self, event: AnalysisEvent) {
        if let Some(observer) = self.observer.as_mut() {
            observer(&event);
        }
    }

    /// Analyse `corpus` with `prompt` as the system prompt.
    ///
    /// `repo_label` names the source (usually a repository URL) in the
    /// prompts. Map-phase failures are recorded inline and do not abort the
    /// run; a failing single-pass or reduce call does.
    pub async fn analyze(
        &mut self,
        prompt: &str,
        corpus: &str,
        repo_label: Option<&str>,
    ) -> Result<AnalysisResult, AnalyzeError> {
        let estimated_tokens = estimate_tokens(corpus);
        let strategy = choose_strategy(corpus, self.settings.single_pass_threshold);
        info!(
            "Corpus is ~{} tokens (threshold {}), using {:?}",
            estimated_tokens, self.settings.single_pass_threshold, strategy
        );
        self.emit(AnalysisEvent::StrategyChosen {
            strategy,
            estimated_tokens,
        });

        match strategy {
            Strategy::SinglePass => self.single_pass(prompt, corpus, repo_label).await,
            Strategy::MapReduce => self.map_reduce(prompt, corpus, repo_label).await,
        }
    }

    async fn single_pass(
        &mut self,
        prompt: &str,
        corpus: &str,
        repo_label: Option<&str>,
    ) -> Result<AnalysisResult, AnalyzeError> {
        let user = match repo_label {
            Some(label) => format!("Repository: {}\n\n{}", label, corpus),
            None => corpus.to_string(),
        };

        self.backend
            .complete(ChatRequest {
                model: &self.settings.model,
                system: prompt,
                user: &user,
            })
            .await
            .map_err(AnalyzeError::SinglePass)
    }

    async fn map_reduce(
        &mut self,
        prompt: &str,
        corpus: &str,
        repo_label: Option<&str>,
    ) -> Result<AnalysisResult, AnalyzeError> {
        let label = repo_label.unwrap_or(DEFAULT_LABEL);
        let model = self.settings.model.clone();

        let files = parse_digest(corpus);
        let chunks = build_chunks(&files, self.settings.chunk_max_tokens);
        let total = chunks.len();
        self.emit(AnalysisEvent::ChunksPlanned {
            files: files.len(),
            chunks: total,
            max_tokens: self.settings.chunk_max_tokens,
        });

        let mut partials = Vec::with_capacity(total);
        let mut map_usage = Usage::default();

        for (i, chunk) in chunks.iter().enumerate() {
            let index = i + 1;
            self.emit(AnalysisEvent::ChunkStarted { index, total });

            let system = map_system_prompt(prompt, label, index, total);
            let reply = self
                .backend
                .complete(ChatRequest {
                    model: &model,
                    system: &system,
                    user: &chunk.text,
                })
                .await;

            match reply {
                Ok(result) => {
                    map_usage.add(&result.usage);
                    partials.push(result.content);
                }
                Err(err) => {
                    error!("Failed to analyze chunk {}: {}", index, err);
                    self.emit(AnalysisEvent::ChunkFailed {
                        index,
                        total,
                        error: err.to_string(),
                    });
                    partials.push(format!("[Error analyzing chunk {}: {}]", index, err));
                }
            }
        }

        if partials.is_empty() {
            warn!("Map phase produced no chunks, synthesizing from an empty set");
        }
        info!(
            "Map phase done: {} partials, {} tokens used",
            partials.len(),
            map_usage.total_tokens
        );
        self.emit(AnalysisEvent::Synthesizing {
            partials: partials.len(),
        });

        let findings = partials.join(PARTIAL_FINDING_SEPARATOR);
        let system = reduce_system_prompt(label);
        let user = reduce_user_prompt(prompt, label, total, &findings);

        self.backend
            .complete(ChatRequest {
                model: &model,
                system: &system,
                user: &user,
            })
            .await
            .map_err(AnalyzeError::Reduce)
    }
}

/// One-shot helper around [`Analyzer`] without progress reporting.
pub async fn analyze(
    backend: &dyn ChatBackend,
    settings: AnalysisSettings,
    prompt: &str,
    corpus: &str,
    repo_label: Option<&str>,
) -> Result<AnalysisResult, AnalyzeError> {
    Analyzer::new(backend, settings)
        .analyze(prompt, corpus, repo_label)
        .await
}
