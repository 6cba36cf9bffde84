//! devtool-assistant library crate
//!
//! Exposes the analysis core and its collaborators so the CLI, benchmarks
//! and tests can drive them without going through argument parsing.

pub mod analysis;
pub mod config;
pub mod git_ops;
pub mod ingest;
pub mod keyring;
pub mod llm;
pub mod logging;
pub mod prompts;
pub mod tasks;
pub mod util;
