pub mod client;
pub mod error;
pub mod models;

use futures::future::BoxFuture;

pub use client::GroqClient;
pub use error::LlmError;
pub use models::{is_text_generation_model, AnalysisResult, Usage, DEFAULT_MODEL};

/// One chat completion call: a system prompt and a user message.
#[derive(Debug, Clone, Copy)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub system: &'a str,
    pub user: &'a str,
}

/// Something that can answer a chat completion request.
///
/// The orchestrator only talks to the model through this trait, so tests can
/// swap the network client for a scripted double.
pub trait ChatBackend: Send + Sync {
    fn complete<'a>(
        &'a self,
        request: ChatRequest<'a>,
    ) -> BoxFuture<'a, Result<AnalysisResult, LlmError>>;
}
