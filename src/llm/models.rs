use serde::{Deserialize, Serialize};

/// Model used when neither the CLI nor the config picks one.
pub const DEFAULT_MODEL: &str = "openai/gpt-oss-120b";

/// Model ids containing any of these are audio/speech or distilled models,
/// not chat models.
const NON_TEXT_GENERATION_KEYWORDS: [&str; 4] = ["whisper", "tts", "playai", "distil"];

/// Whether `model_id` looks like a text-generation (chat) model.
pub fn is_text_generation_model(model_id: &str) -> bool {
    let lower = model_id.to_lowercase();
    !NON_TEXT_GENERATION_KEYWORDS
        .iter()
        .any(|kw| lower.contains(kw))
}

/// Token usage reported by the API
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

impl Usage {
    pub fn add(&mut self, other: &Usage) {
        self.prompt_tokens = self.prompt_tokens.saturating_add(other.prompt_tokens);
        self.completion_tokens = self
            .completion_tokens
            .saturating_add(other.completion_tokens);
        self.total_tokens = self.total_tokens.saturating_add(other.total_tokens);
    }
}

/// Reply from one chat completion call
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisResult {
    pub content: String,
    pub model: String,
    pub usage: Usage,
    pub elapsed_seconds: f64,
}
