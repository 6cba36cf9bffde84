//! Character-based token estimation
//!
//! Not a tokenizer. Roughly four characters per token, which is close enough
//! to size prompts against a model's limits.

const CHARS_PER_TOKEN: usize = 4;

/// Estimate how many tokens `text` will cost. Never returns 0.
pub fn estimate_tokens(text: &str) -> usize {
    estimate_tokens_from_chars(text.chars().count())
}

/// Same estimate, for text whose character count is already known.
pub fn estimate_tokens_from_chars(chars: usize) -> usize {
    (chars / CHARS_PER_TOKEN).max(1)
}
