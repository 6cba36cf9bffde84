use thiserror::Error;

/// Errors from a chat completion or model listing call
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("No Groq API key configured. Run 'devtool setup' or set GROQ_API_KEY.")]
    MissingApiKey,

    #[error("Invalid API key. Run 'devtool setup' to update it.")]
    Unauthorized,

    #[error("Rate limited by Groq: {0}")]
    RateLimited(String),

    #[error("Groq server error ({0}). The service may be temporarily unavailable.")]
    Server(u16),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Failed to decode API response: {0}")]
    Decode(String),
}

impl LlmError {
    /// Map a non-success HTTP status and its (already sanitized) body.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 | 403 => LlmError::Unauthorized,
            413 | 429 => LlmError::RateLimited(body),
            500..=599 => LlmError::Server(status),
            _ => LlmError::Api {
                status,
                message: body,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            LlmError::from_status(401, String::new()),
            LlmError::Unauthorized
        ));
        assert!(matches!(
            LlmError::from_status(413, "too large".into()),
            LlmError::RateLimited(_)
        ));
        assert!(matches!(
            LlmError::from_status(503, String::new()),
            LlmError::Server(503)
        ));
        let err = LlmError::from_status(400, "bad model".into());
        assert_eq!(err.to_string(), "API error 400: bad model");
    }
}
