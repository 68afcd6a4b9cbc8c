use thiserror::Error;

pub type Result<T> = std::result::Result<T, GeminiError>;

#[derive(Debug, Error)]
pub enum GeminiError {
    /// Quota exhausted for this model. Callers rotate to the next model
    /// instead of failing; this variant must stay distinguishable.
    #[error("Rate limited on model {model}")]
    RateLimited { model: String },

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Empty response from model {model}")]
    Empty { model: String },
}

impl GeminiError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, GeminiError::RateLimited { .. })
    }
}

impl From<reqwest::Error> for GeminiError {
    fn from(err: reqwest::Error) -> Self {
        GeminiError::Network(err.to_string())
    }
}
