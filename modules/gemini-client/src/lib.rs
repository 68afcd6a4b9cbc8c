pub mod error;
pub mod util;

mod types;

pub use error::{GeminiError, Result};
pub use util::{strip_code_fences, truncate_to_char_boundary};

use async_trait::async_trait;
use tracing::debug;

use types::{GenerateRequest, GenerateResponse};

const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// One text completion against a named model. The trait seam lets the
/// analyzer run against a scripted backend in tests.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn generate(&self, model: &str, prompt: &str) -> Result<String>;
}

pub struct GeminiClient {
    api_key: String,
    http: reqwest::Client,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            http: reqwest::Client::new(),
            base_url: GEMINI_API_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.to_string();
        self
    }
}

#[async_trait]
impl CompletionBackend for GeminiClient {
    async fn generate(&self, model: &str, prompt: &str) -> Result<String> {
        let url = format!("{}/models/{}:generateContent", self.base_url, model);

        debug!(model, prompt_bytes = prompt.len(), "Gemini generate request");

        let response = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&GenerateRequest::from_prompt(prompt))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_failure(model, status.as_u16(), body));
        }

        let generated: GenerateResponse = response.json().await?;
        generated.text().ok_or(GeminiError::Empty {
            model: model.to_string(),
        })
    }
}

/// Quota errors come back as HTTP 429, or as a RESOURCE_EXHAUSTED status in
/// the error body; both spellings mean "rotate models".
fn classify_failure(model: &str, status: u16, body: String) -> GeminiError {
    if status == 429 || body.contains("RESOURCE_EXHAUSTED") {
        return GeminiError::RateLimited {
            model: model.to_string(),
        };
    }
    GeminiError::Api {
        status,
        message: body,
    }
}
