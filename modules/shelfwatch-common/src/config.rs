use std::env;
use std::time::Duration;

use tracing::info;

/// Gemini models ranked by free-tier quota, highest first.
pub const DEFAULT_MODELS: &[&str] = &[
    "gemini-2.5-flash-lite",
    "gemini-2.5-flash",
    "gemini-2.5-pro",
];

/// Application configuration loaded from environment variables.
/// Components receive this by value; nothing reads the environment later.
#[derive(Debug, Clone)]
pub struct Config {
    // Bright Data
    pub brightdata_api_token: String,

    // Gemini. None means rating-based fallback analysis only.
    pub gemini_api_key: Option<String>,
    pub models: Vec<String>,

    // Price history. None disables delta detection.
    pub database_url: Option<String>,

    // Pipeline inputs
    pub keywords: Vec<String>,
    pub limit_per_keyword: u32,
    pub top_n_products: usize,

    // Job polling
    pub poll_interval: Duration,
    pub max_wait: Duration,

    // Analysis
    pub batch_size: usize,
    pub inter_batch_delay: Duration,
    pub positive_min_rating: f64,
    pub neutral_min_rating: f64,

    // Price alerting
    pub price_change_threshold: f64,
    pub top_drops: usize,

    // Quality gate
    pub min_records: usize,
    pub min_price_rate: f64,
    pub min_rating_rate: f64,
    pub min_ai_coverage: f64,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            brightdata_api_token: required_env("BRIGHT_DATA_API_TOKEN"),
            gemini_api_key: env::var("GEMINI_API_KEY").ok().filter(|k| !k.is_empty()),
            models: DEFAULT_MODELS.iter().map(|m| m.to_string()).collect(),
            database_url: env::var("DATABASE_URL").ok().filter(|u| !u.is_empty()),
            keywords: env::var("KEYWORDS")
                .map(|k| k.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or_else(|_| {
                    vec!["wireless earbuds".to_string(), "phone case".to_string()]
                }),
            limit_per_keyword: parsed_env("LIMIT_PER_KEYWORD", 40),
            top_n_products: parsed_env("TOP_N_PRODUCTS", 5),
            poll_interval: Duration::from_secs(parsed_env("POLL_INTERVAL_SECS", 20)),
            max_wait: Duration::from_secs(parsed_env("MAX_WAIT_SECS", 300)),
            batch_size: parsed_env("AI_BATCH_SIZE", 10),
            inter_batch_delay: Duration::from_secs(parsed_env("INTER_BATCH_DELAY_SECS", 1)),
            positive_min_rating: 4.0,
            neutral_min_rating: 3.0,
            price_change_threshold: parsed_env("PRICE_CHANGE_THRESHOLD", 10.0),
            top_drops: 5,
            min_records: parsed_env("MIN_RECORDS", 10),
            min_price_rate: 0.5,
            min_rating_rate: 0.5,
            min_ai_coverage: parsed_env("MIN_AI_COVERAGE", 0.5),
        }
    }

    /// Log the effective configuration without leaking credentials.
    pub fn log_redacted(&self) {
        info!(
            gemini = self.gemini_api_key.is_some(),
            history = self.database_url.is_some(),
            keywords = ?self.keywords,
            batch_size = self.batch_size,
            poll_interval_secs = self.poll_interval.as_secs(),
            max_wait_secs = self.max_wait.as_secs(),
            price_change_threshold = self.price_change_threshold,
            "Config loaded"
        );
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}

fn parsed_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
