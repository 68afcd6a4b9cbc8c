use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShelfwatchError {
    #[error("Submission error: {0}")]
    Submission(String),

    #[error("Collection error: {0}")]
    Collection(String),

    #[error("Analysis error: {0}")]
    Analysis(String),

    #[error("History lookup error: {0}")]
    History(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("AI coverage {coverage:.1}% below acceptance threshold {required:.1}%")]
    CoverageBelowThreshold { coverage: f64, required: f64 },

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
