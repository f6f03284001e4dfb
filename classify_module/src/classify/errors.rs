use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("llm request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("llm endpoint returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode llm response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("model response carried no text content")]
    NonTextResponse,

    #[error("missing required environment variable {key}")]
    MissingEnv { key: &'static str },

    #[error("invalid category set: {0}")]
    InvalidCategories(String),
}
