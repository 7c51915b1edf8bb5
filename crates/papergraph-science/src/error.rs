use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScienceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error from {0}: {1}")]
    ApiError(String, String),

    #[error("rate limit from {0}, retry after {1}s")]
    RateLimit(String, u64),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("download failed for {0}: {1}")]
    Download(String, String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("state error: {0}")]
    State(#[from] papergraph_core::CoreError),
}

pub type Result<T> = std::result::Result<T, ScienceError>;
