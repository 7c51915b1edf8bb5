use thiserror::Error;

/// All errors that can occur in papergraph-core.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("State file not found: {0}")]
    StateNotFound(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

/// Exit codes used by the CLI.
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    InvalidArgs = 3,
    StateError = 4,
}

pub type Result<T> = std::result::Result<T, CoreError>;
