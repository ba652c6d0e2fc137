use thiserror::Error;

#[derive(Error, Debug)]
pub enum BiError {
    /// Programming or deployment defect: unknown template, bad registry, missing key.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Analytic store unreachable or statement failed.
    #[error("Data access error: {0}")]
    DataAccess(String),

    /// Upstream text-completion failure (network, auth, rate limit).
    #[error("Completion error: {0}")]
    Completion(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<rusqlite::Error> for BiError {
    fn from(err: rusqlite::Error) -> Self {
        BiError::DataAccess(err.to_string())
    }
}

impl From<reqwest::Error> for BiError {
    fn from(err: reqwest::Error) -> Self {
        BiError::Completion(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BiError>;
