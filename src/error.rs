use thiserror::Error;

#[derive(Error, Debug)]
pub enum CiTrendError {
    #[error("API request failed with status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot extract build {build}: {reason}")]
    Extract { build: String, reason: String },

    #[error("Git error: {0}")]
    Git(String),

    #[error("No API token provided (set BUILDKITE_TOKEN or pass --token)")]
    MissingToken,

    #[error("Build {number} not found in pipeline {pipeline}")]
    BuildNotFound { pipeline: String, number: u64 },

    #[error("Missing baseline data: {0}")]
    MissingBaseline(String),
}

pub type Result<T> = std::result::Result<T, CiTrendError>;
