//! Error types for the readme generation pipeline.

use thiserror::Error;

/// Errors raised while resolving configuration or generating output.
#[derive(Debug, Error)]
pub enum ReadmeError {
    /// Fatal configuration error; aborts the entire build.
    #[error("``readme-rst``: {0}")]
    Config(String),

    /// Failure to read repository metadata from the git CLI.
    #[error("``readme-rst``: git error: {0}")]
    Git(String),

    /// A reference could not be resolved and strict resolution is enabled.
    #[error("``readme-rst``: unresolved cross-reference :{role}:`{target}`")]
    UnresolvedReference { role: String, target: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Regex(#[from] regex::Error),
}

pub type Result<T> = std::result::Result<T, ReadmeError>;

impl ReadmeError {
    pub fn config(msg: impl Into<String>) -> Self {
        ReadmeError::Config(msg.into())
    }

    pub fn git(msg: impl Into<String>) -> Self {
        ReadmeError::Git(msg.into())
    }
}
