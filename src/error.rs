//! Error types for schema loading, collation and type synthesis.

use std::path::PathBuf;

use serde_json::Value;
use thiserror::Error;

/// Errors while reading or parsing a schema document.
#[derive(Debug, Error)]
pub enum LoadError {
    // IO errors (exit code 3)
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[cfg(feature = "remote")]
    #[error("failed to fetch {url}: {source}")]
    NetworkError {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("document not available: {uri}")]
    NotFound { uri: String },

    #[error("unsupported URI scheme \"{scheme}\" in {uri}")]
    UnsupportedScheme { uri: String, scheme: String },

    // Parse errors (exit code 2)
    #[error("invalid document: {message}")]
    InvalidDocument { message: String },

    #[error("invalid URI \"{uri}\": {source}")]
    InvalidUri {
        uri: String,
        #[source]
        source: url::ParseError,
    },
}

impl LoadError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            LoadError::FileNotFound { .. }
            | LoadError::ReadError { .. }
            | LoadError::NotFound { .. }
            | LoadError::UnsupportedScheme { .. } => 3,
            #[cfg(feature = "remote")]
            LoadError::NetworkError { .. } => 3,
            _ => 2,
        }
    }
}

/// Two `allOf` branches that cannot both hold.
///
/// No merged schema exists for the input, so this is fatal for the caller.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("conflicting values for `{field}`: {left} vs {right}")]
pub struct MergeConflict {
    /// Keyword the branches disagree on.
    pub field: &'static str,
    pub left: Value,
    pub right: Value,
}

impl MergeConflict {
    pub(crate) fn new(field: &'static str, left: impl Into<Value>, right: impl Into<Value>) -> Self {
        Self {
            field,
            left: left.into(),
            right: right.into(),
        }
    }
}

/// Errors from the one-call entry points that load and synthesize.
#[derive(Debug, Error)]
pub enum SynthError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Conflict(#[from] MergeConflict),
}

impl SynthError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            SynthError::Load(e) => e.exit_code(),
            SynthError::Conflict(_) => 2,
        }
    }
}
