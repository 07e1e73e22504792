use std::path::PathBuf;
use thiserror::Error;

/// Result type for search operations
pub type SearchResult<T> = Result<T, SearchError>;

/// Errors that can occur while configuring or running a search.
///
/// Only configuration and pattern errors are fatal. Access and I/O failures
/// on individual paths are recovered where they happen and surface as report
/// lines and counters instead.
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("{}", format_config_error(.path, .reason))]
    Config { path: String, reason: String },
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),
    #[error("Unknown regex option: {0}")]
    UnknownRegexOption(String),
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to start worker threads: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

fn format_config_error(path: &str, reason: &str) -> String {
    if path.is_empty() {
        format!("Configuration error: {}", reason)
    } else {
        format!("Configuration error at path: {}: {}", path, reason)
    }
}

impl SearchError {
    /// Configuration error at a `>`-joined location inside the document
    pub fn config_error(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Config {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_pattern(msg: impl Into<String>) -> Self {
        Self::InvalidPattern(msg.into())
    }

    pub fn unknown_regex_option(name: impl Into<String>) -> Self {
        Self::UnknownRegexOption(name.into())
    }

    pub fn permission_denied(path: impl Into<PathBuf>) -> Self {
        Self::PermissionDenied(path.into())
    }

    /// Prefixes the location of a configuration error with `segment`.
    ///
    /// Rule parsers report locations relative to the value they were given;
    /// callers walking up the document prepend their own key.
    pub fn within(self, segment: impl std::fmt::Display) -> Self {
        match self {
            Self::Config { path, reason } => {
                let path = if path.is_empty() {
                    segment.to_string()
                } else {
                    format!("{}>{}", segment, path)
                };
                Self::Config { path, reason }
            }
            other => other,
        }
    }
}
