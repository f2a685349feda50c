use std::path::PathBuf;
use thiserror::Error;

/// Unified error type for git-autover operations
#[derive(Error, Debug)]
pub enum AutoverError {
    #[error("Git operation failed: {0}")]
    Git(#[from] git2::Error),

    #[error("Not a git repository: {}", .0.display())]
    NotARepository(PathBuf),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Tag cache error: {0}")]
    Cache(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience type alias for Results in git-autover
pub type Result<T> = std::result::Result<T, AutoverError>;

impl AutoverError {
    /// Create a configuration error with context
    pub fn config(msg: impl Into<String>) -> Self {
        AutoverError::Config(msg.into())
    }

    /// Create a tag cache error with context
    pub fn cache(msg: impl Into<String>) -> Self {
        AutoverError::Cache(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AutoverError::config("test config issue");
        assert_eq!(err.to_string(), "Configuration error: test config issue");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: AutoverError = io_err.into();
        assert!(err.to_string().contains("I/O error"));
    }

    #[test]
    fn test_not_a_repository_mentions_path() {
        let err = AutoverError::NotARepository(PathBuf::from("/tmp/nowhere"));
        assert_eq!(err.to_string(), "Not a git repository: /tmp/nowhere");
    }

    #[test]
    fn test_error_messages_are_descriptive() {
        let error_pairs = vec![
            (AutoverError::config("x"), "Configuration error"),
            (AutoverError::cache("x"), "Tag cache error"),
        ];

        for (err, expected_prefix) in error_pairs {
            let msg = err.to_string();
            assert!(
                msg.starts_with(expected_prefix),
                "Error message should start with '{}', but got '{}'",
                expected_prefix,
                msg
            );
        }
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<u32>("not json").unwrap_err();
        let err: AutoverError = json_err.into();
        assert!(err.to_string().starts_with("JSON error"));
    }
}
