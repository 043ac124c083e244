use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One file that failed during processing or embedding, with a
/// human-readable reason. Collected into job records and batch results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedFile {
    pub path: String,
    pub error: String,
}

/// Main error type for EES
#[derive(Error, Debug)]
pub enum EesError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Sync root missing or not a directory; fatal to the whole collection
    #[error("Directory not found: {0}")]
    DirectoryNotFound(String),

    /// File extension/MIME type outside the supported buckets
    #[error("Unsupported file type: {0}")]
    UnsupportedType(String),

    /// Reported size exceeded the limit; checked before any content is read
    #[error("File too large: {path} is {size} bytes (limit {limit})")]
    FileTooLarge { path: String, size: u64, limit: u64 },

    /// Extraction produced nothing but whitespace
    #[error("No text content found in {0}")]
    EmptyContent(String),

    /// Content could not be decoded (corrupt input, bad encoding, timeout)
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// Embedding provider call failure
    #[error("Embedding API error: {0}")]
    Embedding(String),

    /// Batch processing failure: not a single file survived
    #[error("all {} files failed to process", .0.len())]
    AllFilesFailed(Vec<FailedFile>),
}

/// Convenient Result type using EesError
pub type Result<T> = std::result::Result<T, EesError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EesError::Config("Test error".to_string());
        assert!(err.to_string().contains("Configuration error"));
        assert!(err.to_string().contains("Test error"));
    }

    #[test]
    fn test_file_too_large_carries_size_and_limit() {
        let err = EesError::FileTooLarge {
            path: "big.bin".to_string(),
            size: 2048,
            limit: 1024,
        };
        let msg = err.to_string();
        assert!(msg.contains("big.bin"));
        assert!(msg.contains("2048"));
        assert!(msg.contains("1024"));
    }

    #[test]
    fn test_all_files_failed_counts() {
        let err = EesError::AllFilesFailed(vec![
            FailedFile { path: "a".into(), error: "x".into() },
            FailedFile { path: "b".into(), error: "y".into() },
        ]);
        assert!(err.to_string().contains("all 2 files"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let ees_err: EesError = io_err.into();
        assert!(matches!(ees_err, EesError::Io(_)));
    }

    #[test]
    fn test_error_from_rusqlite() {
        let sqlite_err = rusqlite::Error::InvalidQuery;
        let ees_err: EesError = sqlite_err.into();
        assert!(matches!(ees_err, EesError::Database(_)));
    }
}
