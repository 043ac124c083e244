pub mod chunker;
pub mod detect;
pub mod extract;

pub use chunker::chunk_content;
pub use detect::{detect, ContentKind};
pub use extract::Normalizer;

use crate::collect::CollectedFile;
use crate::config::ProcessingConfig;
use crate::error::{EesError, FailedFile, Result};

/// Extracted, normalized text ready for the embedding step
#[derive(Debug, Clone)]
pub struct ProcessedFile {
    pub filename: String,
    pub content: String,
    pub content_type: String,
    pub size: u64,
    /// Present only when chunking is enabled
    pub chunks: Option<Vec<String>>,
}

/// Result of processing a batch of files
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub successes: Vec<ProcessedFile>,
    pub failures: Vec<FailedFile>,
}

/// Per-file type detection, safety-limited extraction, optional chunking
pub struct FileProcessor {
    config: ProcessingConfig,
    normalizer: Normalizer,
}

impl FileProcessor {
    pub fn new(config: ProcessingConfig) -> Self {
        Self {
            config,
            normalizer: Normalizer::new(),
        }
    }

    pub fn config(&self) -> &ProcessingConfig {
        &self.config
    }

    /// Process one collected file into extracted text.
    ///
    /// The size gate uses the collector-reported size and fires before any
    /// content is read. Text and code are read verbatim (trailing whitespace
    /// trimmed); documents go through the limited PDF extractor and are
    /// normalized. Whitespace-only results fail, whatever the source type.
    pub async fn process(
        &self,
        file: &CollectedFile,
        declared_mime: Option<&str>,
    ) -> Result<ProcessedFile> {
        let kind = detect(&file.absolute_path, declared_mime)?;

        if file.size > self.config.max_file_size {
            return Err(EesError::FileTooLarge {
                path: file.relative_path.clone(),
                size: file.size,
                limit: self.config.max_file_size,
            });
        }

        let content = match kind {
            ContentKind::Text | ContentKind::Code => {
                extract::read_text(&file.absolute_path).await?
            }
            ContentKind::Document => {
                let raw =
                    extract::extract_pdf(&file.absolute_path, file.size, &self.config).await?;
                self.normalizer.normalize(&raw)
            }
        };

        if content.trim().is_empty() {
            return Err(EesError::EmptyContent(file.relative_path.clone()));
        }

        let chunks = if self.config.enable_chunking {
            Some(chunk_content(&content, self.config.max_chunk_size))
        } else {
            None
        };

        Ok(ProcessedFile {
            filename: file.relative_path.clone(),
            content,
            content_type: kind.mime().to_string(),
            size: file.size,
            chunks,
        })
    }

    /// Process a batch, tolerating individual failures.
    ///
    /// The batch only fails as a whole when every file failed; otherwise the
    /// failures ride along in the outcome for the caller to surface.
    pub async fn process_many(&self, files: &[CollectedFile]) -> Result<BatchOutcome> {
        let mut outcome = BatchOutcome::default();

        for file in files {
            match self.process(file, None).await {
                Ok(processed) => outcome.successes.push(processed),
                Err(e) => {
                    log::warn!("Failed to process {}: {}", file.relative_path, e);
                    outcome.failures.push(FailedFile {
                        path: file.relative_path.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        if !files.is_empty() && outcome.successes.is_empty() {
            return Err(EesError::AllFilesFailed(outcome.failures));
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn collected(temp: &TempDir, name: &str, content: &str) -> CollectedFile {
        let path = temp.path().join(name);
        fs::write(&path, content).unwrap();
        CollectedFile {
            absolute_path: path,
            relative_path: name.to_string(),
            size: content.len() as u64,
        }
    }

    fn processor(config: ProcessingConfig) -> FileProcessor {
        FileProcessor::new(config)
    }

    #[tokio::test]
    async fn test_plain_text_round_trip() {
        let temp = TempDir::new().unwrap();
        let file = collected(&temp, "note.txt", "line one\nline two\n");
        let p = processor(ProcessingConfig::default());

        let result = p.process(&file, None).await.unwrap();
        assert_eq!(result.content, "line one\nline two");
        assert_eq!(result.content_type, "text/plain");
        assert_eq!(result.filename, "note.txt");
        assert_eq!(result.size, file.size);
    }

    #[tokio::test]
    async fn test_size_gate_fires_before_read() {
        let p = processor(ProcessingConfig {
            max_file_size: 10,
            ..ProcessingConfig::default()
        });
        // Path does not exist: reaching the filesystem would error with Io,
        // so a FileTooLarge here proves the gate ran first.
        let file = CollectedFile {
            absolute_path: Path::new("/nonexistent/huge.txt").to_path_buf(),
            relative_path: "huge.txt".to_string(),
            size: 100,
        };
        let err = p.process(&file, None).await.unwrap_err();
        assert!(matches!(err, EesError::FileTooLarge { size: 100, limit: 10, .. }));
    }

    #[tokio::test]
    async fn test_empty_file_fails() {
        let temp = TempDir::new().unwrap();
        let file = collected(&temp, "empty.txt", "   \n\n  ");
        let p = processor(ProcessingConfig::default());
        let err = p.process(&file, None).await.unwrap_err();
        assert!(matches!(err, EesError::EmptyContent(_)));
        assert!(err.to_string().contains("No text content found"));
    }

    #[tokio::test]
    async fn test_unsupported_extension_fails() {
        let temp = TempDir::new().unwrap();
        let file = collected(&temp, "image.png", "not really a png");
        let p = processor(ProcessingConfig::default());
        let err = p.process(&file, None).await.unwrap_err();
        assert!(matches!(err, EesError::UnsupportedType(_)));
    }

    #[tokio::test]
    async fn test_chunking_disabled_returns_no_chunks() {
        let temp = TempDir::new().unwrap();
        let long = "paragraph one\n\nparagraph two\n\nparagraph three";
        let file = collected(&temp, "doc.md", long);
        let p = processor(ProcessingConfig {
            enable_chunking: false,
            max_chunk_size: 10,
            ..ProcessingConfig::default()
        });
        let result = p.process(&file, None).await.unwrap();
        assert!(result.chunks.is_none());
        assert_eq!(result.content, long);
    }

    #[tokio::test]
    async fn test_chunking_large_limit_yields_one_chunk() {
        let temp = TempDir::new().unwrap();
        let file = collected(&temp, "doc.md", "some short content");
        let p = processor(ProcessingConfig {
            enable_chunking: true,
            max_chunk_size: 10_000,
            ..ProcessingConfig::default()
        });
        let result = p.process(&file, None).await.unwrap();
        assert_eq!(result.chunks, Some(vec!["some short content".to_string()]));
    }

    #[tokio::test]
    async fn test_chunking_splits_long_content() {
        let temp = TempDir::new().unwrap();
        let para = "x".repeat(40);
        let content = format!("{p}\n\n{p}\n\n{p}", p = para);
        let file = collected(&temp, "doc.md", &content);
        let p = processor(ProcessingConfig {
            enable_chunking: true,
            max_chunk_size: 50,
            ..ProcessingConfig::default()
        });
        let result = p.process(&file, None).await.unwrap();
        let chunks = result.chunks.unwrap();
        assert_eq!(chunks.len(), 3);
    }

    #[tokio::test]
    async fn test_process_many_tolerates_partial_failure() {
        let temp = TempDir::new().unwrap();
        let files = vec![
            collected(&temp, "one.txt", "first file"),
            collected(&temp, "bad.png", "unsupported"),
            collected(&temp, "two.txt", "second file"),
        ];
        let p = processor(ProcessingConfig::default());

        let outcome = p.process_many(&files).await.unwrap();
        assert_eq!(outcome.successes.len(), 2);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].path, "bad.png");
    }

    #[tokio::test]
    async fn test_process_many_fails_when_all_fail() {
        let temp = TempDir::new().unwrap();
        let files = vec![
            collected(&temp, "a.png", "x"),
            collected(&temp, "b.png", "y"),
        ];
        let p = processor(ProcessingConfig::default());

        let err = p.process_many(&files).await.unwrap_err();
        match err {
            EesError::AllFilesFailed(failures) => assert_eq!(failures.len(), 2),
            other => panic!("expected AllFilesFailed, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_process_many_empty_batch_is_ok() {
        let p = processor(ProcessingConfig::default());
        let outcome = p.process_many(&[]).await.unwrap();
        assert!(outcome.successes.is_empty());
        assert!(outcome.failures.is_empty());
    }
}
