use crate::config::ProcessingConfig;
use crate::error::{EesError, Result};
use regex::Regex;
use std::path::Path;
use tokio::task;

/// Compiled normalization patterns, built once per processor.
pub struct Normalizer {
    space_runs: Regex,
    newline_spacing: Regex,
    newline_runs: Regex,
}

impl Normalizer {
    pub fn new() -> Self {
        Self {
            // Runs of whitespace other than newlines
            space_runs: Regex::new(r"[^\S\n]+").expect("static regex"),
            // Spaces hugging a newline
            newline_spacing: Regex::new(r" *\n *").expect("static regex"),
            // Three or more consecutive newlines
            newline_runs: Regex::new(r"\n{3,}").expect("static regex"),
        }
    }

    /// Collapse whitespace runs to a single space and runs of 3+ newlines to
    /// exactly two, then trim.
    pub fn normalize(&self, raw: &str) -> String {
        let collapsed = self.space_runs.replace_all(raw, " ");
        let tightened = self.newline_spacing.replace_all(&collapsed, "\n");
        let squeezed = self.newline_runs.replace_all(&tightened, "\n\n");
        squeezed.trim().to_string()
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Read a text or code file verbatim.
///
/// Only trailing whitespace is trimmed; invalid UTF-8 is an extraction
/// failure, not a crash.
pub async fn read_text(path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path).await?;
    let text = String::from_utf8(bytes).map_err(|_| {
        EesError::Extraction(format!("{} is not valid UTF-8", path.display()))
    })?;
    Ok(text.trim_end().to_string())
}

/// Extract text from a PDF under three ordered safety limits: input byte
/// size, wall-clock extraction time, and extracted text length.
///
/// The size gate fires before any bytes are read. Extraction runs on a
/// blocking worker raced against a timer; whichever finishes first wins and
/// a timeout is reported as an ordinary extraction failure.
pub async fn extract_pdf(path: &Path, reported_size: u64, config: &ProcessingConfig) -> Result<String> {
    if reported_size > config.max_pdf_bytes {
        return Err(EesError::Extraction(format!(
            "{} is {} bytes, over the PDF extraction cap of {} bytes",
            path.display(),
            reported_size,
            config.max_pdf_bytes
        )));
    }

    let bytes = tokio::fs::read(path).await?;
    let decode = task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes));

    let text = match tokio::time::timeout(config.pdf_timeout(), decode).await {
        Err(_) => {
            return Err(EesError::Extraction(format!(
                "PDF extraction timed out after {} ms for {}",
                config.pdf_timeout_ms,
                path.display()
            )));
        }
        Ok(Err(join_err)) => {
            return Err(EesError::Extraction(format!(
                "PDF extraction task failed for {}: {}",
                path.display(),
                join_err
            )));
        }
        Ok(Ok(Err(decode_err))) => {
            return Err(EesError::Extraction(format!(
                "Failed to decode {}: {}",
                path.display(),
                decode_err
            )));
        }
        Ok(Ok(Ok(text))) => text,
    };

    if text.len() > config.max_pdf_text {
        return Err(EesError::Extraction(format!(
            "Extracted text from {} is {} characters, over the cap of {}",
            path.display(),
            text.len(),
            config.max_pdf_text
        )));
    }

    Ok(text)
}
