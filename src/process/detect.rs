use crate::error::{EesError, Result};
use std::path::Path;

/// The three processing buckets a file can land in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    /// Plain or structured text, read verbatim
    Text,
    /// Source code, read verbatim
    Code,
    /// Portable documents, run through the safety-limited extractor
    Document,
}

impl ContentKind {
    pub fn mime(&self) -> &'static str {
        match self {
            ContentKind::Text => "text/plain",
            ContentKind::Code => "text/x-source",
            ContentKind::Document => "application/pdf",
        }
    }
}

const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "md", "markdown", "rst", "json", "yaml", "yml", "toml", "xml", "csv", "tsv", "html",
    "htm", "ini", "cfg",
];

const CODE_EXTENSIONS: &[&str] = &[
    "rs", "py", "js", "ts", "jsx", "tsx", "go", "java", "c", "cpp", "cc", "h", "hpp", "rb", "php",
    "sh", "bash", "sql", "kt", "swift", "scala",
];

/// Detect the processing bucket for a file.
///
/// Extension wins; a declared MIME type is consulted only when the extension
/// is unknown (the generic/octet-stream case). Anything that matches neither
/// is an `UnsupportedType` failure.
pub fn detect(path: &Path, declared_mime: Option<&str>) -> Result<ContentKind> {
    let extension = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_lowercase();

    if TEXT_EXTENSIONS.contains(&extension.as_str()) {
        return Ok(ContentKind::Text);
    }
    if CODE_EXTENSIONS.contains(&extension.as_str()) {
        return Ok(ContentKind::Code);
    }
    if extension == "pdf" {
        return Ok(ContentKind::Document);
    }

    if let Some(mime) = declared_mime {
        let mime = mime.trim().to_lowercase();
        if mime.starts_with("text/") {
            return Ok(ContentKind::Text);
        }
        if mime == "application/pdf" {
            return Ok(ContentKind::Document);
        }
        if matches!(
            mime.as_str(),
            "application/json" | "application/xml" | "application/x-yaml" | "application/toml"
        ) {
            return Ok(ContentKind::Text);
        }
    }

    Err(EesError::UnsupportedType(path.display().to_string()))
}
