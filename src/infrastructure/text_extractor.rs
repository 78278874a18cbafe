use std::fs;
use std::path::Path;

use crate::infrastructure::error::CoreError;

const PLAIN_TEXT_EXTENSIONS: [&str; 4] = ["txt", "text", "md", "markdown"];

/// Boundary to the document reader. The core only needs raw text; format
/// internals (PDF, DOCX) live behind this trait in the host application.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<String, CoreError>;
}

/// Reads plain-text documents; anything else is an unsupported format.
/// Byte sequences that are not valid UTF-8 are decoded lossily rather than
/// rejected, since study notes routinely carry stray encoding artifacts.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, path: &Path) -> Result<String, CoreError> {
        let extension = path
            .extension()
            .and_then(|extension| extension.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        if !PLAIN_TEXT_EXTENSIONS.contains(&extension.as_str()) {
            return Err(CoreError::UnsupportedFormat(if extension.is_empty() {
                "file has no extension".to_string()
            } else {
                format!(".{extension}")
            }));
        }

        let bytes = fs::read(path)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}
