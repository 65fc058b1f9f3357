//! Text extraction with a file-identity header.
//!
//! Plain text is read UTF-8-first with a lossy fallback so legacy encodings
//! degrade instead of failing the file. Structured documents (PDF) go
//! through a dedicated extractor behind the `pdf` feature.

use std::path::Path;

use crate::error::{IndexError, Result};

/// Extract a file's text, dispatching on extension.
///
/// # Errors
///
/// Returns `FileTooLarge` past the size limit, or `Extraction` if a
/// structured-document extractor fails.
pub async fn extract_text(path: &Path, max_bytes: u64) -> Result<String> {
    let meta = tokio::fs::metadata(path).await?;
    if meta.len() > max_bytes {
        return Err(IndexError::FileTooLarge(meta.len()));
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        #[cfg(feature = "pdf")]
        "pdf" => extract_pdf(path).await,
        _ => {
            let bytes = tokio::fs::read(path).await?;
            Ok(read_text_lossy(bytes))
        }
    }
}

#[cfg(feature = "pdf")]
async fn extract_pdf(path: &Path) -> Result<String> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        pdf_extract::extract_text(&path).map_err(|e| IndexError::Extraction(e.to_string()))
    })
    .await
    .map_err(|e| IndexError::Extraction(e.to_string()))?
}

/// UTF-8 strict first; on invalid sequences fall back to lossy decoding so
/// the rest of the file still gets indexed.
fn read_text_lossy(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    }
}

/// Header block prefixed to the content before chunking, so every chunk
/// carries file identity even without a metadata lookup.
#[must_use]
pub fn identity_header(rel_path: &str, file_name: &str, extension: &str) -> String {
    let mut header = String::with_capacity(rel_path.len() + file_name.len() + 32);
    header.push_str("# File: ");
    header.push_str(rel_path);
    header.push('\n');
    header.push_str("# Name: ");
    header.push_str(file_name);
    header.push('\n');
    if !extension.is_empty() {
        header.push_str("# Type: ");
        header.push_str(extension);
        header.push('\n');
    }
    header.push('\n');
    header
}
