//! Plain-text extraction for downloaded blobs.

use std::path::Path;

use lopdf::Document as PdfDocument;

/// Errors surfaced while extracting text from a blob.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    /// The PDF could not be parsed or a page could not be decoded.
    #[error("failed to read PDF: {0}")]
    Pdf(#[from] lopdf::Error),
}

/// How a blob's bytes are turned into text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    /// Portable Document Format, text pulled page by page.
    Pdf,
    /// Anything else, decoded as UTF-8 (lossy).
    Text,
}

impl ContentKind {
    /// Picks the extraction strategy from the blob name, falling back to the content type.
    pub fn detect(name: &str, content_type: Option<&str>) -> Self {
        let by_extension = Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
        let by_content_type = content_type
            .map(|ct| ct.trim().to_ascii_lowercase().starts_with("application/pdf"))
            .unwrap_or(false);
        if by_extension || by_content_type {
            Self::Pdf
        } else {
            Self::Text
        }
    }
}

/// Extracts the text of one blob. PDF pages are joined with blank lines.
pub fn extract_text(
    name: &str,
    content_type: Option<&str>,
    bytes: &[u8],
) -> Result<String, ExtractError> {
    match ContentKind::detect(name, content_type) {
        ContentKind::Pdf => extract_pdf(bytes),
        ContentKind::Text => Ok(String::from_utf8_lossy(bytes).into_owned()),
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    let document = PdfDocument::load_mem(bytes)?;
    let mut pages = Vec::new();
    for page_number in document.get_pages().into_keys() {
        let text = document.extract_text(&[page_number])?;
        let text = text.trim();
        if !text.is_empty() {
            pages.push(text.to_string());
        }
    }
    Ok(pages.join("\n\n"))
}
