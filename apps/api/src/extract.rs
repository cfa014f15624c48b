//! Document Extractor — fetches a resume/cover-letter URL and produces
//! plain text or a binary PDF payload.
//!
//! This boundary never errors: a missing, unfetchable, or unparseable
//! document degrades to `Empty`/empty text. Callers must treat "no text"
//! as a valid, common outcome.

use std::io::{Read, Write};
use std::time::Duration;

use bytes::Bytes;
use dotext::MsDoc;
use tracing::{debug, warn};

/// A fetched document, classified by URL suffix / content type.
#[derive(Debug, Clone)]
pub enum FetchedDocument {
    /// Raw PDF bytes, kept binary so the LLM can read the document directly.
    Pdf(Bytes),
    /// Plain or extracted text (DOCX/DOC/unknown).
    Text(String),
    /// Fetch failed or the body was unusable.
    Empty,
}

impl FetchedDocument {
    /// Text rendition of the document: PDF bytes are run through text
    /// extraction, everything else passes through.
    pub fn into_text(self) -> String {
        match self {
            FetchedDocument::Pdf(bytes) => pdf_text(&bytes),
            FetchedDocument::Text(text) => text,
            FetchedDocument::Empty => String::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            FetchedDocument::Pdf(bytes) => bytes.is_empty(),
            FetchedDocument::Text(text) => text.is_empty(),
            FetchedDocument::Empty => true,
        }
    }
}

#[derive(Clone)]
pub struct DocumentExtractor {
    http: reqwest::Client,
}

impl Default for DocumentExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentExtractor {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .expect("Failed to build document HTTP client"),
        }
    }

    /// Fetches and classifies a document. Never errors.
    pub async fn fetch(&self, url: &str) -> FetchedDocument {
        let response = match self.http.get(url).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!("Document fetch failed for {url}: {e}");
                return FetchedDocument::Empty;
            }
        };
        if !response.status().is_success() {
            warn!("Document fetch returned {} for {url}", response.status());
            return FetchedDocument::Empty;
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        let bytes = match response.bytes().await {
            Ok(b) => b,
            Err(e) => {
                warn!("Document body read failed for {url}: {e}");
                return FetchedDocument::Empty;
            }
        };

        match classify(url, &content_type) {
            DocumentKind::Pdf => FetchedDocument::Pdf(bytes),
            DocumentKind::Docx => FetchedDocument::Text(docx_text(&bytes)),
            DocumentKind::Text => {
                FetchedDocument::Text(String::from_utf8_lossy(&bytes).into_owned())
            }
        }
    }

    /// Fetches a document and returns its plain-text rendition.
    pub async fn fetch_text(&self, url: &str) -> String {
        self.fetch(url).await.into_text()
    }
}

#[derive(Debug, PartialEq)]
enum DocumentKind {
    Pdf,
    Docx,
    Text,
}

/// URL path suffix wins; content type is the fallback. Everything
/// unrecognized is decoded as text outright.
fn classify(url: &str, content_type: &str) -> DocumentKind {
    let path = url.split(['?', '#']).next().unwrap_or(url).to_lowercase();
    if path.ends_with(".pdf") {
        return DocumentKind::Pdf;
    }
    if path.ends_with(".docx") || path.ends_with(".doc") {
        return DocumentKind::Docx;
    }
    if content_type.contains("application/pdf") {
        return DocumentKind::Pdf;
    }
    if content_type.contains("officedocument.wordprocessingml") || content_type.contains("msword") {
        return DocumentKind::Docx;
    }
    DocumentKind::Text
}

/// Extracts text from PDF bytes. Parse failure yields empty text.
pub fn pdf_text(bytes: &[u8]) -> String {
    match pdf_extract::extract_text_from_mem(bytes) {
        Ok(text) => text,
        Err(e) => {
            warn!("PDF text extraction failed: {e}");
            String::new()
        }
    }
}

/// Extracts text from DOCX/DOC bytes via a scratch file. Parse failure
/// yields empty text.
fn docx_text(bytes: &[u8]) -> String {
    let result = (|| -> anyhow::Result<String> {
        let mut scratch = tempfile::NamedTempFile::new()?;
        scratch.write_all(bytes)?;
        scratch.flush()?;
        let mut doc = dotext::Docx::open(scratch.path())?;
        let mut text = String::new();
        doc.read_to_string(&mut text)?;
        Ok(text)
    })();

    match result {
        Ok(text) => {
            debug!("Extracted {} chars from DOCX", text.len());
            text
        }
        Err(e) => {
            warn!("DOCX text extraction failed: {e}");
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_by_url_suffix() {
        assert_eq!(classify("https://files/resume.pdf", ""), DocumentKind::Pdf);
        assert_eq!(classify("https://files/resume.docx", ""), DocumentKind::Docx);
        assert_eq!(classify("https://files/resume.doc", ""), DocumentKind::Docx);
        assert_eq!(classify("https://files/resume.txt", ""), DocumentKind::Text);
    }

    #[test]
    fn test_classify_ignores_query_string() {
        assert_eq!(
            classify("https://files/resume.pdf?Expires=123&Signature=abc", ""),
            DocumentKind::Pdf
        );
    }

    #[test]
    fn test_classify_falls_back_to_content_type() {
        assert_eq!(
            classify("https://files/download", "application/pdf"),
            DocumentKind::Pdf
        );
        assert_eq!(
            classify(
                "https://files/download",
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            ),
            DocumentKind::Docx
        );
        assert_eq!(classify("https://files/download", "text/plain"), DocumentKind::Text);
    }

    #[test]
    fn test_pdf_text_of_garbage_is_empty_not_error() {
        assert_eq!(pdf_text(b"not a pdf"), "");
    }

    #[test]
    fn test_docx_text_of_garbage_is_empty_not_error() {
        assert_eq!(docx_text(b"not a docx"), "");
    }

    #[test]
    fn test_into_text_passthrough_and_empty() {
        assert_eq!(
            FetchedDocument::Text("hello".to_string()).into_text(),
            "hello"
        );
        assert_eq!(FetchedDocument::Empty.into_text(), "");
        assert!(FetchedDocument::Empty.is_empty());
    }
}
