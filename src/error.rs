//! Error types for the edgequake-sections library.
//!
//! Every failure that stops a document from being resolved is a
//! [`ResolveError`]. Errors are local to one document: a failed resolution
//! never poisons the shared [`crate::outline::OutlineCache`], so resolving a
//! different document (or retrying the same one) starts from a clean slate.
//!
//! A document that simply has no headings is *not* an error. It resolves to
//! [`crate::output::OutlineSource::None`] and a single section spanning the
//! whole document.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-sections library.
#[derive(Debug, Error)]
pub enum ResolveError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// A web page could not be fetched.
    #[error("Failed to fetch URL '{url}': {reason}")]
    FetchFailed { url: String, reason: String },

    /// A URL resolved to a web page where a PDF was required.
    #[error("'{url}' is a web page, not a PDF\nUse --with-text to extract its sections.")]
    NotAPdfUrl { url: String },

    /// A web page was fetched but carried no readable text.
    #[error("No extractable content found at '{url}'")]
    NoExtractableContent { url: String },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// The document could not be opened or parsed at all.
    #[error("Document '{path}' is unreadable: {detail}")]
    DocumentUnreadable { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    // ── Layout analysis errors ────────────────────────────────────────────
    /// Heading inference could not run (model unavailable, page analysis
    /// failed after retries, unreadable model reply).
    ///
    /// Never downgraded to "no headings": an empty inferred outline would make
    /// the classifier treat the whole document as content.
    #[error("Layout analysis failed: {detail}")]
    LayoutAnalysisFailed { page: Option<usize>, detail: String },

    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Internal consistency ──────────────────────────────────────────────
    /// Produced sections do not tile the content range. Indicates a bug.
    #[error("Invariant violated: {0}")]
    InvariantViolation(String),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A classification pattern is not a valid regular expression.
    #[error("Invalid classification pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium (or its directory), place the library\n\
next to the binary, or install it system-wide.\n"
    )]
    PdfiumBindingFailed(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ResolveError {
    /// Shorthand for an analysis failure tied to one page (1-indexed in the message).
    pub(crate) fn analysis_on_page(page: usize, detail: impl Into<String>) -> Self {
        ResolveError::LayoutAnalysisFailed {
            page: Some(page),
            detail: format!("page {}: {}", page + 1, detail.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_failure_display_names_page() {
        let e = ResolveError::analysis_on_page(4, "model returned garbage");
        let msg = e.to_string();
        assert!(msg.contains("page 5"), "got: {msg}");
        assert!(msg.contains("garbage"), "got: {msg}");
    }

    #[test]
    fn invariant_display() {
        let e = ResolveError::InvariantViolation("gap before page 7".into());
        assert!(e.to_string().contains("gap before page 7"));
    }

    #[test]
    fn unreadable_display() {
        let e = ResolveError::DocumentUnreadable {
            path: PathBuf::from("/tmp/book.pdf"),
            detail: "bad xref".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("book.pdf"));
        assert!(msg.contains("bad xref"));
    }

    #[test]
    fn invalid_pattern_keeps_source() {
        let source = regex::Regex::new("(").unwrap_err();
        let e = ResolveError::InvalidPattern {
            pattern: "(".into(),
            source,
        };
        assert!(std::error::Error::source(&e).is_some());
    }
}
