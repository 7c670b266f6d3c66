//! The document seam: everything the resolver needs to know about a PDF.
//!
//! [`DocumentSource`] is small and blocking. The resolver calls it
//! from `spawn_blocking` (pdfium is not async-safe), so implementations may do
//! synchronous file I/O freely. [`crate::pipeline::render::PdfiumDocument`] is
//! the production implementation; tests use in-memory fakes.

use crate::error::ResolveError;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;

/// Content-aware document identity: the hex SHA-256 of the document bytes.
///
/// Two paths to the same bytes share an identity; the same path with
/// different bytes (file replaced between runs) does not.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(format!("{:x}", Sha256::digest(bytes)))
    }

    /// Wrap an identity computed elsewhere (e.g. a database key).
    pub fn from_raw(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Twelve hex digits are plenty for log lines.
        let short: String = self.0.chars().take(12).collect();
        f.write_str(&short)
    }
}

/// One raw bookmark as read from the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeBookmark {
    /// 1 = top level.
    pub depth: u32,
    /// Untrimmed.
    pub title: String,
    /// 1-indexed target page; `None` when the bookmark has no page destination.
    pub page_1based: Option<i64>,
}

impl NativeBookmark {
    pub fn new(depth: u32, title: impl Into<String>, page_1based: i64) -> Self {
        Self {
            depth,
            title: title.into(),
            page_1based: Some(page_1based),
        }
    }
}

/// A "what font size is this heading?" question for one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontQuery {
    pub page: usize,
    pub text: String,
}

/// Read-only access to one document.
pub trait DocumentSource: Send + Sync {
    fn identity(&self) -> &DocumentId;

    /// Fails with [`ResolveError::DocumentUnreadable`] (or a password error)
    /// when the document cannot be opened.
    fn page_count(&self) -> Result<usize, ResolveError>;

    /// Bookmarks in document order; empty when the PDF has none.
    fn native_outline(&self) -> Result<Vec<NativeBookmark>, ResolveError>;

    /// Rendered font size of each queried heading, `None` when the text
    /// cannot be located on its page. Output is aligned with `queries`.
    fn font_sizes(&self, queries: &[FontQuery]) -> Result<Vec<Option<f32>>, ResolveError>;

    /// Plain text of pages `start..=end`, one string per page.
    fn page_texts(&self, start: usize, end: usize) -> Result<Vec<String>, ResolveError>;

    /// Character count of every page, used for size estimation.
    fn page_char_counts(&self) -> Result<Vec<usize>, ResolveError> {
        let total = self.page_count()?;
        if total == 0 {
            return Ok(Vec::new());
        }
        Ok(self
            .page_texts(0, total - 1)?
            .iter()
            .map(|t| t.chars().count())
            .collect())
    }

    /// Rasterise one page with its longest edge capped at `max_pixels`.
    fn render_page(&self, page: usize, max_pixels: u32) -> Result<DynamicImage, ResolveError> {
        let _ = max_pixels;
        Err(ResolveError::analysis_on_page(
            page,
            "this document source cannot be rasterised",
        ))
    }
}

/// Run a blocking [`DocumentSource`] call off the async executor.
pub(crate) async fn blocking<T, F>(doc: &Arc<dyn DocumentSource>, f: F) -> Result<T, ResolveError>
where
    T: Send + 'static,
    F: FnOnce(&dyn DocumentSource) -> Result<T, ResolveError> + Send + 'static,
{
    let doc = Arc::clone(doc);
    tokio::task::spawn_blocking(move || f(doc.as_ref()))
        .await
        .map_err(|e| ResolveError::Internal(format!("Document task panicked: {}", e)))?
}
