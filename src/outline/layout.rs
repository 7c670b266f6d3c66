//! The layout-analysis seam used by heading inference.

use crate::document::DocumentSource;
use crate::error::ResolveError;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A line a layout analyser tagged as a title or section header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeadingCandidate {
    pub text: String,
    /// 0-indexed page; `None` when the analyser could not place it.
    pub page: Option<usize>,
    /// Rendered font size when the analyser already knows it.
    pub font_size: Option<f32>,
}

impl HeadingCandidate {
    pub fn new(text: impl Into<String>, page: usize) -> Self {
        Self {
            text: text.into(),
            page: Some(page),
            font_size: None,
        }
    }

    pub fn with_font_size(mut self, size: f32) -> Self {
        self.font_size = Some(size);
        self
    }
}

/// Finds heading candidates in a document.
///
/// Candidates are returned in document order: by page, then top to bottom.
/// An analyser that cannot run must fail with
/// [`ResolveError::LayoutAnalysisFailed`] (or `ProviderNotConfigured`) and
/// never report an empty list instead.
pub trait LayoutAnalyzer: Send + Sync {
    fn detect_headings<'a>(
        &'a self,
        doc: Arc<dyn DocumentSource>,
    ) -> BoxFuture<'a, Result<Vec<HeadingCandidate>, ResolveError>>;
}
