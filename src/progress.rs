//! Progress-callback trait for layout-analysis events.
//!
//! Heading inference is the only slow stage of resolution: every page is
//! rasterised and sent to a vision model. Inject an
//! [`Arc<dyn AnalysisProgressCallback>`] via
//! [`crate::config::ResolverConfigBuilder::progress_callback`] to follow it.
//! Nothing is reported when the embedded outline is trusted.
//!
//! # Example
//!
//! ```rust
//! use edgequake_sections::{AnalysisProgressCallback, ResolverConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     headings: AtomicUsize,
//! }
//!
//! impl AnalysisProgressCallback for CountingCallback {
//!     fn on_page_complete(&self, page_num: usize, total_pages: usize, headings: usize) {
//!         self.headings.fetch_add(headings, Ordering::SeqCst);
//!         eprintln!("Page {}/{}: {} heading(s)", page_num, total_pages, headings);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { headings: AtomicUsize::new(0) });
//!
//! let config = ResolverConfig::builder()
//!     .progress_callback(counter as Arc<dyn AnalysisProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the layout analyser as it processes each page.
///
/// Pages are analysed concurrently, so `on_page_start`, `on_page_complete`
/// and `on_page_error` may be called from several tasks at once. All methods
/// default to no-ops.
pub trait AnalysisProgressCallback: Send + Sync {
    /// Called once before any page is rendered.
    fn on_analysis_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// `page_num` is 1-indexed.
    fn on_page_start(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called when a page's headings were detected.
    ///
    /// # Arguments
    /// * `page_num`: 1-indexed page number
    /// * `total_pages`: total pages
    /// * `headings`: number of title/section-header lines found
    fn on_page_complete(&self, page_num: usize, total_pages: usize, headings: usize) {
        let _ = (page_num, total_pages, headings);
    }

    /// Called when a page fails after all retries. Analysis stops after the
    /// first such failure.
    fn on_page_error(&self, page_num: usize, total_pages: usize, error: &str) {
        let _ = (page_num, total_pages, error);
    }

    /// Called once after every page succeeded.
    fn on_analysis_complete(&self, total_pages: usize, candidate_count: usize) {
        let _ = (total_pages, candidate_count);
    }
}

/// Default when no callback is configured.
pub struct NoopProgressCallback;

impl AnalysisProgressCallback for NoopProgressCallback {}

/// The type stored in [`crate::config::ResolverConfig`].
pub type ProgressCallback = Arc<dyn AnalysisProgressCallback>;
