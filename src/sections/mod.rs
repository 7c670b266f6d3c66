//! Pure section stages: content range, first-pass sections, subdivision.
//!
//! None of these touch the document. They work on classified outline entries
//! and, for subdivision, a [`SizeEstimator`] built from page character counts.

pub mod build;
pub mod range;
pub mod subdivide;

pub use build::{build_sections, verify_tiling, FULL_DOCUMENT_TITLE};
pub use range::resolve_range;
pub use subdivide::{
    subdivide, PageSizeEstimator, SizeEstimator, CHARS_PER_TOKEN, DEFAULT_MAX_SIZE,
};
