//! Configuration for section resolution.
//!
//! Every knob lives in [`ResolverConfig`], built through
//! [`ResolverConfigBuilder`]. The first group of fields drives the pure
//! section stages; the second is only read when a PDF has no trustworthy
//! bookmarks and its outline must be inferred by a vision model.

use crate::classify::EntryClassifier;
use crate::error::ResolveError;
use crate::progress::ProgressCallback;
use crate::sections::DEFAULT_MAX_SIZE;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for resolving a document into sections.
///
/// # Example
/// ```rust
/// use edgequake_sections::ResolverConfig;
///
/// let config = ResolverConfig::builder()
///     .max_depth(2)
///     .max_size(Some(16_000))
///     .min_coverage(0.5)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ResolverConfig {
    /// Minimum fraction of the document the bookmarks must reach (highest
    /// bookmarked page / total pages) to be trusted. Range 0.0–1.0. Default: 0.3.
    ///
    /// Bookmarks that stop early usually cover only the front matter of a
    /// scanned or badly exported book.
    pub min_coverage: f64,

    /// Deepest outline level that opens a section. Default: 1 (parts/chapters).
    ///
    /// Also the deepest heading level the web splitter breaks on.
    pub max_depth: u32,

    /// Per-section budget in estimated tokens (characters / 4).
    /// Default: `Some(24_000)`. `None` disables subdivision.
    pub max_size: Option<usize>,

    /// Title patterns for front/back/preamble classification.
    pub classifier: EntryClassifier,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Where downloaded PDFs are kept. Default: a temp dir removed after the run.
    ///
    /// A file already present under the derived name is reused without
    /// downloading again.
    pub download_dir: Option<PathBuf>,

    // ── Heading inference ─────────────────────────────────────────────────
    /// Pre-constructed vision provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Provider name (e.g. "openai", "anthropic", "ollama").
    /// If None along with `provider`, the provider is detected from the environment.
    pub provider_name: Option<String>,

    /// Vision model identifier. If None, uses the provider default.
    pub model: Option<String>,

    /// Number of pages analysed concurrently. Default: 4.
    pub concurrency: usize,

    /// Longest edge of a rendered page in pixels. Default: 1600.
    ///
    /// Headings are large; a smaller render than full transcription needs is
    /// enough and keeps requests cheap.
    pub max_rendered_pixels: u32,

    /// Sampling temperature. Default: 0.0.
    pub temperature: f32,

    /// Maximum tokens the model may generate per page. Default: 2048.
    pub max_tokens: usize,

    /// Retries per page on a failed model call. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-call timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Receives per-page analysis events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            min_coverage: 0.3,
            max_depth: 1,
            max_size: Some(DEFAULT_MAX_SIZE),
            classifier: EntryClassifier::default(),
            password: None,
            download_timeout_secs: 120,
            download_dir: None,
            provider: None,
            provider_name: None,
            model: None,
            concurrency: 4,
            max_rendered_pixels: 1600,
            temperature: 0.0,
            max_tokens: 2048,
            max_retries: 3,
            retry_backoff_ms: 500,
            api_timeout_secs: 60,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ResolverConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolverConfig")
            .field("min_coverage", &self.min_coverage)
            .field("max_depth", &self.max_depth)
            .field("max_size", &self.max_size)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("download_dir", &self.download_dir)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("provider_name", &self.provider_name)
            .field("model", &self.model)
            .field("concurrency", &self.concurrency)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .finish()
    }
}

impl ResolverConfig {
    pub fn builder() -> ResolverConfigBuilder {
        ResolverConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ResolverConfig`].
#[derive(Debug)]
pub struct ResolverConfigBuilder {
    config: ResolverConfig,
}

impl ResolverConfigBuilder {
    pub fn min_coverage(mut self, fraction: f64) -> Self {
        self.config.min_coverage = fraction;
        self
    }

    pub fn max_depth(mut self, depth: u32) -> Self {
        self.config.max_depth = depth;
        self
    }

    pub fn max_size(mut self, budget: Option<usize>) -> Self {
        self.config.max_size = budget;
        self
    }

    pub fn classifier(mut self, classifier: EntryClassifier) -> Self {
        self.config.classifier = classifier;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn download_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.download_dir = Some(dir.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ResolverConfig, ResolveError> {
        let c = &self.config;
        if !(0.0..=1.0).contains(&c.min_coverage) {
            return Err(ResolveError::InvalidConfig(format!(
                "min_coverage must be 0.0–1.0, got {}",
                c.min_coverage
            )));
        }
        if c.max_depth == 0 {
            return Err(ResolveError::InvalidConfig(
                "max_depth must be ≥ 1".into(),
            ));
        }
        if c.max_size == Some(0) {
            return Err(ResolveError::InvalidConfig(
                "max_size must be ≥ 1 (use None to disable subdivision)".into(),
            ));
        }
        if c.concurrency == 0 {
            return Err(ResolveError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}
