//! CLI binary for edgequake-sections.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ResolverConfig` and prints the resolved sections.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_sections::web::{fetch_url_content, split_by_headings};
use edgequake_sections::{
    open_input, AnalysisProgressCallback, DocumentSource, ExtractedSection, OpenedInput,
    PageSizeEstimator, ProgressCallback, Resolution, ResolverConfig, SectionResolver,
    SizeEstimator,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const SPINNER: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner while the outline is resolved; switches to a page bar if layout
/// analysis has to run.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(SPINNER);
        bar.set_style(spinner_style);
        bar.set_prefix("Resolving");
        bar.set_message("Reading outline…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
        })
    }

    fn elapsed_secs(&self, page_num: usize) -> f64 {
        self.start_times
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&page_num)
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl AnalysisProgressCallback for CliProgressCallback {
    fn on_analysis_start(&self, total_pages: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(SPINNER);

        self.bar.set_length(total_pages as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Finding headings");
        self.bar.reset_eta();
    }

    fn on_page_start(&self, page_num: usize, _total: usize) {
        self.start_times
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(page_num, Instant::now());
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_complete(&self, page_num: usize, total: usize, headings: usize) {
        let secs = self.elapsed_secs(page_num);
        if headings > 0 {
            self.bar.println(format!(
                "  {} Page {:>3}/{:<3}  {:<12}  {}",
                green("✓"),
                page_num,
                total,
                dim(&format!("{headings} heading(s)")),
                dim(&format!("{secs:.1}s")),
            ));
        }
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total: usize, error: &str) {
        let secs = self.elapsed_secs(page_num);
        let msg: String = if error.chars().count() > 80 {
            error.chars().take(79).chain(['…']).collect()
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}  {}",
            red("✗"),
            page_num,
            total,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_analysis_complete(&self, total_pages: usize, candidate_count: usize) {
        self.bar.println(format!(
            "{} {} heading candidate(s) on {} pages",
            green("✔"),
            bold(&candidate_count.to_string()),
            total_pages
        ));
        self.bar.set_prefix("Resolving");
        self.bar.set_message("Building sections…");
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Chapter table of a book
  pdf2sections book.pdf

  # Chapters and their sub-sections, no size limit
  pdf2sections --max-depth 2 --no-subdivide book.pdf

  # Classified outline only (front / back / preamble / content)
  pdf2sections --outline-only book.pdf

  # Section text as JSON
  pdf2sections --with-text --json book.pdf -o sections.json

  # A PDF URL (downloaded once into ./downloads)
  pdf2sections --download-dir downloads https://arxiv.org/pdf/1706.03762

  # A web article, split at its headings
  pdf2sections --with-text https://example.com/blog/post

OUTLINE SOURCES:
  The PDF's bookmarks are used when they reach at least --min-coverage of the
  document. Otherwise every page is rendered and a vision model lists its
  headings; this needs an API key and is the only slow path.

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to libpdfium (file or directory)
  RUST_LOG                Log filter, e.g. edgequake_sections=debug
"#;

/// Resolve the content sections of PDFs and web articles.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2sections",
    version,
    about = "Resolve the content sections of PDFs and web articles",
    long_about = "Find where a PDF's real content starts and ends (skipping covers, tables of \
contents, indices, bibliographies) and cut it into ordered, size-bounded sections using its \
bookmarks, or headings detected by a vision model when the bookmarks are missing.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// Write output to this file instead of stdout.
    #[arg(short, long, env = "PDF2SECTIONS_OUTPUT")]
    output: Option<PathBuf>,

    /// Deepest outline level that starts a section.
    #[arg(long, env = "PDF2SECTIONS_MAX_DEPTH", default_value_t = 1,
          value_parser = clap::value_parser!(u32).range(1..))]
    max_depth: u32,

    /// Per-section budget in estimated tokens (characters / 4).
    #[arg(long, env = "PDF2SECTIONS_MAX_SIZE", default_value_t = 24_000)]
    max_size: usize,

    /// Keep oversized sections whole.
    #[arg(long, env = "PDF2SECTIONS_NO_SUBDIVIDE")]
    no_subdivide: bool,

    /// Fraction of the document the bookmarks must reach to be trusted.
    #[arg(long, env = "PDF2SECTIONS_MIN_COVERAGE", default_value_t = 0.3)]
    min_coverage: f64,

    /// LLM provider for heading inference: openai, anthropic, gemini, ollama.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Vision model ID (default: gpt-4.1-nano).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// Pages analysed concurrently during heading inference.
    #[arg(short, long, env = "PDF2SECTIONS_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Longest edge of a rendered page in pixels.
    #[arg(long, env = "PDF2SECTIONS_MAX_PIXELS", default_value_t = 1600)]
    max_pixels: u32,

    /// Retries per page on model failure.
    #[arg(long, env = "PDF2SECTIONS_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDF2SECTIONS_PASSWORD")]
    password: Option<String>,

    /// Print the classified outline instead of sections.
    #[arg(long, conflicts_with = "with_text")]
    outline_only: bool,

    /// Print each section's text.
    #[arg(long)]
    with_text: bool,

    /// Output JSON.
    #[arg(long, env = "PDF2SECTIONS_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDF2SECTIONS_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2SECTIONS_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF2SECTIONS_QUIET")]
    quiet: bool,

    /// Keep downloaded PDFs here and reuse them on later runs.
    #[arg(long, env = "PDF2SECTIONS_DOWNLOAD_DIR")]
    download_dir: Option<PathBuf>,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "PDF2SECTIONS_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Per-page model call timeout in seconds.
    #[arg(long, env = "PDF2SECTIONS_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let progress = show_progress.then(CliProgressCallback::new);
    let config = build_config(&cli, progress.clone().map(|p| p as ProgressCallback))?;

    let result = run(&cli, &config).await;
    if let Some(ref p) = progress {
        p.finish();
    }
    let text = result?;

    match cli.output {
        Some(ref path) => {
            write_atomic(path, &text).await?;
            if !cli.quiet {
                eprintln!("{} Wrote {}", green("✔"), bold(&path.display().to_string()));
            }
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(text.as_bytes())
                .context("Failed to write to stdout")?;
            if !text.ends_with('\n') {
                handle.write_all(b"\n").ok();
            }
        }
    }
    Ok(())
}

/// Map CLI args to `ResolverConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ResolverConfig> {
    let mut builder = ResolverConfig::builder()
        .min_coverage(cli.min_coverage)
        .max_depth(cli.max_depth)
        .max_size((!cli.no_subdivide).then_some(cli.max_size))
        .concurrency(cli.concurrency)
        .max_rendered_pixels(cli.max_pixels)
        .max_retries(cli.max_retries)
        .download_timeout_secs(cli.download_timeout)
        .api_timeout_secs(cli.api_timeout);

    if let Some(ref name) = cli.provider {
        builder = builder.provider_name(name);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd);
    }
    if let Some(ref dir) = cli.download_dir {
        builder = builder.download_dir(dir);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }
    builder.build().context("Invalid configuration")
}

/// Resolve the input and render the requested view as text.
async fn run(cli: &Cli, config: &ResolverConfig) -> Result<String> {
    let opened = open_input(&cli.input, config)
        .await
        .with_context(|| format!("Failed to open '{}'", cli.input))?;

    // `_source` keeps a downloaded file alive for the whole run.
    let (doc, _source) = match opened {
        OpenedInput::Web { url } => {
            let markdown = fetch_url_content(&url, config.download_timeout_secs).await?;
            let sections: Vec<ExtractedSection> = split_by_headings(&markdown, config.max_depth)
                .into_iter()
                .map(ExtractedSection::from)
                .collect();
            return render_extracted(&sections, cli.json, cli.with_text);
        }
        OpenedInput::Pdf { document, source } => {
            tracing::debug!("Resolving {}", source.path().display());
            (document as Arc<dyn DocumentSource>, source)
        }
    };
    let resolver = SectionResolver::new(config.clone());

    if cli.outline_only {
        let outline = resolver
            .resolve_outline(Arc::clone(&doc))
            .await
            .context("Outline resolution failed")?;
        let entries = config.classifier.classify_all(&outline.entries);
        if cli.json {
            let value = json!({ "outline_source": outline.source, "entries": entries });
            return serde_json::to_string_pretty(&value).context("Failed to serialise outline");
        }
        let mut out = format!("Outline: {}\n\n", outline.source);
        for e in &entries {
            let indent = "  ".repeat(e.depth().saturating_sub(1) as usize);
            writeln!(out, "{:>9}  p.{:<5} {}{}", format!("[{}]", e.kind), e.page() + 1, indent, e.title())?;
        }
        return Ok(out);
    }

    if cli.with_text {
        let sections = resolver
            .extract(Arc::clone(&doc))
            .await
            .context("Section extraction failed")?;
        return render_extracted(&sections, cli.json, true);
    }

    let resolution = resolver
        .resolve(Arc::clone(&doc))
        .await
        .context("Section resolution failed")?;
    if cli.json {
        return serde_json::to_string_pretty(&resolution).context("Failed to serialise resolution");
    }

    let counts = {
        let doc = Arc::clone(&doc);
        tokio::task::spawn_blocking(move || doc.page_char_counts())
            .await
            .context("Page text task panicked")??
    };
    render_table(&resolution, &PageSizeEstimator::new(counts))
}

fn render_table(resolution: &Resolution, estimator: &dyn SizeEstimator) -> Result<String> {
    let range = &resolution.content_range;
    let mut out = String::new();
    writeln!(out, "Outline:  {}", resolution.outline_source)?;
    if range.is_empty() {
        writeln!(out, "Content:  none ({} pages)", range.total_pages)?;
    } else {
        writeln!(
            out,
            "Content:  pages {}-{} of {}",
            range.start_page + 1,
            range.end_page + 1,
            range.total_pages
        )?;
    }
    for (label, skipped) in [("front", &range.skipped_front), ("back", &range.skipped_back)] {
        if !skipped.is_empty() {
            let titles: Vec<String> = skipped
                .iter()
                .map(|s| format!("{} (p.{})", s.title, s.page + 1))
                .collect();
            writeln!(out, "Skipped {label}:  {}", titles.join(", "))?;
        }
    }

    writeln!(out)?;
    writeln!(out, "{:>4}  {:<11}  {:>8}  Title", "#", "Pages", "Tokens")?;
    let mut total_tokens = 0;
    for (i, s) in resolution.sections.iter().enumerate() {
        let tokens = estimator.estimate(s.start_page, s.end_page);
        total_tokens += tokens;
        let indent = "  ".repeat(s.level().saturating_sub(1) as usize);
        writeln!(
            out,
            "{:>4}  {:<11}  {:>8}  {}{}",
            i + 1,
            format!("{}-{}", s.start_page + 1, s.end_page + 1),
            tokens,
            indent,
            s.title
        )?;
    }
    writeln!(
        out,
        "\n{} section(s), ~{} tokens",
        resolution.sections.len(),
        total_tokens
    )?;
    Ok(out)
}

fn render_extracted(sections: &[ExtractedSection], as_json: bool, with_text: bool) -> Result<String> {
    if as_json {
        return serde_json::to_string_pretty(sections).context("Failed to serialise sections");
    }
    let mut out = String::new();
    for (i, s) in sections.iter().enumerate() {
        if with_text {
            writeln!(out, "## {}\n\n{}\n", s.title, s.content)?;
        } else {
            writeln!(out, "{:>4}  {:>8}  {}", i + 1, s.content.len().div_ceil(4), s.title)?;
        }
    }
    Ok(out)
}

/// Write via a temp file + rename so a failed run never leaves half a file.
async fn write_atomic(path: &Path, text: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, text)
        .await
        .with_context(|| format!("Failed to write {}", tmp.display()))?;
    tokio::fs::rename(&tmp, path)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
