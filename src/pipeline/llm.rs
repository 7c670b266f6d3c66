//! Vision-model layout analysis: the production [`LayoutAnalyzer`].
//!
//! Each page is rendered, PNG-encoded and sent to the model together with
//! [`HEADING_DETECTION_PROMPT`]; the model answers with the page's heading
//! lines as JSON. Pages run concurrently (`buffer_unordered`) and are put
//! back in page order afterwards, so candidates come out in document order.
//!
//! ## Retry Strategy
//!
//! Failed calls, timeouts and unparseable replies are retried with
//! exponential backoff (`retry_backoff_ms * 2^(attempt-1)`): with 500 ms and
//! 3 retries the waits are 500 ms → 1 s → 2 s. A page that still fails stops
//! the whole analysis with [`ResolveError::LayoutAnalysisFailed`]; a partial
//! outline would silently drop chapters.

use crate::config::ResolverConfig;
use crate::document::{blocking, DocumentSource};
use crate::error::ResolveError;
use crate::outline::{HeadingCandidate, LayoutAnalyzer};
use crate::pipeline::encode::encode_page;
use crate::prompts::{page_message, HEADING_DETECTION_PROMPT};
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use futures::future::BoxFuture;
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::OnceCell;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, info, warn};

const DEFAULT_VISION_MODEL: &str = "gpt-4.1-nano";

/// Detects headings by showing each page to a vision model.
///
/// The provider is resolved on first use, so building the analyser never
/// fails and documents with trusted bookmarks never need an API key.
pub struct VlmLayoutAnalyzer {
    config: ResolverConfig,
    provider: OnceCell<Arc<dyn LLMProvider>>,
}

impl VlmLayoutAnalyzer {
    pub fn new(config: ResolverConfig) -> Self {
        Self {
            config,
            provider: OnceCell::new(),
        }
    }

    async fn provider(&self) -> Result<Arc<dyn LLMProvider>, ResolveError> {
        self.provider
            .get_or_try_init(|| async { resolve_provider(&self.config) })
            .await
            .map(Arc::clone)
            .map_err(|e| ResolveError::LayoutAnalysisFailed {
                page: None,
                detail: e.to_string(),
            })
    }

    async fn analyse(&self, doc: Arc<dyn DocumentSource>) -> Result<Vec<HeadingCandidate>, ResolveError> {
        let start = Instant::now();
        let provider = self.provider().await?;
        let total_pages = blocking(&doc, |d| d.page_count()).await?;
        let config = &self.config;
        info!(
            "Analysing layout of {} page(s) with concurrency {}",
            total_pages, config.concurrency
        );

        if let Some(ref cb) = config.progress_callback {
            cb.on_analysis_start(total_pages);
        }

        let mut pages = stream::iter((0..total_pages).map(|page| {
            let provider = Arc::clone(&provider);
            let doc = Arc::clone(&doc);
            async move {
                let page_num = page + 1;
                if let Some(ref cb) = config.progress_callback {
                    cb.on_page_start(page_num, total_pages);
                }
                let result = analyse_page(&provider, &doc, page, total_pages, config).await;
                if let Some(ref cb) = config.progress_callback {
                    match &result {
                        Ok(headings) => cb.on_page_complete(page_num, total_pages, headings.len()),
                        Err(e) => cb.on_page_error(page_num, total_pages, &e.to_string()),
                    }
                }
                result.map(|headings| (page, headings))
            }
        }))
        .buffer_unordered(config.concurrency.max(1));

        let mut by_page: Vec<(usize, Vec<HeadingCandidate>)> = Vec::with_capacity(total_pages);
        while let Some(result) = pages.next().await {
            by_page.push(result?);
        }
        by_page.sort_by_key(|(page, _)| *page);

        let candidates: Vec<HeadingCandidate> =
            by_page.into_iter().flat_map(|(_, headings)| headings).collect();

        info!(
            "Layout analysis complete: {} candidate(s) in {:?}",
            candidates.len(),
            start.elapsed()
        );
        if let Some(ref cb) = config.progress_callback {
            cb.on_analysis_complete(total_pages, candidates.len());
        }
        Ok(candidates)
    }
}

impl LayoutAnalyzer for VlmLayoutAnalyzer {
    fn detect_headings<'a>(
        &'a self,
        doc: Arc<dyn DocumentSource>,
    ) -> BoxFuture<'a, Result<Vec<HeadingCandidate>, ResolveError>> {
        Box::pin(self.analyse(doc))
    }
}

/// Render, encode and analyse one page.
async fn analyse_page(
    provider: &Arc<dyn LLMProvider>,
    doc: &Arc<dyn DocumentSource>,
    page: usize,
    total_pages: usize,
    config: &ResolverConfig,
) -> Result<Vec<HeadingCandidate>, ResolveError> {
    let max_pixels = config.max_rendered_pixels;
    let image = blocking(doc, move |d| d.render_page(page, max_pixels)).await?;
    let image_data = encode_page(page, &image)?;
    drop(image);
    detect_page_headings(provider, page, total_pages, image_data, config).await
}

/// Ask the model for one page's headings, retrying with backoff.
pub async fn detect_page_headings(
    provider: &Arc<dyn LLMProvider>,
    page: usize,
    total_pages: usize,
    image_data: ImageData,
    config: &ResolverConfig,
) -> Result<Vec<HeadingCandidate>, ResolveError> {
    let page_num = page + 1;
    let messages = vec![
        ChatMessage::system(HEADING_DETECTION_PROMPT),
        ChatMessage::user_with_images(page_message(page_num, total_pages), vec![image_data]),
    ];
    let options = build_options(config);
    let call_timeout = Duration::from_secs(config.api_timeout_secs.max(1));

    let mut last_err: Option<String> = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let backoff = config.retry_backoff_ms * 2u64.pow(attempt - 1);
            warn!(
                "Page {}: retry {}/{} after {}ms",
                page_num, attempt, config.max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        let err_msg = match timeout(call_timeout, provider.chat(&messages, Some(&options))).await {
            Ok(Ok(response)) => {
                debug!(
                    "Page {}: {} input tokens, {} output tokens",
                    page_num, response.prompt_tokens, response.completion_tokens
                );
                match parse_heading_reply(page, &response.content) {
                    Ok(headings) => return Ok(headings),
                    Err(e) => e,
                }
            }
            Ok(Err(e)) => format!("{}", e),
            Err(_) => format!("no reply within {}s", call_timeout.as_secs()),
        };
        warn!("Page {}: attempt {} failed: {}", page_num, attempt + 1, err_msg);
        last_err = Some(err_msg);
    }

    let detail = last_err.unwrap_or_else(|| "Unknown error".to_string());
    Err(ResolveError::analysis_on_page(
        page,
        format!("{} (after {} retries)", detail, config.max_retries),
    ))
}

fn build_options(config: &ResolverConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum HeadingReply {
    Wrapped { headings: Vec<ReplyHeading> },
    Bare(Vec<ReplyHeading>),
}

#[derive(Debug, Deserialize)]
struct ReplyHeading {
    text: String,
    #[serde(default)]
    label: Option<String>,
}

/// Parse the model's JSON reply into candidates on `page`.
///
/// Code fences and chatter around the JSON are tolerated. Lines labelled
/// anything other than `title` or `section_header` are ignored.
pub fn parse_heading_reply(page: usize, content: &str) -> Result<Vec<HeadingCandidate>, String> {
    let body = strip_code_fences(content);
    let reply: HeadingReply = serde_json::from_str(body)
        .or_else(|first_err| {
            let start = body.find(['{', '[']);
            let end = body.rfind(['}', ']']);
            match (start, end) {
                (Some(s), Some(e)) if e > s => serde_json::from_str(&body[s..=e]),
                _ => Err(first_err),
            }
        })
        .map_err(|e| format!("unparseable heading reply: {}", e))?;

    let headings = match reply {
        HeadingReply::Wrapped { headings } | HeadingReply::Bare(headings) => headings,
    };
    Ok(headings
        .into_iter()
        .filter(|h| {
            h.label
                .as_deref()
                .map_or(true, |l| l == "title" || l == "section_header")
        })
        .filter(|h| !h.text.trim().is_empty())
        .map(|h| HeadingCandidate::new(h.text, page))
        .collect())
}

fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening line.
    let rest = rest.split_once('\n').map_or("", |(_, body)| body);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

/// Instantiate a named provider with the given model.
fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, ResolveError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        ResolveError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the vision provider, from most-specific to least-specific:
///
/// 1. a pre-built `config.provider`
/// 2. `config.provider_name` (+ `config.model`)
/// 3. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`, when both are set
/// 4. OpenAI when `OPENAI_API_KEY` is set, else `ProviderFactory::from_env`
pub fn resolve_provider(config: &ResolverConfig) -> Result<Arc<dyn LLMProvider>, ResolveError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_VISION_MODEL);
        return create_vision_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_vision_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_VISION_MODEL);
            return create_vision_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| ResolveError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No vision provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_options_defaults() {
        let opts = build_options(&ResolverConfig::default());
        assert_eq!(opts.temperature, Some(0.0));
        assert_eq!(opts.max_tokens, Some(2048));
    }

    #[test]
    fn parses_wrapped_reply() {
        let reply = r#"{"headings": [
            {"text": "3 Results", "label": "section_header"},
            {"text": "Figure 2: Loss", "label": "caption"},
            {"text": "A Study of Things", "label": "title"}
        ]}"#;
        let got = parse_heading_reply(4, reply).unwrap();
        assert_eq!(
            got,
            vec![
                HeadingCandidate::new("3 Results", 4),
                HeadingCandidate::new("A Study of Things", 4)
            ]
        );
    }

    #[test]
    fn parses_fenced_and_bare_replies() {
        let fenced = "```json\n{\"headings\": [{\"text\": \"Intro\"}]}\n```";
        assert_eq!(parse_heading_reply(0, fenced).unwrap().len(), 1);

        let bare = r#"[{"text": "Methods", "label": "section_header"}]"#;
        assert_eq!(parse_heading_reply(1, bare).unwrap()[0].text, "Methods");

        let chatty = "Here you go:\n{\"headings\": []}\nHope this helps.";
        assert!(parse_heading_reply(2, chatty).unwrap().is_empty());
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_heading_reply(0, "no headings here").is_err());
    }

    #[test]
    fn strip_fences() {
        assert_eq!(strip_code_fences("```json\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("  {}  "), "{}");
        assert_eq!(strip_code_fences("```\n[]```"), "[]");
    }
}
