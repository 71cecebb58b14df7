//! Per-URL source verification.
//!
//! Each URL found in search text is fetched and judged before the note writer
//! may cite it. Policy is lenient: pages that load and look related pass,
//! clear error pages and unrelated content do not.

use crate::urls::extract_urls;
use async_trait::async_trait;
use notewriter_common::truncate_chars;
use notewriter_http::{FetchOpts, FetchedPage, HttpClient, HttpError};
use notewriter_llm::LlmGateway;
use scraper::Html;
use std::sync::Arc;
use url::Url;

pub const DEFAULT_MAX_URLS: usize = 10;
pub const PAGE_EXCERPT_CHARS: usize = 4000;
pub const CLAIM_EXCERPT_CHARS: usize = 500;
const CLASSIFIER_TEMPERATURE: f32 = 0.1;

/// Never fetched; low-quality or unverifiable for fact-checking.
const DENYLISTED_DOMAINS: &[&str] = &[
    "facebook.com",
    "instagram.com",
    "tiktok.com",
    "reddit.com",
    "pinterest.com",
    "quora.com",
    "linkedin.com",
    "youtube.com",
    "youtu.be",
    "t.co",
    "bit.ly",
];

/// Fetched, then screened for removed-content pages before classification.
const SOCIAL_DOMAINS: &[&str] = &["x.com", "twitter.com"];

const DELETED_PHRASES: &[&str] = &[
    "this post was deleted",
    "this tweet was deleted",
    "this post is unavailable",
    "this tweet is unavailable",
    "this page doesn't exist",
    "this page doesn’t exist",
    "this account doesn't exist",
    "this account doesn’t exist",
    "account suspended",
    "this account has been suspended",
    "hmm...this page doesn't exist",
    "sorry, that page does not exist",
];

const HARD_FAILURE_STATUSES: &[u16] = &[403, 404, 410];

#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, HttpError>;
}

/// [`PageFetcher`] over the shared HTTP client with bounded reads.
pub struct HttpPageFetcher {
    http: HttpClient,
    opts: FetchOpts,
}

impl HttpPageFetcher {
    pub fn new(opts: FetchOpts) -> Result<Self, HttpError> {
        // Base is unused; every fetch passes an absolute URL.
        let http = HttpClient::new("https://localhost/")?.with_retries(0);
        Ok(Self { http, opts })
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, HttpError> {
        self.http.fetch_page(url, &self.opts).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlVerdict {
    pub url: String,
    pub valid: bool,
    pub reason: String,
}

impl UrlVerdict {
    fn invalid(url: &str, reason: impl Into<String>) -> Self {
        Self {
            url: url.to_string(),
            valid: false,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct VerifiedSources {
    /// Search text with the verified-sources header, or `None` when nothing passed.
    pub filtered_text: Option<String>,
    pub valid_urls: Vec<String>,
    pub verdicts: Vec<UrlVerdict>,
}

pub struct SourceVerifier {
    fetcher: Arc<dyn PageFetcher>,
    llm: LlmGateway,
    max_urls: usize,
}

fn host_of(url: &str) -> Option<String> {
    let host = Url::parse(url).ok()?.host_str()?.to_ascii_lowercase();
    Some(host.strip_prefix("www.").unwrap_or(&host).to_string())
}

fn domain_matches(host: &str, domains: &[&str]) -> bool {
    domains
        .iter()
        .any(|d| host == *d || host.ends_with(&format!(".{d}")))
}

fn looks_deleted(body: &str) -> bool {
    let lower = body.to_lowercase();
    DELETED_PHRASES.iter().any(|p| lower.contains(p))
}

/// Readable text of an HTML page, skipping scripts and styles.
fn visible_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut out = String::with_capacity(html.len() / 4);
    for node in document.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node
            .parent()
            .and_then(|p| p.value().as_element().map(|e| e.name()))
            .map(|name| matches!(name, "script" | "style" | "noscript" | "template"))
            .unwrap_or(false);
        if !hidden {
            out.push_str(text);
            out.push(' ');
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn classifier_prompt(url: &str, page_excerpt: &str, claim_excerpt: &str) -> String {
    let page = if page_excerpt.trim().is_empty() {
        "[page content could not be retrieved]"
    } else {
        page_excerpt
    };
    format!(
        r#"You are checking whether a web page can be cited as a source when fact-checking a social media post.

Claim being fact-checked:
"""
{claim_excerpt}
"""

URL: {url}

Page content (may be partial, or missing if the page could not be loaded):
"""
{page}
"""

Be lenient. Answer VALID if the page is a real, accessible article or document that is plausibly relevant to the claim, even if it only covers part of it, or if the content is missing but the URL itself points to a reputable source on the topic.
Answer INVALID only if the page is clearly an error page, a deleted or removed post, a login wall with no content, or unrelated to the claim.

Reply with one word, VALID or INVALID, followed by a short reason."#
    )
}

/// `INVALID` wins over `VALID`; anything else is treated as invalid.
fn parse_classification(reply: &str) -> bool {
    let upper = reply.to_uppercase();
    if upper.contains("INVALID") {
        false
    } else {
        upper.contains("VALID")
    }
}

impl SourceVerifier {
    pub fn new(fetcher: Arc<dyn PageFetcher>, llm: LlmGateway) -> Self {
        Self {
            fetcher,
            llm,
            max_urls: DEFAULT_MAX_URLS,
        }
    }

    pub fn with_max_urls(mut self, max_urls: usize) -> Self {
        self.max_urls = max_urls;
        self
    }

    /// Verify every URL in `raw_text` (up to the configured limit) against
    /// `claim`, returning the survivors in their original order.
    pub async fn verify_and_filter(&self, raw_text: &str, claim: &str) -> VerifiedSources {
        let urls = extract_urls(raw_text);
        if urls.len() > self.max_urls {
            tracing::info!(
                found = urls.len(),
                max_urls = self.max_urls,
                "verify.urls.capped"
            );
        }

        let claim_excerpt = truncate_chars(claim.trim(), CLAIM_EXCERPT_CHARS);
        let mut verdicts = Vec::new();
        for url in urls.iter().take(self.max_urls) {
            let verdict = self.verify_url(url, claim_excerpt).await;
            if verdict.valid {
                tracing::info!(url = %verdict.url, reason = %verdict.reason, "verify.url.valid");
            } else {
                tracing::info!(url = %verdict.url, reason = %verdict.reason, "verify.url.invalid");
            }
            verdicts.push(verdict);
        }

        let valid_urls: Vec<String> = verdicts
            .iter()
            .filter(|v| v.valid)
            .map(|v| v.url.clone())
            .collect();

        tracing::info!(
            checked = verdicts.len(),
            valid = valid_urls.len(),
            "verify.summary"
        );

        if valid_urls.is_empty() {
            return VerifiedSources {
                filtered_text: None,
                valid_urls,
                verdicts,
            };
        }

        let mut header = String::from("VERIFIED VALID SOURCES (only cite these URLs):\n");
        for url in &valid_urls {
            header.push_str("- ");
            header.push_str(url);
            header.push('\n');
        }
        VerifiedSources {
            filtered_text: Some(format!("{header}\n{raw_text}")),
            valid_urls,
            verdicts,
        }
    }

    async fn verify_url(&self, url: &str, claim_excerpt: &str) -> UrlVerdict {
        let Some(host) = host_of(url) else {
            return UrlVerdict::invalid(url, "unparseable URL");
        };
        if domain_matches(&host, DENYLISTED_DOMAINS) {
            return UrlVerdict::invalid(url, format!("denylisted domain {host}"));
        }

        let content = match self.fetcher.fetch(url).await {
            Ok(page) if HARD_FAILURE_STATUSES.contains(&page.status) => {
                return UrlVerdict::invalid(url, format!("HTTP {}", page.status));
            }
            Ok(page) if page.is_success() => {
                if domain_matches(&host, SOCIAL_DOMAINS) && looks_deleted(&page.body) {
                    return UrlVerdict::invalid(url, "deleted or unavailable post");
                }
                visible_text(&page.body)
            }
            Ok(page) => {
                tracing::debug!(%url, status = page.status, "verify.fetch.soft_status");
                String::new()
            }
            Err(e) => {
                tracing::debug!(%url, error = %e, "verify.fetch.soft_error");
                String::new()
            }
        };

        let page_excerpt = truncate_chars(&content, PAGE_EXCERPT_CHARS);
        let prompt = classifier_prompt(url, page_excerpt, claim_excerpt);
        match self
            .llm
            .generate_text(&prompt, Some(CLASSIFIER_TEMPERATURE))
            .await
        {
            Ok(reply) => {
                let valid = parse_classification(&reply);
                UrlVerdict {
                    url: url.to_string(),
                    valid,
                    reason: truncate_chars(reply.trim(), 200).to_string(),
                }
            }
            Err(e) => UrlVerdict::invalid(url, format!("classifier failed: {e}")),
        }
    }
}
