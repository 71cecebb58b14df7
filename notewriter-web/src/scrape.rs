use crate::engine::{EngineOutcome, SearchEngine, SearchHit};
use async_trait::async_trait;
use notewriter_http::{HttpClient, HttpError, PAGE_USER_AGENT, RequestOpts};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use scraper::{Html, Selector};
use std::time::Duration;
use url::Url;

pub const DUCKDUCKGO_BASE_URL: &str = "https://html.duckduckgo.com/";

/// DuckDuckGo's JavaScript-free results page.
#[derive(Clone)]
pub struct DuckDuckGoHtml {
    http: HttpClient,
}

impl DuckDuckGoHtml {
    pub fn new() -> Result<Self, HttpError> {
        Self::with_base(DUCKDUCKGO_BASE_URL)
    }

    pub fn with_base(base: &str) -> Result<Self, HttpError> {
        let http = HttpClient::new(base)?.with_timeout(Duration::from_secs(15));
        Ok(Self { http })
    }
}

/// Result links point at a `/l/?uddg=` redirect; unwrap it when present.
fn resolve_result_href(href: &str) -> Option<String> {
    let absolute = if href.starts_with("//") {
        format!("https:{href}")
    } else if href.starts_with('/') {
        format!("https://duckduckgo.com{href}")
    } else {
        href.to_string()
    };
    let parsed = Url::parse(&absolute).ok()?;
    if parsed.path().starts_with("/l/") {
        if let Some((_, target)) = parsed.query_pairs().find(|(k, _)| k == "uddg") {
            return Some(target.into_owned());
        }
    }
    match parsed.scheme() {
        "http" | "https" => Some(absolute),
        _ => None,
    }
}

fn text_of(el: scraper::ElementRef<'_>) -> String {
    el.text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub(crate) fn hits_from_html(html: &str, max_results: usize) -> Vec<SearchHit> {
    let (Ok(result_sel), Ok(link_sel), Ok(snippet_sel)) = (
        Selector::parse(".result"),
        Selector::parse(".result__a"),
        Selector::parse(".result__snippet"),
    ) else {
        return Vec::new();
    };

    let document = Html::parse_document(html);
    document
        .select(&result_sel)
        .filter(|r| !r.value().classes().any(|c| c == "result--ad"))
        .filter_map(|r| {
            let link = r.select(&link_sel).next()?;
            let url = resolve_result_href(link.value().attr("href")?)?;
            let description = r.select(&snippet_sel).next().map(text_of).unwrap_or_default();
            Some(SearchHit {
                title: text_of(link),
                url,
                description,
            })
        })
        .take(max_results)
        .collect()
}

#[async_trait]
impl SearchEngine for DuckDuckGoHtml {
    fn name(&self) -> &'static str {
        "duckduckgo_html"
    }

    async fn search(&self, query: &str, max_results: usize) -> EngineOutcome {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(PAGE_USER_AGENT));
        let opts = RequestOpts {
            headers: Some(headers),
            query: Some(vec![("q", query.to_string().into())]),
            retries: Some(0),
            ..Default::default()
        };
        let html = match self.http.get_text("html/", opts).await {
            Ok(html) => html,
            Err(e) => {
                tracing::warn!(target: "web.scrape", error = %e, "scrape.search.failed");
                return EngineOutcome::Failed(e.to_string());
            }
        };
        let hits = hits_from_html(&html, max_results);
        tracing::info!(target: "web.scrape", hit_count = hits.len(), "scrape.search.done");
        EngineOutcome::from_hits(hits)
    }
}
