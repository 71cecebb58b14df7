use crate::engine::{EngineOutcome, SearchEngine, SearchHit, clean_snippet};
use async_trait::async_trait;
use notewriter_http::{Auth, HttpClient, HttpError, RequestOpts};
use reqwest::header::{HeaderName, HeaderValue};
use serde::Deserialize;
use std::time::{Duration, Instant};

pub const BRAVE_BASE_URL: &str = "https://api.search.brave.com/";
const BRAVE_MAX_COUNT: usize = 20;

#[derive(Debug, Deserialize)]
struct WebSearchApiResponse {
    web: Option<WebResults>,
}

#[derive(Debug, Deserialize)]
struct WebResults {
    #[serde(default)]
    results: Vec<WebResult>,
}

#[derive(Debug, Deserialize)]
struct WebResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    description: String,
}

/// Brave Search API (web vertical).
#[derive(Clone)]
pub struct BraveSearch {
    http: HttpClient,
    token: String,
}

impl BraveSearch {
    pub fn new(subscription_token: String) -> Result<Self, HttpError> {
        Self::with_base(subscription_token, BRAVE_BASE_URL)
    }

    pub fn with_base(subscription_token: String, base: &str) -> Result<Self, HttpError> {
        let http = HttpClient::new(base)?.with_timeout(Duration::from_secs(15));
        Ok(Self {
            http,
            token: subscription_token,
        })
    }

    async fn query(&self, query: &str, count: usize) -> Result<WebSearchApiResponse, HttpError> {
        let params = vec![
            ("q", query.to_string().into()),
            ("count", count.to_string().into()),
        ];
        self.http
            .get_json(
                "res/v1/web/search",
                RequestOpts {
                    auth: Some(Auth::Header {
                        name: HeaderName::from_static("x-subscription-token"),
                        value: HeaderValue::from_str(&self.token)
                            .map_err(|e| HttpError::Build(e.to_string()))?,
                    }),
                    query: Some(params),
                    retries: Some(1),
                    ..Default::default()
                },
            )
            .await
    }
}

#[async_trait]
impl SearchEngine for BraveSearch {
    fn name(&self) -> &'static str {
        "brave"
    }

    async fn search(&self, query: &str, max_results: usize) -> EngineOutcome {
        let started = Instant::now();
        let count = max_results.clamp(1, BRAVE_MAX_COUNT);
        match self.query(query, count).await {
            Ok(resp) => {
                let hits: Vec<SearchHit> = resp
                    .web
                    .map(|w| w.results)
                    .unwrap_or_default()
                    .into_iter()
                    .filter(|r| !r.url.is_empty())
                    .map(|r| SearchHit {
                        title: clean_snippet(&r.title),
                        url: r.url,
                        description: clean_snippet(&r.description),
                    })
                    .collect();
                tracing::info!(
                    target: "web.brave",
                    hit_count = hits.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "brave.search.done"
                );
                EngineOutcome::from_hits(hits)
            }
            Err(e) => {
                tracing::warn!(target: "web.brave", error = %e, "brave.search.failed");
                EngineOutcome::Failed(e.to_string())
            }
        }
    }
}
