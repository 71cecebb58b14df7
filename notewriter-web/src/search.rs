use crate::brave::BraveSearch;
use crate::cache::SearchCache;
use crate::engine::{EngineOutcome, SearchEngine, SearchHit};
use crate::rss::GoogleNewsRss;
use crate::scoring::rank_hits;
use crate::scrape::DuckDuckGoHtml;
use notewriter_http::HttpError;
use std::fmt::Write as _;
use std::sync::Arc;

/// Returned when every engine failed or came back empty.
pub const SEARCH_FAILED_SENTINEL: &str =
    "WEB SEARCH FAILED: no search engine returned results for this query.";

/// Cascading search over several engines in priority order.
pub struct MultiEngineSearch {
    engines: Vec<Arc<dyn SearchEngine>>,
    cache: Arc<SearchCache>,
}

impl MultiEngineSearch {
    pub fn new(engines: Vec<Arc<dyn SearchEngine>>, cache: Arc<SearchCache>) -> Self {
        Self { engines, cache }
    }

    /// Brave (only with a key), then Google News RSS, then DuckDuckGo HTML.
    pub fn with_default_engines(
        brave_api_key: Option<String>,
        cache: Arc<SearchCache>,
    ) -> Result<Self, HttpError> {
        let mut engines: Vec<Arc<dyn SearchEngine>> = Vec::new();
        match brave_api_key.filter(|k| !k.trim().is_empty()) {
            Some(key) => engines.push(Arc::new(BraveSearch::new(key)?)),
            None => tracing::info!("search.brave.disabled"),
        }
        engines.push(Arc::new(GoogleNewsRss::new()?));
        engines.push(Arc::new(DuckDuckGoHtml::new()?));
        Ok(Self::new(engines, cache))
    }

    pub fn engine_names(&self) -> Vec<&'static str> {
        self.engines.iter().map(|e| e.name()).collect()
    }

    /// Formatted, ranked results for `query`. Never fails; returns
    /// [`SEARCH_FAILED_SENTINEL`] when no engine produced anything.
    pub async fn search(&self, query: &str, max_results: usize) -> String {
        if let Some(hit) = self.cache.get(query, max_results).await {
            tracing::debug!("search.cache.hit");
            return hit;
        }

        for engine in &self.engines {
            match engine.search(query, max_results).await {
                EngineOutcome::Hits(hits) if !hits.is_empty() => {
                    let text = format_results(engine.name(), query, hits, max_results);
                    self.cache.put(query, max_results, text.clone()).await;
                    tracing::info!(engine = engine.name(), "search.engine.succeeded");
                    return text;
                }
                EngineOutcome::Hits(_) | EngineOutcome::NoResults => {
                    tracing::info!(engine = engine.name(), "search.engine.no_results");
                }
                EngineOutcome::Failed(reason) => {
                    tracing::warn!(engine = engine.name(), %reason, "search.engine.failed");
                }
            }
        }

        tracing::warn!(engines = self.engines.len(), "search.all_engines_failed");
        SEARCH_FAILED_SENTINEL.to_string()
    }
}

fn format_results(engine: &str, query: &str, hits: Vec<SearchHit>, max_results: usize) -> String {
    let ranked = rank_hits(hits, query, max_results);
    let mut out = format!("Web search results for \"{query}\" (via {engine}):\n");
    for (i, (score, hit)) in ranked.iter().enumerate() {
        let _ = write!(
            out,
            "\n{}. {} [priority score: {}]\n   URL: {}\n",
            i + 1,
            hit.title,
            score,
            hit.url
        );
        if !hit.description.is_empty() {
            let _ = writeln!(out, "   {}", hit.description);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct FixedEngine {
        name: &'static str,
        outcome: EngineOutcome,
        calls: AtomicUsize,
    }

    impl FixedEngine {
        fn new(name: &'static str, outcome: EngineOutcome) -> Arc<Self> {
            Arc::new(Self {
                name,
                outcome,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl SearchEngine for FixedEngine {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn search(&self, _query: &str, _max_results: usize) -> EngineOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.outcome.clone()
        }
    }

    fn hits(urls: &[&str]) -> EngineOutcome {
        EngineOutcome::Hits(
            urls.iter()
                .map(|u| SearchHit {
                    title: format!("title {u}"),
                    url: (*u).to_string(),
                    description: String::new(),
                })
                .collect(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn falls_through_to_first_engine_with_hits() {
        let failing = FixedEngine::new("a", EngineOutcome::Failed("boom".into()));
        let empty = FixedEngine::new("b", EngineOutcome::NoResults);
        let good = FixedEngine::new("c", hits(&["https://example.com/1"]));
        let never = FixedEngine::new("d", hits(&["https://example.com/2"]));
        let engines: Vec<Arc<dyn SearchEngine>> =
            vec![failing.clone(), empty.clone(), good.clone(), never.clone()];
        let search = MultiEngineSearch::new(engines, Arc::new(SearchCache::default()));

        let text = search.search("query", 5).await;
        assert!(text.contains("https://example.com/1"));
        assert!(text.contains("via c"));
        assert_eq!(never.calls.load(Ordering::SeqCst), 0);
        assert_eq!(failing.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn total_failure_returns_sentinel_and_is_not_cached() {
        let failing = FixedEngine::new("a", EngineOutcome::Failed("down".into()));
        let cache = Arc::new(SearchCache::default());
        let engines: Vec<Arc<dyn SearchEngine>> = vec![failing.clone()];
        let search = MultiEngineSearch::new(engines, cache.clone());

        assert_eq!(search.search("q", 5).await, SEARCH_FAILED_SENTINEL);
        assert_eq!(cache.entry_count().await, 0);
        assert_eq!(search.search("q", 5).await, SEARCH_FAILED_SENTINEL);
        assert_eq!(failing.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cache_hit_skips_engines_until_ttl() {
        let engine = FixedEngine::new("a", hits(&["https://example.com"]));
        let engines: Vec<Arc<dyn SearchEngine>> = vec![engine.clone()];
        let search =
            MultiEngineSearch::new(engines, Arc::new(SearchCache::new(Duration::from_secs(300))));

        let first = search.search("q", 5).await;
        let second = search.search("q", 5).await;
        assert_eq!(first, second);
        assert_eq!(engine.calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(301)).await;
        search.search("q", 5).await;
        assert_eq!(engine.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn formatting_orders_by_score() {
        let text = format_results(
            "x",
            "q",
            vec![
                SearchHit {
                    title: "blog".into(),
                    url: "https://blog.example.com".into(),
                    description: "".into(),
                },
                SearchHit {
                    title: "agency".into(),
                    url: "https://www.cdc.gov/page".into(),
                    description: "summary".into(),
                },
            ],
            5,
        );
        let gov = text.find("cdc.gov").unwrap();
        let blog = text.find("blog.example.com").unwrap();
        assert!(gov < blog);
        assert!(text.contains("[priority score: 30]"));
    }
}
