use crate::engine::{EngineOutcome, SearchEngine, SearchHit, clean_snippet};
use async_trait::async_trait;
use notewriter_http::{HttpClient, HttpError, RequestOpts};
use std::time::Duration;

pub const GOOGLE_NEWS_BASE_URL: &str = "https://news.google.com/";

/// Google News search exposed as an RSS feed.
#[derive(Clone)]
pub struct GoogleNewsRss {
    http: HttpClient,
}

impl GoogleNewsRss {
    pub fn new() -> Result<Self, HttpError> {
        Self::with_base(GOOGLE_NEWS_BASE_URL)
    }

    pub fn with_base(base: &str) -> Result<Self, HttpError> {
        let http = HttpClient::new(base)?.with_timeout(Duration::from_secs(15));
        Ok(Self { http })
    }
}

/// Map feed entries onto hits, keeping feed order.
pub(crate) fn hits_from_feed(bytes: &[u8], max_results: usize) -> Result<Vec<SearchHit>, String> {
    let feed = feed_rs::parser::parse(bytes).map_err(|e| format!("feed parse failed: {e}"))?;
    let hits = feed
        .entries
        .into_iter()
        .filter_map(|entry| {
            let url = entry.links.first().map(|l| l.href.clone())?;
            let title = entry.title.map(|t| clean_snippet(&t.content)).unwrap_or_default();
            let mut description = entry
                .summary
                .map(|s| clean_snippet(&s.content))
                .unwrap_or_default();
            if let Some(published) = entry.published.or(entry.updated) {
                let stamp = published.format("%Y-%m-%d").to_string();
                description = if description.is_empty() {
                    format!("Published {stamp}")
                } else {
                    format!("{description} (published {stamp})")
                };
            }
            Some(SearchHit {
                title,
                url,
                description,
            })
        })
        .take(max_results)
        .collect();
    Ok(hits)
}

#[async_trait]
impl SearchEngine for GoogleNewsRss {
    fn name(&self) -> &'static str {
        "google_news_rss"
    }

    async fn search(&self, query: &str, max_results: usize) -> EngineOutcome {
        let opts = RequestOpts {
            query: Some(vec![
                ("q", query.to_string().into()),
                ("hl", "en-US".into()),
                ("gl", "US".into()),
                ("ceid", "US:en".into()),
            ]),
            retries: Some(1),
            ..Default::default()
        };
        let body = match self.http.get_text("rss/search", opts).await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(target: "web.rss", error = %e, "rss.search.failed");
                return EngineOutcome::Failed(e.to_string());
            }
        };
        match hits_from_feed(body.as_bytes(), max_results) {
            Ok(hits) => {
                tracing::info!(target: "web.rss", hit_count = hits.len(), "rss.search.done");
                EngineOutcome::from_hits(hits)
            }
            Err(e) => {
                tracing::warn!(target: "web.rss", error = %e, "rss.search.parse_failed");
                EngineOutcome::Failed(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"><channel><title>"bill" - Google News</title>
<item>
  <title>Senate passes bill - Example Times</title>
  <link>https://news.example.com/bill</link>
  <description>&lt;a href="x"&gt;Senate passes bill&lt;/a&gt; after debate</description>
  <pubDate>Tue, 04 Mar 2025 10:00:00 GMT</pubDate>
</item>
<item>
  <title>Second</title>
  <link>https://b.example.org/2</link>
</item>
</channel></rss>"#;

    #[test]
    fn parses_items_in_order() {
        let hits = hits_from_feed(SAMPLE.as_bytes(), 10).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].url, "https://news.example.com/bill");
        assert_eq!(hits[0].title, "Senate passes bill - Example Times");
        assert!(hits[0].description.contains("Senate passes bill after debate"));
        assert!(hits[0].description.contains("2025-03-04"));
    }

    #[test]
    fn respects_max_results() {
        assert_eq!(hits_from_feed(SAMPLE.as_bytes(), 1).unwrap().len(), 1);
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(hits_from_feed(b"not a feed", 5).is_err());
    }
}
