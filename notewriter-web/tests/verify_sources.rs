mod common;

use async_trait::async_trait;
use notewriter_http::{FetchedPage, HttpError};
use notewriter_llm::traits::{LlmClient, LlmResponse, LlmResult};
use notewriter_llm::{LlmGateway, RateLimiter, RetryPolicy};
use notewriter_web::{PageFetcher, SourceVerifier};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

enum Canned {
    Page(u16, &'static str),
    Timeout,
}

#[derive(Default)]
struct FakeFetcher {
    pages: HashMap<String, Canned>,
    fetched: Mutex<Vec<String>>,
}

impl FakeFetcher {
    fn with(mut self, url: &str, canned: Canned) -> Self {
        self.pages.insert(url.to_string(), canned);
        self
    }
}

#[async_trait]
impl PageFetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, HttpError> {
        self.fetched.lock().unwrap().push(url.to_string());
        match self.pages.get(url) {
            Some(Canned::Page(status, body)) => Ok(FetchedPage {
                status: *status,
                final_url: url.to_string(),
                body: body.to_string(),
                truncated: false,
            }),
            Some(Canned::Timeout) | None => Err(HttpError::Timeout("deadline elapsed".into())),
        }
    }
}

/// Answers VALID unless the prompt contains one of the `reject` markers.
struct Classifier {
    reject: Vec<&'static str>,
    calls: AtomicUsize,
}

#[async_trait]
impl LlmClient for Classifier {
    async fn generate(
        &self,
        prompt: &str,
        _system_prompt: Option<&str>,
        _max_tokens: Option<u32>,
        _temperature: Option<f32>,
    ) -> LlmResult<LlmResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let text = if self.reject.iter().any(|m| prompt.contains(m)) {
            "INVALID - unrelated"
        } else {
            "VALID - relevant coverage"
        };
        Ok(LlmResponse {
            text: text.into(),
            model: None,
            tokens_used: None,
        })
    }

    async fn health_check(&self) -> LlmResult<bool> {
        Ok(true)
    }

    fn model_name(&self) -> &str {
        "classifier"
    }
}

fn verifier(fetcher: Arc<FakeFetcher>, classifier: Arc<Classifier>) -> SourceVerifier {
    common::init_test_tracing();
    let gateway = LlmGateway::new(
        classifier,
        Arc::new(RateLimiter::new(Duration::ZERO)),
        RetryPolicy::new(0),
    )
    .unwrap();
    SourceVerifier::new(fetcher, gateway)
}

fn classifier(reject: Vec<&'static str>) -> Arc<Classifier> {
    Arc::new(Classifier {
        reject,
        calls: AtomicUsize::new(0),
    })
}

#[tokio::test(start_paused = true)]
async fn hard_failures_and_denylist_skip_classifier() {
    let fetcher = Arc::new(
        FakeFetcher::default()
            .with("https://apnews.com/bill-y", Canned::Page(200, "<p>Senator X signed bill Y</p>"))
            .with("https://news.example.com/gone", Canned::Page(404, "Not found")),
    );
    let llm = classifier(vec![]);
    let v = verifier(fetcher.clone(), llm.clone());

    let text = "See https://apnews.com/bill-y and https://news.example.com/gone and facebook.com/post/1";
    let out = v.verify_and_filter(text, "Senator X signed bill Y in 2025").await;

    assert_eq!(out.valid_urls, vec!["https://apnews.com/bill-y"]);
    assert_eq!(out.verdicts.len(), 3);
    assert_eq!(llm.calls.load(Ordering::SeqCst), 1);
    let fetched = fetcher.fetched.lock().unwrap().clone();
    assert!(!fetched.iter().any(|u| u.contains("facebook")));

    let filtered = out.filtered_text.unwrap();
    assert!(filtered.starts_with("VERIFIED VALID SOURCES"));
    assert!(filtered.ends_with(text));
}

#[tokio::test(start_paused = true)]
async fn deleted_social_post_is_rejected_without_llm() {
    let fetcher = Arc::new(FakeFetcher::default().with(
        "https://x.com/someone/status/1",
        Canned::Page(200, "<div>Hmm...this page doesn't exist. Try searching for something else.</div>"),
    ));
    let llm = classifier(vec![]);
    let v = verifier(fetcher, llm.clone());

    let out = v
        .verify_and_filter("Proof: https://x.com/someone/status/1", "claim")
        .await;
    assert!(out.filtered_text.is_none());
    assert!(out.valid_urls.is_empty());
    assert_eq!(llm.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn soft_failure_still_reaches_classifier() {
    let fetcher = Arc::new(
        FakeFetcher::default().with("https://www.congress.gov/bill/y", Canned::Timeout),
    );
    let llm = classifier(vec![]);
    let v = verifier(fetcher, llm.clone());

    let out = v
        .verify_and_filter("https://www.congress.gov/bill/y", "bill Y")
        .await;
    assert_eq!(out.valid_urls, vec!["https://www.congress.gov/bill/y"]);
    assert_eq!(llm.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn classifier_rejection_and_order_preserved() {
    let fetcher = Arc::new(
        FakeFetcher::default()
            .with("https://b.example.org/a", Canned::Page(200, "<p>bill Y details</p>"))
            .with("https://c.example.org/b", Canned::Page(200, "<p>celebrity gossip</p>"))
            .with("https://a.example.org/c", Canned::Page(200, "<p>bill Y vote</p>")),
    );
    let llm = classifier(vec!["celebrity gossip"]);
    let v = verifier(fetcher, llm);

    let out = v
        .verify_and_filter(
            "b.example.org/a then c.example.org/b then a.example.org/c",
            "bill Y",
        )
        .await;
    assert_eq!(
        out.valid_urls,
        vec!["https://b.example.org/a", "https://a.example.org/c"]
    );
}

#[tokio::test(start_paused = true)]
async fn no_urls_means_no_sources() {
    let llm = classifier(vec![]);
    let v = verifier(Arc::new(FakeFetcher::default()), llm.clone());
    let out = v.verify_and_filter("no links here at all", "claim").await;
    assert!(out.filtered_text.is_none());
    assert!(out.verdicts.is_empty());
    assert_eq!(llm.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn at_most_max_urls_are_checked() {
    let llm = classifier(vec![]);
    let fetcher = Arc::new(FakeFetcher::default());
    let v = verifier(fetcher.clone(), llm).with_max_urls(2);
    let out = v
        .verify_and_filter("a1.org b2.org c3.org d4.org", "claim")
        .await;
    assert_eq!(out.verdicts.len(), 2);
    assert_eq!(fetcher.fetched.lock().unwrap().len(), 2);
}
