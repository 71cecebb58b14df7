mod common;

use async_trait::async_trait;
use notewriter_http::{FetchedPage, HttpError};
use notewriter_llm::traits::{LlmClient, LlmResponse, LlmResult};
use notewriter_llm::{LlmGateway, RateLimiter, RetryPolicy};
use notewriter_notes::composer::{EMPTY_POST_REFUSAL, NO_VALID_SOURCES_REFUSAL};
use notewriter_notes::{NoteComposer, NoteOutcome, NoteWriter};
use notewriter_social::{Media, MediaKind, MisleadingTag, Post};
use notewriter_web::{
    EngineOutcome, MultiEngineSearch, PageFetcher, SearchCache, SearchEngine, SearchHit,
    SourceVerifier, extract_urls,
};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const VALID_SOURCE: &str = "https://apnews.com/article/senator-x-bill-y";
const DEAD_SOURCE: &str = "https://news.example.com/bill-y-2025";

/// Routes each prompt by what it asks for and counts calls per kind.
struct ScriptedModel {
    note_reply: &'static str,
    tags_reply: &'static str,
    research: AtomicUsize,
    notes: AtomicUsize,
    classifications: AtomicUsize,
    tags: AtomicUsize,
}

impl ScriptedModel {
    fn new(note_reply: &'static str) -> Self {
        Self {
            note_reply,
            tags_reply: r#"{"misleading_tags": ["factual_error"]}"#,
            research: AtomicUsize::new(0),
            notes: AtomicUsize::new(0),
            classifications: AtomicUsize::new(0),
            tags: AtomicUsize::new(0),
        }
    }

    fn total(&self) -> usize {
        self.research.load(Ordering::SeqCst)
            + self.notes.load(Ordering::SeqCst)
            + self.classifications.load(Ordering::SeqCst)
            + self.tags.load(Ordering::SeqCst)
    }
}

fn reply(text: &str) -> LlmResult<LlmResponse> {
    Ok(LlmResponse {
        text: text.to_string(),
        model: None,
        tokens_used: None,
    })
}

#[async_trait]
impl LlmClient for ScriptedModel {
    async fn generate(
        &self,
        prompt: &str,
        _system_prompt: Option<&str>,
        _max_tokens: Option<u32>,
        _temperature: Option<f32>,
    ) -> LlmResult<LlmResponse> {
        if prompt.contains("checking whether a web page can be cited") {
            self.classifications.fetch_add(1, Ordering::SeqCst);
            reply("VALID - covers the bill signing")
        } else if prompt.contains("Decide whether the post is misleading") {
            self.notes.fetch_add(1, Ordering::SeqCst);
            reply(self.note_reply)
        } else {
            self.research.fetch_add(1, Ordering::SeqCst);
            reply(&format!(
                "Senator X signed bill Y in March 2024, not 2025 ({VALID_SOURCE}). Some outlets misdated it ({DEAD_SOURCE})."
            ))
        }
    }

    async fn generate_json(
        &self,
        _prompt: &str,
        _schema: &JsonValue,
        _max_tokens: Option<u32>,
        _temperature: Option<f32>,
    ) -> LlmResult<LlmResponse> {
        self.tags.fetch_add(1, Ordering::SeqCst);
        reply(self.tags_reply)
    }

    async fn health_check(&self) -> LlmResult<bool> {
        Ok(true)
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

struct FixedEngine {
    calls: AtomicUsize,
}

#[async_trait]
impl SearchEngine for FixedEngine {
    fn name(&self) -> &'static str {
        "fixed"
    }

    async fn search(&self, _query: &str, _max_results: usize) -> EngineOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        EngineOutcome::from_hits(vec![
            SearchHit {
                title: "Senator X signs bill Y".into(),
                url: VALID_SOURCE.into(),
                description: "The bill was signed on March 4, 2024.".into(),
            },
            SearchHit {
                title: "Bill Y in 2025".into(),
                url: DEAD_SOURCE.into(),
                description: "Archived coverage.".into(),
            },
        ])
    }
}

struct FakeFetcher {
    pages: HashMap<&'static str, (u16, &'static str)>,
    fetched: Mutex<Vec<String>>,
}

#[async_trait]
impl PageFetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, HttpError> {
        self.fetched.lock().unwrap().push(url.to_string());
        match self.pages.get(url) {
            Some((status, body)) => Ok(FetchedPage {
                status: *status,
                final_url: url.to_string(),
                body: body.to_string(),
                truncated: false,
            }),
            None => Err(HttpError::Timeout("deadline elapsed".into())),
        }
    }
}

struct Harness {
    composer: NoteComposer,
    model: Arc<ScriptedModel>,
    engine: Arc<FixedEngine>,
    fetcher: Arc<FakeFetcher>,
}

fn harness(model: ScriptedModel, valid_source_status: u16, dead_source_status: u16) -> Harness {
    common::init_test_tracing();
    let model = Arc::new(model);
    let gateway = LlmGateway::new(
        model.clone(),
        Arc::new(RateLimiter::new(Duration::ZERO)),
        RetryPolicy::new(0),
    )
    .unwrap();

    let engine = Arc::new(FixedEngine {
        calls: AtomicUsize::new(0),
    });
    let engines: Vec<Arc<dyn SearchEngine>> = vec![engine.clone()];
    let search = Arc::new(MultiEngineSearch::new(engines, Arc::new(SearchCache::default())));

    let fetcher = Arc::new(FakeFetcher {
        pages: HashMap::from([
            (
                VALID_SOURCE,
                (valid_source_status, "<article><h1>Senator X signs bill Y</h1><p>Signed March 4, 2024.</p></article>"),
            ),
            (DEAD_SOURCE, (dead_source_status, "Not Found")),
        ]),
        fetched: Mutex::new(Vec::new()),
    });
    let verifier = Arc::new(SourceVerifier::new(fetcher.clone(), gateway.clone()));

    Harness {
        composer: NoteComposer::new(gateway, search, verifier),
        model,
        engine,
        fetcher,
    }
}

#[tokio::test(start_paused = true)]
async fn note_cites_only_sources_that_survived_verification() {
    let h = harness(
        ScriptedModel::new(
            "Senator X signed bill Y in March 2024, not 2025. apnews.com/article/senator-x-bill-y https://news.example.com/bill-y-2025",
        ),
        200,
        404,
    );
    let post = Post::text_only("1001", "Senator X signed bill Y in 2025");

    let result = h.composer.research_and_write(&post).await;

    let note = match &result.outcome {
        NoteOutcome::Note(note) => note,
        other => panic!("expected a note, got {other:?}"),
    };
    assert_eq!(note.post_id, "1001");
    let cited = extract_urls(&note.note_text);
    assert_eq!(cited, vec![VALID_SOURCE.to_string()]);
    assert!(!note.note_text.contains("news.example.com"));
    assert_eq!(note.misleading_tags, vec![MisleadingTag::FactualError]);
    assert_eq!(h.engine.calls.load(Ordering::SeqCst), 1);
    // The 404 page never reaches the classifier.
    assert_eq!(h.model.classifications.load(Ordering::SeqCst), 1);
    assert!(result.images_summary.is_none());
}

#[tokio::test(start_paused = true)]
async fn no_note_needed_reply_is_a_refusal() {
    let h = harness(ScriptedModel::new("NO NOTE NEEDED."), 200, 404);
    let post = Post::text_only("1002", "Senator X signed bill Y in 2025");

    let result = h.composer.research_and_write(&post).await;

    assert_eq!(result.outcome, NoteOutcome::Refusal("NO NOTE NEEDED.".into()));
    assert!(result.note().is_none());
    assert_eq!(h.model.tags.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn video_is_rejected_before_any_network_call() {
    let h = harness(ScriptedModel::new("unused"), 200, 404);
    let post = Post {
        post_id: "1003".into(),
        text: Some("Watch this".into()),
        media: vec![Media {
            kind: MediaKind::Video,
            url: Some("https://video.twimg.com/v.mp4".into()),
        }],
    };

    let result = h.composer.research_and_write(&post).await;

    assert_eq!(result.outcome, NoteOutcome::Error("Video not supported yet".into()));
    assert_eq!(h.model.total(), 0);
    assert_eq!(h.engine.calls.load(Ordering::SeqCst), 0);
    assert!(h.fetcher.fetched.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn empty_post_is_refused_without_model_calls() {
    let h = harness(ScriptedModel::new("unused"), 200, 404);
    let post = Post {
        post_id: "1004".into(),
        text: Some("  \n ".into()),
        media: vec![],
    };

    let result = h.composer.research_and_write(&post).await;

    assert_eq!(result.outcome, NoteOutcome::Refusal(EMPTY_POST_REFUSAL.into()));
    assert_eq!(h.model.total(), 0);
    assert_eq!(h.engine.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn no_surviving_sources_means_no_note() {
    let h = harness(ScriptedModel::new("A note https://apnews.com"), 410, 404);
    let post = Post::text_only("1005", "Senator X signed bill Y in 2025");

    let result = h.composer.research_and_write(&post).await;

    assert_eq!(result.outcome, NoteOutcome::Refusal(NO_VALID_SOURCES_REFUSAL.into()));
    assert_eq!(h.model.notes.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn unparseable_tags_fall_back_after_three_attempts() {
    let mut model = ScriptedModel::new(
        "Bill Y was signed in 2024. https://apnews.com/article/senator-x-bill-y",
    );
    model.tags_reply = "I think it is a factual error.";
    let h = harness(model, 200, 404);
    let post = Post::text_only("1006", "Senator X signed bill Y in 2025");

    let result = h.composer.research_and_write(&post).await;

    let note = result.note().expect("note");
    assert_eq!(note.misleading_tags, vec![MisleadingTag::MissingImportantContext]);
    assert_eq!(h.model.tags.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn photo_without_url_gets_a_placeholder_summary() {
    let h = harness(
        ScriptedModel::new("Signed in 2024. https://apnews.com/article/senator-x-bill-y"),
        200,
        404,
    );
    let post = Post {
        post_id: "1007".into(),
        text: Some("Senator X signed bill Y in 2025".into()),
        media: vec![Media {
            kind: MediaKind::Photo,
            url: None,
        }],
    };

    let result = h.composer.research_and_write(&post).await;

    assert_eq!(
        result.images_summary.as_deref(),
        Some("Image 0: [No URL available for image]\n\n")
    );
    assert!(result.note().is_some());
}

#[tokio::test]
async fn failed_image_download_degrades_to_placeholder() {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/media/missing.jpg"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(
        ScriptedModel::new("Signed in 2024. https://apnews.com/article/senator-x-bill-y"),
        200,
        404,
    );
    let post = Post {
        post_id: "1008".into(),
        text: Some("Senator X signed bill Y in 2025".into()),
        media: vec![Media {
            kind: MediaKind::Photo,
            url: Some(format!("{}/media/missing.jpg", server.uri())),
        }],
    };

    let result = h.composer.research_and_write(&post).await;

    let summary = result.images_summary.as_deref().expect("images summary");
    assert!(summary.starts_with("Image 0: [Error analyzing image:"), "{summary}");
    assert!(result.note().is_some(), "{:?}", result.outcome);
    assert_eq!(h.model.research.load(Ordering::SeqCst), 1);
}
