//! Research a post and turn verified evidence into a note, a refusal, or an error.

use crate::prompts::{is_refusal, live_search_prompt, note_prompt};
use crate::tags::classify_tags;
use async_trait::async_trait;
use notewriter_common::{NoteWriterError, truncate_chars};
use notewriter_llm::LlmGateway;
use notewriter_social::{Media, MediaKind, Post, ProposedMisleadingNote};
use notewriter_web::{
    MultiEngineSearch, SourceVerifier, ensure_urls_have_protocol, extract_urls, retain_urls,
};
use std::collections::HashSet;
use std::sync::Arc;

pub const EMPTY_POST_REFUSAL: &str =
    "NO NOTE NEEDED: Post appears to be empty with no text content or media.";
pub const NO_VALID_SOURCES_REFUSAL: &str = "NO VALID SOURCES FOUND: All links in search results were either broken, irrelevant, or inaccessible. Cannot write a reliable Community Note without credible sources.";
pub const NO_VERIFIED_CITATION_REFUSAL: &str =
    "NO VERIFIED CITATION: The drafted note did not cite any verified source.";

pub const DEFAULT_SEARCH_RESULTS: usize = 8;
const SEARCH_QUERY_CHARS: usize = 250;
const IMAGE_ERROR_CHARS: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoteOutcome {
    Error(String),
    Refusal(String),
    Note(ProposedMisleadingNote),
}

impl NoteOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            NoteOutcome::Error(_) => "error",
            NoteOutcome::Refusal(_) => "refusal",
            NoteOutcome::Note(_) => "note",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteResult {
    pub post: Post,
    pub images_summary: Option<String>,
    pub outcome: NoteOutcome,
}

impl NoteResult {
    fn new(post: &Post, images_summary: Option<String>, outcome: NoteOutcome) -> Self {
        Self {
            post: post.clone(),
            images_summary,
            outcome,
        }
    }

    pub fn note(&self) -> Option<&ProposedMisleadingNote> {
        match &self.outcome {
            NoteOutcome::Note(note) => Some(note),
            _ => None,
        }
    }
}

/// Anything that can take a post to a [`NoteResult`]. The batch runner only
/// depends on this.
#[async_trait]
pub trait NoteWriter: Send + Sync {
    async fn research_and_write(&self, post: &Post) -> NoteResult;
}

pub struct NoteComposer {
    llm: LlmGateway,
    search: Arc<MultiEngineSearch>,
    verifier: Arc<SourceVerifier>,
    max_search_results: usize,
}

impl NoteComposer {
    pub fn new(llm: LlmGateway, search: Arc<MultiEngineSearch>, verifier: Arc<SourceVerifier>) -> Self {
        Self {
            llm,
            search,
            verifier,
            max_search_results: DEFAULT_SEARCH_RESULTS,
        }
    }

    pub fn with_max_search_results(mut self, max: usize) -> Self {
        self.max_search_results = max.max(1);
        self
    }

    async fn summarize_images(&self, post: &Post) -> String {
        let mut summary = String::new();
        for (i, media) in post.media.iter().enumerate() {
            if media.kind != MediaKind::Photo {
                continue;
            }
            let line = match media.url.as_deref() {
                None => "[No URL available for image]".to_string(),
                Some(url) => match self.llm.describe_image(url, None).await {
                    Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
                    Ok(_) => "[Unable to analyze image]".to_string(),
                    Err(e) => {
                        let msg = e.to_string();
                        format!("[Error analyzing image: {}]", truncate_chars(&msg, IMAGE_ERROR_CHARS))
                    }
                },
            };
            summary.push_str(&format!("Image {i}: {line}\n\n"));
        }
        summary
    }
}

/// Reject posts whose media the pipeline cannot analyse, before any network call.
pub fn check_media(media: &[Media]) -> notewriter_common::Result<()> {
    for item in media {
        match &item.kind {
            MediaKind::Photo => {}
            MediaKind::Video => {
                return Err(NoteWriterError::UnsupportedMedia("Video not supported yet".into()));
            }
            MediaKind::Other(kind) => {
                return Err(NoteWriterError::UnsupportedMedia(format!(
                    "Unsupported media type: {kind}"
                )));
            }
        }
    }
    Ok(())
}

/// Search query for a post: its text without links and handles, or the image
/// summary when the post has no text.
pub fn search_query(post: &Post, images_summary: &str) -> String {
    let source = match post.trimmed_text() {
        Some(text) => text.to_string(),
        None => images_summary
            .lines()
            .map(|l| match l.split_once(": ") {
                Some((head, rest)) if head.starts_with("Image ") => rest,
                _ => l,
            })
            .collect::<Vec<_>>()
            .join(" "),
    };
    let words: Vec<&str> = source
        .split_whitespace()
        .filter(|w| !w.starts_with("http://") && !w.starts_with("https://") && !w.starts_with('@'))
        .collect();
    truncate_chars(&words.join(" "), SEARCH_QUERY_CHARS).trim_end().to_string()
}

fn citation_key(url: &str) -> String {
    let lower = url.trim().to_ascii_lowercase();
    let rest = lower
        .strip_prefix("https://")
        .or_else(|| lower.strip_prefix("http://"))
        .unwrap_or(&lower);
    let rest = rest.strip_prefix("www.").unwrap_or(rest);
    rest.trim_end_matches('/').to_string()
}

/// Remove cited URLs that are not in `valid_urls`.
///
/// Returns the cleaned note and whether at least one verified URL is still
/// cited in it.
pub fn guard_citations(note: &str, valid_urls: &[String]) -> (String, bool) {
    let allowed: HashSet<String> = valid_urls.iter().map(|u| citation_key(u)).collect();
    let text = retain_urls(note, |url| {
        let verified = allowed.contains(&citation_key(url));
        if !verified {
            tracing::warn!(%url, "compose.citation.removed");
        }
        verified
    });
    let cleaned = text
        .lines()
        .map(|l| l.split_whitespace().collect::<Vec<_>>().join(" "))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string();
    let cited = extract_urls(&cleaned)
        .iter()
        .any(|u| allowed.contains(&citation_key(u)));
    (cleaned, cited)
}

#[async_trait]
impl NoteWriter for NoteComposer {
    async fn research_and_write(&self, post: &Post) -> NoteResult {
        let post_id = post.post_id.as_str();

        if post.is_empty() {
            tracing::info!(post_id, "compose.empty_post");
            return NoteResult::new(post, None, NoteOutcome::Refusal(EMPTY_POST_REFUSAL.into()));
        }

        if let Err(e) = check_media(&post.media) {
            tracing::info!(post_id, error = %e, "compose.unsupported_media");
            return NoteResult::new(post, None, NoteOutcome::Error(e.to_string()));
        }

        let summary = self.summarize_images(post).await;
        let images_summary = (!summary.trim().is_empty()).then(|| summary.clone());
        let images = images_summary.as_deref();
        let today = chrono::Utc::now().format("%B %-d, %Y").to_string();

        let query = search_query(post, &summary);
        tracing::debug!(post_id, %query, "compose.search");
        let web_results = self.search.search(&query, self.max_search_results).await;

        let research_prompt = live_search_prompt(&today, post.trimmed_text(), images, &web_results);
        let research = match self.llm.generate_text(&research_prompt, None).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(post_id, error = %e, "compose.research_failed");
                return NoteResult::new(
                    post,
                    images_summary,
                    NoteOutcome::Error(format!("Research call failed: {e}")),
                );
            }
        };

        let combined = format!("{research}\n\n{web_results}");
        let claim = post.trimmed_text().unwrap_or(summary.trim());
        let verified = self.verifier.verify_and_filter(&combined, claim).await;
        let verified_text = match verified.filtered_text {
            Some(text) if !verified.valid_urls.is_empty() => text,
            _ => {
                tracing::info!(post_id, checked = verified.verdicts.len(), "compose.no_valid_sources");
                return NoteResult::new(
                    post,
                    images_summary,
                    NoteOutcome::Refusal(NO_VALID_SOURCES_REFUSAL.into()),
                );
            }
        };

        let prompt = note_prompt(&today, post.trimmed_text(), images, &verified_text);
        let reply = match self.llm.generate_text(&prompt, None).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(post_id, error = %e, "compose.note_failed");
                return NoteResult::new(
                    post,
                    images_summary,
                    NoteOutcome::Error(format!("Note writing call failed: {e}")),
                );
            }
        };

        if is_refusal(&reply) {
            return NoteResult::new(post, images_summary, NoteOutcome::Refusal(reply.trim().to_string()));
        }

        let normalized = ensure_urls_have_protocol(reply.trim());
        let (note_text, cited) = guard_citations(&normalized, &verified.valid_urls);
        if !cited {
            tracing::info!(post_id, "compose.no_verified_citation");
            return NoteResult::new(
                post,
                images_summary,
                NoteOutcome::Refusal(NO_VERIFIED_CITATION_REFUSAL.into()),
            );
        }

        let misleading_tags = classify_tags(&self.llm, post, images, &note_text).await;
        NoteResult::new(
            post,
            images_summary,
            NoteOutcome::Note(ProposedMisleadingNote {
                post_id: post.post_id.clone(),
                note_text,
                misleading_tags,
            }),
        )
    }
}
