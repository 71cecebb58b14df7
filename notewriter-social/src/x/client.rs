//! Community Notes endpoints of the X API v2.
//!
//! Auth is a bearer token on every call. Eligible posts come back with their
//! media expanded through `includes.media`, which we fold into [`Post`].
use super::types::{
    ApiMedia, CreateNoteRequest, CreateNoteResponse, EligiblePostsResponse, NoteInfo,
};
use crate::traits::{NoteSink, PostSource, SocialResult, SubmittedNote};
use crate::types::{Media, MediaKind, Post, ProposedMisleadingNote};
use async_trait::async_trait;
use notewriter_http::{Auth, HttpClient, HttpError, RequestOpts};
use std::borrow::Cow;
use std::collections::HashMap;

pub const X_API_BASE_URL: &str = "https://api.x.com/";
const NOTE_CLASSIFICATION: &str = "misinformed_or_potentially_misleading";

#[derive(Clone)]
pub struct XNotesApi {
    http: HttpClient,
    bearer: String,
    test_mode: bool,
}

impl XNotesApi {
    pub fn new(bearer_token: String, base_url: Option<&str>, test_mode: bool) -> Result<Self, HttpError> {
        let http = HttpClient::new(base_url.unwrap_or(X_API_BASE_URL))?;
        Ok(Self {
            http,
            bearer: bearer_token,
            test_mode,
        })
    }

    fn bool_param(v: bool) -> Cow<'static, str> {
        Cow::Borrowed(if v { "true" } else { "false" })
    }
}

fn media_url(m: &ApiMedia) -> Option<String> {
    m.url.clone().or_else(|| m.preview_image_url.clone())
}

pub(crate) fn posts_from_response(resp: EligiblePostsResponse) -> Vec<Post> {
    let media_by_key: HashMap<String, ApiMedia> = resp
        .includes
        .and_then(|i| i.media)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|m| m.media_key.clone().map(|k| (k, m)))
        .collect();

    resp.data
        .unwrap_or_default()
        .into_iter()
        .map(|p| {
            let media = p
                .attachments
                .map(|a| a.media_keys)
                .unwrap_or_default()
                .iter()
                .filter_map(|key| media_by_key.get(key))
                .map(|m| Media {
                    kind: MediaKind::from_api(m.kind.as_deref().unwrap_or("unknown")),
                    url: media_url(m),
                })
                .collect();
            let text = p.note_tweet.map(|n| n.text).or(p.text);
            Post {
                post_id: p.id,
                text,
                media,
            }
        })
        .collect()
}

#[async_trait]
impl PostSource for XNotesApi {
    async fn eligible_posts(&self, max_results: u32) -> SocialResult<Vec<Post>> {
        let resp: EligiblePostsResponse = self
            .http
            .get_json(
                "2/notes/search/posts_eligible_for_notes",
                RequestOpts {
                    auth: Some(Auth::Bearer(&self.bearer)),
                    query: Some(vec![
                        ("test_mode", Self::bool_param(self.test_mode)),
                        ("max_results", max_results.to_string().into()),
                        ("tweet.fields", "author_id,created_at,referenced_tweets,note_tweet".into()),
                        ("expansions", "attachments.media_keys".into()),
                        ("media.fields", "type,url,preview_image_url,height,width".into()),
                    ]),
                    ..Default::default()
                },
            )
            .await?;
        let posts = posts_from_response(resp);
        tracing::info!(count = posts.len(), "x.eligible_posts.fetched");
        Ok(posts)
    }
}

#[async_trait]
impl NoteSink for XNotesApi {
    async fn submit(
        &self,
        note: &ProposedMisleadingNote,
        test_mode: bool,
    ) -> SocialResult<SubmittedNote> {
        let body = CreateNoteRequest {
            test_mode,
            post_id: &note.post_id,
            info: NoteInfo {
                text: &note.note_text,
                classification: NOTE_CLASSIFICATION,
                misleading_tags: note.misleading_tags.iter().map(|t| t.as_str()).collect(),
                trustworthy_sources: true,
            },
        };
        let resp: CreateNoteResponse = self
            .http
            .post_json_opts(
                "2/notes",
                &body,
                RequestOpts {
                    auth: Some(Auth::Bearer(&self.bearer)),
                    // Submissions are not idempotent.
                    retries: Some(0),
                    ..Default::default()
                },
            )
            .await?;
        let note_id = resp.data.and_then(|d| d.note_id.or(d.id));
        tracing::info!(post_id = %note.post_id, ?note_id, test_mode, "x.note.submitted");
        Ok(SubmittedNote { note_id })
    }
}
