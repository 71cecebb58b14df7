use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct EligiblePostsResponse {
    #[serde(default)]
    pub data: Option<Vec<ApiPost>>,
    #[serde(default)]
    pub includes: Option<Includes>,
    #[serde(default)]
    pub meta: Option<Meta>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Meta {
    #[serde(default)]
    pub result_count: Option<u32>,
    #[serde(default)]
    pub next_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Includes {
    #[serde(default)]
    pub media: Option<Vec<ApiMedia>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiMedia {
    #[serde(default)]
    pub media_key: Option<String>,
    #[serde(rename = "type")]
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub preview_image_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiPost {
    pub id: String,
    #[serde(default)]
    pub text: Option<String>,
    /// Full text for posts longer than 280 characters.
    #[serde(default)]
    pub note_tweet: Option<NoteTweet>,
    #[serde(default)]
    pub attachments: Option<Attachments>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NoteTweet {
    pub text: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Attachments {
    #[serde(default)]
    pub media_keys: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateNoteRequest<'a> {
    pub test_mode: bool,
    pub post_id: &'a str,
    pub info: NoteInfo<'a>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NoteInfo<'a> {
    pub text: &'a str,
    pub classification: &'static str,
    pub misleading_tags: Vec<&'static str>,
    pub trustworthy_sources: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateNoteResponse {
    #[serde(default)]
    pub data: Option<CreatedNote>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatedNote {
    #[serde(default)]
    pub note_id: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
}
