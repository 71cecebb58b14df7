//! Misleading-tag classification for a finished note.

use crate::prompts::tags_prompt;
use notewriter_llm::LlmGateway;
use notewriter_social::{MisleadingTag, Post};
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};

pub const TAG_ATTEMPTS: u32 = 3;
pub const FALLBACK_TAG: MisleadingTag = MisleadingTag::MissingImportantContext;

const TAG_TEMPERATURE: f32 = 0.2;

#[derive(Debug, Deserialize)]
struct TagsReply {
    misleading_tags: Vec<String>,
}

/// Response schema in the provider's OpenAPI subset.
pub fn tags_schema() -> JsonValue {
    let names: Vec<&str> = MisleadingTag::ALL.iter().map(|t| t.as_str()).collect();
    json!({
        "type": "OBJECT",
        "properties": {
            "misleading_tags": {
                "type": "ARRAY",
                "items": { "type": "STRING", "enum": names }
            }
        },
        "required": ["misleading_tags"]
    })
}

/// Parse a tags reply: the whole text first, then the first `{...}` slice.
///
/// Unknown names are dropped and duplicates collapsed. An empty result is a
/// parse failure.
pub fn parse_tags(reply: &str) -> Option<Vec<MisleadingTag>> {
    let trimmed = reply.trim();
    let parsed = serde_json::from_str::<TagsReply>(trimmed).ok().or_else(|| {
        let start = trimmed.find('{')?;
        let end = trimmed.rfind('}')?;
        if end <= start {
            return None;
        }
        serde_json::from_str::<TagsReply>(&trimmed[start..=end]).ok()
    })?;

    let mut tags = Vec::new();
    for name in &parsed.misleading_tags {
        match MisleadingTag::parse(name) {
            Some(tag) if !tags.contains(&tag) => tags.push(tag),
            Some(_) => {}
            None => tracing::debug!(tag = %name, "tags.unknown"),
        }
    }
    (!tags.is_empty()).then_some(tags)
}

/// Ask the model which tags apply, falling back to [`FALLBACK_TAG`].
pub async fn classify_tags(
    llm: &LlmGateway,
    post: &Post,
    images_summary: Option<&str>,
    note: &str,
) -> Vec<MisleadingTag> {
    let prompt = tags_prompt(post.trimmed_text(), images_summary, note);
    let schema = tags_schema();

    for attempt in 1..=TAG_ATTEMPTS {
        match llm.generate_json(&prompt, &schema, Some(TAG_TEMPERATURE)).await {
            Ok(reply) => match parse_tags(&reply) {
                Some(tags) => return tags,
                None => tracing::warn!(
                    post_id = %post.post_id,
                    attempt,
                    reply = %notewriter_common::truncate_chars(&reply, 200),
                    "tags.unparseable"
                ),
            },
            Err(e) => tracing::warn!(post_id = %post.post_id, attempt, error = %e, "tags.llm_failed"),
        }
    }

    tracing::warn!(post_id = %post.post_id, "tags.fallback");
    vec![FALLBACK_TAG]
}
