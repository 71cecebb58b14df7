//! Prompt text for the research, note-writing, and tagging calls.

use notewriter_social::MisleadingTag;

pub const NO_NOTE_NEEDED: &str = "NO NOTE NEEDED";
pub const NOT_ENOUGH_EVIDENCE: &str = "NOT ENOUGH EVIDENCE TO WRITE A GOOD COMMUNITY NOTE";

const NO_TEXT: &str = "[No text content]";
const NO_IMAGES: &str = "[No images]";

fn or_placeholder<'a>(value: Option<&'a str>, placeholder: &'a str) -> &'a str {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v,
        _ => placeholder,
    }
}

/// Research request: the model reads fresh web results and reports what they
/// say about the post, citing URLs inline.
pub fn live_search_prompt(
    today: &str,
    post_text: Option<&str>,
    images_summary: Option<&str>,
    web_results: &str,
) -> String {
    format!(
        r#"Below is a post on X. Research whether it is potentially misleading.

Today's date is {today}. Your training data may be out of date for recent events, so rely on the web search results below rather than memory for anything from the last two years.

Requirements for sources:
- Put a specific, complete URL directly next to each claim it supports. Plain URLs only, no "[Source]" labels.
- Prefer reputable news outlets, government sites, academic institutions and long-established organisations.
- Prefer the most recent sources available, especially for legislation, elections and other political events.
- Avoid X/Twitter links as primary sources.
- Do not invent URLs. Only cite pages that appear in the search results or that you are certain exist.
- If you cannot find reliable, current sources for the claims in the post, say so explicitly.

Post text:
```
{post}
```

Summary of images in the post:
```
{images}
```

Web search results retrieved just now:
```
{web_results}
```"#,
        post = or_placeholder(post_text, NO_TEXT),
        images = or_placeholder(images_summary, NO_IMAGES),
    )
}

/// Note request over verified research only.
pub fn note_prompt(
    today: &str,
    post_text: Option<&str>,
    images_summary: Option<&str>,
    verified_results: &str,
) -> String {
    format!(
        r#"You will be given a post on X, a summary of any images in it, and research results whose sources have been checked.
Decide whether the post is misleading and whether it merits a Community Note.

Today's date is {today}. Prefer the research results over your own knowledge for recent events.

If the post is misleading and the research gives strong, current, verifiable evidence for a correction, write a Community Note:
- at most 280 characters, not counting URLs
- clear, neutral and professional; no emojis, hashtags, or lead-ins such as "Community Note:"
- include at least one plain URL, and cite ONLY URLs listed under "VERIFIED VALID SOURCES"
- every factual statement must be accurate as of today

If the post is not misleading, or makes no concrete fact-checkable claim, reply exactly:
{NO_NOTE_NEEDED}.

If the post may be misleading but the evidence is outdated, conflicting or too thin to support a confident correction, reply exactly:
{NOT_ENOUGH_EVIDENCE}.

Do not write notes about predictions or opinions. Ignore sources that describe past administrations or superseded facts as current, and never rely on deleted posts.

Post text:
```
{post}
```

Summary of images in the post:
```
{images}
```

Research results:
```
{verified_results}
```"#,
        post = or_placeholder(post_text, NO_TEXT),
        images = or_placeholder(images_summary, NO_IMAGES),
    )
}

pub fn tags_prompt(post_text: Option<&str>, images_summary: Option<&str>, note: &str) -> String {
    let options = MisleadingTag::ALL
        .iter()
        .map(|t| format!("- \"{}\": {}", t.as_str(), tag_description(*t)))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        r#"Below is a post on X and a proposed Community Note that adds context to it.
Choose every tag that applies to the post and note. At least one tag is required.

{options}

Respond with JSON only, for example:
{{"misleading_tags": ["factual_error", "missing_important_context"]}}

Post text:
```
{post}
```

Summary of images in the post:
```
{images}
```

Proposed Community Note:
```
{note}
```"#,
        post = or_placeholder(post_text, NO_TEXT),
        images = or_placeholder(images_summary, NO_IMAGES),
    )
}

fn tag_description(tag: MisleadingTag) -> &'static str {
    match tag {
        MisleadingTag::Other => "misleading for another reason",
        MisleadingTag::FactualError => "the post contains a factual error",
        MisleadingTag::ManipulatedMedia => "manipulated, fake or out-of-context media",
        MisleadingTag::OutdatedInformation => "the post relies on outdated information",
        MisleadingTag::MissingImportantContext => "the post leaves out important context",
        MisleadingTag::DisputedClaimAsFact => "an unverified or disputed claim presented as fact",
        MisleadingTag::MisinterpretedSatire => "satire likely to be taken as fact",
    }
}

/// Whether a note-writing reply declines to write a note.
pub fn is_refusal(reply: &str) -> bool {
    reply.contains(NO_NOTE_NEEDED) || reply.contains(NOT_ENOUGH_EVIDENCE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refusal_phrases_are_detected() {
        assert!(is_refusal("NO NOTE NEEDED."));
        assert!(is_refusal(
            "Sources conflict. NOT ENOUGH EVIDENCE TO WRITE A GOOD COMMUNITY NOTE."
        ));
        assert!(!is_refusal("Bill Y was signed in 2024. https://congress.gov"));
    }

    #[test]
    fn placeholders_fill_missing_parts() {
        let p = live_search_prompt("June 1, 2025", None, Some("  "), "results");
        assert!(p.contains(NO_TEXT));
        assert!(p.contains(NO_IMAGES));
        assert!(p.contains("June 1, 2025"));
    }

    #[test]
    fn tags_prompt_lists_every_tag() {
        let p = tags_prompt(Some("post"), None, "note");
        for tag in MisleadingTag::ALL {
            assert!(p.contains(tag.as_str()));
        }
    }
}
