use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaKind {
    Photo,
    Video,
    Other(String),
}

impl MediaKind {
    pub fn from_api(kind: &str) -> Self {
        match kind {
            "photo" => MediaKind::Photo,
            "video" => MediaKind::Video,
            other => MediaKind::Other(other.to_string()),
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Photo => f.write_str("photo"),
            MediaKind::Video => f.write_str("video"),
            MediaKind::Other(kind) => f.write_str(kind),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Media {
    pub kind: MediaKind,
    pub url: Option<String>,
}

/// A post eligible for a note. Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub post_id: String,
    pub text: Option<String>,
    pub media: Vec<Media>,
}

impl Post {
    pub fn text_only(post_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            post_id: post_id.into(),
            text: Some(text.into()),
            media: Vec::new(),
        }
    }

    /// Trimmed text, or `None` when there is nothing but whitespace.
    pub fn trimmed_text(&self) -> Option<&str> {
        self.text.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.trimmed_text().is_none() && self.media.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MisleadingTag {
    Other,
    FactualError,
    ManipulatedMedia,
    OutdatedInformation,
    MissingImportantContext,
    DisputedClaimAsFact,
    MisinterpretedSatire,
}

impl MisleadingTag {
    pub const ALL: [MisleadingTag; 7] = [
        MisleadingTag::Other,
        MisleadingTag::FactualError,
        MisleadingTag::ManipulatedMedia,
        MisleadingTag::OutdatedInformation,
        MisleadingTag::MissingImportantContext,
        MisleadingTag::DisputedClaimAsFact,
        MisleadingTag::MisinterpretedSatire,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MisleadingTag::Other => "other",
            MisleadingTag::FactualError => "factual_error",
            MisleadingTag::ManipulatedMedia => "manipulated_media",
            MisleadingTag::OutdatedInformation => "outdated_information",
            MisleadingTag::MissingImportantContext => "missing_important_context",
            MisleadingTag::DisputedClaimAsFact => "disputed_claim_as_fact",
            MisleadingTag::MisinterpretedSatire => "misinterpreted_satire",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let wanted = s.trim();
        Self::ALL.into_iter().find(|t| t.as_str() == wanted)
    }
}

impl fmt::Display for MisleadingTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposedMisleadingNote {
    pub post_id: String,
    pub note_text: String,
    pub misleading_tags: Vec<MisleadingTag>,
}
