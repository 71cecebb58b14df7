use crate::types::{Post, ProposedMisleadingNote};
use async_trait::async_trait;
use notewriter_http::HttpError;
use std::collections::HashSet;

#[derive(Debug, thiserror::Error)]
pub enum SocialError {
    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type SocialResult<T> = std::result::Result<T, SocialError>;

/// Identifier assigned by the platform to an accepted note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedNote {
    pub note_id: Option<String>,
}

/// Supplies candidate posts.
#[async_trait]
pub trait PostSource: Send + Sync {
    async fn eligible_posts(&self, max_results: u32) -> SocialResult<Vec<Post>>;
}

/// Accepts finished notes.
#[async_trait]
pub trait NoteSink: Send + Sync {
    async fn submit(
        &self,
        note: &ProposedMisleadingNote,
        test_mode: bool,
    ) -> SocialResult<SubmittedNote>;
}

/// Remembers which posts have been handled across runs.
#[async_trait]
pub trait ProcessedStore: Send + Sync {
    async fn processed_ids(&self) -> SocialResult<HashSet<String>>;
    async fn mark_processed(&self, post_id: &str) -> SocialResult<()>;
}
