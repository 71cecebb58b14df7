use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    pub text: String,
    pub model: Option<String>,
    pub tokens_used: Option<u32>,
}

/// Raw image bytes sent inline with a prompt.
#[derive(Debug, Clone)]
pub struct InlineImage {
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// Coarse category of an [`LlmError`], used to pick a backoff schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LlmErrorKind {
    RateLimited,
    ServiceUnavailable,
    EmptyResponse,
    Transient,
    ContentFiltered,
    Permanent,
}

impl LlmErrorKind {
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::ServiceUnavailable | Self::EmptyResponse | Self::Transient
        )
    }
}

impl fmt::Display for LlmErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::RateLimited => "rate_limited",
            Self::ServiceUnavailable => "service_unavailable",
            Self::EmptyResponse => "empty_response",
            Self::Transient => "transient",
            Self::ContentFiltered => "content_filtered",
            Self::Permanent => "permanent",
        };
        f.write_str(s)
    }
}

/// Provider failures, mapped once at the adapter boundary.
#[derive(thiserror::Error, Debug)]
pub enum LlmError {
    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Empty response: {0}")]
    EmptyResponse(String),

    #[error("Transient failure: {0}")]
    Transient(String),

    #[error("Content blocked by safety filters: {0}")]
    ContentFiltered(String),

    #[error("API error ({status:?}): {message}")]
    Api {
        status: Option<u16>,
        message: String,
    },

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Gave up after {attempts} attempts ({kind}): {last}")]
    RetriesExhausted {
        kind: LlmErrorKind,
        attempts: u32,
        last: Box<LlmError>,
    },
}

impl LlmError {
    pub fn kind(&self) -> LlmErrorKind {
        match self {
            LlmError::RateLimited(_) => LlmErrorKind::RateLimited,
            LlmError::ServiceUnavailable(_) => LlmErrorKind::ServiceUnavailable,
            LlmError::EmptyResponse(_) => LlmErrorKind::EmptyResponse,
            LlmError::Transient(_) => LlmErrorKind::Transient,
            LlmError::ContentFiltered(_) => LlmErrorKind::ContentFiltered,
            LlmError::Api { .. } | LlmError::Unsupported(_) => LlmErrorKind::Permanent,
            LlmError::RetriesExhausted { kind, .. } => *kind,
        }
    }

    pub fn is_retryable(&self) -> bool {
        !matches!(self, LlmError::RetriesExhausted { .. }) && self.kind().is_retryable()
    }
}

impl From<LlmError> for notewriter_common::NoteWriterError {
    fn from(err: LlmError) -> Self {
        notewriter_common::NoteWriterError::Upstream(err.to_string())
    }
}

pub type LlmResult<T> = std::result::Result<T, LlmError>;

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Generate a response to the given prompt with optional system prompt
    async fn generate(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
    ) -> LlmResult<LlmResponse>;

    /// Generate a response constrained to `schema`.
    ///
    /// Providers without structured output fall back to plain generation and the
    /// caller's parser has to cope with free text.
    async fn generate_json(
        &self,
        prompt: &str,
        schema: &JsonValue,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
    ) -> LlmResult<LlmResponse> {
        let _ = schema;
        self.generate(prompt, None, max_tokens, temperature).await
    }

    /// Generate a response about an inline image.
    async fn generate_with_image(
        &self,
        prompt: &str,
        image: &InlineImage,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
    ) -> LlmResult<LlmResponse> {
        let _ = (prompt, image, max_tokens, temperature);
        Err(LlmError::Unsupported(format!(
            "{} does not accept images",
            self.model_name()
        )))
    }

    /// Check if the LLM service is available
    async fn health_check(&self) -> LlmResult<bool>;

    /// Get the model name being used
    fn model_name(&self) -> &str;
}
