//! Common types and utilities shared across notewriter crates.
//!
//! This crate defines the provider-agnostic LLM configuration, observability helpers,
//! and the shared error type used throughout the workspace. It stays dependency-light so
//! every crate can depend on it without pulling in the HTTP or provider stacks.
//!
//! # Overview
//!
//! - [`LlmConfig`]: Provider-agnostic LLM configuration
//! - [`observability`]: Centralised tracing/logging initialisation
//! - [`NoteWriterError`] and [`Result`]: Shared error handling
//! - [`truncate_chars`]: char-boundary safe truncation used when building prompts and logs
//!
//! # Examples
//!
//! ```rust
//! use notewriter_common::{truncate_chars, LlmConfig};
//!
//! assert!(matches!(LlmConfig::default(), LlmConfig::None));
//! assert_eq!(truncate_chars("héllo world", 5), "héllo");
//! ```
use serde::{Deserialize, Serialize};

pub mod observability;

/// Configuration for an LLM provider used by the bot.
///
/// Feature flags control which variants are compiled in.
/// See the `notewriter-llm` crate for concrete client implementations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LlmConfig {
    #[cfg(feature = "gemini")]
    Gemini {
        api_key: String,
        model: String,
        /// Override for the API root; tests point this at a mock server.
        #[serde(skip_serializing_if = "Option::is_none")]
        base_url: Option<String>,
    },
    None,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self::None
    }
}

/// Error types used across the notewriter system.
#[derive(thiserror::Error, Debug)]
pub enum NoteWriterError {
    /// Configuration was incomplete or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A collaborator (post source, note sink) reported a failure.
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// The processed-post store could not be read or written.
    #[error("Storage error: {0}")]
    Storage(String),

    /// A post carried media the pipeline cannot analyse.
    #[error("{0}")]
    UnsupportedMedia(String),

    /// Anything raised at the binary edges.
    #[error("Driver error: {0}")]
    Driver(#[from] anyhow::Error),
}

/// Convenient alias for results that use [`NoteWriterError`].
pub type Result<T> = std::result::Result<T, NoteWriterError>;

/// Truncate `s` to at most `max` characters without splitting a code point.
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
