//! Provider-agnostic LLM integration for notewriter.
//!
//! This crate exposes a common [`traits::LlmClient`] interface, the Gemini
//! provider adapter, and the [`gateway::LlmGateway`] that wraps every call in
//! the shared [`rate::RateLimiter`] and the [`retry::RetryExecutor`].
//!
//! # Examples
//! ```no_run
//! use notewriter_common::{LlmConfig, Result};
//! use notewriter_llm::ensure_llm_ready;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<()> {
//! let cfg = LlmConfig::Gemini {
//!     api_key: "key".into(),
//!     model: notewriter_llm::DEFAULT_GEMINI_MODEL.into(),
//!     base_url: None,
//! };
//! let client = ensure_llm_ready(&cfg).await?;
//! assert!(!client.model_name().is_empty());
//! # Ok(())
//! # }
//! ```
pub mod gateway;
#[cfg(feature = "gemini")]
pub mod gemini;
pub mod rate;
pub mod retry;
pub mod traits;

pub use gateway::LlmGateway;
pub use rate::RateLimiter;
pub use retry::{RetryExecutor, RetryPolicy};
pub use traits::{LlmClient, LlmError, LlmErrorKind, LlmResult};

use notewriter_common::{LlmConfig, NoteWriterError};
use std::sync::Arc;

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash-lite";

/// Build the configured provider client.
pub async fn ensure_llm_ready(
    config: &LlmConfig,
) -> notewriter_common::Result<Arc<dyn LlmClient + Send + Sync + 'static>> {
    match config {
        #[cfg(feature = "gemini")]
        LlmConfig::Gemini {
            api_key,
            model,
            base_url,
        } => {
            if api_key.trim().is_empty() {
                return Err(NoteWriterError::Config(
                    "Gemini API key is empty".to_string(),
                ));
            }
            let client =
                gemini::GeminiClient::new(api_key.clone(), model.clone(), base_url.as_deref())?;
            tracing::info!(model = %client.model_name(), "llm.client.ready");
            Ok(Arc::new(client))
        }
        LlmConfig::None => Err(NoteWriterError::Config("No LLM configured".to_string())),
    }
}
