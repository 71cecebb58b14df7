use crate::rate::RateLimiter;
use crate::retry::{RetryExecutor, RetryPolicy};
use crate::traits::{InlineImage, LlmClient, LlmError, LlmResult};
use notewriter_http::{HttpClient, RequestOpts};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;

pub const TEXT_MAX_OUTPUT_TOKENS: u32 = 8192;
pub const IMAGE_MAX_OUTPUT_TOKENS: u32 = 2048;
pub const DEFAULT_TEXT_TEMPERATURE: f32 = 0.8;
pub const DEFAULT_IMAGE_TEMPERATURE: f32 = 0.01;

const IMAGE_PROMPT: &str = "What's in this image? Provide a detailed description.";
const IMAGE_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);
const MEDIA_HOST: &str = "https://pbs.twimg.com/";

/// The single entry point the pipeline uses to talk to a model.
///
/// Every call goes through the shared rate limiter and the retry executor.
#[derive(Clone)]
pub struct LlmGateway {
    client: Arc<dyn LlmClient>,
    executor: RetryExecutor,
    media: HttpClient,
}

impl LlmGateway {
    pub fn new(
        client: Arc<dyn LlmClient>,
        limiter: Arc<RateLimiter>,
        policy: RetryPolicy,
    ) -> LlmResult<Self> {
        let media = HttpClient::new(MEDIA_HOST)
            .map_err(|e| LlmError::Api {
                status: None,
                message: format!("Failed to create media client: {e}"),
            })?
            .with_timeout(IMAGE_DOWNLOAD_TIMEOUT)
            .with_retries(0);
        Ok(Self {
            client,
            executor: RetryExecutor::new(limiter, policy),
            media,
        })
    }

    pub fn model_name(&self) -> &str {
        self.client.model_name()
    }

    pub async fn generate_text(&self, prompt: &str, temperature: Option<f32>) -> LlmResult<String> {
        let temperature = temperature.unwrap_or(DEFAULT_TEXT_TEMPERATURE);
        let resp = self
            .executor
            .execute("generate_text", || {
                self.client
                    .generate(prompt, None, Some(TEXT_MAX_OUTPUT_TOKENS), Some(temperature))
            })
            .await?;
        Ok(resp.text)
    }

    pub async fn generate_json(
        &self,
        prompt: &str,
        schema: &JsonValue,
        temperature: Option<f32>,
    ) -> LlmResult<String> {
        let temperature = temperature.unwrap_or(DEFAULT_TEXT_TEMPERATURE);
        let resp = self
            .executor
            .execute("generate_json", || {
                self.client.generate_json(
                    prompt,
                    schema,
                    Some(TEXT_MAX_OUTPUT_TOKENS),
                    Some(temperature),
                )
            })
            .await?;
        Ok(resp.text)
    }

    /// Download the image at `url` and ask the model to describe it.
    ///
    /// A failed download is returned as an error for this image only; it is
    /// not retried.
    pub async fn describe_image(&self, url: &str, temperature: Option<f32>) -> LlmResult<String> {
        let temperature = temperature.unwrap_or(DEFAULT_IMAGE_TEMPERATURE);
        let data = self
            .media
            .get_bytes(
                url,
                RequestOpts {
                    allow_absolute: true,
                    retries: Some(0),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| {
                tracing::warn!(%url, error = %e, "llm.image.download_failed");
                LlmError::Api {
                    status: e.status().map(|s| s.as_u16()),
                    message: format!("Failed to download image: {e}"),
                }
            })?;

        let image = InlineImage {
            mime_type: mime_from_url(url).to_string(),
            data,
        };

        let resp = self
            .executor
            .execute("describe_image", || {
                self.client.generate_with_image(
                    IMAGE_PROMPT,
                    &image,
                    Some(IMAGE_MAX_OUTPUT_TOKENS),
                    Some(temperature),
                )
            })
            .await?;
        Ok(resp.text)
    }
}

fn mime_from_url(url: &str) -> &'static str {
    let path = url.split(['?', '#']).next().unwrap_or(url).to_ascii_lowercase();
    // pbs.twimg.com encodes the format as a query param
    let format = url
        .split_once("format=")
        .map(|(_, rest)| rest.split('&').next().unwrap_or(""))
        .unwrap_or("");
    if path.ends_with(".png") || format == "png" {
        "image/png"
    } else if path.ends_with(".gif") || format == "gif" {
        "image/gif"
    } else if path.ends_with(".webp") || format == "webp" {
        "image/webp"
    } else {
        "image/jpeg"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_guess_uses_extension_or_format_param() {
        assert_eq!(mime_from_url("https://a.b/c.PNG"), "image/png");
        assert_eq!(
            mime_from_url("https://pbs.twimg.com/media/x?format=webp&name=large"),
            "image/webp"
        );
        assert_eq!(mime_from_url("https://a.b/c"), "image/jpeg");
    }
}
