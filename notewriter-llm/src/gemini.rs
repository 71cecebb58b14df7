use crate::traits::{InlineImage, LlmClient, LlmError, LlmResponse, LlmResult};
use async_trait::async_trait;
use base64::Engine as _;
use notewriter_http::{Auth, HttpClient, HttpError, RequestOpts};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::borrow::Cow;
use std::time::Duration;

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Finish reasons that mean the output was withheld rather than merely short.
const BLOCKING_FINISH_REASONS: &[&str] = &[
    "SAFETY",
    "PROHIBITED_CONTENT",
    "BLOCKLIST",
    "SPII",
    "RECITATION",
];

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<GeminiInlineData>,
}

impl GeminiPart {
    fn text(s: &str) -> Self {
        Self {
            text: Some(s.to_string()),
            inline_data: None,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<JsonValue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    prompt_feedback: Option<GeminiPromptFeedback>,
    usage_metadata: Option<GeminiUsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiResponseContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsageMetadata {
    total_token_count: Option<u32>,
}

/// Google Gemini `generateContent` client.
///
/// Retries are left to [`crate::retry::RetryExecutor`]; this adapter only maps
/// provider signals onto [`LlmError`].
pub struct GeminiClient {
    http: HttpClient,
    api_key: String,
    model: String,
}

impl GeminiClient {
    /// Create a new client using the provided API key and model.
    ///
    /// `base_url` overrides the public endpoint (tests point it at a mock server).
    pub fn new(api_key: String, model: String, base_url: Option<&str>) -> LlmResult<Self> {
        let mut base = base_url.unwrap_or(GEMINI_BASE_URL).to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let http = HttpClient::new(&base)
            .map_err(|e| LlmError::Api {
                status: None,
                message: format!("Failed to create HTTP client: {e}"),
            })?
            .with_timeout(REQUEST_TIMEOUT)
            .with_retries(0);

        Ok(Self {
            http,
            api_key,
            model,
        })
    }

    async fn send(&self, request: &GeminiRequest) -> LlmResult<LlmResponse> {
        let path = format!("models/{}:generateContent", self.model);
        let opts = RequestOpts {
            auth: Some(Auth::Query {
                name: "key",
                value: Cow::Borrowed(self.api_key.as_str()),
            }),
            retries: Some(0),
            ..Default::default()
        };

        tracing::debug!(model = %self.model, "llm.gemini.request");

        let resp: GeminiResponse = self
            .http
            .post_json_opts(&path, request, opts)
            .await
            .map_err(map_http_error)?;

        let tokens_used = resp.usage_metadata.as_ref().and_then(|u| u.total_token_count);
        let text = interpret_response(resp)?;

        Ok(LlmResponse {
            text,
            model: Some(self.model.clone()),
            tokens_used,
        })
    }
}

fn map_http_error(err: HttpError) -> LlmError {
    match err {
        HttpError::Api {
            status, message, ..
        } => {
            let code = status.as_u16();
            if code == 429 || message.contains("RESOURCE_EXHAUSTED") {
                LlmError::RateLimited(message)
            } else if matches!(code, 500 | 502 | 503 | 504) || message.contains("UNAVAILABLE") {
                LlmError::ServiceUnavailable(message)
            } else {
                LlmError::Api {
                    status: Some(code),
                    message,
                }
            }
        }
        HttpError::Timeout(m) | HttpError::Connect(m) | HttpError::Network(m) => {
            LlmError::Transient(m)
        }
        // A truncated or garbled body is worth another attempt.
        HttpError::Decode(m, _) => LlmError::Transient(format!("undecodable response: {m}")),
        other => LlmError::Api {
            status: None,
            message: other.to_string(),
        },
    }
}

fn interpret_response(resp: GeminiResponse) -> LlmResult<String> {
    let block_reason = resp.prompt_feedback.and_then(|f| f.block_reason);
    let candidate = resp.candidates.into_iter().next();
    let finish_reason = candidate.as_ref().and_then(|c| c.finish_reason.clone());

    let text: String = candidate
        .and_then(|c| c.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    if !text.trim().is_empty() {
        return Ok(text);
    }

    if let Some(reason) = block_reason {
        tracing::warn!(block_reason = %reason, "llm.gemini.prompt_blocked");
        return Err(LlmError::ContentFiltered(format!("prompt blocked: {reason}")));
    }
    if let Some(reason) = finish_reason.as_deref() {
        if BLOCKING_FINISH_REASONS.contains(&reason) {
            tracing::warn!(finish_reason = %reason, "llm.gemini.output_blocked");
            return Err(LlmError::ContentFiltered(format!(
                "finish reason {reason}"
            )));
        }
    }
    Err(LlmError::EmptyResponse(format!(
        "no text returned (finish_reason={})",
        finish_reason.as_deref().unwrap_or("none")
    )))
}

fn generation_config(max_tokens: Option<u32>, temperature: Option<f32>) -> GeminiGenerationConfig {
    GeminiGenerationConfig {
        temperature,
        max_output_tokens: max_tokens,
        ..Default::default()
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn generate(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
    ) -> LlmResult<LlmResponse> {
        let request = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart::text(prompt)],
            }],
            generation_config: Some(generation_config(max_tokens, temperature)),
            system_instruction: system_prompt.map(|sys| GeminiContent {
                parts: vec![GeminiPart::text(sys)],
            }),
        };
        self.send(&request).await
    }

    async fn generate_json(
        &self,
        prompt: &str,
        schema: &JsonValue,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
    ) -> LlmResult<LlmResponse> {
        let request = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart::text(prompt)],
            }],
            generation_config: Some(GeminiGenerationConfig {
                response_mime_type: Some("application/json"),
                response_schema: Some(schema.clone()),
                ..generation_config(max_tokens, temperature)
            }),
            system_instruction: None,
        };
        self.send(&request).await
    }

    async fn generate_with_image(
        &self,
        prompt: &str,
        image: &InlineImage,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
    ) -> LlmResult<LlmResponse> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(&image.data);
        let request = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![
                    GeminiPart::text(prompt),
                    GeminiPart {
                        text: None,
                        inline_data: Some(GeminiInlineData {
                            mime_type: image.mime_type.clone(),
                            data: encoded,
                        }),
                    },
                ],
            }],
            generation_config: Some(generation_config(max_tokens, temperature)),
            system_instruction: None,
        };
        self.send(&request).await
    }

    async fn health_check(&self) -> LlmResult<bool> {
        match self
            .generate("Respond with just 'OK'", None, Some(5), Some(0.1))
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                tracing::warn!(error = %e, "llm.gemini.health_check_failed");
                Ok(false)
            }
        }
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
