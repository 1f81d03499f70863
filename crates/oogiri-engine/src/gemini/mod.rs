use std::env;
use std::time::Duration;

use anyhow::Context;
use reqwest::blocking::Client as HttpClient;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

mod response;

pub use response::{
    extract_image, extract_texts, Candidate, Content, GenerateContentResponse, InlineData,
    InlinePayload, Part,
};

pub const DEFAULT_MODEL: &str = "models/gemini-2.5-flash-image-preview";
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(180);
const ERROR_BODY_MAX_CHARS: usize = 512;

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("quota exhausted: {message}")]
    QuotaExhausted { message: String },
    #[error("{message}")]
    Api { status: u16, message: String },
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

/// A blocking text-to-image call returning the raw, untrusted response.
pub trait ImageBackend: Send + Sync {
    fn generate_content(
        &self,
        api_key: &str,
        model: &str,
        prompt: &str,
    ) -> Result<GenerateContentResponse, BackendError>;
}

pub struct GeminiClient {
    api_base: String,
    http: HttpClient,
}

impl GeminiClient {
    pub fn new() -> anyhow::Result<Self> {
        let api_base = env::var("GEMINI_API_BASE")
            .ok()
            .map(|value| value.trim().trim_end_matches('/').to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        Self::with_api_base(api_base)
    }

    pub fn with_api_base(api_base: impl Into<String>) -> anyhow::Result<Self> {
        let http = HttpClient::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build Gemini HTTP client")?;
        Ok(Self {
            api_base: api_base.into(),
            http,
        })
    }

    pub fn endpoint_for_model(&self, model: &str) -> String {
        let trimmed = model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        };
        format!("{}/{}:generateContent", self.api_base, model_path)
    }
}

impl ImageBackend for GeminiClient {
    fn generate_content(
        &self,
        api_key: &str,
        model: &str,
        prompt: &str,
    ) -> Result<GenerateContentResponse, BackendError> {
        let endpoint = self.endpoint_for_model(model);
        let payload = request_payload(prompt);
        debug!(%endpoint, "calling generateContent");

        let response = self
            .http
            .post(&endpoint)
            .query(&[("key", api_key)])
            .json(&payload)
            .send()
            .with_context(|| format!("Gemini request failed ({endpoint})"))?;
        let status = response.status();
        let body = response
            .text()
            .context("Gemini response body read failed")?;
        if !status.is_success() {
            return Err(classify_failure(status.as_u16(), &body));
        }
        let parsed = serde_json::from_str::<GenerateContentResponse>(&body)
            .context("Gemini returned invalid JSON payload")?;
        Ok(parsed)
    }
}

pub fn request_payload(prompt: &str) -> Value {
    json!({
        "contents": [{
            "role": "user",
            "parts": [{ "text": prompt }],
        }],
        "generationConfig": {
            "responseModalities": ["TEXT", "IMAGE"],
        },
    })
}

#[derive(Debug, Default, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    error: Option<ErrorBody>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

/// Maps a non-success HTTP reply to quota exhaustion or a provider API error.
pub fn classify_failure(status: u16, body: &str) -> BackendError {
    let envelope = serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(|envelope| envelope.error)
        .unwrap_or_default();
    let message = envelope
        .message
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| truncate_text(body.trim(), ERROR_BODY_MAX_CHARS));
    let exhausted = status == 429
        || envelope
            .status
            .as_deref()
            .is_some_and(|value| value.eq_ignore_ascii_case("RESOURCE_EXHAUSTED"));
    if exhausted {
        return BackendError::QuotaExhausted { message };
    }
    BackendError::Api { status, message }
}

pub fn error_chain_text(err: &anyhow::Error, max_chars: usize) -> String {
    let mut parts: Vec<String> = Vec::new();
    for cause in err.chain() {
        let text = cause.to_string();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            continue;
        }
        if parts.last().is_some_and(|existing| existing == trimmed) {
            continue;
        }
        parts.push(trimmed.to_string());
    }
    if parts.is_empty() {
        return truncate_text(&err.to_string(), max_chars);
    }
    truncate_text(&parts.join(" | caused by: "), max_chars)
}

fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{classify_failure, error_chain_text, request_payload, BackendError, GeminiClient};

    #[test]
    fn endpoint_accepts_prefixed_and_bare_models() -> anyhow::Result<()> {
        let client = GeminiClient::with_api_base("https://example.test/v1beta")?;
        assert_eq!(
            client.endpoint_for_model("models/gemini-2.5-flash-image-preview"),
            "https://example.test/v1beta/models/gemini-2.5-flash-image-preview:generateContent"
        );
        assert_eq!(
            client.endpoint_for_model(" gemini-x "),
            "https://example.test/v1beta/models/gemini-x:generateContent"
        );
        Ok(())
    }

    #[test]
    fn payload_requests_text_and_image() {
        let payload = request_payload("a cat");
        assert_eq!(payload["contents"][0]["parts"][0]["text"], json!("a cat"));
        assert_eq!(
            payload["generationConfig"]["responseModalities"],
            json!(["TEXT", "IMAGE"])
        );
    }

    #[test]
    fn classify_429_as_quota() {
        let body = json!({"error": {"code": 429, "message": "Quota exceeded", "status": "RESOURCE_EXHAUSTED"}})
            .to_string();
        match classify_failure(429, &body) {
            BackendError::QuotaExhausted { message } => assert_eq!(message, "Quota exceeded"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn classify_resource_exhausted_status_without_429() {
        let body = json!({"error": {"message": "slow down", "status": "RESOURCE_EXHAUSTED"}})
            .to_string();
        assert!(matches!(
            classify_failure(503, &body),
            BackendError::QuotaExhausted { .. }
        ));
    }

    #[test]
    fn classify_other_failures_surface_provider_message() {
        let body = json!({"error": {"code": 400, "message": "API key not valid.", "status": "INVALID_ARGUMENT"}})
            .to_string();
        match classify_failure(400, &body) {
            BackendError::Api { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "API key not valid.");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn classify_non_json_body_falls_back_to_text() {
        match classify_failure(502, "  Bad Gateway ") {
            BackendError::Api { message, .. } => assert_eq!(message, "Bad Gateway"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn error_chain_text_joins_causes() {
        let err = anyhow::anyhow!("connection reset").context("Gemini request failed");
        assert_eq!(
            error_chain_text(&err, 200),
            "Gemini request failed | caused by: connection reset"
        );
        assert_eq!(error_chain_text(&err, 6), "Gemini…");
    }
}
