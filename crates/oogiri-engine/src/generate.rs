use chrono::Utc;
use oogiri_contracts::history::GenerationRecord;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::gemini::{error_chain_text, extract_image, extract_texts, BackendError, ImageBackend};
use crate::prompt::compose_prompt;

pub const RATE_LIMIT_DOCS_URL: &str = "https://ai.google.dev/gemini-api/docs/rate-limits";

const UNEXPECTED_DETAIL_MAX_CHARS: usize = 600;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GenerationRequest {
    pub prompt: String,
    pub no_text: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerateError {
    #[error("Set a Gemini API key in the settings panel first.")]
    MissingApiKey,
    #[error("Enter a prompt first.")]
    EmptyPrompt,
    #[error("Gemini API quota exceeded (free tier or billing plan). Wait a while, or review usage and billing in Google AI Studio.")]
    QuotaExhausted { detail: String },
    #[error("API call failed: {0}")]
    Api(String),
    #[error("Unexpected error: {0}")]
    Unexpected(String),
    #[error("The response did not contain any image data.")]
    NoImage { texts: Vec<String> },
}

impl GenerateError {
    /// Configuration absence and input validation are warnings, not errors.
    pub fn is_warning(&self) -> bool {
        matches!(self, Self::MissingApiKey | Self::EmptyPrompt)
    }

    pub fn reference_link(&self) -> Option<&'static str> {
        match self {
            Self::QuotaExhausted { .. } => Some(RATE_LIMIT_DOCS_URL),
            _ => None,
        }
    }

    pub fn texts(&self) -> &[String] {
        match self {
            Self::NoImage { texts } => texts.as_slice(),
            _ => &[],
        }
    }
}

impl From<BackendError> for GenerateError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::QuotaExhausted { message } => Self::QuotaExhausted { detail: message },
            BackendError::Api { message, .. } => Self::Api(message),
            BackendError::Unexpected(err) => {
                Self::Unexpected(error_chain_text(&err, UNEXPECTED_DETAIL_MAX_CHARS))
            }
        }
    }
}

/// Validates, composes the final prompt, calls the backend once and turns the
/// response into a record. Nothing is retried.
pub fn generate(
    backend: &dyn ImageBackend,
    model: &str,
    request: &GenerationRequest,
    api_key: Option<&str>,
) -> Result<GenerationRecord, GenerateError> {
    let api_key = api_key
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or(GenerateError::MissingApiKey)?;
    if request.prompt.trim().is_empty() {
        return Err(GenerateError::EmptyPrompt);
    }

    let composed = compose_prompt(&request.prompt, request.no_text);
    info!(
        model,
        prompt_chars = request.prompt.chars().count(),
        no_text = request.no_text,
        "generation started"
    );
    let response = backend
        .generate_content(api_key, model, &composed)
        .map_err(|err| {
            let err = GenerateError::from(err);
            warn!(error = %err, "generation call failed");
            err
        })?;

    let texts = extract_texts(&response);
    let Some(image) = extract_image(&response) else {
        warn!(text_parts = texts.len(), "response carried no image");
        return Err(GenerateError::NoImage { texts });
    };
    info!(image_bytes = image.len(), text_parts = texts.len(), "generation succeeded");

    Ok(GenerationRecord {
        id: record_id(&request.prompt),
        prompt: request.prompt.clone(),
        model: model.to_string(),
        no_text: request.no_text,
        image,
        texts,
    })
}

fn record_id(prompt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prompt.as_bytes());
    hasher.update(
        Utc::now()
            .timestamp_nanos_opt()
            .unwrap_or_default()
            .to_be_bytes(),
    );
    let digest = hasher.finalize();
    hex::encode(&digest[..6])
}
