use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Deserialize;

/// `generateContent` response, reduced to what the studio reads.
///
/// Every level may be missing or null; key spellings are accepted in both the
/// REST camelCase form and the snake_case form.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub parts: Option<Vec<Part>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default, alias = "inline_data")]
    pub inline_data: Option<InlineData>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    #[serde(default)]
    pub data: Option<InlinePayload>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum InlinePayload {
    Encoded(String),
    Raw(Vec<u8>),
}

impl InlinePayload {
    /// Base64 text is decoded, ignoring ASCII whitespace such as line wrapping;
    /// raw bytes pass through. Empty or undecodable payloads yield `None`.
    pub fn decode(&self) -> Option<Vec<u8>> {
        let bytes = match self {
            Self::Encoded(text) => {
                let compact: Vec<u8> = text
                    .bytes()
                    .filter(|byte| !byte.is_ascii_whitespace())
                    .collect();
                BASE64.decode(compact).ok()?
            }
            Self::Raw(bytes) => bytes.clone(),
        };
        (!bytes.is_empty()).then_some(bytes)
    }
}

impl GenerateContentResponse {
    /// All parts across all candidates, in encounter order.
    pub fn parts(&self) -> impl Iterator<Item = &Part> + '_ {
        self.candidates
            .iter()
            .flatten()
            .filter_map(|candidate| candidate.content.as_ref())
            .flat_map(|content| content.parts.iter().flatten())
    }
}

/// First decodable inline image across all candidates and parts.
pub fn extract_image(response: &GenerateContentResponse) -> Option<Vec<u8>> {
    response
        .parts()
        .filter_map(|part| part.inline_data.as_ref())
        .filter_map(|inline| inline.data.as_ref())
        .find_map(InlinePayload::decode)
}

/// Every non-empty text fragment, in encounter order, duplicates kept.
pub fn extract_texts(response: &GenerateContentResponse) -> Vec<String> {
    response
        .parts()
        .filter_map(|part| part.text.as_deref())
        .filter(|text| !text.is_empty())
        .map(str::to_string)
        .collect()
}
