use std::collections::HashSet;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::session::sanitize_session_id;

/// One successful generation. Records are never mutated once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRecord {
    pub id: String,
    pub prompt: String,
    pub model: String,
    pub no_text: bool,
    pub image: Vec<u8>,
    pub texts: Vec<String>,
}

impl GenerationRecord {
    pub fn has_image(&self) -> bool {
        !self.image.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub no_text: Option<bool>,
    #[serde(default)]
    pub image_b64: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub texts: Vec<String>,
}

impl From<&GenerationRecord> for StoredRecord {
    fn from(record: &GenerationRecord) -> Self {
        Self {
            id: Some(record.id.clone()),
            prompt: Some(record.prompt.clone()),
            model: Some(record.model.clone()),
            no_text: Some(record.no_text),
            image_b64: record
                .has_image()
                .then(|| BASE64.encode(record.image.as_slice())),
            texts: record.texts.clone(),
        }
    }
}

impl StoredRecord {
    pub fn into_record(self) -> GenerationRecord {
        let image = self
            .image_b64
            .as_deref()
            .map(|value| {
                value
                    .bytes()
                    .filter(|byte| !byte.is_ascii_whitespace())
                    .collect::<Vec<u8>>()
            })
            .filter(|value| !value.is_empty())
            .and_then(|value| BASE64.decode(value).ok())
            .unwrap_or_default();
        GenerationRecord {
            id: self.id.unwrap_or_default(),
            prompt: self.prompt.unwrap_or_default(),
            model: self.model.unwrap_or_default(),
            no_text: self.no_text.unwrap_or(false),
            image,
            texts: self
                .texts
                .into_iter()
                .filter(|text| !text.is_empty())
                .collect(),
        }
    }
}

/// On-disk shape of one session's history file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryFile {
    pub updated_at: String,
    pub history: Vec<StoredRecord>,
}

impl HistoryFile {
    pub fn snapshot(history: &[GenerationRecord]) -> Self {
        Self {
            updated_at: now_utc_iso(),
            history: history.iter().map(StoredRecord::from).collect(),
        }
    }

    /// Returns `None` unless the payload is an object carrying a `history` array.
    /// Entries that are not objects are skipped.
    pub fn parse(raw: &str) -> Option<Vec<GenerationRecord>> {
        let payload: Value = serde_json::from_str(raw).ok()?;
        let entries = payload.as_object()?.get("history")?.as_array()?;
        let mut history: Vec<GenerationRecord> = entries
            .iter()
            .filter(|entry| entry.is_object())
            .filter_map(|entry| serde_json::from_value::<StoredRecord>(entry.clone()).ok())
            .map(StoredRecord::into_record)
            .collect();
        repair_ids(&mut history);
        Some(history)
    }
}

/// Ids address records in URLs, so every loaded id must be non-empty, path-safe
/// and unique within the list. Offending ids get a positional suffix.
fn repair_ids(history: &mut [GenerationRecord]) {
    let mut seen: HashSet<String> = HashSet::new();
    for (index, record) in history.iter_mut().enumerate() {
        let safe = sanitize_session_id(&record.id);
        if safe.is_empty() || safe != record.id || seen.contains(&safe) {
            let base = if safe.is_empty() { "record".to_string() } else { safe };
            let mut suffix = index;
            let mut candidate = format!("{base}-{suffix}");
            while seen.contains(&candidate) {
                suffix += 1;
                candidate = format!("{base}-{suffix}");
            }
            record.id = candidate;
        }
        seen.insert(record.id.clone());
    }
}

fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}
