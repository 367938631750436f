//! Parsing of structured assistant replies

use crate::error::KardiaError;
use serde::{Deserialize, Serialize};

const FENCE_OPEN: &str = "```json";
const FENCE_CLOSE: &str = "```";

/// Risk level reported by the assistant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// Structured reply from the assistant model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssistantReply {
    pub text: String,
    pub risk: RiskLevel,
    #[serde(default)]
    pub factors: String,
    #[serde(default)]
    pub recommendation: String,
    /// Empty unless risk is high
    #[serde(default)]
    pub alert: String,
}

impl AssistantReply {
    /// Extract the JSON object from raw model output and deserialize it
    pub fn parse(raw: &str) -> Result<Self, KardiaError> {
        let json = extract_json(raw);
        serde_json::from_str(json).map_err(|e| KardiaError::InvalidReply(e.to_string()))
    }

    pub fn is_urgent(&self) -> bool {
        self.risk == RiskLevel::High || !self.alert.trim().is_empty()
    }
}

/// Object inside the first ```json fence that holds one, or the trimmed text
/// when there is none
pub fn extract_json(text: &str) -> &str {
    fenced_object(text).unwrap_or_else(|| text.trim())
}

fn fenced_object(text: &str) -> Option<&str> {
    text.match_indices(FENCE_OPEN).find_map(|(open, _)| {
        let body = text[open + FENCE_OPEN.len()..].trim_start();
        if !body.starts_with('{') {
            return None;
        }

        // shortest object whose closing brace is followed by the closing fence
        body.match_indices('}').find_map(|(idx, _)| {
            let rest = body[idx + 1..].trim_start();
            rest.starts_with(FENCE_CLOSE).then(|| &body[..=idx])
        })
    })
}
