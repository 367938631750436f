//! Speech synthesis requests

use crate::error::KardiaError;
use serde::{Deserialize, Serialize};

pub const DEFAULT_VOICE_ID: &str = "21m00Tcm4TlvDq8ikWAM";
pub const DEFAULT_SPEECH_MODEL: &str = "eleven_turbo_v2";

/// Text-to-speech request with vendor voice settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeechRequest {
    /// Trimmed, non-empty text
    pub text: String,
    pub voice_id: String,
    pub model_id: String,
    pub stability: f64,
    pub similarity_boost: f64,
}

impl SpeechRequest {
    pub fn new(text: &str) -> Result<Self, KardiaError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(KardiaError::EmptyText);
        }
        Ok(Self {
            text: text.to_string(),
            voice_id: DEFAULT_VOICE_ID.to_string(),
            model_id: DEFAULT_SPEECH_MODEL.to_string(),
            stability: 0.5,
            similarity_boost: 0.5,
        })
    }

    pub fn with_voice(mut self, voice_id: impl Into<String>) -> Self {
        self.voice_id = voice_id.into();
        self
    }

    /// Vendor request body; the voice id travels in the URL path
    pub fn to_body(&self) -> serde_json::Value {
        serde_json::json!({
            "text": self.text,
            "model_id": self.model_id,
            "voice_settings": {
                "stability": self.stability,
                "similarity_boost": self.similarity_boost,
            }
        })
    }
}
