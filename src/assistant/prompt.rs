//! Prompt construction for the language-model collaborators

use crate::error::KardiaError;
use crate::evaluator::evaluate;
use crate::types::{Measurement, MeasurementInput};
use serde::Serialize;

/// Default chat completion model
pub const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";

const INSIGHT_TEMPERATURE: f64 = 0.5;
const ASSISTANT_TEMPERATURE: f64 = 0.2;
const ASSISTANT_MAX_TOKENS: u32 = 300;

const INSIGHT_SYSTEM_PROMPT: &str = "\
You are an expert health and wellness analyst. Your task is to analyze a series of physiological and environmental measurements.

The metrics provided are:
- 'heartRate' (BPM): Normal resting range is 60-90 BPM.
- 'spo2' (%): Oxygen saturation. Normal is 96% and above.
- 'temperature' (°C): This represents the ROOM TEMPERATURE, not body temperature. Ideal range for sleep/rest is 20-24°C.
- 'motionLevel' (0-1): Activity level/movement. Below 0.3 is resting, above 0.6 is high activity.
- 'status' and 'score': A heuristic wellness score (0-100) computed for each reading. It is not a diagnosis.

Analyze the provided JSON data and generate a single, comprehensive insight summary. The insight must be structured, professional, and actionable.

Your response must ONLY contain the insight text. Do not include any titles, headers, or conversational filler.

Focus on the following points:
1. Overall Status: Summarize the average state of the user's health metrics (BPM, SpO2).
2. Trends/Anomalies: Point out any sustained high/low readings in any metric.
3. Environmental Impact: Comment on the relationship between Room Temperature and Motion/Heart Rate.
4. Recommendation: Provide a single, relevant wellness recommendation based on the data.";

const ASSISTANT_SYSTEM_PROMPT: &str = "\
You are KardiaAI, a careful cardiology safety assistant.
You evaluate heart rate, SpO₂, ambient temperature, and movement patterns.
Your job:

1. Assess cardiovascular risk (low / medium / high)
2. Explain what caused the risk
3. Provide clear, calm recommendations
4. If risk is HIGH, also provide an urgent alert message.
5. Keep responses medically cautious: NO diagnosis.

Return output strictly as a JSON object. DO NOT include any text, markdown, or commentary outside the JSON object.
{
\"text\": \"...\",
\"risk\": \"low|medium|high\",
\"factors\": \"...\",
\"recommendation\": \"...\",
\"alert\": \"\"
}";

/// Request for a narrative insight over a series of readings
#[derive(Debug, Clone, Serialize)]
pub struct InsightRequest {
    pub model: String,
    pub temperature: f64,
    pub system_prompt: String,
    pub user_prompt: String,
    /// Number of readings embedded in the prompt
    pub readings: usize,
}

impl InsightRequest {
    pub fn from_measurements(measurements: &[&Measurement]) -> Result<Self, KardiaError> {
        if measurements.is_empty() {
            return Err(KardiaError::EmptyMeasurements);
        }

        let data = serde_json::to_string_pretty(measurements)?;
        let user_prompt = format!(
            "--- MEASUREMENT DATA (JSON ARRAY) ---\n{data}\n--- END OF DATA ---"
        );

        Ok(Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: INSIGHT_TEMPERATURE,
            system_prompt: INSIGHT_SYSTEM_PROMPT.to_string(),
            user_prompt,
            readings: measurements.len(),
        })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// OpenAI-compatible chat completion body
    pub fn to_chat_body(&self) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": self.system_prompt },
                { "role": "user", "content": self.user_prompt }
            ],
            "temperature": self.temperature,
        })
    }
}

/// Chat message for the assistant, optionally with the current reading
#[derive(Debug, Clone, Serialize)]
pub struct AssistantRequest {
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub system_prompt: String,
    pub user_prompt: String,
}

impl AssistantRequest {
    pub fn new(text: &str, reading: Option<MeasurementInput>) -> Result<Self, KardiaError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(KardiaError::MissingText);
        }

        let mut user_prompt = format!("User message: \"{text}\".");
        if let Some(reading) = reading {
            let evaluation = evaluate(&reading);
            user_prompt.push_str(&format!(
                "\nCurrent reading: heart rate {} BPM, SpO₂ {}%, room temperature {} °C, motion level {}.",
                reading.heart_rate, reading.spo2, reading.temperature, reading.motion_level
            ));
            user_prompt.push_str(&format!(
                "\nHeuristic evaluation: {} (score {}).",
                evaluation.status.as_str(),
                evaluation.score
            ));
            for reason in &evaluation.reasons {
                user_prompt.push_str(&format!("\n- {reason}"));
            }
        }

        Ok(Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: ASSISTANT_TEMPERATURE,
            max_tokens: ASSISTANT_MAX_TOKENS,
            system_prompt: ASSISTANT_SYSTEM_PROMPT.to_string(),
            user_prompt,
        })
    }

    /// OpenAI-compatible chat completion body requesting a JSON object
    pub fn to_chat_body(&self) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": self.system_prompt },
                { "role": "user", "content": self.user_prompt }
            ],
        })
    }
}
