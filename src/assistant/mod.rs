//! Assistant collaborators
//!
//! Kardia does not talk to language-model or speech vendors itself. This
//! module shapes what goes to them (prompts, speech requests) and what comes
//! back (assistant replies), and defines the traits a vendor client
//! implements.

mod prompt;
mod reply;
mod speech;

pub use prompt::{AssistantRequest, InsightRequest, DEFAULT_MODEL};
pub use reply::{extract_json, AssistantReply, RiskLevel};
pub use speech::{SpeechRequest, DEFAULT_SPEECH_MODEL, DEFAULT_VOICE_ID};

use crate::error::KardiaError;
use crate::types::Measurement;

/// Produces narrative insight text from a prompt
pub trait InsightGenerator {
    fn name(&self) -> &'static str;

    fn generate(&self, request: &InsightRequest) -> Result<String, KardiaError>;
}

/// Answers a chat message with raw model output (expected to hold JSON)
pub trait AssistantModel {
    fn complete(&self, request: &AssistantRequest) -> Result<String, KardiaError>;
}

/// Converts text to an audio byte stream (e.g. MPEG)
pub trait SpeechSynthesizer {
    fn synthesize(&self, request: &SpeechRequest) -> Result<Vec<u8>, KardiaError>;
}

/// Build the insight prompt, run the generator and return the trimmed text
pub fn generate_insight(
    generator: &dyn InsightGenerator,
    measurements: &[&Measurement],
) -> Result<String, KardiaError> {
    let request = InsightRequest::from_measurements(measurements)?;
    let text = generator.generate(&request)?;
    let text = text.trim();
    if text.is_empty() {
        return Err(KardiaError::InvalidReply(format!(
            "{} returned an empty insight",
            generator.name()
        )));
    }
    tracing::debug!(generator = generator.name(), readings = measurements.len(), "generated insight");
    Ok(text.to_string())
}

/// Send a chat message and parse the structured reply
pub fn ask(model: &dyn AssistantModel, request: &AssistantRequest) -> Result<AssistantReply, KardiaError> {
    let raw = model.complete(request)?;
    AssistantReply::parse(&raw)
}

/// Validate text and synthesize speech
pub fn speak(synthesizer: &dyn SpeechSynthesizer, text: &str) -> Result<Vec<u8>, KardiaError> {
    let request = SpeechRequest::new(text)?;
    synthesizer.synthesize(&request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::evaluate;
    use crate::store::MeasurementStore;
    use crate::types::MeasurementInput;
    use chrono::Utc;

    struct Echo;

    impl InsightGenerator for Echo {
        fn name(&self) -> &'static str {
            "echo"
        }

        fn generate(&self, request: &InsightRequest) -> Result<String, KardiaError> {
            Ok(format!("  {} readings analysed  \n", request.readings))
        }
    }

    struct Silent;

    impl InsightGenerator for Silent {
        fn name(&self) -> &'static str {
            "silent"
        }

        fn generate(&self, _request: &InsightRequest) -> Result<String, KardiaError> {
            Ok("   ".to_string())
        }
    }

    struct Fenced;

    impl AssistantModel for Fenced {
        fn complete(&self, _request: &AssistantRequest) -> Result<String, KardiaError> {
            Ok("```json\n{\"text\":\"Rest.\",\"risk\":\"medium\",\"factors\":\"hr\",\"recommendation\":\"Sit down\",\"alert\":\"\"}\n```".to_string())
        }
    }

    struct Bytes;

    impl SpeechSynthesizer for Bytes {
        fn synthesize(&self, request: &SpeechRequest) -> Result<Vec<u8>, KardiaError> {
            Ok(request.text.as_bytes().to_vec())
        }
    }

    fn sample_store() -> MeasurementStore {
        let mut store = MeasurementStore::default();
        let input = MeasurementInput::new(72.0, 98.0, 22.0, 0.1);
        store.insert(1, &input, &evaluate(&input), "device", Utc::now()).unwrap();
        store
    }

    #[test]
    fn test_generate_insight_trims() {
        let store = sample_store();
        let readings: Vec<&Measurement> = store.all().collect();
        let text = generate_insight(&Echo, &readings).unwrap();
        assert_eq!(text, "1 readings analysed");
    }

    #[test]
    fn test_generate_insight_rejects_blank_output() {
        let store = sample_store();
        let readings: Vec<&Measurement> = store.all().collect();
        assert!(matches!(
            generate_insight(&Silent, &readings),
            Err(KardiaError::InvalidReply(_))
        ));
    }

    #[test]
    fn test_generate_insight_requires_measurements() {
        assert!(matches!(
            generate_insight(&Echo, &[]),
            Err(KardiaError::EmptyMeasurements)
        ));
    }

    #[test]
    fn test_ask_parses_fenced_reply() {
        let request = AssistantRequest::new("I feel dizzy", None).unwrap();
        let reply = ask(&Fenced, &request).unwrap();
        assert_eq!(reply.risk, RiskLevel::Medium);
        assert_eq!(reply.recommendation, "Sit down");
    }

    #[test]
    fn test_speak_validates_text() {
        assert_eq!(speak(&Bytes, "  hi ").unwrap(), b"hi".to_vec());
        assert!(matches!(speak(&Bytes, "   "), Err(KardiaError::EmptyText)));
    }
}
