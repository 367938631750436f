//! Measurement ingest
//!
//! Parses device payloads (single JSON objects, JSON arrays or NDJSON) into
//! typed readings and raises quality flags. Payload checks are structural
//! only: every numeric field must be present and be a JSON number. Range
//! problems are reported as flags and never rejected, since the evaluator
//! scores any numeric input.

use crate::error::KardiaError;
use crate::types::{MeasurementInput, QualityFlag};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default source recorded for device payloads
pub const DEFAULT_SOURCE: &str = "device";

/// Plausible heart rate range (bpm)
pub const HEART_RATE_RANGE: (f64, f64) = (30.0, 220.0);

/// Valid SpO2 range (percentage)
pub const SPO2_RANGE: (f64, f64) = (0.0, 100.0);

/// Incoming measurement payload as sent by a device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementPayload {
    /// Device key; accepted and carried, not verified here
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub user_id: u64,
    pub heart_rate: f64,
    pub spo2: f64,
    pub temperature: f64,
    pub motion_level: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Reading time; defaults to ingest time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl MeasurementPayload {
    pub fn new(user_id: u64, input: MeasurementInput) -> Self {
        Self {
            api_key: None,
            user_id,
            heart_rate: input.heart_rate,
            spo2: input.spo2,
            temperature: input.temperature,
            motion_level: input.motion_level,
            source: None,
            created_at: None,
        }
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn input(&self) -> MeasurementInput {
        MeasurementInput {
            heart_rate: self.heart_rate,
            spo2: self.spo2,
            temperature: self.temperature,
            motion_level: self.motion_level,
        }
    }

    pub fn source(&self) -> &str {
        self.source.as_deref().unwrap_or(DEFAULT_SOURCE)
    }

    /// Reject values JSON cannot carry but the Rust API can (NaN, infinity)
    pub fn validate(&self) -> Result<(), KardiaError> {
        let fields = [
            ("heartRate", self.heart_rate),
            ("spo2", self.spo2),
            ("temperature", self.temperature),
            ("motionLevel", self.motion_level),
        ];
        for (name, value) in fields {
            if !value.is_finite() {
                return Err(KardiaError::InvalidPayload(format!(
                    "{name} must be a finite number"
                )));
            }
        }
        Ok(())
    }
}

/// Parse a single JSON payload
pub fn parse_payload(json: &str) -> Result<MeasurementPayload, KardiaError> {
    serde_json::from_str(json).map_err(|e| KardiaError::InvalidPayload(e.to_string()))
}

/// Parse a JSON array of payloads
pub fn parse_array(json: &str) -> Result<Vec<MeasurementPayload>, KardiaError> {
    serde_json::from_str(json).map_err(|e| KardiaError::InvalidPayload(e.to_string()))
}

/// Parse NDJSON (one payload per line, blank lines skipped)
pub fn parse_ndjson(ndjson: &str) -> Result<Vec<MeasurementPayload>, KardiaError> {
    let mut payloads = Vec::new();
    for (line_num, line) in ndjson.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<MeasurementPayload>(trimmed) {
            Ok(payload) => payloads.push(payload),
            Err(e) => {
                return Err(KardiaError::ParseError(format!(
                    "Failed to parse line {}: {}",
                    line_num + 1,
                    e
                )));
            }
        }
    }
    tracing::debug!(count = payloads.len(), "parsed NDJSON payloads");
    Ok(payloads)
}

/// Quality flags for a reading, in a fixed order
pub fn quality_flags(input: &MeasurementInput) -> Vec<QualityFlag> {
    let mut flags = Vec::new();

    if input.motion_level > 1.0 {
        flags.push(QualityFlag::MotionLevelLooksLikePercent);
    }
    if !(HEART_RATE_RANGE.0..=HEART_RATE_RANGE.1).contains(&input.heart_rate) {
        flags.push(QualityFlag::HeartRateOutOfRange);
    }
    if !(SPO2_RANGE.0..=SPO2_RANGE.1).contains(&input.spo2) {
        flags.push(QualityFlag::Spo2OutOfRange);
    }

    flags
}

/// Result of payload validation
#[derive(Debug)]
pub struct ValidationResult {
    pub index: usize,
    pub user_id: u64,
    pub error: KardiaError,
}

/// Validate a batch of payloads, returning only the failures
pub fn validate_payloads(payloads: &[MeasurementPayload]) -> Vec<ValidationResult> {
    payloads
        .iter()
        .enumerate()
        .filter_map(|(index, payload)| {
            payload.validate().err().map(|error| ValidationResult {
                index,
                user_id: payload.user_id,
                error,
            })
        })
        .collect()
}
