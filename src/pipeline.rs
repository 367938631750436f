//! Pipeline orchestration
//!
//! This module provides the public API for Kardia. It ties the stages
//! together: payload ingest → evaluation → storage → insight.

use crate::error::KardiaError;
use crate::evaluator::evaluate;
use crate::ingest::{parse_ndjson, parse_payload, quality_flags, MeasurementPayload};
use crate::insight::{today_for_user, DailyInsight};
use crate::store::{MeasurementStore, StoreConfig};
use crate::types::{HeartEvaluation, Measurement, MeasurementInput, QualityFlag};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Evaluate a single JSON-encoded reading and return the JSON evaluation.
///
/// # Example
/// ```ignore
/// let evaluation = evaluate_json(
///     r#"{"heartRate":72,"spo2":98,"temperature":22,"motionLevel":0.1}"#,
/// )?;
/// ```
pub fn evaluate_json(json: &str) -> Result<String, KardiaError> {
    let input: MeasurementInput = serde_json::from_str(json)?;
    let evaluation = evaluate(&input);
    serde_json::to_string(&evaluation).map_err(KardiaError::JsonError)
}

/// Result of ingesting one payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestOutcome {
    pub measurement: Measurement,
    pub evaluation: HeartEvaluation,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<QualityFlag>,
}

/// Latest stored reading with a fresh evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestReading {
    pub measurement: Measurement,
    pub evaluation: HeartEvaluation,
}

/// Stateful processor owning a measurement store.
///
/// Use this when readings arrive over time and must be queried later.
pub struct KardiaProcessor {
    store: MeasurementStore,
    instance_id: String,
}

impl Default for KardiaProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl KardiaProcessor {
    /// Create a processor with an empty default store
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    /// Create a processor with a specific store configuration
    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            store: MeasurementStore::new(config),
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn store(&self) -> &MeasurementStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut MeasurementStore {
        &mut self.store
    }

    /// Load store state from JSON
    pub fn load_store(&mut self, json: &str) -> Result<(), KardiaError> {
        self.store = MeasurementStore::from_json(json)?;
        Ok(())
    }

    /// Save store state to JSON
    pub fn save_store(&self) -> Result<String, KardiaError> {
        self.store
            .to_json()
            .map_err(|e| KardiaError::StoreError(e.to_string()))
    }

    /// Evaluate and store one payload
    pub fn ingest(&mut self, payload: &MeasurementPayload) -> Result<IngestOutcome, KardiaError> {
        payload.validate()?;

        let input = payload.input();
        let evaluation = evaluate(&input);
        let flags = quality_flags(&input);
        if !flags.is_empty() {
            tracing::warn!(
                instance = %self.instance_id,
                user_id = payload.user_id,
                ?flags,
                "reading raised quality flags"
            );
        }

        let created_at = payload.created_at.unwrap_or_else(Utc::now);
        let measurement =
            self.store
                .insert(payload.user_id, &input, &evaluation, payload.source(), created_at)?;

        Ok(IngestOutcome {
            measurement,
            evaluation,
            flags,
        })
    }

    /// Ingest a single JSON payload
    pub fn ingest_json(&mut self, json: &str) -> Result<IngestOutcome, KardiaError> {
        let payload = parse_payload(json)?;
        self.ingest(&payload)
    }

    /// Ingest NDJSON payloads. Stops at the first invalid payload; earlier
    /// payloads stay stored.
    pub fn ingest_ndjson(&mut self, ndjson: &str) -> Result<Vec<IngestOutcome>, KardiaError> {
        let payloads = parse_ndjson(ndjson)?;
        payloads.iter().map(|p| self.ingest(p)).collect()
    }

    /// Latest reading re-evaluated with the current rules
    pub fn latest_evaluation(&self) -> Option<LatestReading> {
        self.store.latest().map(|m| LatestReading {
            measurement: m.clone(),
            evaluation: evaluate(&m.input()),
        })
    }

    /// Today's insight for a user, relative to `now`
    pub fn today_insight(&self, user_id: u64, now: DateTime<Utc>) -> Option<DailyInsight> {
        today_for_user(&self.store, user_id, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HeartStatus;

    fn payload_json(user_id: u64, hr: f64, spo2: f64, when: &str) -> String {
        format!(
            r#"{{"userId":{user_id},"heartRate":{hr},"spo2":{spo2},"temperature":22,"motionLevel":0.1,"createdAt":"{when}"}}"#
        )
    }

    #[test]
    fn test_evaluate_json() {
        let out = evaluate_json(r#"{"heartRate":45,"spo2":98,"temperature":22,"motionLevel":0.1}"#)
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["score"], 80);
        assert_eq!(value["status"], "OK");
        assert_eq!(value["reasons"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_evaluate_json_invalid() {
        assert!(evaluate_json("not json").is_err());
        assert!(evaluate_json(r#"{"heartRate":45}"#).is_err());
    }

    #[test]
    fn test_ingest_stores_evaluation() {
        let mut processor = KardiaProcessor::new();
        let outcome = processor
            .ingest_json(&payload_json(1, 115.0, 88.0, "2024-03-04T08:00:00Z"))
            .unwrap();

        assert_eq!(outcome.measurement.id, 1);
        assert_eq!(outcome.measurement.score, 40);
        assert_eq!(outcome.measurement.status, HeartStatus::Warning);
        assert_eq!(outcome.measurement.source, "device");
        assert_eq!(outcome.evaluation.reasons.len(), 2);
        assert!(outcome.flags.is_empty());
        assert_eq!(processor.store().len(), 1);
    }

    #[test]
    fn test_ingest_flags_percent_motion() {
        let mut processor = KardiaProcessor::new();
        let payload = MeasurementPayload::new(1, MeasurementInput::new(72.0, 98.0, 22.0, 45.0));
        let outcome = processor.ingest(&payload).unwrap();

        assert_eq!(outcome.flags, vec![QualityFlag::MotionLevelLooksLikePercent]);
        // 45 is treated as "not resting": 72 bpm is fine, no sensor-noise penalty
        assert_eq!(outcome.evaluation.score, 100);
    }

    #[test]
    fn test_ingest_stores_out_of_range_with_flags() {
        let mut processor = KardiaProcessor::new();
        let outcome = processor
            .ingest_json(&payload_json(1, 250.0, 101.0, "2024-03-04T08:00:00Z"))
            .unwrap();

        assert_eq!(
            outcome.flags,
            vec![QualityFlag::HeartRateOutOfRange, QualityFlag::Spo2OutOfRange]
        );
        assert_eq!(processor.store().len(), 1);

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["flags"][0], "heart_rate_out_of_range");
    }

    #[test]
    fn test_ingest_rejects_non_finite() {
        let mut processor = KardiaProcessor::new();
        let payload = MeasurementPayload::new(1, MeasurementInput::new(f64::INFINITY, 98.0, 22.0, 0.1));
        assert!(matches!(
            processor.ingest(&payload),
            Err(KardiaError::InvalidPayload(_))
        ));
        assert!(processor.store().is_empty());
    }

    #[test]
    fn test_latest_evaluation() {
        let mut processor = KardiaProcessor::new();
        assert!(processor.latest_evaluation().is_none());

        let ndjson = [
            payload_json(1, 72.0, 98.0, "2024-03-04T09:00:00Z"),
            payload_json(1, 45.0, 98.0, "2024-03-04T08:00:00Z"),
        ]
        .join("\n");
        let outcomes = processor.ingest_ndjson(&ndjson).unwrap();
        assert_eq!(outcomes.len(), 2);

        let latest = processor.latest_evaluation().unwrap();
        assert_eq!(latest.measurement.heart_rate, 72.0);
        assert_eq!(latest.evaluation.score, 100);
    }

    #[test]
    fn test_store_round_trip_keeps_ids() {
        let mut processor = KardiaProcessor::new();
        processor
            .ingest_json(&payload_json(1, 72.0, 98.0, "2024-03-04T08:00:00Z"))
            .unwrap();
        let saved = processor.save_store().unwrap();

        let mut restored = KardiaProcessor::new();
        restored.load_store(&saved).unwrap();
        let outcome = restored
            .ingest_json(&payload_json(1, 75.0, 98.0, "2024-03-04T09:00:00Z"))
            .unwrap();
        assert_eq!(outcome.measurement.id, 2);
    }

    #[test]
    fn test_load_unsorted_store_keeps_latest_by_time() {
        let mut processor = KardiaProcessor::new();
        processor
            .ingest_json(&payload_json(1, 70.0, 98.0, "2024-03-04T08:00:00Z"))
            .unwrap();
        processor
            .ingest_json(&payload_json(1, 90.0, 98.0, "2024-03-04T10:00:00Z"))
            .unwrap();

        let mut value: serde_json::Value =
            serde_json::from_str(&processor.save_store().unwrap()).unwrap();
        value["records"].as_array_mut().unwrap().reverse();

        let mut restored = KardiaProcessor::new();
        restored.load_store(&value.to_string()).unwrap();
        assert_eq!(restored.latest_evaluation().unwrap().measurement.heart_rate, 90.0);
    }

    #[test]
    fn test_load_store_invalid() {
        let mut processor = KardiaProcessor::new();
        assert!(matches!(
            processor.load_store("{oops"),
            Err(KardiaError::StoreError(_))
        ));
    }
}
