//! Measurement store
//!
//! Keeps evaluated measurements ordered by reading time and answers the
//! queries the dashboard and insight builders need: latest reading, most
//! recent page, and time windows per user. The store serializes to JSON so
//! callers can persist it between runs.

use crate::error::KardiaError;
use crate::types::{HeartEvaluation, Measurement, MeasurementInput};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Default number of records returned by `recent`
pub const DEFAULT_RECENT_LIMIT: usize = 200;

/// Store configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Maximum number of records returned by `recent`
    #[serde(default = "default_recent_limit")]
    pub recent_limit: usize,
    /// Oldest records are evicted past this size
    #[serde(default)]
    pub max_records: Option<usize>,
}

fn default_recent_limit() -> usize {
    DEFAULT_RECENT_LIMIT
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            recent_limit: DEFAULT_RECENT_LIMIT,
            max_records: None,
        }
    }
}

/// Time-ordered measurement store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeasurementStore {
    /// Records sorted by `created_at`, insertion order kept for ties
    records: VecDeque<Measurement>,
    /// Next identifier to assign
    next_id: u64,
    /// Whether a measurement has been requested from the device
    #[serde(default)]
    armed: bool,
    #[serde(default)]
    config: StoreConfig,
}

impl Default for MeasurementStore {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

impl MeasurementStore {
    /// Create an empty store
    pub fn new(config: StoreConfig) -> Self {
        Self {
            records: VecDeque::new(),
            next_id: 1,
            armed: false,
            config,
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Store an evaluated reading and return the persisted record.
    ///
    /// Fails with `StoreError` once the id space is exhausted; `u64::MAX` is
    /// never assigned.
    pub fn insert(
        &mut self,
        user_id: u64,
        input: &MeasurementInput,
        evaluation: &HeartEvaluation,
        source: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Measurement, KardiaError> {
        let id = self.next_id;
        let next_id = id
            .checked_add(1)
            .ok_or_else(|| KardiaError::StoreError("measurement ids exhausted".to_string()))?;

        let measurement = Measurement {
            id,
            user_id,
            heart_rate: input.heart_rate,
            spo2: input.spo2,
            temperature: input.temperature,
            motion_level: input.motion_level,
            status: evaluation.status,
            score: evaluation.score,
            source: source.to_string(),
            created_at,
        };
        self.next_id = next_id;

        let position = self.records.partition_point(|m| m.created_at <= created_at);
        self.records.insert(position, measurement.clone());

        if let Some(max) = self.config.max_records {
            while self.records.len() > max {
                if let Some(evicted) = self.records.pop_front() {
                    tracing::debug!(id = evicted.id, "evicted oldest measurement");
                }
            }
        }

        tracing::debug!(
            id = measurement.id,
            user_id,
            score = measurement.score,
            status = measurement.status.as_str(),
            "stored measurement"
        );

        Ok(measurement)
    }

    /// Most recent reading by time
    pub fn latest(&self) -> Option<&Measurement> {
        self.records.back()
    }

    /// Newest readings first, capped at the configured limit
    pub fn recent(&self) -> Vec<&Measurement> {
        self.records
            .iter()
            .rev()
            .take(self.config.recent_limit)
            .collect()
    }

    /// Readings with `from <= created_at <= to`, oldest first
    pub fn between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<&Measurement> {
        self.records
            .iter()
            .filter(|m| m.created_at >= from && m.created_at <= to)
            .collect()
    }

    /// Same as `between`, restricted to one user
    pub fn for_user_between(
        &self,
        user_id: u64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Vec<&Measurement> {
        self.between(from, to)
            .into_iter()
            .filter(|m| m.user_id == user_id)
            .collect()
    }

    /// All readings, oldest first
    pub fn all(&self) -> impl Iterator<Item = &Measurement> + Clone {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Request a measurement from the device
    pub fn arm(&mut self) {
        self.armed = true;
        tracing::info!("measurement command received, device is listening");
    }

    /// Clear the measurement request
    pub fn disarm(&mut self) {
        self.armed = false;
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Load store from JSON.
    ///
    /// Records are re-sorted by `created_at` (stable) and `next_id` is moved
    /// past the largest stored id, so a hand-edited file behaves like one
    /// written by `to_json`.
    pub fn from_json(json: &str) -> Result<Self, KardiaError> {
        let mut store: Self =
            serde_json::from_str(json).map_err(|e| KardiaError::StoreError(e.to_string()))?;

        let records = store.records.make_contiguous();
        if !records.windows(2).all(|w| w[0].created_at <= w[1].created_at) {
            tracing::warn!(records = records.len(), "store file out of time order, re-sorting");
            records.sort_by_key(|m| m.created_at);
        }

        if let Some(max_id) = store.records.iter().map(|m| m.id).max() {
            store.next_id = store.next_id.max(max_id.saturating_add(1));
        }
        store.next_id = store.next_id.max(1);

        Ok(store)
    }

    /// Serialize store to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
