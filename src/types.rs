//! Core types for Kardia
//!
//! This module defines the data structures shared by the evaluator, the
//! measurement store and the insight builders: raw readings, evaluations and
//! the persisted measurement record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Score at or above which a reading is considered OK
pub const OK_SCORE_FLOOR: u8 = 80;

/// Score at or above which a reading is ELEVATED rather than WARNING
pub const ELEVATED_SCORE_FLOOR: u8 = 60;

/// A single physiological/environmental reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementInput {
    /// Heart rate (bpm)
    pub heart_rate: f64,
    /// Blood oxygen saturation (percentage, 0-100)
    pub spo2: f64,
    /// Ambient (room) temperature in celsius, not body temperature
    pub temperature: f64,
    /// Normalized activity indicator (fraction, 0-1)
    pub motion_level: f64,
}

impl MeasurementInput {
    pub fn new(heart_rate: f64, spo2: f64, temperature: f64, motion_level: f64) -> Self {
        Self {
            heart_rate,
            spo2,
            temperature,
            motion_level,
        }
    }
}

/// Qualitative status, ordered by severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HeartStatus {
    Ok,
    Elevated,
    Warning,
}

impl HeartStatus {
    /// Derive the status from a score. This is the only input to status.
    pub fn from_score(score: u8) -> Self {
        if score < ELEVATED_SCORE_FLOOR {
            HeartStatus::Warning
        } else if score < OK_SCORE_FLOOR {
            HeartStatus::Elevated
        } else {
            HeartStatus::Ok
        }
    }

    /// Same thresholds applied to an averaged, non-integer score
    pub fn from_average(score: f64) -> Self {
        if score < f64::from(ELEVATED_SCORE_FLOOR) {
            HeartStatus::Warning
        } else if score < f64::from(OK_SCORE_FLOOR) {
            HeartStatus::Elevated
        } else {
            HeartStatus::Ok
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HeartStatus::Ok => "OK",
            HeartStatus::Elevated => "ELEVATED",
            HeartStatus::Warning => "WARNING",
        }
    }
}

/// Result of evaluating one reading
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartEvaluation {
    pub status: HeartStatus,
    /// Wellness score (0-100)
    pub score: u8,
    /// One entry per triggered rule, in rule order
    pub reasons: Vec<String>,
}

/// Persisted measurement record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Measurement {
    /// Store-assigned identifier, starts at 1
    pub id: u64,
    pub user_id: u64,
    pub heart_rate: f64,
    pub spo2: f64,
    pub temperature: f64,
    pub motion_level: f64,
    pub status: HeartStatus,
    pub score: u8,
    /// Origin of the reading (e.g. "device")
    pub source: String,
    pub created_at: DateTime<Utc>,
}

impl Measurement {
    /// The raw reading without the stored evaluation
    pub fn input(&self) -> MeasurementInput {
        MeasurementInput {
            heart_rate: self.heart_rate,
            spo2: self.spo2,
            temperature: self.temperature,
            motion_level: self.motion_level,
        }
    }
}

/// Quality flag raised on ingest. Flags never change the score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityFlag {
    /// Motion level above 1.0, likely sent as a 0-100 percentage
    MotionLevelLooksLikePercent,
    HeartRateOutOfRange,
    Spo2OutOfRange,
}
