//! Kardia - heuristic heart-health scoring for biometric readings
//!
//! Kardia scores single readings (heart rate, SpO₂, ambient temperature,
//! motion level) with a deterministic rule table, stores evaluated readings
//! and aggregates them into daily and weekly insights:
//! payload ingest → evaluation → storage → insight.
//!
//! ## Modules
//!
//! - **Evaluator**: Pure scoring of one reading into status, score and reasons
//! - **Store / Insight**: Time-ordered persistence and aggregate summaries
//! - **Assistant**: Prompt and request shaping for language-model and speech collaborators

pub mod assistant;
pub mod error;
pub mod evaluator;
pub mod ingest;
pub mod insight;
pub mod pipeline;
pub mod store;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use error::KardiaError;
pub use evaluator::evaluate;
pub use ingest::MeasurementPayload;
pub use insight::{DailyInsight, DaySummary, MetricsOverview, WeeklyTrend};
pub use pipeline::{evaluate_json, IngestOutcome, KardiaProcessor};
pub use store::{MeasurementStore, StoreConfig};
pub use types::{HeartEvaluation, HeartStatus, Measurement, MeasurementInput, QualityFlag};

/// Kardia version
pub const KARDIA_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name reported by the CLI
pub const PRODUCER_NAME: &str = "kardia";
