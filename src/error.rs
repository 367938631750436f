//! Error types for Kardia
//!
//! The evaluator itself is total and never fails; these errors cover ingest,
//! storage and the assistant collaborators around it.

use thiserror::Error;

/// Errors that can occur outside the evaluator
#[derive(Debug, Error)]
pub enum KardiaError {
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Failed to parse input: {0}")]
    ParseError(String),

    #[error("Missing or empty measurements")]
    EmptyMeasurements,

    #[error("Missing text")]
    MissingText,

    #[error("Text cannot be empty")]
    EmptyText,

    #[error("Invalid assistant reply: {0}")]
    InvalidReply(String),

    #[error("Collaborator failed: {0}")]
    Collaborator(String),

    #[error("Store error: {0}")]
    StoreError(String),
}
