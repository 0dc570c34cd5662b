use thiserror::Error;

/// Errors raised by the analysis and scoring core.
///
/// Per-record ingestion problems are never reported through this type; they
/// are counted in [`crate::IngestOutcome`] instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Negative threshold, malformed weights map, invalid policy parameters.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    /// Non-finite or wrongly typed numeric input.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Reject NaN and infinities before they reach any clamp logic.
pub(crate) fn ensure_finite(name: &str, value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(Error::InvalidInput(format!("{name} must be finite, got {value}")))
    }
}
