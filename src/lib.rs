//! Wallet anomaly analysis and token risk scoring.
//!
//! Raw records flow through [`ingest`] into a [`WalletSession`] for anomaly
//! detection and summaries; risk signals flow independently through a
//! [`RiskScorer`]. Nothing here performs I/O.

mod analysis;
mod config;
mod error;
mod ingest;
mod report;
mod scoring;
pub mod stats;
pub mod telemetry;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

pub use analysis::*;
pub use config::AnalyzerConfig;
pub use error::{Error, Result};
pub use ingest::{ingest, parse_timestamp, IngestOutcome};
pub use report::WalletReport;
pub use scoring::*;

/// One on-chain transfer. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Transaction {
    id: String,
    value: f64,
    timestamp: DateTime<Utc>,
}

impl Transaction {
    /// Build a transaction from already-typed parts.
    ///
    /// `value` must be finite and non-negative.
    pub fn new(id: impl Into<String>, value: f64, timestamp: DateTime<Utc>) -> Result<Self> {
        let value = error::ensure_finite("transaction value", value)?;
        if value < 0.0 {
            return Err(Error::InvalidInput(format!(
                "transaction value must be non-negative, got {value}"
            )));
        }
        Ok(Self {
            id: id.into(),
            value,
            timestamp,
        })
    }

    /// Transaction hash, empty when the source had none.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Descriptive statistics over transaction values.
#[derive(Debug, Clone, Copy, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct ValueSummary {
    pub avg: f64,
    pub max: f64,
    pub min: f64,
}

/// Hash wallet address for efficient lookups
pub fn hash_wallet_address(address: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(address.as_bytes());
    format!("{:x}", hasher.finalize())
}
