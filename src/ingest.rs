//! Conversion of loosely-typed upstream records into [`Transaction`]s.

use crate::Transaction;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

/// Accepted alternatives for the transaction hash field, in priority order.
const HASH_KEYS: [&str; 2] = ["hash", "tx_hash"];

const OFFSET_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M%z",
    "%Y-%m-%d %H:%M%z",
];

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Result of one ingestion pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestOutcome {
    /// Accepted records, in input order.
    pub transactions: Vec<Transaction>,
    /// Records excluded because they were not objects or had no usable timestamp.
    pub skipped: usize,
    /// Accepted records whose value was missing or unparsable and fell back to 0.0.
    pub defaulted_values: usize,
}

impl IngestOutcome {
    pub fn accepted(&self) -> usize {
        self.transactions.len()
    }
}

/// Parse raw records into transactions.
///
/// A bad record never fails the batch: records without a parsable timestamp
/// are dropped and counted in [`IngestOutcome::skipped`], bad values are
/// coerced to `0.0`.
pub fn ingest(raw_records: &[Value]) -> IngestOutcome {
    let mut outcome = IngestOutcome {
        transactions: Vec::with_capacity(raw_records.len()),
        ..IngestOutcome::default()
    };

    for (index, record) in raw_records.iter().enumerate() {
        let Some(fields) = record.as_object() else {
            debug!(index, "skipping non-object transaction record");
            outcome.skipped += 1;
            continue;
        };

        let Some(timestamp) = fields
            .get("timestamp")
            .and_then(Value::as_str)
            .and_then(parse_timestamp)
        else {
            debug!(index, "skipping record without a parsable timestamp");
            outcome.skipped += 1;
            continue;
        };

        let value = match coerce_value(fields.get("value")) {
            Some(value) => value,
            None => {
                outcome.defaulted_values += 1;
                0.0
            }
        };

        outcome.transactions.push(Transaction {
            id: extract_id(fields),
            value,
            timestamp,
        });
    }

    if outcome.skipped > 0 {
        warn!(
            skipped = outcome.skipped,
            total = raw_records.len(),
            "excluded malformed transaction records"
        );
    }
    if outcome.defaulted_values > 0 {
        debug!(
            count = outcome.defaulted_values,
            "transaction values defaulted to 0.0"
        );
    }

    outcome
}

fn extract_id(fields: &serde_json::Map<String, Value>) -> String {
    HASH_KEYS
        .iter()
        .find_map(|key| match fields.get(*key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .unwrap_or_default()
}

/// Numbers, numeric strings and booleans (as 1.0 / 0.0); anything negative
/// or non-finite is rejected.
fn coerce_value(raw: Option<&Value>) -> Option<f64> {
    let parsed = match raw? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }?;
    (parsed.is_finite() && parsed >= 0.0).then_some(parsed)
}

/// ISO-8601 with an offset or `Z`, naive date-times (taken as UTC), or a bare date.
///
/// Seconds and minutes may be omitted from the time part.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(raw, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    let naive = raw.strip_suffix(['Z', 'z']).unwrap_or(raw);
    parse_naive(naive).map(|naive| Utc.from_utc_datetime(&naive))
}

fn parse_naive(raw: &str) -> Option<NaiveDateTime> {
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive);
        }
    }
    // hour-only time such as `2024-01-01T00`
    let with_minutes = format!("{raw}:00");
    for format in &NAIVE_FORMATS[2..] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(&with_minutes, format) {
            return Some(naive);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}
