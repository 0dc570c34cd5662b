use crate::error::{Error, Result};
use crate::ingest::{ingest, IngestOutcome};
use crate::stats::{self, ValueStatistics};
use crate::{hash_wallet_address, Transaction, ValueSummary};
use serde_json::Value;
use tracing::{debug, info};

pub const DEFAULT_ANOMALY_THRESHOLD: f64 = 10_000.0;

/// Value above which a transaction counts as an anomaly. Always `>= 0`.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct AnomalyThreshold(f64);

impl AnomalyThreshold {
    pub fn new(value: f64) -> Result<Self> {
        // NaN fails this comparison too
        if !(value >= 0.0) {
            return Err(Error::InvalidConfiguration(format!(
                "anomaly threshold must be >= 0, got {value}"
            )));
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl Default for AnomalyThreshold {
    fn default() -> Self {
        Self(DEFAULT_ANOMALY_THRESHOLD)
    }
}

/// Transactions whose value strictly exceeds the threshold, in input order.
pub fn detect_anomalies(
    transactions: &[Transaction],
    threshold: AnomalyThreshold,
) -> Vec<&Transaction> {
    transactions
        .iter()
        .filter(|tx| tx.value > threshold.0)
        .collect()
}

/// Average, max and min over every transaction value.
///
/// An empty slice yields all zeros: a fresh session simply has no data yet.
pub fn summarize(transactions: &[Transaction]) -> ValueSummary {
    if transactions.is_empty() {
        return ValueSummary::default();
    }

    let total: f64 = transactions.iter().map(|tx| tx.value).sum();
    let max = transactions
        .iter()
        .map(|tx| tx.value)
        .fold(f64::NEG_INFINITY, f64::max);
    let min = transactions
        .iter()
        .map(|tx| tx.value)
        .fold(f64::INFINITY, f64::min);

    ValueSummary {
        avg: total / transactions.len() as f64,
        max,
        min,
    }
}

/// Analysis state for a single wallet.
#[derive(Debug, Clone)]
pub struct WalletSession {
    address: String,
    threshold: AnomalyThreshold,
    transactions: Vec<Transaction>,
    skipped: usize,
}

impl WalletSession {
    pub fn new(address: impl Into<String>, threshold: f64) -> Result<Self> {
        Ok(Self::with_threshold(address, AnomalyThreshold::new(threshold)?))
    }

    pub fn with_threshold(address: impl Into<String>, threshold: AnomalyThreshold) -> Self {
        Self {
            address: address.into(),
            threshold,
            transactions: Vec::new(),
            skipped: 0,
        }
    }

    /// Ingest raw records, replacing anything loaded before.
    ///
    /// Returns the number of accepted transactions; excluded records are
    /// available through [`WalletSession::skipped`].
    pub fn load(&mut self, raw_records: &[Value]) -> usize {
        let IngestOutcome {
            transactions,
            skipped,
            ..
        } = ingest(raw_records);
        info!(
            address = %self.address,
            loaded = transactions.len(),
            skipped,
            "loaded transactions"
        );
        self.transactions = transactions;
        self.skipped = skipped;
        self.transactions.len()
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn address_key(&self) -> String {
        hash_wallet_address(&self.address)
    }

    pub fn threshold(&self) -> AnomalyThreshold {
        self.threshold
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// Records dropped by the last [`WalletSession::load`].
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn anomalies(&self) -> Vec<&Transaction> {
        let anomalies = detect_anomalies(&self.transactions, self.threshold);
        info!(
            address = %self.address,
            count = anomalies.len(),
            threshold = self.threshold.0,
            "detected anomalies"
        );
        anomalies
    }

    pub fn summary(&self) -> ValueSummary {
        let summary = summarize(&self.transactions);
        debug!(address = %self.address, ?summary, "transaction summary");
        summary
    }

    pub fn statistics(&self) -> ValueStatistics {
        stats::describe(&self.values())
    }

    /// Transactions more than `z` population standard deviations from the mean.
    pub fn zscore_outliers(&self, z: f64) -> Result<Vec<&Transaction>> {
        let indices = stats::zscore_outliers(&self.values(), z)?;
        Ok(indices.into_iter().map(|i| &self.transactions[i]).collect())
    }

    /// Transactions outside the `k`-scaled interquartile fence.
    pub fn iqr_outliers(&self, k: f64) -> Result<Vec<&Transaction>> {
        let indices = stats::iqr_outliers(&self.values(), k)?;
        Ok(indices.into_iter().map(|i| &self.transactions[i]).collect())
    }

    pub fn rolling_mean(&self, window: usize) -> Result<Vec<f64>> {
        stats::rolling_mean(&self.chronological_values(), window)
    }

    pub fn rolling_median(&self, window: usize) -> Result<Vec<f64>> {
        stats::rolling_median(&self.chronological_values(), window)
    }

    pub fn rolling_std(&self, window: usize) -> Result<Vec<f64>> {
        stats::rolling_std(&self.chronological_values(), window)
    }

    pub fn value_diffs(&self) -> Vec<f64> {
        stats::diffs(&self.chronological_values())
    }

    pub fn value_pct_change(&self) -> Vec<f64> {
        stats::pct_change(&self.chronological_values())
    }

    pub fn volatility(&self) -> f64 {
        stats::volatility(&self.values())
    }

    /// Whether the most recent transaction jumps `factor` times past the
    /// average step between consecutive transactions.
    pub fn spike_detected(&self, factor: f64) -> Result<bool> {
        let spiked = stats::detect_spike(&self.chronological_values(), factor)?;
        if spiked {
            info!(address = %self.address, factor, "value spike on latest transaction");
        }
        Ok(spiked)
    }

    fn values(&self) -> Vec<f64> {
        self.transactions.iter().map(|tx| tx.value).collect()
    }

    /// Values ordered by timestamp; ties keep load order.
    fn chronological_values(&self) -> Vec<f64> {
        let mut ordered: Vec<&Transaction> = self.transactions.iter().collect();
        ordered.sort_by_key(|tx| tx.timestamp);
        ordered.into_iter().map(|tx| tx.value).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;
    use serde_json::json;

    fn tx(id: &str, value: f64) -> Transaction {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Transaction::new(id, value, ts).unwrap()
    }

    #[test]
    fn test_threshold_validation() {
        assert!(AnomalyThreshold::new(0.0).is_ok());
        assert!(matches!(
            AnomalyThreshold::new(-1.0),
            Err(Error::InvalidConfiguration(_))
        ));
        assert!(AnomalyThreshold::new(f64::NAN).is_err());
        assert!(WalletSession::new("wallet", -0.5).is_err());
        assert_eq!(AnomalyThreshold::default().value(), 10_000.0);
    }

    #[test]
    fn test_detect_anomalies_strict() {
        let txs = vec![tx("a", 5000.0), tx("b", 15000.0), tx("c", 10000.0)];
        let threshold = AnomalyThreshold::new(10_000.0).unwrap();

        let anomalies = detect_anomalies(&txs, threshold);
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].id(), "b");
        assert_eq!(anomalies[0].value(), 15000.0);
    }

    #[test]
    fn test_summarize() {
        assert_eq!(
            summarize(&[]),
            ValueSummary {
                avg: 0.0,
                max: 0.0,
                min: 0.0
            }
        );

        let txs = vec![tx("a", 10.0), tx("b", 30.0), tx("c", 20.0)];
        let summary = summarize(&txs);
        assert_eq!(summary.avg, 20.0);
        assert_eq!(summary.max, 30.0);
        assert_eq!(summary.min, 10.0);
    }

    #[test]
    fn test_session_workflow() {
        let mut session = WalletSession::new("wallet1", 5_000.0).unwrap();
        assert_eq!(session.summary(), ValueSummary::default());
        assert!(session.anomalies().is_empty());

        let raw = vec![
            json!({"hash": "a", "value": 1000, "timestamp": "2024-01-01T00:00:00Z"}),
            json!({"hash": "b", "value": 9000, "timestamp": "2024-01-02T00:00:00Z"}),
            json!({"hash": "c", "value": 2000}),
        ];
        assert_eq!(session.load(&raw), 2);
        assert_eq!(session.skipped(), 1);

        let anomalies = session.anomalies();
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].id(), "b");

        // summary covers the full set, not just the anomalies
        let summary = session.summary();
        assert_eq!(summary.avg, 5000.0);
        assert_eq!(summary.min, 1000.0);

        // reloading replaces
        session.load(&[]);
        assert!(session.transactions().is_empty());
        assert_eq!(session.skipped(), 0);
    }

    #[test]
    fn test_session_outliers() {
        let mut session = WalletSession::with_threshold("wallet1", AnomalyThreshold::default());
        let mut raw: Vec<Value> = (0..10)
            .map(|i| json!({"hash": format!("n{i}"), "value": 100, "timestamp": "2024-01-01"}))
            .collect();
        raw.push(json!({"hash": "whale", "value": 100000, "timestamp": "2024-01-01"}));
        session.load(&raw);

        let z = session.zscore_outliers(2.0).unwrap();
        assert_eq!(z.len(), 1);
        assert_eq!(z[0].id(), "whale");

        let iqr = session.iqr_outliers(1.5).unwrap();
        assert_eq!(iqr.len(), 1);
        assert_eq!(iqr[0].id(), "whale");

        assert_eq!(session.statistics().count, 11);
        assert_eq!(session.address_key(), hash_wallet_address("wallet1"));
    }

    #[test]
    fn test_session_sequence_features() {
        let mut session = WalletSession::new("wallet1", 1_000.0).unwrap();
        session.load(&[
            json!({"hash": "c", "value": 40, "timestamp": "2024-01-03"}),
            json!({"hash": "a", "value": 10, "timestamp": "2024-01-01"}),
            json!({"hash": "b", "value": 20, "timestamp": "2024-01-02"}),
        ]);

        assert_eq!(session.value_diffs(), vec![0.0, 10.0, 20.0]);
        assert_eq!(session.value_pct_change(), vec![0.0, 1.0, 1.0]);
        assert_eq!(session.rolling_mean(2).unwrap(), vec![10.0, 15.0, 30.0]);
        assert_eq!(session.rolling_median(3).unwrap(), vec![10.0, 15.0, 20.0]);
        assert_eq!(session.rolling_std(1).unwrap(), vec![0.0; 3]);
        assert!(session.rolling_mean(0).is_err());
        assert!((session.volatility() - 155.555_555_555_555_56).abs() < 1e-9);
        assert!(session.spike_detected(1.0).unwrap());
        assert!(!session.spike_detected(2.0).unwrap());
    }

    proptest! {
        #[test]
        fn prop_anomalies_strictly_above_threshold(
            values in prop::collection::vec(0.0f64..50_000.0, 0..64),
            threshold in 0.0f64..50_000.0,
        ) {
            let txs: Vec<Transaction> = values
                .iter()
                .enumerate()
                .map(|(i, v)| tx(&i.to_string(), *v))
                .collect();
            let threshold = AnomalyThreshold::new(threshold).unwrap();
            let anomalies = detect_anomalies(&txs, threshold);

            prop_assert!(anomalies.iter().all(|a| a.value() > threshold.value()));
            let expected = txs.iter().filter(|t| t.value() > threshold.value()).count();
            prop_assert_eq!(anomalies.len(), expected);
            // subset, in input order
            let ids: Vec<usize> = anomalies.iter().map(|a| a.id().parse().unwrap()).collect();
            prop_assert!(ids.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
