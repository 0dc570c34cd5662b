use crate::analysis::WalletSession;
use crate::scoring::RiskAssessment;
use crate::{Transaction, ValueSummary};
use serde::Serialize;

/// Read-only snapshot of one wallet's analysis for the host to render or store.
#[derive(Debug, Clone, Serialize)]
pub struct WalletReport {
    pub address: String,
    pub threshold: f64,
    pub transaction_count: usize,
    pub skipped_records: usize,
    pub anomaly_count: usize,
    pub anomalies: Vec<Transaction>,
    pub summary: ValueSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk: Option<RiskAssessment>,
}

impl WalletReport {
    pub fn build(session: &WalletSession, risk: Option<RiskAssessment>) -> Self {
        let anomalies: Vec<Transaction> = session.anomalies().into_iter().cloned().collect();
        Self {
            address: session.address().to_string(),
            threshold: session.threshold().value(),
            transaction_count: session.transactions().len(),
            skipped_records: session.skipped(),
            anomaly_count: anomalies.len(),
            anomalies,
            summary: session.summary(),
            risk,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::{RiskCategory, RiskInputs, RiskScorer};
    use serde_json::json;

    #[test]
    fn test_report_combines_both_branches() {
        let mut session = WalletSession::new("wallet1", 10_000.0).unwrap();
        session.load(&[
            json!({"hash": "a", "value": 5000, "timestamp": "2024-01-01T00:00:00Z"}),
            json!({"hash": "b", "value": 15000, "timestamp": "2024-01-01T00:00:00Z"}),
            json!({"hash": "c", "value": 10000, "timestamp": "2024-01-01T00:00:00Z"}),
            json!({"hash": "d", "value": 1}),
        ]);

        let payload = json!({"price_change": 0.05, "liquidity": 0.9, "flags": ["suspicious"]});
        let risk = RiskScorer::default()
            .assess(&RiskInputs::from_payload(&payload).unwrap())
            .unwrap();

        let report = WalletReport::build(&session, Some(risk));
        assert_eq!(report.transaction_count, 3);
        assert_eq!(report.skipped_records, 1);
        assert_eq!(report.anomaly_count, 1);
        assert_eq!(report.anomalies[0].id(), "b");
        assert_eq!(report.summary.max, 15000.0);
        assert_eq!(report.risk.as_ref().unwrap().category, RiskCategory::Low);

        let encoded = serde_json::to_value(&report).unwrap();
        assert_eq!(encoded["anomalies"][0]["id"], json!("b"));
        assert_eq!(encoded["anomalies"][0]["timestamp"], json!("2024-01-01T00:00:00Z"));
        assert_eq!(encoded["risk"]["score"], json!(0.26));
    }

    #[test]
    fn test_report_without_risk() {
        let session = WalletSession::new("empty", 0.0).unwrap();
        let report = WalletReport::build(&session, None);
        assert_eq!(report.anomaly_count, 0);
        assert_eq!(report.summary, ValueSummary::default());
        assert!(serde_json::to_value(&report).unwrap().get("risk").is_none());
    }
}
