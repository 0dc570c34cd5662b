use crate::analysis::{AnomalyThreshold, WalletSession, DEFAULT_ANOMALY_THRESHOLD};
use crate::error::{Error, Result};
use crate::scoring::{RiskScorer, ScoringPolicy};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Analyzer settings supplied by the host, typically as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Transactions strictly above this value are anomalies
    pub anomaly_threshold: f64,
    pub policy: ScoringPolicy,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            anomaly_threshold: DEFAULT_ANOMALY_THRESHOLD,
            policy: ScoringPolicy::default(),
        }
    }
}

impl AnalyzerConfig {
    /// Parse and validate; missing fields take their defaults.
    pub fn from_json_str(contents: &str) -> Result<Self> {
        let config: AnalyzerConfig = serde_json::from_str(contents)
            .map_err(|e| Error::InvalidConfiguration(format!("failed to parse config: {e}")))?;
        config.validate()?;
        info!(
            threshold = config.anomaly_threshold,
            policy = %config.policy.version,
            "loaded analyzer config"
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        AnomalyThreshold::new(self.anomaly_threshold)?;
        self.policy.validate()
    }

    pub fn threshold(&self) -> Result<AnomalyThreshold> {
        AnomalyThreshold::new(self.anomaly_threshold)
    }

    pub fn session(&self, address: impl Into<String>) -> Result<WalletSession> {
        Ok(WalletSession::with_threshold(address, self.threshold()?))
    }

    pub fn scorer(&self) -> Result<RiskScorer> {
        RiskScorer::new(self.policy.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::BoundaryRule;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = AnalyzerConfig::from_json_str("{}").unwrap();
        assert_eq!(config, AnalyzerConfig::default());
        assert_eq!(config.threshold().unwrap().value(), 10_000.0);
    }

    #[test]
    fn test_config_with_policy() {
        let config = AnalyzerConfig::from_json_str(
            r#"{
                "anomaly_threshold": 5000,
                "policy": {
                    "version": "flat-penalty-v1",
                    "weights": {"price": 0.5, "liquidity": 0.3, "flags": 0.2},
                    "flags": {"kind": "flat_penalty", "penalties": {"suspicious": 0.3}},
                    "boundary": "inclusive"
                }
            }"#,
        )
        .unwrap();

        assert_eq!(config.anomaly_threshold, 5000.0);
        assert_eq!(config.policy, ScoringPolicy::flat_penalty_v1());
        assert_eq!(config.scorer().unwrap().policy().boundary, BoundaryRule::Inclusive);
        assert_eq!(config.session("w").unwrap().threshold().value(), 5000.0);
    }

    #[test]
    fn test_invalid_configs() {
        for bad in [
            r#"{"anomaly_threshold": -1}"#,
            r#"{"anomaly_threshold": "high"}"#,
            r#"{"policy": {"version": "v", "weights": {"price": -0.1, "liquidity": 0.4, "flags": 0.2}}}"#,
            r#"{"policy": {"version": ""}}"#,
            "not json",
        ] {
            assert!(matches!(
                AnalyzerConfig::from_json_str(bad),
                Err(Error::InvalidConfiguration(_))
            ));
        }
    }
}
