//! Token risk scoring: weighted price, liquidity and flag signals combined
//! into a bounded score and mapped to a category.

use crate::error::{ensure_finite, Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::debug;

pub const DEFAULT_FLAG_INDICATOR: &str = "suspicious";

/// Flag recorded for each alert when a payload only carries an alert count.
pub const ALERT_FLAG: &str = "alert";

const MAX_ALERT_COUNT: u64 = 10_000;

/// Per-signal weights. The formula is additive, so they need not sum to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskWeights {
    pub price: f64,
    pub liquidity: f64,
    pub flags: f64,
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            price: 0.4,
            liquidity: 0.4,
            flags: 0.2,
        }
    }
}

impl RiskWeights {
    pub fn new(price: f64, liquidity: f64, flags: f64) -> Result<Self> {
        let weights = Self {
            price,
            liquidity,
            flags,
        };
        weights.validate()?;
        Ok(weights)
    }

    /// Parse a `{"price": .., "liquidity": .., "flags": ..}` object.
    ///
    /// All three keys are required, unknown keys are rejected.
    pub fn from_json(raw: &Value) -> Result<Self> {
        let fields = raw.as_object().ok_or_else(|| {
            Error::InvalidConfiguration(format!("weights must be an object, got {raw}"))
        })?;

        if let Some(unknown) = fields
            .keys()
            .find(|k| !matches!(k.as_str(), "price" | "liquidity" | "flags"))
        {
            return Err(Error::InvalidConfiguration(format!(
                "unknown weight key '{unknown}'"
            )));
        }

        let weight = |key: &str| -> Result<f64> {
            match fields.get(key) {
                Some(v) => v.as_f64().ok_or_else(|| {
                    Error::InvalidConfiguration(format!("weight '{key}' is not numeric: {v}"))
                }),
                None => Err(Error::InvalidConfiguration(format!(
                    "missing weight '{key}'"
                ))),
            }
        };

        Self::new(weight("price")?, weight("liquidity")?, weight("flags")?)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("price", self.price),
            ("liquidity", self.liquidity),
            ("flags", self.flags),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::InvalidConfiguration(format!(
                    "weight '{name}' must be a non-negative number, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// How the flag list turns into a component in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FlagPolicy {
    /// Share of flags equal to `indicator`.
    Fractional { indicator: String },
    /// Sum of the penalties of each distinct flag present, capped at 1.
    FlatPenalty { penalties: BTreeMap<String, f64> },
    /// `n / (n + 1)` for `n` raised flags.
    AlertCount,
}

impl Default for FlagPolicy {
    fn default() -> Self {
        FlagPolicy::Fractional {
            indicator: DEFAULT_FLAG_INDICATOR.to_string(),
        }
    }
}

impl FlagPolicy {
    pub fn component<S: AsRef<str>>(&self, flags: &[S]) -> f64 {
        if flags.is_empty() {
            return 0.0;
        }
        match self {
            FlagPolicy::Fractional { indicator } => {
                let hits = flags.iter().filter(|f| f.as_ref() == indicator.as_str()).count();
                hits as f64 / flags.len() as f64
            }
            FlagPolicy::FlatPenalty { penalties } => {
                let distinct: BTreeSet<&str> = flags.iter().map(|f| f.as_ref()).collect();
                let total: f64 = distinct.iter().filter_map(|f| penalties.get(*f)).sum();
                total.min(1.0)
            }
            FlagPolicy::AlertCount => {
                let n = flags.len() as f64;
                n / (n + 1.0)
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if let FlagPolicy::FlatPenalty { penalties } = self {
            if let Some((flag, penalty)) = penalties
                .iter()
                .find(|(_, p)| !p.is_finite() || **p < 0.0)
            {
                return Err(Error::InvalidConfiguration(format!(
                    "penalty for flag '{flag}' must be a non-negative number, got {penalty}"
                )));
            }
        }
        Ok(())
    }
}

/// Whether a score equal to a category bound falls into the higher category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryRule {
    /// `score > bound`
    #[default]
    Exclusive,
    /// `score >= bound`
    Inclusive,
}

impl BoundaryRule {
    fn exceeds(self, score: f64, bound: f64) -> bool {
        match self {
            BoundaryRule::Exclusive => score > bound,
            BoundaryRule::Inclusive => score >= bound,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskCategory {
    #[serde(rename = "Low Risk")]
    Low,
    #[serde(rename = "Moderate Risk")]
    Moderate,
    #[serde(rename = "High Risk")]
    High,
}

impl RiskCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskCategory::Low => "Low Risk",
            RiskCategory::Moderate => "Moderate Risk",
            RiskCategory::High => "High Risk",
        }
    }
}

impl fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named, versioned scoring variant: weights, flag treatment and
/// category bounds. Serialized form is stable and fingerprinted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringPolicy {
    pub version: String,
    #[serde(default)]
    pub weights: RiskWeights,
    #[serde(default)]
    pub flags: FlagPolicy,
    #[serde(default)]
    pub boundary: BoundaryRule,
    #[serde(default = "default_high_bound")]
    pub high_bound: f64,
    #[serde(default = "default_moderate_bound")]
    pub moderate_bound: f64,
}

fn default_high_bound() -> f64 {
    0.8
}

fn default_moderate_bound() -> f64 {
    0.5
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self::fractional_v1()
    }
}

impl ScoringPolicy {
    /// Fraction-of-"suspicious" flags, 0.4/0.4/0.2 weights, exclusive bounds.
    pub fn fractional_v1() -> Self {
        Self {
            version: "fractional-v1".to_string(),
            weights: RiskWeights::default(),
            flags: FlagPolicy::default(),
            boundary: BoundaryRule::Exclusive,
            high_bound: default_high_bound(),
            moderate_bound: default_moderate_bound(),
        }
    }

    /// Flat 0.3 penalty for a "suspicious" flag, 0.5/0.3/0.2 weights, inclusive bounds.
    pub fn flat_penalty_v1() -> Self {
        Self {
            version: "flat-penalty-v1".to_string(),
            weights: RiskWeights {
                price: 0.5,
                liquidity: 0.3,
                flags: 0.2,
            },
            flags: FlagPolicy::FlatPenalty {
                penalties: BTreeMap::from([(DEFAULT_FLAG_INDICATOR.to_string(), 0.3)]),
            },
            boundary: BoundaryRule::Inclusive,
            high_bound: default_high_bound(),
            moderate_bound: default_moderate_bound(),
        }
    }

    /// Saturating alert count, 0.5/0.3/0.2 weights, exclusive bounds.
    pub fn alert_count_v1() -> Self {
        Self {
            version: "alert-count-v1".to_string(),
            weights: RiskWeights {
                price: 0.5,
                liquidity: 0.3,
                flags: 0.2,
            },
            flags: FlagPolicy::AlertCount,
            boundary: BoundaryRule::Exclusive,
            high_bound: default_high_bound(),
            moderate_bound: default_moderate_bound(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.version.trim().is_empty() {
            return Err(Error::InvalidConfiguration(
                "scoring policy needs a version".to_string(),
            ));
        }
        self.weights.validate()?;
        self.flags.validate()?;
        let bounds_ok = (0.0..=1.0).contains(&self.moderate_bound)
            && (0.0..=1.0).contains(&self.high_bound)
            && self.moderate_bound <= self.high_bound;
        if !bounds_ok {
            return Err(Error::InvalidConfiguration(format!(
                "category bounds must satisfy 0 <= moderate ({}) <= high ({}) <= 1",
                self.moderate_bound, self.high_bound
            )));
        }
        Ok(())
    }

    /// SHA-256 of the policy's JSON form; equal fingerprints score identically.
    pub fn fingerprint(&self) -> Result<String> {
        let encoded = serde_json::to_vec(self)
            .map_err(|e| Error::InvalidConfiguration(format!("unencodable policy: {e}")))?;
        let mut hasher = Sha256::new();
        hasher.update(&encoded);
        Ok(format!("{:x}", hasher.finalize()))
    }

    pub fn classify(&self, score: f64) -> RiskCategory {
        if self.boundary.exceeds(score, self.high_bound) {
            RiskCategory::High
        } else if self.boundary.exceeds(score, self.moderate_bound) {
            RiskCategory::Moderate
        } else {
            RiskCategory::Low
        }
    }
}

/// Signals for one token.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RiskInputs {
    /// Signed fractional price move; 0.05 is +5%.
    pub price_change: f64,
    /// Normalized liquidity, nominally in `[0, 1]`.
    pub liquidity: f64,
    #[serde(default)]
    pub flags: Vec<String>,
    /// Overrides the policy weights when set.
    #[serde(default)]
    pub weights: Option<RiskWeights>,
}

impl RiskInputs {
    pub fn new(price_change: f64, liquidity: f64, flags: Vec<String>) -> Self {
        Self {
            price_change,
            liquidity,
            flags,
            weights: None,
        }
    }

    pub fn with_weights(mut self, weights: RiskWeights) -> Self {
        self.weights = Some(weights);
        self
    }

    /// Read signals from a fetched token payload.
    ///
    /// Missing fields default to no price change, full liquidity and no flags.
    /// Without a `flags` list, an integer `alert_flags` count becomes that
    /// many [`ALERT_FLAG`] entries.
    pub fn from_payload(payload: &Value) -> Result<Self> {
        let number = |key: &str, default: f64| -> Result<f64> {
            match payload.get(key) {
                None | Some(Value::Null) => Ok(default),
                Some(v) => v
                    .as_f64()
                    .ok_or_else(|| Error::InvalidInput(format!("'{key}' is not numeric: {v}"))),
            }
        };

        let flags = match payload.get("flags") {
            None | Some(Value::Null) => alert_flags(payload)?,
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str().map(str::to_string).ok_or_else(|| {
                        Error::InvalidInput(format!("flag is not a string: {item}"))
                    })
                })
                .collect::<Result<Vec<_>>>()?,
            Some(other) => {
                return Err(Error::InvalidInput(format!(
                    "'flags' must be a list, got {other}"
                )))
            }
        };

        let weights = match payload.get("weights") {
            None | Some(Value::Null) => None,
            Some(raw) => Some(RiskWeights::from_json(raw)?),
        };

        Ok(Self {
            price_change: number("price_change", 0.0)?,
            liquidity: number("liquidity", 1.0)?,
            flags,
            weights,
        })
    }
}

fn alert_flags(payload: &Value) -> Result<Vec<String>> {
    let count = match payload.get("alert_flags") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(raw) => raw.as_u64().ok_or_else(|| {
            Error::InvalidInput(format!("'alert_flags' must be a non-negative integer: {raw}"))
        })?,
    };
    if count > MAX_ALERT_COUNT {
        return Err(Error::InvalidInput(format!(
            "'alert_flags' of {count} exceeds {MAX_ALERT_COUNT}"
        )));
    }
    Ok(vec![ALERT_FLAG.to_string(); count as usize])
}

/// Intermediate terms of one score computation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RiskBreakdown {
    pub price: f64,
    pub illiquidity: f64,
    pub flags: f64,
    /// Weighted sum before clamping.
    pub raw: f64,
    /// Clamped to `[0, 1]` and rounded to two decimals.
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskAssessment {
    pub score: f64,
    pub category: RiskCategory,
    pub policy_version: String,
}

/// Scores risk inputs under a fixed, validated policy.
#[derive(Debug, Clone, Default)]
pub struct RiskScorer {
    policy: ScoringPolicy,
}

impl RiskScorer {
    pub fn new(policy: ScoringPolicy) -> Result<Self> {
        policy.validate()?;
        Ok(Self { policy })
    }

    pub fn policy(&self) -> &ScoringPolicy {
        &self.policy
    }

    pub fn breakdown(&self, inputs: &RiskInputs) -> Result<RiskBreakdown> {
        let price_change = ensure_finite("price_change", inputs.price_change)?;
        let liquidity = ensure_finite("liquidity", inputs.liquidity)?;
        let weights = match &inputs.weights {
            Some(w) => {
                w.validate()?;
                *w
            }
            None => self.policy.weights,
        };

        let price = price_change.abs().min(1.0);
        let illiquidity = 1.0 - liquidity.clamp(0.0, 1.0);
        let flags = self.policy.flags.component(&inputs.flags);

        let raw = price * weights.price + illiquidity * weights.liquidity + flags * weights.flags;
        let score = round2(raw.clamp(0.0, 1.0));

        debug!(
            policy = %self.policy.version,
            price, illiquidity, flags, raw, score,
            "calculated risk score"
        );

        Ok(RiskBreakdown {
            price,
            illiquidity,
            flags,
            raw,
            score,
        })
    }

    pub fn score(&self, inputs: &RiskInputs) -> Result<f64> {
        Ok(self.breakdown(inputs)?.score)
    }

    pub fn classify(&self, score: f64) -> RiskCategory {
        self.policy.classify(score)
    }

    pub fn assess(&self, inputs: &RiskInputs) -> Result<RiskAssessment> {
        let score = self.score(inputs)?;
        Ok(RiskAssessment {
            score,
            category: self.classify(score),
            policy_version: self.policy.version.clone(),
        })
    }
}

/// Score under the default policy, optionally overriding its weights.
pub fn score<S: AsRef<str>>(
    price_change: f64,
    liquidity: f64,
    flags: &[S],
    weights: Option<RiskWeights>,
) -> Result<f64> {
    let inputs = RiskInputs {
        price_change,
        liquidity,
        flags: flags.iter().map(|f| f.as_ref().to_string()).collect(),
        weights,
    };
    RiskScorer::default().score(&inputs)
}

/// Category under the default (exclusive) bounds.
pub fn classify(score: f64) -> RiskCategory {
    ScoringPolicy::default().classify(score)
}

/// Two decimals, ties to even on the exact binary value.
fn round2(value: f64) -> f64 {
    format!("{value:.2}").parse().unwrap_or(value)
}
