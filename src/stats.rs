//! Descriptive statistics, distribution-based outlier detection and
//! sequence features (rolling windows, step changes, spikes) over plain
//! value series.

use crate::error::{ensure_finite, Error, Result};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ValueStatistics {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    /// Sample standard deviation, 0 for fewer than two values.
    pub stdev: f64,
    pub min: f64,
    pub max: f64,
}

/// Describe a series; empty input yields all zeros.
pub fn describe(values: &[f64]) -> ValueStatistics {
    if values.is_empty() {
        return ValueStatistics::default();
    }

    let count = values.len();
    let sorted = sorted(values);

    ValueStatistics {
        count,
        mean: mean(values),
        median: percentile(&sorted, 50.0),
        stdev: sample_stdev(values),
        min: sorted[0],
        max: sorted[count - 1],
    }
}

/// Indices of values more than `z` population standard deviations from the mean.
pub fn zscore_outliers(values: &[f64], z: f64) -> Result<Vec<usize>> {
    let z = non_negative("z-score cutoff", z)?;
    if values.is_empty() {
        return Ok(Vec::new());
    }

    let mu = mean(values);
    let variance = values.iter().map(|v| (v - mu).powi(2)).sum::<f64>() / values.len() as f64;
    // A flat series has no spread; fall back to unit scale
    let sigma = if variance > 0.0 { variance.sqrt() } else { 1.0 };

    Ok(values
        .iter()
        .enumerate()
        .filter(|(_, v)| ((*v - mu) / sigma).abs() > z)
        .map(|(i, _)| i)
        .collect())
}

/// Indices of values outside `[q1 - k*iqr, q3 + k*iqr]`.
pub fn iqr_outliers(values: &[f64], k: f64) -> Result<Vec<usize>> {
    let k = non_negative("IQR multiplier", k)?;
    if values.is_empty() {
        return Ok(Vec::new());
    }

    let sorted = sorted(values);
    let q1 = percentile(&sorted, 25.0);
    let q3 = percentile(&sorted, 75.0);
    let iqr = q3 - q1;
    let (lower, upper) = (q1 - k * iqr, q3 + k * iqr);

    Ok(values
        .iter()
        .enumerate()
        .filter(|(_, v)| **v < lower || **v > upper)
        .map(|(i, _)| i)
        .collect())
}

/// Trailing-window mean; the first `window - 1` entries use the values seen so far.
pub fn rolling_mean(values: &[f64], window: usize) -> Result<Vec<f64>> {
    rolling(values, window, mean)
}

pub fn rolling_median(values: &[f64], window: usize) -> Result<Vec<f64>> {
    rolling(values, window, |w| percentile(&sorted(w), 50.0))
}

/// Trailing-window sample standard deviation, 0 where a window holds one value.
pub fn rolling_std(values: &[f64], window: usize) -> Result<Vec<f64>> {
    rolling(values, window, sample_stdev)
}

/// Mean of each complete window; empty when the series is shorter than `window`.
pub fn moving_average(values: &[f64], window: usize) -> Result<Vec<f64>> {
    check_window(window)?;
    Ok(values.windows(window).map(mean).collect())
}

/// Step from the previous value; the first entry is 0.
pub fn diffs(values: &[f64]) -> Vec<f64> {
    steps(values, |prev, cur| cur - prev)
}

/// Relative change from the previous value; the first entry is 0, as is any
/// change from a previous value of 0.
pub fn pct_change(values: &[f64]) -> Vec<f64> {
    steps(values, |prev, cur| {
        let change = cur / prev - 1.0;
        if change.is_finite() {
            change
        } else {
            0.0
        }
    })
}

/// Population variance; 0 for an empty series.
pub fn volatility(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mu = mean(values);
    values.iter().map(|v| (v - mu).powi(2)).sum::<f64>() / values.len() as f64
}

/// Whether the last absolute step exceeds `factor` times the average step.
///
/// Fewer than three values never spike.
pub fn detect_spike(values: &[f64], factor: f64) -> Result<bool> {
    let factor = non_negative("spike factor", factor)?;
    if values.len() < 3 {
        return Ok(false);
    }

    let steps: Vec<f64> = values.windows(2).map(|w| (w[1] - w[0]).abs()).collect();
    let last = steps[steps.len() - 1];
    Ok(last > mean(&steps) * factor)
}

fn rolling(values: &[f64], window: usize, stat: impl Fn(&[f64]) -> f64) -> Result<Vec<f64>> {
    check_window(window)?;
    Ok((0..values.len())
        .map(|end| stat(&values[(end + 1).saturating_sub(window)..=end]))
        .collect())
}

fn steps(values: &[f64], step: impl Fn(f64, f64) -> f64) -> Vec<f64> {
    let Some(first) = values.first() else {
        return Vec::new();
    };
    let mut out = Vec::with_capacity(values.len());
    out.push(0.0);
    let mut prev = *first;
    for &cur in &values[1..] {
        out.push(step(prev, cur));
        prev = cur;
    }
    out
}

fn check_window(window: usize) -> Result<()> {
    if window == 0 {
        return Err(Error::InvalidConfiguration(
            "window size must be at least 1".to_string(),
        ));
    }
    Ok(())
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn sample_stdev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mu = mean(values);
    let sq_diff: f64 = values.iter().map(|v| (v - mu).powi(2)).sum();
    (sq_diff / (values.len() - 1) as f64).sqrt()
}

fn sorted(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted
}

/// Linear interpolation between closest ranks. `sorted` must be non-empty.
fn percentile(sorted: &[f64], pct: f64) -> f64 {
    let rank = pct / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
}

fn non_negative(name: &str, value: f64) -> Result<f64> {
    let value = ensure_finite(name, value)
        .map_err(|_| Error::InvalidConfiguration(format!("{name} must be finite")))?;
    if value < 0.0 {
        return Err(Error::InvalidConfiguration(format!(
            "{name} must be >= 0, got {value}"
        )));
    }
    Ok(value)
}
