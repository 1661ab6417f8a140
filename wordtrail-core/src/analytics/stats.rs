//! Statistical analysis over bucket series
//!
//! Every function here is pure: it takes an ordered series and returns a
//! derived result. Insufficient input never errors; it yields a
//! zero-confidence result, an empty set or `None`.
//!
//! | Analysis | Minimum samples |
//! |----------|-----------------|
//! | [`trend_for`] | 7 |
//! | [`correlations`] | 10 |
//! | [`seasonal_bias`] | 14 |

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use super::metric::Metric;

/// Samples required before a trend is reported.
pub const MIN_TREND_SAMPLES: usize = 7;
/// Samples required before correlations are computed.
pub const MIN_CORRELATION_SAMPLES: usize = 10;
/// Samples required before seasonal bias is reported.
pub const MIN_SEASONAL_SAMPLES: usize = 14;
/// Trailing samples averaged for predictions.
pub const PREDICTION_WINDOW: usize = 14;

/// Slope magnitude below which a series counts as flat.
const STABLE_SLOPE: f64 = 0.1;
/// Relative difference between weekday and weekend means that counts as bias.
const SEASONAL_THRESHOLD: f64 = 1.2;
const MAX_SEASONAL_CONFIDENCE: u8 = 90;

// ============================================
// Trend
// ============================================

/// Direction of a fitted trend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
}

/// Strength bucket for a trend's percent change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendStrength {
    Weak,
    Moderate,
    Strong,
}

impl TrendStrength {
    /// `|percent_change|` of 25% or more is strong, 10% or more moderate.
    pub fn from_percent_change(percent_change: f64) -> Self {
        let magnitude = percent_change.abs();
        if magnitude >= 25.0 {
            TrendStrength::Strong
        } else if magnitude >= 10.0 {
            TrendStrength::Moderate
        } else {
            TrendStrength::Weak
        }
    }
}

/// Linear trend over a series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendResult {
    pub direction: TrendDirection,
    pub strength: TrendStrength,
    /// `(last - first) / |first| * 100`, 0 when `first == 0`
    pub percent_change: f64,
    /// `round(R² * 100)`
    pub confidence: u8,
    pub sample_size: usize,
}

impl TrendResult {
    /// Zero-confidence result for series that are too short.
    pub fn insufficient(sample_size: usize) -> Self {
        Self {
            direction: TrendDirection::Stable,
            strength: TrendStrength::Weak,
            percent_change: 0.0,
            confidence: 0,
            sample_size,
        }
    }

    /// Whether the series was too short to fit.
    pub fn is_insufficient(&self) -> bool {
        self.sample_size < MIN_TREND_SAMPLES
    }
}

/// Ordinary least-squares fit of value against index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
}

/// Fit `series[i]` against `i`. `None` for fewer than two samples.
///
/// A perfectly flat series has no variance to explain; it is reported with
/// `r_squared = 1.0` since the fitted line matches it exactly.
pub fn linear_regression(series: &[f64]) -> Option<LinearFit> {
    let n = series.len();
    if n < 2 {
        return None;
    }

    let n_f = n as f64;
    let mean_x = (n_f - 1.0) / 2.0;
    let mean_y = mean(series);

    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for (i, &y) in series.iter().enumerate() {
        let dx = i as f64 - mean_x;
        sxx += dx * dx;
        sxy += dx * (y - mean_y);
    }

    let slope = sxy / sxx;
    let intercept = mean_y - slope * mean_x;

    let mut ss_res = 0.0;
    let mut ss_tot = 0.0;
    for (i, &y) in series.iter().enumerate() {
        let predicted = intercept + slope * i as f64;
        ss_res += (y - predicted).powi(2);
        ss_tot += (y - mean_y).powi(2);
    }

    let r_squared = if ss_tot == 0.0 {
        1.0
    } else {
        (1.0 - ss_res / ss_tot).clamp(0.0, 1.0)
    };

    Some(LinearFit {
        slope,
        intercept,
        r_squared,
    })
}

/// Percent change from the first to the last sample.
pub fn percent_change(series: &[f64]) -> f64 {
    match (series.first(), series.last()) {
        (Some(&first), Some(&last)) if first != 0.0 => (last - first) / first.abs() * 100.0,
        _ => 0.0,
    }
}

/// Fit a linear trend. Needs at least [`MIN_TREND_SAMPLES`] samples.
pub fn trend_for(series: &[f64]) -> TrendResult {
    if series.len() < MIN_TREND_SAMPLES {
        return TrendResult::insufficient(series.len());
    }
    let Some(fit) = linear_regression(series) else {
        return TrendResult::insufficient(series.len());
    };

    let direction = if fit.slope.abs() < STABLE_SLOPE {
        TrendDirection::Stable
    } else if fit.slope > 0.0 {
        TrendDirection::Increasing
    } else {
        TrendDirection::Decreasing
    };

    let percent_change = percent_change(series);

    TrendResult {
        direction,
        strength: TrendStrength::from_percent_change(percent_change),
        percent_change,
        confidence: to_percent(fit.r_squared),
        sample_size: series.len(),
    }
}

// ============================================
// Prediction
// ============================================

/// Short-horizon projection of a daily series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prediction {
    /// Projected total over the next 7 samples
    pub next_week: u64,
    /// Projected total over the next 30 samples
    pub next_month: u64,
    /// At least 30, otherwise the recent trend's confidence
    pub confidence: u8,
}

/// Project the next week and month from the recent moving average.
///
/// The average of the last [`PREDICTION_WINDOW`] samples is scaled by 1.1
/// when that window trends up and by 0.9 when it trends down.
pub fn predict(series: &[f64]) -> Prediction {
    let window = &series[series.len().saturating_sub(PREDICTION_WINDOW)..];
    let average = mean(window);
    let recent = trend_for(window);

    let multiplier = match recent.direction {
        TrendDirection::Increasing => 1.1,
        TrendDirection::Decreasing => 0.9,
        TrendDirection::Stable => 1.0,
    };

    Prediction {
        next_week: (average * 7.0 * multiplier).round().max(0.0) as u64,
        next_month: (average * 30.0 * multiplier).round().max(0.0) as u64,
        confidence: recent.confidence.max(30),
    }
}

// ============================================
// Correlation
// ============================================

/// Strength category for a correlation coefficient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationStrength {
    Negligible,
    Weak,
    Moderate,
    Strong,
}

impl CorrelationStrength {
    /// Categorize `|coefficient|` at 0.2 / 0.4 / 0.7.
    pub fn from_coefficient(coefficient: f64) -> Self {
        let magnitude = coefficient.abs();
        if magnitude >= 0.7 {
            CorrelationStrength::Strong
        } else if magnitude >= 0.4 {
            CorrelationStrength::Moderate
        } else if magnitude >= 0.2 {
            CorrelationStrength::Weak
        } else {
            CorrelationStrength::Negligible
        }
    }
}

/// Pairwise correlation between two metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationResult {
    pub metric_a: Metric,
    pub metric_b: Metric,
    /// Pearson coefficient in [-1, 1]
    pub coefficient: f64,
    pub strength: CorrelationStrength,
    /// `|coefficient|` weighted by sample adequacy (30 samples is full weight)
    pub significance: u8,
}

/// Pearson correlation coefficient.
///
/// Uses the common prefix when lengths differ. Returns 0 when either series
/// has zero variance instead of NaN.
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().min(y.len());
    if n == 0 {
        return 0.0;
    }
    let (x, y) = (&x[..n], &y[..n]);
    let mean_x = mean(x);
    let mean_y = mean(y);

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (&a, &b) in x.iter().zip(y) {
        let dx = a - mean_x;
        let dy = b - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    let denominator = (var_x * var_y).sqrt();
    if denominator == 0.0 || !denominator.is_finite() {
        return 0.0;
    }
    (cov / denominator).clamp(-1.0, 1.0)
}

/// Correlate every pair of metric series.
///
/// Empty when the shortest series has fewer than
/// [`MIN_CORRELATION_SAMPLES`] samples.
pub fn correlations(series: &[(Metric, Vec<f64>)]) -> Vec<CorrelationResult> {
    let samples = series.iter().map(|(_, s)| s.len()).min().unwrap_or(0);
    if samples < MIN_CORRELATION_SAMPLES {
        return Vec::new();
    }

    let adequacy = (samples as f64 / 30.0).min(1.0);
    let mut results = Vec::new();
    for (i, (metric_a, a)) in series.iter().enumerate() {
        for (metric_b, b) in &series[i + 1..] {
            let coefficient = pearson(a, b);
            results.push(CorrelationResult {
                metric_a: *metric_a,
                metric_b: *metric_b,
                coefficient,
                strength: CorrelationStrength::from_coefficient(coefficient),
                significance: to_percent(coefficient.abs() * adequacy),
            });
        }
    }
    results
}

// ============================================
// Seasonal bias
// ============================================

/// Which part of the week carries more activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeasonalBias {
    Weekday,
    Weekend,
}

/// A detected weekday/weekend imbalance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalPattern {
    pub bias: SeasonalBias,
    pub weekday_mean: f64,
    pub weekend_mean: f64,
    /// Grows with the ratio of the two means, capped at 90
    pub confidence: u8,
    pub sample_size: usize,
}

fn is_weekend(day: NaiveDate) -> bool {
    matches!(day.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Compare mean weekday (Mon–Fri) and weekend values.
///
/// Reports a bias when one mean is at least 20% above the other. Needs
/// [`MIN_SEASONAL_SAMPLES`] samples so both parts of the week are present.
pub fn seasonal_bias(series: &[(NaiveDate, f64)]) -> Option<SeasonalPattern> {
    if series.len() < MIN_SEASONAL_SAMPLES {
        return None;
    }

    let (weekend, weekday): (Vec<_>, Vec<_>) =
        series.iter().partition(|(day, _)| is_weekend(*day));
    if weekday.is_empty() || weekend.is_empty() {
        return None;
    }

    let weekday_mean = mean(&weekday.iter().map(|(_, v)| *v).collect::<Vec<_>>());
    let weekend_mean = mean(&weekend.iter().map(|(_, v)| *v).collect::<Vec<_>>());

    let (bias, high, low) = if weekday_mean >= weekend_mean {
        (SeasonalBias::Weekday, weekday_mean, weekend_mean)
    } else {
        (SeasonalBias::Weekend, weekend_mean, weekday_mean)
    };

    if high <= 0.0 || high < low * SEASONAL_THRESHOLD {
        return None;
    }

    let confidence = if low <= 0.0 {
        MAX_SEASONAL_CONFIDENCE
    } else {
        let ratio = high / low;
        (((ratio - 1.0) * 100.0).round() as u64).min(u64::from(MAX_SEASONAL_CONFIDENCE)) as u8
    };

    Some(SeasonalPattern {
        bias,
        weekday_mean,
        weekend_mean,
        confidence,
        sample_size: series.len(),
    })
}

// ============================================
// Consistency
// ============================================

/// `round(max(0, 1 - min(1, stddev / mean)) * 100)`.
///
/// A zero mean counts as the worst case and scores 0.
pub fn consistency_score(series: &[f64]) -> u8 {
    let mean = mean(series);
    if series.is_empty() || mean <= 0.0 {
        return 0;
    }
    let variation = (std_dev(series) / mean).min(1.0);
    to_percent((1.0 - variation).max(0.0))
}

// ============================================
// Helpers
// ============================================

/// Arithmetic mean, 0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Population standard deviation, 0 for an empty slice.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Map a [0, 1] fraction onto a rounded 0–100 score.
fn to_percent(fraction: f64) -> u8 {
    (fraction.clamp(0.0, 1.0) * 100.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_perfect_linear_trend() {
        let trend = trend_for(&[10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0]);
        assert_eq!(trend.direction, TrendDirection::Increasing);
        assert_eq!(trend.confidence, 100);
        assert_eq!(trend.strength, TrendStrength::Strong);
        assert_eq!(trend.percent_change, 600.0);
        assert_eq!(trend.sample_size, 7);
    }

    #[test]
    fn test_decreasing_and_stable_trends() {
        let down = trend_for(&[70.0, 60.0, 50.0, 40.0, 30.0, 20.0, 10.0]);
        assert_eq!(down.direction, TrendDirection::Decreasing);

        let flat = trend_for(&[5.0; 10]);
        assert_eq!(flat.direction, TrendDirection::Stable);
        assert_eq!(flat.percent_change, 0.0);
        assert_eq!(flat.strength, TrendStrength::Weak);
    }

    #[test]
    fn test_short_series_is_insufficient() {
        let trend = trend_for(&[1.0, 2.0, 3.0]);
        assert!(trend.is_insufficient());
        assert_eq!(trend.confidence, 0);
        assert_eq!(trend.direction, TrendDirection::Stable);
    }

    #[test]
    fn test_percent_change_guards_zero_start() {
        assert_eq!(percent_change(&[0.0, 10.0]), 0.0);
        assert_eq!(percent_change(&[-10.0, 10.0]), 200.0);
        assert_eq!(TrendStrength::from_percent_change(-12.0), TrendStrength::Moderate);
    }

    #[test]
    fn test_prediction_scales_with_recent_trend() {
        // Flat window: no adjustment, confidence floor of 30 does not apply (R² = 1)
        let flat = predict(&[10.0; 20]);
        assert_eq!(flat.next_week, 70);
        assert_eq!(flat.next_month, 300);
        assert_eq!(flat.confidence, 100);

        // Rising window: mean of 1..=14 is 7.5, boosted by 10%
        let rising: Vec<f64> = (1..=14i32).map(f64::from).collect();
        let p = predict(&rising);
        assert_eq!(p.next_week, 58); // 7.5 * 7 * 1.1 = 57.75
        assert_eq!(p.next_month, 248); // 7.5 * 30 * 1.1 = 247.5

        let empty = predict(&[]);
        assert_eq!(empty.next_week, 0);
        assert_eq!(empty.confidence, 30);
    }

    #[test]
    fn test_pearson_bounds() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert!((pearson(&x, &x) - 1.0).abs() < 1e-12);

        let inverse = [5.0, 4.0, 3.0, 2.0, 1.0];
        assert!((pearson(&x, &inverse) + 1.0).abs() < 1e-12);

        let constant = [3.0; 5];
        assert_eq!(pearson(&x, &constant), 0.0);
        assert_eq!(pearson(&[], &[]), 0.0);

        let noisy = [2.0, 9.0, 1.0, 7.0, 3.0];
        let r = pearson(&x, &noisy);
        assert!((-1.0..=1.0).contains(&r));
    }

    #[test]
    fn test_correlations_need_ten_samples() {
        let short = vec![
            (Metric::Words, vec![1.0; 9]),
            (Metric::Files, vec![2.0; 9]),
        ];
        assert!(correlations(&short).is_empty());

        let words: Vec<f64> = (0..30i32).map(|i| f64::from(i) * 3.0).collect();
        let files: Vec<f64> = (0..30i32).map(f64::from).collect();
        let avg: Vec<f64> = (0..30i32).map(|i| f64::from(30 - i)).collect();
        let results = correlations(&[
            (Metric::Words, words),
            (Metric::Files, files),
            (Metric::AverageWords, avg),
        ]);

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].metric_a, Metric::Words);
        assert_eq!(results[0].metric_b, Metric::Files);
        assert_eq!(results[0].strength, CorrelationStrength::Strong);
        assert_eq!(results[0].significance, 100);
        assert!(results[1].coefficient < -0.99);
    }

    #[test]
    fn test_weekday_bias_detected() {
        // 2024-01-01 is a Monday; two full weeks
        let series: Vec<(NaiveDate, f64)> = (0..14)
            .map(|i| {
                let d = day(2024, 1, 1) + chrono::Duration::days(i);
                let v = if is_weekend(d) { 100.0 } else { 150.0 };
                (d, v)
            })
            .collect();

        let pattern = seasonal_bias(&series).expect("bias expected");
        assert_eq!(pattern.bias, SeasonalBias::Weekday);
        assert_eq!(pattern.confidence, 50);
        assert_eq!(pattern.weekday_mean, 150.0);
    }

    #[test]
    fn test_weekend_bias_is_capped() {
        let series: Vec<(NaiveDate, f64)> = (0..21)
            .map(|i| {
                let d = day(2024, 1, 1) + chrono::Duration::days(i);
                let v = if is_weekend(d) { 500.0 } else { 10.0 };
                (d, v)
            })
            .collect();

        let pattern = seasonal_bias(&series).expect("bias expected");
        assert_eq!(pattern.bias, SeasonalBias::Weekend);
        assert_eq!(pattern.confidence, 90);
    }

    #[test]
    fn test_no_bias_when_balanced_or_short() {
        let balanced: Vec<(NaiveDate, f64)> = (0..14)
            .map(|i| (day(2024, 1, 1) + chrono::Duration::days(i), 100.0))
            .collect();
        assert!(seasonal_bias(&balanced).is_none());
        assert!(seasonal_bias(&balanced[..10]).is_none());
    }

    #[test]
    fn test_consistency_score() {
        assert_eq!(consistency_score(&[10.0, 10.0, 10.0]), 100);
        assert_eq!(consistency_score(&[0.0, 0.0]), 0);
        assert_eq!(consistency_score(&[]), 0);
        // mean 10, population stddev 5 -> cv 0.5
        assert_eq!(consistency_score(&[5.0, 15.0, 5.0, 15.0]), 50);
        // cv above 1 floors at 0
        assert_eq!(consistency_score(&[0.0, 0.0, 0.0, 40.0]), 0);
    }
}
