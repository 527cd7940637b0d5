//! Order-independent descriptive statistics.
//!
//! Variance, standard deviation and covariance use population (`1/n`)
//! normalisation so that `pearson_r` is the plain `cov / (σx·σy)` ratio.

use serde::{Deserialize, Serialize};

use crate::Sample;

/// Least-squares line with its correlation coefficient.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LsqFit {
    pub r: f64,
    pub slope: f64,
    pub intercept: f64,
}

/// Arithmetic mean. `NaN` for an empty sample.
pub fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Smallest value.
///
/// Calling this on an empty sample is a caller error; it returns `+∞`.
pub fn min(values: &[f64]) -> f64 {
    values.iter().copied().fold(f64::INFINITY, f64::min)
}

/// Largest value.
///
/// Calling this on an empty sample is a caller error; it returns `-∞`.
pub fn max(values: &[f64]) -> f64 {
    values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

/// Population variance. `NaN` for an empty sample.
pub fn variance(values: &[f64]) -> f64 {
    let center = mean(values);
    let squares: f64 = values.iter().map(|v| (v - center).powi(2)).sum();
    squares / values.len() as f64
}

/// Population standard deviation. `NaN` for an empty sample.
pub fn stdev(values: &[f64]) -> f64 {
    variance(values).sqrt()
}

fn unzip(samples: &[Sample]) -> (Vec<f64>, Vec<f64>) {
    samples.iter().copied().unzip()
}

/// Population covariance of paired samples.
pub fn covariance(samples: &[Sample]) -> f64 {
    let (xs, ys) = unzip(samples);
    let (x_mean, y_mean) = (mean(&xs), mean(&ys));
    let sum: f64 = samples
        .iter()
        .map(|(x, y)| (x - x_mean) * (y - y_mean))
        .sum();
    sum / samples.len() as f64
}

/// Pearson correlation coefficient. `NaN` when either variable is constant.
pub fn pearson_r(samples: &[Sample]) -> f64 {
    let (xs, ys) = unzip(samples);
    covariance(samples) / (stdev(&xs) * stdev(&ys))
}

/// Ordinary least-squares fit `y = slope·x + intercept`.
pub fn lsq_regression(samples: &[Sample]) -> LsqFit {
    let (xs, ys) = unzip(samples);
    let r = pearson_r(samples);
    let slope = r * (stdev(&ys) / stdev(&xs));
    LsqFit {
        r,
        slope,
        intercept: mean(&ys) - slope * mean(&xs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    #[test]
    fn test_mean_and_extrema() {
        let values = [3.0, 1.0, 4.0, 1.0, 5.0];
        assert!((mean(&values) - 2.8).abs() < EPS);
        assert_eq!(min(&values), 1.0);
        assert_eq!(max(&values), 5.0);
    }

    #[test]
    fn test_empty_sample_sentinels() {
        assert!(mean(&[]).is_nan());
        assert!(variance(&[]).is_nan());
        assert!(stdev(&[]).is_nan());
        assert_eq!(min(&[]), f64::INFINITY);
        assert_eq!(max(&[]), f64::NEG_INFINITY);
    }

    #[test]
    fn test_population_variance() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((variance(&values) - 4.0).abs() < EPS);
        assert!((stdev(&values) - 2.0).abs() < EPS);
    }

    #[test]
    fn test_covariance_and_correlation() {
        let samples = [(1.0, 2.0), (2.0, 4.0), (3.0, 6.0)];
        assert!((covariance(&samples) - 4.0 / 3.0).abs() < EPS);
        assert!((pearson_r(&samples) - 1.0).abs() < EPS);

        let inverse = [(1.0, 3.0), (2.0, 2.0), (3.0, 1.0)];
        assert!((pearson_r(&inverse) + 1.0).abs() < EPS);
    }

    #[test]
    fn test_constant_variable_has_undefined_correlation() {
        let samples = [(1.0, 5.0), (2.0, 5.0), (3.0, 5.0)];
        assert!(pearson_r(&samples).is_nan());
    }

    #[test]
    fn test_lsq_regression_exact_line() {
        let samples: Vec<Sample> = (1..=5).map(|x| (x as f64, 2.0 * x as f64 + 1.0)).collect();
        let fit = lsq_regression(&samples);
        assert!((fit.r - 1.0).abs() < EPS);
        assert!((fit.slope - 2.0).abs() < 1e-9);
        assert!((fit.intercept - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_lsq_regression_noisy() {
        let samples = [(1.0, 1.0), (2.0, 3.0), (3.0, 2.0), (4.0, 4.0)];
        let fit = lsq_regression(&samples);
        // slope = cov / var(x) = 1.0 / 1.25
        assert!((fit.slope - 0.8).abs() < 1e-9);
        assert!((fit.intercept - 0.5).abs() < 1e-9);
        assert!(fit.r > 0.0 && fit.r < 1.0);
    }
}
