//! Theil-Sen estimator for samples sorted by `x`.
//!
//! The slope is the median of all finite pairwise slopes; pairs sharing an
//! `x` are skipped. The intercept is the median of `y - slope·x`. Both working
//! collections are kept sorted by binary-search insertion as they are built,
//! so the total cost is O(n²) comparisons plus O(n²) insertion moves. Callers
//! bound `n` themselves.

use serde::{Deserialize, Serialize};

use crate::sorted;
use crate::Sample;

/// Robust line `y = slope·x + intercept`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
}

impl LinearFit {
    /// Value of the line at `x`.
    pub fn predict(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }

    fn undefined() -> Self {
        Self {
            slope: f64::NAN,
            intercept: f64::NAN,
        }
    }
}

/// Insert `item` after every element whose key is `<=` its own.
fn insert_sorted<T, K>(collection: &mut Vec<T>, item: T, key: K)
where
    K: Fn(&T) -> f64,
{
    let probe = key(&item);
    let index = collection.partition_point(|existing| key(existing) <= probe);
    collection.insert(index, item);
}

/// Pairwise `(slope, weight)` tuples sorted by slope.
fn pairwise_slopes(samples: &[Sample], weighted: bool) -> Vec<(f64, f64)> {
    let mut slopes = Vec::new();
    for (i, &(x0, y0)) in samples.iter().enumerate() {
        for &(x1, y1) in &samples[i + 1..] {
            let x_delta = x1 - x0;
            let slope = (y1 - y0) / x_delta;
            if !slope.is_finite() {
                continue;
            }
            let weight = if weighted { x_delta.abs() } else { 1.0 };
            insert_sorted(&mut slopes, (slope, weight), |t| t.0);
        }
    }
    slopes
}

fn intercept(samples: &[Sample], slope: f64) -> f64 {
    let mut intercepts = Vec::with_capacity(samples.len());
    for &(x, y) in samples {
        insert_sorted(&mut intercepts, y - slope * x, |v| *v);
    }
    sorted::median(&intercepts)
}

/// Theil-Sen regression.
///
/// Returns `NaN` slope and intercept when fewer than two distinct `x` values
/// are present.
pub fn theil_sen(samples: &[Sample]) -> LinearFit {
    let slopes: Vec<f64> = pairwise_slopes(samples, false)
        .into_iter()
        .map(|(slope, _)| slope)
        .collect();
    if slopes.is_empty() {
        return LinearFit::undefined();
    }
    let slope = sorted::median(&slopes);
    LinearFit {
        slope,
        intercept: intercept(samples, slope),
    }
}

/// Theil-Sen regression with each pairwise slope weighted by `|Δx|`.
///
/// Pairs far apart on the `x` axis dominate, which damps the noise of slopes
/// taken between near-neighbours.
pub fn theil_sen_weighted(samples: &[Sample]) -> LinearFit {
    let slopes = pairwise_slopes(samples, true);
    if slopes.is_empty() {
        return LinearFit::undefined();
    }
    let slope = sorted::weighted_median(&slopes);
    LinearFit {
        slope,
        intercept: intercept(samples, slope),
    }
}
