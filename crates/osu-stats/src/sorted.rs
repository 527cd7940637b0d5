//! Fast paths for ascending-sorted samples.
//!
//! Every function here trusts its input to be sorted ascending (by value, or
//! by the first tuple element for weighted input). Unsorted input is not
//! detected and gives meaningless results.

use crate::descriptive;

/// First element. `NaN` when empty.
pub fn min(values: &[f64]) -> f64 {
    values.first().copied().unwrap_or(f64::NAN)
}

/// Last element. `NaN` when empty.
pub fn max(values: &[f64]) -> f64 {
    values.last().copied().unwrap_or(f64::NAN)
}

/// Median; even-length samples average the two central elements.
pub fn median(values: &[f64]) -> f64 {
    let count = values.len();
    if count == 0 {
        return f64::NAN;
    }
    let half = count / 2;
    if count % 2 == 1 {
        values[half]
    } else {
        (values[half - 1] + values[half]) / 2.0
    }
}

/// Lower and upper quartile as `[median(lower half), median(upper half)]`.
///
/// Halves have `floor(n / 2)` elements each, so an odd sample leaves its
/// middle element out of both.
pub fn iqr(values: &[f64]) -> [f64; 2] {
    let count = values.len();
    if count == 1 {
        return [values[0], values[0]];
    }
    let half = count / 2;
    [median(&values[..half]), median(&values[count - half..])]
}

/// Interquartile mean.
///
/// The lowest and highest quarter are trimmed. When the count is not a
/// multiple of four, the two boundary elements of the kept range count with
/// weight `1 - (n % 4) / 4`, which makes the result vary continuously as
/// samples are added.
pub fn iqm(values: &[f64]) -> f64 {
    let count = values.len();
    if count == 1 {
        return values[0];
    }

    let modulus = count % 4;
    let outer = count / 4;
    let kept = &values[outer..count - outer];
    if modulus == 0 {
        return descriptive::mean(kept);
    }

    let limit_weight = 1.0 - modulus as f64 / 4.0;
    let total_weight = count as f64 - (2 * outer) as f64 - modulus as f64 / 2.0;

    let (first, last) = (kept[0], kept[kept.len() - 1]);
    let inner: f64 = kept[1..kept.len() - 1].iter().sum();
    (inner + (first + last) * limit_weight) / total_weight
}

/// Weighted median of `(value, weight)` pairs sorted by value.
///
/// Weight is accumulated left to right. The first element whose left and
/// right partitions both hold at most half the total weight is the answer;
/// when that element closes the lower half exactly, the result is the mean of
/// it and its right neighbour. `NaN` when empty.
pub fn weighted_median(values: &[(f64, f64)]) -> f64 {
    let mut right_weight: f64 = values.iter().map(|(_, w)| w).sum();
    let mut left_weight = 0.0;
    let half_weight = right_weight / 2.0;

    for (i, &(value, weight)) in values.iter().enumerate() {
        if i > 0 {
            left_weight += values[i - 1].1;
        }
        right_weight -= weight;

        if left_weight > half_weight || right_weight > half_weight {
            continue;
        }

        if left_weight == right_weight {
            return value;
        }

        if right_weight == half_weight && left_weight + weight == half_weight {
            // Two weighted medians: this element and the next.
            return match values.get(i + 1) {
                Some(&(upper, _)) => (value + upper) / 2.0,
                None => value,
            };
        }

        return value;
    }
    f64::NAN
}
