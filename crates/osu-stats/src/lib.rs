//! Descriptive and robust statistics over in-memory samples.
//!
//! This crate provides:
//! - `descriptive`: mean, extrema, population variance/covariance, Pearson r,
//!   least-squares fit; any input order
//! - `sorted`: median, quartiles, interquartile mean and weighted median for
//!   ascending-sorted input
//! - `theil_sen`: plain and `|Δx|`-weighted Theil-Sen regression for input
//!   sorted by `x`
//!
//! All functions are pure. Degenerate input (empty samples, zero variance,
//! fewer than two distinct `x`) produces `NaN` instead of an error so callers
//! can carry "insufficient data" through a report without branching.

pub mod descriptive;
pub mod sorted;
pub mod theil_sen;

pub use descriptive::{
    covariance, lsq_regression, max, mean, min, pearson_r, stdev, variance, LsqFit,
};
pub use theil_sen::LinearFit;

/// A paired observation `(x, y)`.
pub type Sample = (f64, f64);
