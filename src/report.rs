//! Play accuracy maths and the range-accuracy report.

use osu_stats::{sorted, theil_sen, LinearFit};
use serde::{Deserialize, Serialize};

/// Judgement counts of a single play.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitCounts {
    pub count300: u32,
    pub count100: u32,
    pub count50: u32,
    pub count_miss: u32,
}

impl HitCounts {
    pub fn total(&self) -> u64 {
        self.count300 as u64 + self.count100 as u64 + self.count50 as u64 + self.count_miss as u64
    }

    /// Score-weighted accuracy in `[0, 1]`. `NaN` for a play with no objects.
    pub fn accuracy(&self) -> f64 {
        let max_raw = 300 * self.total();
        if max_raw == 0 {
            return f64::NAN;
        }
        let raw = 300 * self.count300 as u64 + 100 * self.count100 as u64 + 50 * self.count50 as u64;
        raw as f64 / max_raw as f64
    }
}

/// Round a pp ceiling to one decimal, the precision kept in the difficulty cache.
pub fn round_pp(pp: f64) -> f64 {
    (pp * 10.0).round() / 10.0
}

/// A play reduced to its difficulty ceiling and accuracy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Play {
    /// Achievable pp on the played map with the played mods.
    pub max_pp: f64,
    pub accuracy: f64,
}

impl Play {
    pub fn new(max_pp: f64, accuracy: f64) -> Self {
        Self { max_pp, accuracy }
    }

    pub fn from_hits(max_pp: f64, hits: &HitCounts) -> Self {
        Self::new(max_pp, hits.accuracy())
    }

    /// Plays whose ceiling or accuracy could not be determined are unusable.
    fn is_usable(&self) -> bool {
        self.max_pp.is_finite() && self.max_pp != 0.0 && self.accuracy.is_finite() && self.accuracy != 0.0
    }
}

/// Accuracy statistics over a player's top plays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccuracyReport {
    /// Plays that entered the report.
    pub plays: usize,
    /// `[median accuracy of the easier half, median accuracy of the harder half]`.
    pub range: [f64; 2],
    pub median: f64,
    /// Lower and upper accuracy quartiles.
    pub iqr: [f64; 2],
    pub iqm: f64,
    /// Weighted Theil-Sen fit of accuracy against pp ceiling.
    pub trend: LinearFit,
}

impl AccuracyReport {
    /// Build the report, or `None` when no usable play remains.
    ///
    /// Plays are ranked by ceiling; the hardest `ceil(n / 2)` form the hard
    /// half and the rest the easy half.
    pub fn from_plays(plays: &[Play]) -> Option<Self> {
        let mut usable: Vec<Play> = plays.iter().copied().filter(Play::is_usable).collect();
        if usable.is_empty() {
            return None;
        }

        usable.sort_by(|a, b| b.max_pp.total_cmp(&a.max_pp));
        let (hard, easy) = usable.split_at(usable.len().div_ceil(2));
        let range = [median_accuracy(easy), median_accuracy(hard)];

        let accuracies = sorted_accuracies(&usable);

        let mut samples: Vec<(f64, f64)> = usable.iter().map(|p| (p.max_pp, p.accuracy)).collect();
        samples.sort_by(|a, b| a.0.total_cmp(&b.0));

        Some(Self {
            plays: usable.len(),
            range,
            median: sorted::median(&accuracies),
            iqr: sorted::iqr(&accuracies),
            iqm: sorted::iqm(&accuracies),
            trend: theil_sen::theil_sen_weighted(&samples),
        })
    }
}

fn sorted_accuracies(plays: &[Play]) -> Vec<f64> {
    let mut accuracies: Vec<f64> = plays.iter().map(|p| p.accuracy).collect();
    accuracies.sort_by(f64::total_cmp);
    accuracies
}

/// Median accuracy of a group; 0 for an empty group.
fn median_accuracy(plays: &[Play]) -> f64 {
    if plays.is_empty() {
        return 0.0;
    }
    sorted::median(&sorted_accuracies(plays))
}
