//! Aggregation: clip each output term at its strongest rule (implication by
//! minimum) and merge the clipped shapes pointwise (aggregation by maximum).

use serde::Serialize;

use crate::registry::OutputScale;

/// Aggregated output fuzzy set sampled on the output grid.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedSet {
    pub grid: Vec<f64>,
    pub degrees: Vec<f64>,
}

impl AggregatedSet {
    /// Build directly from samples (grid and degrees must have equal length).
    pub fn from_samples(grid: Vec<f64>, degrees: Vec<f64>) -> Self {
        debug_assert_eq!(grid.len(), degrees.len());
        Self { grid, degrees }
    }

    /// Highest degree anywhere on the grid; 0 means no rule fired.
    pub fn height(&self) -> f64 {
        self.degrees.iter().copied().fold(0.0, f64::max)
    }

    pub fn is_flat(&self) -> bool {
        self.degrees.iter().all(|&d| d <= 0.0)
    }
}

/// `strengths[l]` is the strongest firing strength of rules concluding output term `l`.
pub fn aggregate(scale: &OutputScale, strengths: &[f64]) -> AggregatedSet {
    let grid = scale.grid();
    let mut degrees = vec![0.0_f64; grid.len()];
    for (label, &s) in strengths.iter().enumerate() {
        if s <= 0.0 {
            continue;
        }
        for (slot, &mu) in degrees.iter_mut().zip(scale.curve(label)) {
            *slot = slot.max(mu.min(s));
        }
    }
    AggregatedSet::from_samples(grid.to_vec(), degrees)
}
