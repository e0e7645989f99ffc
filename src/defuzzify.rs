//! Defuzzification (centroid over the output grid) and label assignment.

use thiserror::Error;

use crate::aggregate::AggregatedSet;
use crate::registry::OutputScale;

/// No rule fired: the aggregated set is zero everywhere and has no centroid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("aggregated output set is flat (no rule fired)")]
pub struct FlatOutput;

/// Centroid `Σ y·μ(y) / Σ μ(y)` over the grid.
pub fn defuzzify(set: &AggregatedSet) -> Result<f64, FlatOutput> {
    let (num, den) = set
        .grid
        .iter()
        .zip(&set.degrees)
        .fold((0.0, 0.0), |(n, d), (&y, &mu)| (n + y * mu, d + mu));
    if den <= 0.0 {
        return Err(FlatOutput);
    }
    Ok(num / den)
}

/// Output label with the highest membership at `index`.
///
/// Output ranges overlap on purpose; ties go to the lower (earlier declared)
/// label, so e.g. an index exactly between "fair" and "good" reads as "fair".
pub fn classify(scale: &OutputScale, index: f64) -> (&str, f64) {
    let terms = &scale.variable.terms;
    let mut best = (terms[0].label.as_str(), terms[0].function.degree(index));
    for t in &terms[1..] {
        let d = t.function.degree(index);
        if d > best.1 {
            best = (t.label.as_str(), d);
        }
    }
    best
}
