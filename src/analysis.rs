//! # Analysis
//! Offline helpers around the engine: rule statistics, batch summaries,
//! one-at-a-time sensitivity sweeps, and agreement with external ratings.
//!
//! Everything here is a pure function over engine output; nothing is cached.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::engine::{InferenceInput, InferenceResult, LivabilityEngine};
use crate::error::{FuzzyError, Result};
use crate::rules::RuleBase;

/// Percentiles reported by `BatchSummary`.
pub const SUMMARY_PERCENTILES: [u8; 5] = [10, 25, 50, 75, 90];

/* ----------------------------
Rule statistics
---------------------------- */

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleStatistics {
    pub total: usize,
    /// Rule count per output label.
    pub per_consequent: BTreeMap<String, usize>,
    /// How many rules reference each input variable.
    pub variables_used: BTreeMap<String, usize>,
    pub average_weight: f64,
}

impl RuleStatistics {
    pub fn of(rules: &RuleBase) -> Self {
        let mut per_consequent = BTreeMap::new();
        let mut variables_used = BTreeMap::new();
        for r in rules.rules() {
            *per_consequent.entry(r.consequent.clone()).or_insert(0) += 1;
            let mut vars = r.condition.variables();
            vars.sort_unstable();
            vars.dedup();
            for v in vars {
                *variables_used.entry(v.to_string()).or_insert(0) += 1;
            }
        }
        let total = rules.len();
        let average_weight = if total == 0 {
            0.0
        } else {
            rules.rules().iter().map(|r| r.weight).sum::<f64>() / total as f64
        };
        Self {
            total,
            per_consequent,
            variables_used,
            average_weight,
        }
    }
}

/* ----------------------------
Batch summary
---------------------------- */

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation (n - 1); 0 for a single record.
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub labels: BTreeMap<String, usize>,
    /// Linearly interpolated percentiles of the index, keyed by percent.
    pub percentiles: BTreeMap<u8, f64>,
    pub no_rule_fired: usize,
}

impl BatchSummary {
    /// `None` for an empty batch.
    pub fn from_results<'a, I>(results: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a InferenceResult>,
    {
        let mut indices = Vec::new();
        let mut labels = BTreeMap::new();
        let mut no_rule_fired = 0;
        for r in results {
            indices.push(r.index);
            *labels.entry(r.label.clone()).or_insert(0) += 1;
            if r.no_rule_fired() {
                no_rule_fired += 1;
            }
        }
        if indices.is_empty() {
            return None;
        }
        indices.sort_by(f64::total_cmp);

        let count = indices.len();
        let mean = mean(&indices);
        let std = sample_std(&indices, mean);
        let percentiles = SUMMARY_PERCENTILES
            .iter()
            .map(|&p| (p, quantile(&indices, f64::from(p) / 100.0)))
            .collect();

        Some(Self {
            count,
            mean,
            std,
            min: indices[0],
            max: indices[count - 1],
            labels,
            percentiles,
            no_rule_fired,
        })
    }
}

fn mean(xs: &[f64]) -> f64 {
    xs.iter().sum::<f64>() / xs.len() as f64
}

/// n - 1 denominator; 0 for fewer than two values.
fn sample_std(xs: &[f64], mean: f64) -> f64 {
    if xs.len() < 2 {
        return 0.0;
    }
    let ss: f64 = xs.iter().map(|x| (x - mean).powi(2)).sum();
    (ss / (xs.len() - 1) as f64).sqrt()
}

/// Linear interpolation between closest ranks; `sorted` must be ascending and non-empty.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/* ----------------------------
Sensitivity sweep
---------------------------- */

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensitivityPoint {
    pub value: f64,
    pub index: f64,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sensitivity {
    pub variable: String,
    pub points: Vec<SensitivityPoint>,
    pub index_min: f64,
    pub index_max: f64,
}

impl Sensitivity {
    pub fn index_range(&self) -> f64 {
        self.index_max - self.index_min
    }
}

/// Vary `variable` over `n` evenly spaced values in `[lo, hi]`, other inputs held at `base`.
pub fn sensitivity(
    engine: &LivabilityEngine,
    base: &InferenceInput,
    variable: &str,
    lo: f64,
    hi: f64,
    n: usize,
) -> Result<Sensitivity> {
    if engine.registry().input_index(variable).is_none() {
        return Err(FuzzyError::UnknownVariable(variable.to_string()));
    }
    if n == 0 || !(lo.is_finite() && hi.is_finite()) || lo > hi {
        return Err(FuzzyError::InvalidArgument(format!(
            "sweep of `{variable}` over [{lo}, {hi}] in {n} steps"
        )));
    }

    let mut points = Vec::with_capacity(n);
    for i in 0..n {
        let value = if n == 1 {
            lo
        } else {
            lo + (hi - lo) * i as f64 / (n - 1) as f64
        };
        let mut input = base.clone();
        input.set(variable, value);
        let r = engine.infer(&input)?;
        points.push(SensitivityPoint {
            value,
            index: r.index,
            label: r.label,
        });
    }
    let (index_min, index_max) = points
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
            (lo.min(p.index), hi.max(p.index))
        });

    Ok(Sensitivity {
        variable: variable.to_string(),
        points,
        index_min,
        index_max,
    })
}

/* ----------------------------
Agreement with external ratings
---------------------------- */

/// Verbal grade of |r|: above 0.7 strong, above 0.5 moderate, above 0.3 weak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationStrength {
    Strong,
    Moderate,
    Weak,
    VeryWeak,
}

impl CorrelationStrength {
    pub fn of(r: f64) -> Self {
        match r.abs() {
            a if a > 0.7 => Self::Strong,
            a if a > 0.5 => Self::Moderate,
            a if a > 0.3 => Self::Weak,
            _ => Self::VeryWeak,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Agreement {
    pub n: usize,
    /// `None` when either side has zero variance.
    pub pearson: Option<f64>,
    pub spearman: Option<f64>,
    /// Grade of the Pearson coefficient.
    pub strength: Option<CorrelationStrength>,
    pub rmse: f64,
    pub mae: f64,
    pub index_mean: f64,
    pub index_std: f64,
    pub rating_mean: f64,
    pub rating_std: f64,
}

/// Compare `(index, rating)` pairs; ratings must already be on the index scale.
/// `None` for fewer than two pairs.
pub fn agreement(pairs: &[(f64, f64)]) -> Option<Agreement> {
    if pairs.len() < 2 {
        return None;
    }
    let xs: Vec<f64> = pairs.iter().map(|p| p.0).collect();
    let ys: Vec<f64> = pairs.iter().map(|p| p.1).collect();

    let n = pairs.len() as f64;
    let rmse = (pairs.iter().map(|(x, y)| (x - y).powi(2)).sum::<f64>() / n).sqrt();
    let mae = pairs.iter().map(|(x, y)| (x - y).abs()).sum::<f64>() / n;

    let pearson_r = pearson(&xs, &ys);
    let (index_mean, rating_mean) = (mean(&xs), mean(&ys));

    Some(Agreement {
        n: pairs.len(),
        pearson: pearson_r,
        spearman: pearson(&ranks(&xs), &ranks(&ys)),
        strength: pearson_r.map(CorrelationStrength::of),
        rmse,
        mae,
        index_mean,
        index_std: sample_std(&xs, index_mean),
        rating_mean,
        rating_std: sample_std(&ys, rating_mean),
    })
}

fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    let (mx, my) = (mean(xs), mean(ys));
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in xs.iter().zip(ys) {
        let (dx, dy) = (x - mx, y - my);
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx <= 0.0 || syy <= 0.0 {
        return None;
    }
    Some((sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0))
}

/// 1-based ranks; ties share their average rank.
fn ranks(xs: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..xs.len()).collect();
    order.sort_by(|&a, &b| xs[a].total_cmp(&xs[b]));
    let mut out = vec![0.0; xs.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && xs[order[j + 1]] == xs[order[i]] {
            j += 1;
        }
        let avg = (i + j) as f64 / 2.0 + 1.0;
        for &k in &order[i..=j] {
            out[k] = avg;
        }
        i = j + 1;
    }
    out
}
