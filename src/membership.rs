//! Universes of discourse and membership functions.
//!
//! Two shapes cover every term of the livability model:
//! - `Trapezoid(a, b, c, d)`: rises on `[a, b]`, plateau on `[b, c]`, falls on `[c, d]`.
//!   Coinciding breakpoints give triangles (`b == c`) or shoulders (`a == b`, `c == d`).
//! - `Ramp`: open-ended, monotone, saturating outside `[start, end]`. Used for terms
//!   without a lower bound ("quiet") or upper bound ("noisy").

use serde::{Deserialize, Serialize};

use crate::error::{FuzzyError, Result};

/// Tolerance used when counting grid points so `(max - min) / step` that is
/// "almost" an integer does not lose its last point to rounding.
const GRID_EPS: f64 = 1e-9;

/// Upper bound on grid points per universe.
pub const MAX_GRID_POINTS: usize = 1_000_000;

/// Closed interval `[min, max]` sampled every `step`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Universe {
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

impl Universe {
    /// Validated constructor; the grid must have at least two points.
    pub fn new(min: f64, max: f64, step: f64) -> Result<Self> {
        if !(min.is_finite() && max.is_finite() && step.is_finite()) {
            return Err(FuzzyError::config(format!(
                "universe bounds must be finite (min={min}, max={max}, step={step})"
            )));
        }
        if min >= max {
            return Err(FuzzyError::config(format!(
                "universe min {min} must be below max {max}"
            )));
        }
        if step <= 0.0 {
            return Err(FuzzyError::config(format!(
                "universe step must be positive, got {step}"
            )));
        }
        let points = Self::point_count(min, max, step);
        if points > MAX_GRID_POINTS as f64 {
            return Err(FuzzyError::config(format!(
                "step {step} gives more than {MAX_GRID_POINTS} grid points on [{min}, {max}]"
            )));
        }
        let u = Self { min, max, step };
        if u.len() < 2 {
            return Err(FuzzyError::config(format!(
                "step {step} leaves fewer than two grid points on [{min}, {max}]"
            )));
        }
        Ok(u)
    }

    /// Number of grid points.
    pub fn len(&self) -> usize {
        Self::point_count(self.min, self.max, self.step).min(MAX_GRID_POINTS as f64) as usize
    }

    fn point_count(min: f64, max: f64, step: f64) -> f64 {
        ((max - min) / step + GRID_EPS).floor() + 1.0
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, x: f64) -> bool {
        x >= self.min && x <= self.max
    }

    pub fn midpoint(&self) -> f64 {
        (self.min + self.max) / 2.0
    }

    /// Grid points `min, min + step, ...`; computed by index to avoid drift.
    pub fn grid(&self) -> Vec<f64> {
        (0..self.len())
            .map(|i| (self.min + i as f64 * self.step).min(self.max))
            .collect()
    }

    /// Same universe with a different step (used for convergence checks).
    pub fn with_step(&self, step: f64) -> Result<Self> {
        Self::new(self.min, self.max, step)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RampDirection {
    /// 0 at or below `start`, 1 at or above `end`.
    Rising,
    /// 1 at or below `start`, 0 at or above `end`.
    Falling,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MembershipFunction {
    Trapezoid(f64, f64, f64, f64),
    Ramp {
        direction: RampDirection,
        start: f64,
        end: f64,
    },
}

impl MembershipFunction {
    pub fn trapezoid(a: f64, b: f64, c: f64, d: f64) -> Self {
        Self::Trapezoid(a, b, c, d)
    }

    pub fn triangle(a: f64, peak: f64, c: f64) -> Self {
        Self::Trapezoid(a, peak, peak, c)
    }

    pub fn rising(start: f64, end: f64) -> Self {
        Self::Ramp {
            direction: RampDirection::Rising,
            start,
            end,
        }
    }

    pub fn falling(start: f64, end: f64) -> Self {
        Self::Ramp {
            direction: RampDirection::Falling,
            start,
            end,
        }
    }

    /// Degree of membership of `x`, always in `[0, 1]`.
    pub fn degree(&self, x: f64) -> f64 {
        let raw = match *self {
            Self::Trapezoid(a, b, c, d) => {
                if x < a || x > d {
                    0.0
                } else if x >= b && x <= c {
                    1.0
                } else if x < b {
                    (x - a) / (b - a)
                } else {
                    (d - x) / (d - c)
                }
            }
            Self::Ramp {
                direction,
                start,
                end,
            } => {
                let up = if x <= start {
                    0.0
                } else if x >= end {
                    1.0
                } else {
                    (x - start) / (end - start)
                };
                match direction {
                    RampDirection::Rising => up,
                    RampDirection::Falling => 1.0 - up,
                }
            }
        };
        raw.clamp(0.0, 1.0)
    }

    /// True if the function keeps a non-zero degree beyond the lower edge of any universe.
    pub fn open_below(&self) -> bool {
        matches!(
            self,
            Self::Ramp {
                direction: RampDirection::Falling,
                ..
            }
        )
    }

    /// True if the function keeps a non-zero degree beyond the upper edge of any universe.
    pub fn open_above(&self) -> bool {
        matches!(
            self,
            Self::Ramp {
                direction: RampDirection::Rising,
                ..
            }
        )
    }

    /// Left end of the support; `-inf` for falling ramps. Orders output labels.
    pub fn support_start(&self) -> f64 {
        match *self {
            Self::Trapezoid(a, ..) => a,
            Self::Ramp {
                direction: RampDirection::Rising,
                start,
                ..
            } => start,
            Self::Ramp {
                direction: RampDirection::Falling,
                ..
            } => f64::NEG_INFINITY,
        }
    }

    /// Check breakpoints against the universe they will be evaluated on.
    pub fn validate(&self, universe: &Universe) -> Result<()> {
        let points: Vec<f64> = match *self {
            Self::Trapezoid(a, b, c, d) => vec![a, b, c, d],
            Self::Ramp { start, end, .. } => vec![start, end],
        };
        if points.iter().any(|p| !p.is_finite()) {
            return Err(FuzzyError::config(format!(
                "breakpoints must be finite: {points:?}"
            )));
        }
        if points.windows(2).any(|w| w[0] > w[1]) {
            return Err(FuzzyError::config(format!(
                "breakpoints must be non-decreasing: {points:?}"
            )));
        }
        if let Self::Ramp { start, end, .. } = *self {
            // A ramp must saturate inside the universe, so both edges hit exactly 0 or 1.
            if !universe.contains(start) || !universe.contains(end) {
                return Err(FuzzyError::config(format!(
                    "ramp [{start}, {end}] must lie within [{}, {}]",
                    universe.min, universe.max
                )));
            }
        }
        for edge in [universe.min, universe.max] {
            let d = self.degree(edge);
            if !d.is_finite() {
                return Err(FuzzyError::config(format!(
                    "membership undefined at universe edge {edge}"
                )));
            }
        }
        Ok(())
    }

    /// Sample the function on every grid point of `universe`.
    pub fn sample(&self, universe: &Universe) -> Vec<f64> {
        universe.grid().into_iter().map(|x| self.degree(x)).collect()
    }
}
