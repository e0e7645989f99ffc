//! Fuzzification: crisp values → degrees of membership per label.

use crate::error::{FuzzyError, Result};
use crate::registry::{LinguisticVariable, Registry};

/// Degrees of one variable, aligned with its terms.
#[derive(Debug, Clone, PartialEq)]
pub struct Memberships<'a> {
    pub variable: &'a LinguisticVariable,
    pub value: f64,
    degrees: Vec<f64>,
}

impl<'a> Memberships<'a> {
    pub fn get(&self, label: &str) -> Option<f64> {
        self.variable.label_index(label).map(|i| self.degrees[i])
    }

    pub(crate) fn at(&self, index: usize) -> f64 {
        self.degrees[index]
    }

    /// `(label, degree)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&'a str, f64)> + '_ {
        self.variable
            .terms
            .iter()
            .map(|t| t.label.as_str())
            .zip(self.degrees.iter().copied())
    }

    /// Label with the highest degree; earlier labels win ties.
    pub fn dominant(&self) -> (&'a str, f64) {
        let mut best = (self.variable.terms[0].label.as_str(), self.degrees[0]);
        for (label, d) in self.iter().skip(1) {
            if d > best.1 {
                best = (label, d);
            }
        }
        best
    }
}

/// Evaluate every term of `variable` at `value`.
///
/// Values outside the universe are accepted only on a side covered by an
/// open ramp; NaN and infinities never are.
pub fn fuzzify(variable: &LinguisticVariable, value: f64) -> Result<Memberships<'_>> {
    let u = &variable.universe;
    let covered = if value.is_nan() {
        false
    } else if value < u.min {
        variable.absorbs_below() && value.is_finite()
    } else if value > u.max {
        variable.absorbs_above() && value.is_finite()
    } else {
        true
    };
    if !covered {
        return Err(FuzzyError::Domain {
            variable: variable.name.clone(),
            value,
        });
    }
    let degrees = variable
        .terms
        .iter()
        .map(|t| t.function.degree(value).clamp(0.0, 1.0))
        .collect();
    Ok(Memberships {
        variable,
        value,
        degrees,
    })
}

/// Fuzzified form of a whole input vector, indexed like `Registry::inputs`.
#[derive(Debug, Clone)]
pub struct FuzzifiedInput<'a> {
    sets: Vec<Memberships<'a>>,
}

impl<'a> FuzzifiedInput<'a> {
    /// Fuzzify one value per registered input variable, looked up by name.
    pub(crate) fn from_lookup<F>(registry: &'a Registry, mut lookup: F) -> Result<Self>
    where
        F: FnMut(&str) -> Option<f64>,
    {
        let sets = registry
            .inputs()
            .iter()
            .map(|var| {
                let value =
                    lookup(&var.name).ok_or_else(|| FuzzyError::MissingInput(var.name.clone()))?;
                fuzzify(var, value)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { sets })
    }

    pub(crate) fn degree_at(&self, variable: usize, label: usize) -> f64 {
        self.sets[variable].at(label)
    }

    pub fn variable(&self, name: &str) -> Option<&Memberships<'a>> {
        self.sets.iter().find(|m| m.variable.name == name)
    }

    pub fn degree(&self, variable: &str, label: &str) -> Option<f64> {
        self.variable(variable).and_then(|m| m.get(label))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Memberships<'a>> {
        self.sets.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::membership::{MembershipFunction, Universe};

    fn daylight() -> LinguisticVariable {
        let mut b = Registry::builder();
        b.register(
            "daylight",
            Universe::new(0.0, 1000.0, 5.0).unwrap(),
            vec![
                ("low".into(), MembershipFunction::falling(50.0, 120.0)),
                ("medium".into(), MembershipFunction::triangle(80.0, 200.0, 350.0)),
                ("high".into(), MembershipFunction::rising(280.0, 400.0)),
            ],
        )
        .unwrap();
        b.register_output(
            "livability",
            Universe::new(0.0, 100.0, 1.0).unwrap(),
            vec![("fair".into(), MembershipFunction::triangle(25.0, 40.0, 55.0))],
        )
        .unwrap();
        b.build().unwrap().get("daylight").unwrap().clone()
    }

    #[test]
    fn full_membership_inside_plateau() {
        let v = daylight();
        let m = fuzzify(&v, 476.0).unwrap();
        assert_eq!(m.get("high"), Some(1.0));
        assert_eq!(m.get("medium"), Some(0.0));
        assert_eq!(m.get("low"), Some(0.0));
        assert_eq!(m.dominant(), ("high", 1.0));

        let m = fuzzify(&v, 200.0).unwrap();
        assert_eq!(m.get("medium"), Some(1.0));
    }

    #[test]
    fn partial_degrees() {
        let v = daylight();
        let m = fuzzify(&v, 80.0).unwrap();
        let low = m.get("low").unwrap();
        assert!((low - 40.0 / 70.0).abs() < 1e-12, "low = {low}");
        assert_eq!(m.get("medium"), Some(0.0));
        assert_eq!(m.get("unknown"), None);
    }

    #[test]
    fn ramps_absorb_values_past_the_edges() {
        let v = daylight();
        let m = fuzzify(&v, 1500.0).unwrap();
        assert_eq!(m.get("high"), Some(1.0));
        let m = fuzzify(&v, -5.0).unwrap();
        assert_eq!(m.get("low"), Some(1.0));
    }

    #[test]
    fn nan_and_uncovered_sides_are_domain_errors() {
        let v = daylight();
        assert!(matches!(
            fuzzify(&v, f64::NAN),
            Err(FuzzyError::Domain { .. })
        ));
        assert!(fuzzify(&v, f64::INFINITY).is_err());

        // A variable without ramps cannot absorb anything outside its universe.
        let bounded = LinguisticVariable {
            name: "view_sky".into(),
            universe: Universe::new(0.0, 4.0, 0.05).unwrap(),
            terms: vec![crate::registry::Term {
                label: "moderate".into(),
                function: MembershipFunction::triangle(0.8, 1.5, 2.3),
            }],
        };
        assert!(fuzzify(&bounded, 4.5).is_err());
        assert!(fuzzify(&bounded, 4.0).is_ok());
    }
}
