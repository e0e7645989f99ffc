//! Linguistic variable registry.
//!
//! `RegistryBuilder::register` validates and inserts variables; `build()` freezes
//! them into a `Registry` that only hands out shared references. The output
//! variable's term curves are sampled once here so inference never rebuilds them.

use std::collections::HashSet;

use crate::error::{FuzzyError, Result};
use crate::membership::{MembershipFunction, Universe};

/// A named term of a linguistic variable.
#[derive(Debug, Clone, PartialEq)]
pub struct Term {
    pub label: String,
    pub function: MembershipFunction,
}

/// Name, universe and ordered terms of one dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct LinguisticVariable {
    pub name: String,
    pub universe: Universe,
    pub terms: Vec<Term>,
}

impl LinguisticVariable {
    fn new(
        name: &str,
        universe: Universe,
        terms: Vec<(String, MembershipFunction)>,
    ) -> Result<Self> {
        if name.trim().is_empty() {
            return Err(FuzzyError::config("variable name must not be empty"));
        }
        if terms.is_empty() {
            return Err(FuzzyError::config(format!(
                "variable `{name}` has no terms"
            )));
        }
        let mut seen = HashSet::new();
        let mut out = Vec::with_capacity(terms.len());
        for (label, function) in terms {
            if !seen.insert(label.clone()) {
                return Err(FuzzyError::config(format!(
                    "variable `{name}` declares label `{label}` twice"
                )));
            }
            function.validate(&universe).map_err(|e| {
                FuzzyError::config(format!("variable `{name}`, label `{label}`: {e}"))
            })?;
            out.push(Term { label, function });
        }
        Ok(Self {
            name: name.to_string(),
            universe,
            terms: out,
        })
    }

    pub fn label_index(&self, label: &str) -> Option<usize> {
        self.terms.iter().position(|t| t.label == label)
    }

    pub fn term(&self, label: &str) -> Result<&Term> {
        self.terms
            .iter()
            .find(|t| t.label == label)
            .ok_or_else(|| FuzzyError::UnknownLabel {
                variable: self.name.clone(),
                label: label.to_string(),
            })
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.terms.iter().map(|t| t.label.as_str())
    }

    /// Whether some term stays defined below `universe.min` (a falling ramp).
    pub fn absorbs_below(&self) -> bool {
        self.terms.iter().any(|t| t.function.open_below())
    }

    /// Whether some term stays defined above `universe.max` (a rising ramp).
    pub fn absorbs_above(&self) -> bool {
        self.terms.iter().any(|t| t.function.open_above())
    }
}

/// The output variable plus its term curves sampled on the output grid.
#[derive(Debug, Clone)]
pub struct OutputScale {
    pub variable: LinguisticVariable,
    grid: Vec<f64>,
    curves: Vec<Vec<f64>>,
}

impl OutputScale {
    fn new(variable: LinguisticVariable) -> Result<Self> {
        // Ties in label assignment go to the lower label, which needs an ascending order.
        let starts: Vec<f64> = variable
            .terms
            .iter()
            .map(|t| t.function.support_start())
            .collect();
        if starts.windows(2).any(|w| w[0] > w[1]) {
            return Err(FuzzyError::config(format!(
                "output labels of `{}` must be declared from lowest to highest range",
                variable.name
            )));
        }
        let grid = variable.universe.grid();
        let curves = variable
            .terms
            .iter()
            .map(|t| t.function.sample(&variable.universe))
            .collect();
        Ok(Self {
            variable,
            grid,
            curves,
        })
    }

    pub fn name(&self) -> &str {
        &self.variable.name
    }

    pub fn universe(&self) -> &Universe {
        &self.variable.universe
    }

    pub fn grid(&self) -> &[f64] {
        &self.grid
    }

    /// Sampled curve of the term at `index` (declaration order).
    pub fn curve(&self, index: usize) -> &[f64] {
        &self.curves[index]
    }
}

/// Collects variables before freezing them into a `Registry`.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    inputs: Vec<LinguisticVariable>,
    output: Option<LinguisticVariable>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn taken(&self, name: &str) -> bool {
        self.inputs.iter().any(|v| v.name == name)
            || self.output.as_ref().is_some_and(|v| v.name == name)
    }

    /// Register an input variable.
    pub fn register(
        &mut self,
        name: &str,
        universe: Universe,
        terms: Vec<(String, MembershipFunction)>,
    ) -> Result<&mut Self> {
        if self.taken(name) {
            return Err(FuzzyError::config(format!(
                "variable `{name}` registered twice"
            )));
        }
        let var = LinguisticVariable::new(name, universe, terms)?;
        self.inputs.push(var);
        Ok(self)
    }

    /// Register the (single) output variable.
    pub fn register_output(
        &mut self,
        name: &str,
        universe: Universe,
        terms: Vec<(String, MembershipFunction)>,
    ) -> Result<&mut Self> {
        if self.output.is_some() {
            return Err(FuzzyError::config("output variable registered twice"));
        }
        if self.taken(name) {
            return Err(FuzzyError::config(format!(
                "variable `{name}` registered twice"
            )));
        }
        self.output = Some(LinguisticVariable::new(name, universe, terms)?);
        Ok(self)
    }

    pub fn build(self) -> Result<Registry> {
        if self.inputs.is_empty() {
            return Err(FuzzyError::config("registry has no input variables"));
        }
        let output = self
            .output
            .ok_or_else(|| FuzzyError::config("registry has no output variable"))?;
        Ok(Registry {
            inputs: self.inputs,
            output: OutputScale::new(output)?,
        })
    }
}

/// Frozen set of variables. Read-only after `RegistryBuilder::build`.
#[derive(Debug, Clone)]
pub struct Registry {
    inputs: Vec<LinguisticVariable>,
    output: OutputScale,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Look up an input or the output variable by name.
    pub fn get(&self, name: &str) -> Result<&LinguisticVariable> {
        self.inputs
            .iter()
            .find(|v| v.name == name)
            .or_else(|| (self.output.variable.name == name).then_some(&self.output.variable))
            .ok_or_else(|| FuzzyError::UnknownVariable(name.to_string()))
    }

    pub(crate) fn input_index(&self, name: &str) -> Option<usize> {
        self.inputs.iter().position(|v| v.name == name)
    }

    /// Input variables in registration order.
    pub fn inputs(&self) -> &[LinguisticVariable] {
        &self.inputs
    }

    pub fn output(&self) -> &OutputScale {
        &self.output
    }
}
