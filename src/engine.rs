//! # Inference Engine
//! Pure, testable pipeline that maps a crisp input record → `InferenceResult`.
//! No I/O; the registry and rule base are built once and only read here.
//!
//! Pipeline: fuzzify → evaluate rules → aggregate → defuzzify → classify.
//! When no rule fires, the index falls back to the midpoint of the output
//! universe with confidence 0 so that every record still gets a number.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::aggregate::{aggregate, AggregatedSet};
use crate::defuzzify::{classify, defuzzify, FlatOutput};
use crate::error::{FuzzyError, Result};
use crate::fuzzify::FuzzifiedInput;
use crate::registry::Registry;
use crate::rules::{RuleActivation, RuleBase};

/// Degrees below this are left out of explanations.
const EXPLAIN_MIN_DEGREE: f64 = 0.01;

/// Crisp values keyed by input variable name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InferenceInput(BTreeMap<String, f64>);

impl InferenceInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder style: `InferenceInput::new().with("noise_lden", 45.0)`.
    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.0.insert(name.into(), value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: f64) {
        self.0.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for InferenceInput {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Outcome of one inference call, owned by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceResult {
    /// Crisp livability index on the output universe.
    pub index: f64,
    pub label: String,
    /// Height of the aggregated output set; 0 means no rule fired and `index` is the fallback.
    pub confidence: f64,
    /// Every rule in declaration order, including the ones that did not fire.
    pub activations: Vec<RuleActivation>,
}

impl InferenceResult {
    pub fn no_rule_fired(&self) -> bool {
        self.confidence <= 0.0
    }

    /// Activations with non-zero strength.
    pub fn fired(&self) -> impl Iterator<Item = &RuleActivation> {
        self.activations.iter().filter(|a| a.strength > 0.0)
    }
}

/// Intermediate state of one call, kept for explanations.
#[derive(Debug, Clone)]
pub struct Trace<'a> {
    pub fuzzified: FuzzifiedInput<'a>,
    /// Strongest firing strength per output label, in output declaration order.
    pub consequents: Vec<(&'a str, f64)>,
    pub aggregated: AggregatedSet,
    pub result: InferenceResult,
}

/// Run the full pipeline and keep the intermediates.
pub fn trace<'a>(
    registry: &'a Registry,
    rules: &RuleBase,
    input: &InferenceInput,
) -> Result<Trace<'a>> {
    if let Some((name, _)) = input.iter().find(|(k, _)| registry.input_index(k).is_none()) {
        return Err(FuzzyError::UnknownVariable(name.to_string()));
    }
    let fuzzified = FuzzifiedInput::from_lookup(registry, |name| input.get(name))?;

    let activations = rules.evaluate(&fuzzified);
    let scale = registry.output();
    let strengths = rules.consequent_strengths(&activations, scale.variable.terms.len());
    let aggregated = aggregate(scale, &strengths);

    let (index, confidence) = match defuzzify(&aggregated) {
        Ok(c) => (c, aggregated.height()),
        Err(FlatOutput) => {
            warn!(
                target: "livability",
                fallback = scale.universe().midpoint(),
                "no rule fired; reporting the midpoint of the output universe"
            );
            (scale.universe().midpoint(), 0.0)
        }
    };
    let (label, _) = classify(scale, index);

    let result = InferenceResult {
        index,
        label: label.to_string(),
        confidence,
        activations,
    };
    debug!(
        target: "livability",
        index = result.index,
        label = %result.label,
        fired = result.fired().count(),
        "inference done"
    );

    let consequents = scale
        .variable
        .labels()
        .zip(strengths)
        .collect::<Vec<_>>();
    Ok(Trace {
        fuzzified,
        consequents,
        aggregated,
        result,
    })
}

/// Score one record against a registry and rule base.
pub fn infer(
    registry: &Registry,
    rules: &RuleBase,
    input: &InferenceInput,
) -> Result<InferenceResult> {
    trace(registry, rules, input).map(|t| t.result)
}

/// Recommendation emitted when `var` is `label` to at least `min_degree`.
/// `var` may name the output variable; its degree is then read at the crisp index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Advice {
    pub var: String,
    pub label: String,
    #[serde(default = "default_min_degree")]
    pub min_degree: f64,
    pub message: String,
}

fn default_min_degree() -> f64 {
    0.5
}

/// Result plus advice, the shape served over HTTP.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assessment {
    #[serde(flatten)]
    pub result: InferenceResult,
    pub advice: Vec<String>,
}

/// Registry + rule base + advice, built once and shared read-only.
#[derive(Debug, Clone)]
pub struct LivabilityEngine {
    registry: Registry,
    rules: RuleBase,
    advice: Vec<Advice>,
}

impl LivabilityEngine {
    pub fn new(registry: Registry, rules: RuleBase) -> Self {
        info!(
            target: "livability",
            inputs = registry.inputs().len(),
            rules = rules.len(),
            output_grid = registry.output().grid().len(),
            "livability engine built"
        );
        Self {
            registry,
            rules,
            advice: Vec::new(),
        }
    }

    /// Attach advice entries; each must name a known variable and label.
    pub fn with_advice(mut self, advice: Vec<Advice>) -> Result<Self> {
        for a in &advice {
            let var = self.registry.get(&a.var).map_err(|_| {
                FuzzyError::config(format!("advice references unknown variable `{}`", a.var))
            })?;
            if var.label_index(&a.label).is_none() {
                return Err(FuzzyError::config(format!(
                    "advice references unknown label `{}` of `{}`",
                    a.label, a.var
                )));
            }
            if !(0.0..=1.0).contains(&a.min_degree) {
                return Err(FuzzyError::config(format!(
                    "advice min_degree {} for `{}` is outside [0, 1]",
                    a.min_degree, a.var
                )));
            }
        }
        self.advice = advice;
        Ok(self)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn rules(&self) -> &RuleBase {
        &self.rules
    }

    pub fn infer(&self, input: &InferenceInput) -> Result<InferenceResult> {
        infer(&self.registry, &self.rules, input)
    }

    pub fn trace(&self, input: &InferenceInput) -> Result<Trace<'_>> {
        trace(&self.registry, &self.rules, input)
    }

    /// Score records independently; a bad record yields its own `Err` and the rest still run.
    pub fn infer_batch(&self, inputs: &[InferenceInput]) -> Vec<Result<InferenceResult>> {
        let out: Vec<_> = inputs.iter().map(|i| self.infer(i)).collect();
        let failed = out.iter().filter(|r| r.is_err()).count();
        info!(
            target: "livability",
            total = inputs.len(),
            failed,
            "batch scored"
        );
        out
    }

    /// Result together with every advice entry that applies.
    pub fn assess(&self, input: &InferenceInput) -> Result<Assessment> {
        let t = self.trace(input)?;
        let advice = self.advice_for(&t);
        Ok(Assessment {
            result: t.result,
            advice,
        })
    }

    /// Advice messages only.
    pub fn advise(&self, input: &InferenceInput) -> Result<Vec<String>> {
        self.assess(input).map(|a| a.advice)
    }

    pub fn advice(&self) -> &[Advice] {
        &self.advice
    }

    fn advice_for(&self, t: &Trace<'_>) -> Vec<String> {
        let output = &self.registry.output().variable;
        self.advice
            .iter()
            .filter(|a| {
                let degree = if a.var == output.name {
                    output
                        .term(&a.label)
                        .map(|term| term.function.degree(t.result.index))
                        .ok()
                } else {
                    t.fuzzified.degree(&a.var, &a.label)
                };
                degree.is_some_and(|d| d >= a.min_degree)
            })
            .map(|a| a.message.clone())
            .collect()
    }

    /// Human-readable report: index, input degrees, strongest rules, consequent strengths.
    pub fn explain(&self, input: &InferenceInput, top_n: usize) -> Result<String> {
        let t = self.trace(input)?;
        let r = &t.result;
        let mut out = String::new();

        let _ = writeln!(
            out,
            "Livability index: {:.2} / {:.0} ({})",
            r.index,
            self.registry.output().universe().max,
            r.label
        );
        if r.no_rule_fired() {
            let _ = writeln!(
                out,
                "No rule fired; the index is the midpoint fallback (confidence 0)."
            );
        } else {
            let _ = writeln!(out, "Confidence: {:.3}", r.confidence);
        }

        let _ = writeln!(out, "\nInputs:");
        for m in t.fuzzified.iter() {
            let terms = m
                .iter()
                .filter(|(_, d)| *d > EXPLAIN_MIN_DEGREE)
                .map(|(l, d)| format!("{l} {d:.3}"))
                .collect::<Vec<_>>();
            let _ = writeln!(
                out,
                "  {} = {:.2}  [{}]",
                m.variable.name,
                m.value,
                terms.join(", ")
            );
        }

        let mut fired: Vec<&RuleActivation> = r.fired().collect();
        // stable sort keeps declaration order among equal strengths
        fired.sort_by(|a, b| b.strength.total_cmp(&a.strength));
        let _ = writeln!(out, "\nTop {top_n} rules:");
        if fired.is_empty() {
            let _ = writeln!(out, "  (none)");
        }
        for (i, act) in fired.iter().take(top_n).enumerate() {
            if let Some(rule) = self.rules.rule(act.rule_id) {
                let _ = writeln!(
                    out,
                    "  {}. rule {} ({:.3}) {}",
                    i + 1,
                    rule.id,
                    act.strength,
                    rule.description
                );
                let _ = writeln!(out, "     IF {} THEN {}", rule.condition, rule.consequent);
            }
        }

        let _ = writeln!(out, "\nConsequents:");
        for (label, s) in t.consequents.iter().filter(|(_, s)| *s > EXPLAIN_MIN_DEGREE) {
            let _ = writeln!(out, "  {label}: {s:.3}");
        }
        Ok(out)
    }
}
