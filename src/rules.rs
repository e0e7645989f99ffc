//! Rule base: IF-THEN rules over linguistic literals.
//!
//! Rule definitions (`RuleDef`) use names and come from TOML or code.
//! `build_rule_base` resolves every name against the registry once and
//! compiles the condition into an index-based `Antecedent` tree, evaluated
//! per call by a small recursive interpreter:
//! - AND → minimum
//! - OR  → maximum
//! - NOT → 1 - degree

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{FuzzyError, Result};
use crate::fuzzify::FuzzifiedInput;
use crate::registry::Registry;

/* ----------------------------
Definitions (names, serde)
---------------------------- */

/// Condition tree as written in configuration:
/// `{ var = "noise_lden", is = "quiet" }`, `{ all = [...] }`, `{ any = [...] }`, `{ not = {...} }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Condition {
    Is { var: String, is: String },
    All { all: Vec<Condition> },
    Any { any: Vec<Condition> },
    Not { not: Box<Condition> },
}

impl Condition {
    pub fn is(var: &str, label: &str) -> Self {
        Self::Is {
            var: var.to_string(),
            is: label.to_string(),
        }
    }

    /// Conjunction of `(var, label)` literals, the shape of every reference rule.
    pub fn all_of(literals: &[(&str, &str)]) -> Self {
        Self::All {
            all: literals.iter().map(|(v, l)| Self::is(v, l)).collect(),
        }
    }

    /// Variable names referenced anywhere in the tree.
    pub fn variables(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_variables(&mut out);
        out
    }

    fn collect_variables<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Is { var, .. } => out.push(var),
            Self::All { all: cs } | Self::Any { any: cs } => {
                cs.iter().for_each(|c| c.collect_variables(out))
            }
            Self::Not { not } => not.collect_variables(out),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join(f: &mut fmt::Formatter<'_>, cs: &[Condition], op: &str) -> fmt::Result {
            for (i, c) in cs.iter().enumerate() {
                if i > 0 {
                    write!(f, " {op} ")?;
                }
                match c {
                    Condition::All { .. } | Condition::Any { .. } => write!(f, "({c})")?,
                    _ => write!(f, "{c}")?,
                }
            }
            Ok(())
        }
        match self {
            Self::Is { var, is } => write!(f, "{var} is {is}"),
            Self::All { all } => join(f, all, "AND"),
            Self::Any { any } => join(f, any, "OR"),
            Self::Not { not } => write!(f, "NOT ({not})"),
        }
    }
}

fn default_weight() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDef {
    pub id: u32,
    #[serde(default)]
    pub description: String,
    pub when: Condition,
    /// Output label.
    pub then: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

/* ----------------------------
Compiled rules
---------------------------- */

/// Index-based antecedent tree (indices into `Registry::inputs` and their terms).
#[derive(Debug, Clone, PartialEq)]
pub enum Antecedent {
    Is { variable: usize, label: usize },
    And(Vec<Antecedent>),
    Or(Vec<Antecedent>),
    Not(Box<Antecedent>),
}

impl Antecedent {
    fn compile(cond: &Condition, registry: &Registry) -> Result<Self> {
        Ok(match cond {
            Condition::Is { var, is } => {
                let variable = registry.input_index(var).ok_or_else(|| {
                    FuzzyError::config(format!("rule references unknown input variable `{var}`"))
                })?;
                let label = registry.inputs()[variable].label_index(is).ok_or_else(|| {
                    FuzzyError::config(format!("rule references unknown label `{is}` of `{var}`"))
                })?;
                Self::Is { variable, label }
            }
            Condition::All { all } => Self::And(Self::compile_all(all, registry, "all")?),
            Condition::Any { any } => Self::Or(Self::compile_all(any, registry, "any")?),
            Condition::Not { not } => Self::Not(Box::new(Self::compile(not, registry)?)),
        })
    }

    fn compile_all(cs: &[Condition], registry: &Registry, op: &str) -> Result<Vec<Self>> {
        if cs.is_empty() {
            return Err(FuzzyError::config(format!("empty `{op}` group in rule")));
        }
        cs.iter().map(|c| Self::compile(c, registry)).collect()
    }

    /// Truth value of the tree for one fuzzified input.
    pub fn truth(&self, input: &FuzzifiedInput<'_>) -> f64 {
        match self {
            Self::Is { variable, label } => input.degree_at(*variable, *label),
            Self::And(xs) => xs.iter().map(|x| x.truth(input)).fold(1.0, f64::min),
            Self::Or(xs) => xs.iter().map(|x| x.truth(input)).fold(0.0, f64::max),
            Self::Not(x) => 1.0 - x.truth(input),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub id: u32,
    pub description: String,
    pub condition: Condition,
    pub antecedent: Antecedent,
    pub consequent: String,
    pub(crate) consequent_index: usize,
    pub weight: f64,
}

impl Rule {
    /// Firing strength = truth × weight, clamped to `[0, 1]`.
    pub fn firing_strength(&self, input: &FuzzifiedInput<'_>) -> f64 {
        (self.antecedent.truth(input) * self.weight).clamp(0.0, 1.0)
    }
}

/// One entry of the activation trace returned with every result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleActivation {
    pub rule_id: u32,
    pub consequent: String,
    pub strength: f64,
}

/// Ordered, read-only set of rules.
#[derive(Debug, Clone)]
pub struct RuleBase {
    rules: Vec<Rule>,
}

/// Resolve rule definitions against `registry`; any bad reference aborts the build.
pub fn build_rule_base(registry: &Registry, defs: &[RuleDef]) -> Result<RuleBase> {
    if defs.is_empty() {
        return Err(FuzzyError::config("rule base has no rules"));
    }
    let output = &registry.output().variable;
    let mut ids = HashSet::new();
    let mut rules = Vec::with_capacity(defs.len());
    for def in defs {
        if !ids.insert(def.id) {
            return Err(FuzzyError::config(format!("duplicate rule id {}", def.id)));
        }
        if !def.weight.is_finite() || def.weight < 0.0 {
            return Err(FuzzyError::config(format!(
                "rule {} has invalid weight {}",
                def.id, def.weight
            )));
        }
        let consequent_index = output.label_index(&def.then).ok_or_else(|| {
            FuzzyError::config(format!(
                "rule {} concludes unknown label `{}` of `{}`",
                def.id, def.then, output.name
            ))
        })?;
        let antecedent = Antecedent::compile(&def.when, registry)
            .map_err(|e| FuzzyError::config(format!("rule {}: {e}", def.id)))?;
        rules.push(Rule {
            id: def.id,
            description: def.description.clone(),
            condition: def.when.clone(),
            antecedent,
            consequent: def.then.clone(),
            consequent_index,
            weight: def.weight,
        });
    }
    Ok(RuleBase { rules })
}

impl RuleBase {
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rule(&self, id: u32) -> Option<&Rule> {
        self.rules.iter().find(|r| r.id == id)
    }

    /// Firing strength of every rule, in declaration order. Zero is a normal result.
    pub fn evaluate(&self, input: &FuzzifiedInput<'_>) -> Vec<RuleActivation> {
        self.rules
            .iter()
            .map(|r| RuleActivation {
                rule_id: r.id,
                consequent: r.consequent.clone(),
                strength: r.firing_strength(input),
            })
            .collect()
    }

    /// Strongest activation per output label (indexed like the output terms).
    /// Rules sharing a consequent combine by maximum, never by sum.
    pub fn consequent_strengths(&self, activations: &[RuleActivation], labels: usize) -> Vec<f64> {
        let mut out = vec![0.0_f64; labels];
        for (rule, act) in self.rules.iter().zip(activations) {
            let slot = &mut out[rule.consequent_index];
            *slot = slot.max(act.strength);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::membership::{MembershipFunction, Universe};

    fn registry() -> Registry {
        let mut b = Registry::builder();
        b.register(
            "a",
            Universe::new(0.0, 1.0, 0.1).unwrap(),
            vec![
                ("lo".into(), MembershipFunction::falling(0.0, 1.0)),
                ("hi".into(), MembershipFunction::rising(0.0, 1.0)),
            ],
        )
        .unwrap();
        b.register(
            "b",
            Universe::new(0.0, 1.0, 0.1).unwrap(),
            vec![
                ("lo".into(), MembershipFunction::falling(0.0, 1.0)),
                ("hi".into(), MembershipFunction::rising(0.0, 1.0)),
            ],
        )
        .unwrap();
        b.register_output(
            "out",
            Universe::new(0.0, 100.0, 1.0).unwrap(),
            vec![
                ("bad".into(), MembershipFunction::falling(20.0, 50.0)),
                ("fine".into(), MembershipFunction::rising(50.0, 80.0)),
            ],
        )
        .unwrap();
        b.build().unwrap()
    }

    fn rule(id: u32, when: Condition, then: &str, weight: f64) -> RuleDef {
        RuleDef {
            id,
            description: format!("rule {id}"),
            when,
            then: then.into(),
            weight,
        }
    }

    fn input(reg: &Registry, a: f64, b: f64) -> FuzzifiedInput<'_> {
        FuzzifiedInput::from_lookup(reg, |name| match name {
            "a" => Some(a),
            "b" => Some(b),
            _ => None,
        })
        .unwrap()
    }

    #[test]
    fn and_or_not_operators() {
        let reg = registry();
        let defs = vec![
            rule(1, Condition::all_of(&[("a", "hi"), ("b", "hi")]), "fine", 1.0),
            rule(
                2,
                Condition::Any {
                    any: vec![Condition::is("a", "hi"), Condition::is("b", "hi")],
                },
                "fine",
                1.0,
            ),
            rule(
                3,
                Condition::Not {
                    not: Box::new(Condition::is("a", "hi")),
                },
                "bad",
                1.0,
            ),
        ];
        let rb = build_rule_base(&reg, &defs).unwrap();
        let acts = rb.evaluate(&input(&reg, 0.3, 0.7));

        assert!((acts[0].strength - 0.3).abs() < 1e-12, "AND = min");
        assert!((acts[1].strength - 0.7).abs() < 1e-12, "OR = max");
        assert!((acts[2].strength - 0.7).abs() < 1e-12, "NOT = 1 - x");
        assert_eq!(
            acts.iter().map(|a| a.rule_id).collect::<Vec<_>>(),
            vec![1, 2, 3],
            "trace keeps declaration order"
        );
    }

    #[test]
    fn zero_literals_give_zero_strength() {
        let reg = registry();
        let rb = build_rule_base(
            &reg,
            &[rule(1, Condition::all_of(&[("a", "hi"), ("b", "hi")]), "fine", 1.0)],
        )
        .unwrap();
        let acts = rb.evaluate(&input(&reg, 0.0, 0.0));
        assert_eq!(acts[0].strength, 0.0);
    }

    #[test]
    fn weight_scales_and_clamps() {
        let reg = registry();
        let rb = build_rule_base(
            &reg,
            &[
                rule(1, Condition::is("a", "hi"), "fine", 0.5),
                rule(2, Condition::is("a", "hi"), "fine", 3.0),
            ],
        )
        .unwrap();
        let acts = rb.evaluate(&input(&reg, 0.8, 0.0));
        assert!((acts[0].strength - 0.4).abs() < 1e-12);
        assert_eq!(acts[1].strength, 1.0);
    }

    #[test]
    fn shared_consequent_takes_max_not_sum() {
        let reg = registry();
        let rb = build_rule_base(
            &reg,
            &[
                rule(1, Condition::is("a", "lo"), "bad", 1.0),
                rule(2, Condition::is("b", "lo"), "bad", 1.0),
                rule(3, Condition::is("a", "hi"), "fine", 1.0),
            ],
        )
        .unwrap();
        let acts = rb.evaluate(&input(&reg, 0.2, 0.4));
        let per_label = rb.consequent_strengths(&acts, 2);
        assert!((per_label[0] - 0.8).abs() < 1e-12);
        assert!((per_label[1] - 0.2).abs() < 1e-12);
    }

    #[test]
    fn bad_references_fail_the_build() {
        let reg = registry();
        let cases = vec![
            rule(1, Condition::is("c", "hi"), "fine", 1.0),
            rule(1, Condition::is("a", "medium"), "fine", 1.0),
            rule(1, Condition::is("a", "hi"), "excellent", 1.0),
            rule(1, Condition::is("out", "bad"), "fine", 1.0),
            rule(1, Condition::All { all: vec![] }, "fine", 1.0),
            rule(1, Condition::is("a", "hi"), "fine", f64::NAN),
        ];
        for def in cases {
            let err = build_rule_base(&reg, &[def.clone()]).unwrap_err();
            assert!(matches!(err, FuzzyError::Configuration(_)), "{def:?} → {err:?}");
        }

        let dup = vec![
            rule(7, Condition::is("a", "hi"), "fine", 1.0),
            rule(7, Condition::is("b", "hi"), "fine", 1.0),
        ];
        assert!(build_rule_base(&reg, &dup).is_err());
        assert!(build_rule_base(&reg, &[]).is_err());
    }

    #[test]
    fn condition_display_and_toml_shape() {
        let c: Condition = toml::from_str::<RuleDef>(
            r#"
id = 1
then = "fine"
[when]
all = [
  { var = "a", is = "hi" },
  { any = [ { var = "b", is = "lo" }, { not = { var = "b", is = "hi" } } ] },
]
"#,
        )
        .unwrap()
        .when;
        assert_eq!(c.to_string(), "a is hi AND (b is lo OR NOT (b is hi))");
        assert_eq!(c.variables(), vec!["a", "b", "b"]);
    }
}
