//! Engine configuration: TOML schema, the built-in reference model, env overrides.
//!
//! Loading follows the same two steps everywhere:
//! `EngineConfig::from_toml()` resolves and reads the file, `from_toml_str()` parses it,
//! and `build()` compiles the result into a frozen `LivabilityEngine`.

use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::engine::{Advice, LivabilityEngine};
use crate::error::Result;
use crate::membership::{MembershipFunction, RampDirection, Universe};
use crate::registry::Registry;
use crate::rules::{build_rule_base, Condition, RuleDef};

// --- env defaults & names ---
pub const DEFAULT_LIVABILITY_CONFIG_PATH: &str = "config/livability.toml";
pub const DEFAULT_OUTPUT_STEP: f64 = 0.01;

pub const ENV_LIVABILITY_CONFIG_PATH: &str = "LIVABILITY_CONFIG_PATH";
pub const ENV_LIVABILITY_OUTPUT_STEP: &str = "LIVABILITY_OUTPUT_STEP";

// parse optional step env; only finite, positive values survive
fn parse_step_env(raw: Option<String>) -> Option<f64> {
    let raw = raw?;
    match raw.trim().parse::<f64>() {
        Ok(v) if v.is_finite() && v > 0.0 => Some(v),
        _ => {
            warn!(
                target: "livability",
                value = %raw,
                "ignoring {ENV_LIVABILITY_OUTPUT_STEP}: expected a positive number"
            );
            None
        }
    }
}

/* ----------------------------
Schema
---------------------------- */

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum ShapeCfg {
    Trapezoid {
        points: [f64; 4],
    },
    /// Sugar for a trapezoid with `b == c`.
    Triangle {
        points: [f64; 3],
    },
    Ramp {
        direction: RampDirection,
        start: f64,
        end: f64,
    },
}

impl ShapeCfg {
    pub fn to_function(&self) -> MembershipFunction {
        match *self {
            Self::Trapezoid { points: [a, b, c, d] } => MembershipFunction::trapezoid(a, b, c, d),
            Self::Triangle { points: [a, b, c] } => MembershipFunction::triangle(a, b, c),
            Self::Ramp {
                direction,
                start,
                end,
            } => MembershipFunction::Ramp {
                direction,
                start,
                end,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermCfg {
    pub label: String,
    #[serde(flatten)]
    pub shape: ShapeCfg,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableCfg {
    pub name: String,
    pub min: f64,
    pub max: f64,
    pub step: f64,
    pub terms: Vec<TermCfg>,
}

impl VariableCfg {
    fn universe(&self) -> Result<Universe> {
        Universe::new(self.min, self.max, self.step)
    }

    fn terms(&self) -> Vec<(String, MembershipFunction)> {
        self.terms
            .iter()
            .map(|t| (t.label.clone(), t.shape.to_function()))
            .collect()
    }
}

/// Root of `config/livability.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub output: VariableCfg,
    pub variables: Vec<VariableCfg>,
    pub rules: Vec<RuleDef>,
    #[serde(default)]
    pub advice: Vec<Advice>,
}

impl EngineConfig {
    /// Load from a TOML file. Uses LIVABILITY_CONFIG_PATH or defaults to "config/livability.toml".
    ///
    /// Without the env var and without the default file, the built-in reference model is used.
    pub fn from_toml() -> anyhow::Result<Self> {
        let explicit = std::env::var(ENV_LIVABILITY_CONFIG_PATH).ok().map(PathBuf::from);
        let path = explicit
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LIVABILITY_CONFIG_PATH));

        let mut cfg = if explicit.is_none() && !path.exists() {
            warn!(
                target: "livability",
                path = %path.display(),
                "config file not found; using the built-in reference model"
            );
            Self::reference()
        } else {
            let content = fs::read_to_string(&path).with_context(|| {
                format!("Failed to read livability config at {}", path.display())
            })?;
            Self::from_toml_str(&content)
                .with_context(|| format!("Invalid livability config at {}", path.display()))?
        };

        // optional: override output grid step from env
        if let Some(step) = parse_step_env(std::env::var(ENV_LIVABILITY_OUTPUT_STEP).ok()) {
            cfg.output.step = step;
        }

        info!(
            target: "livability",
            variables = cfg.variables.len(),
            rules = cfg.rules.len(),
            output_step = cfg.output.step,
            "livability config loaded"
        );
        Ok(cfg)
    }

    /// Load from a TOML string (no env overrides).
    pub fn from_toml_str(toml_str: &str) -> anyhow::Result<Self> {
        let cfg: EngineConfig = toml::from_str(toml_str)?;
        Ok(cfg)
    }

    /// Compile into an engine; any invalid universe, term, rule or advice fails here.
    pub fn build(&self) -> Result<LivabilityEngine> {
        let registry = build_registry(self)?;
        let rules = build_rule_base(&registry, &self.rules)?;
        LivabilityEngine::new(registry, rules).with_advice(self.advice.clone())
    }

    /// Built-in model: six inputs, four output labels, fifteen weighted rules.
    pub fn reference() -> Self {
        use RampDirection::{Falling, Rising};

        fn ramp(label: &str, direction: RampDirection, start: f64, end: f64) -> TermCfg {
            TermCfg {
                label: label.into(),
                shape: ShapeCfg::Ramp {
                    direction,
                    start,
                    end,
                },
            }
        }
        fn tri(label: &str, a: f64, b: f64, c: f64) -> TermCfg {
            TermCfg {
                label: label.into(),
                shape: ShapeCfg::Triangle { points: [a, b, c] },
            }
        }
        fn var(name: &str, min: f64, max: f64, step: f64, terms: Vec<TermCfg>) -> VariableCfg {
            VariableCfg {
                name: name.into(),
                min,
                max,
                step,
                terms,
            }
        }
        fn rule(
            id: u32,
            description: &str,
            when: &[(&str, &str)],
            then: &str,
            weight: f64,
        ) -> RuleDef {
            RuleDef {
                id,
                description: description.into(),
                when: Condition::all_of(when),
                then: then.into(),
                weight,
            }
        }
        fn advice(var: &str, label: &str, message: &str) -> Advice {
            Advice {
                var: var.into(),
                label: label.into(),
                min_degree: 0.5,
                message: message.into(),
            }
        }

        const LDEN: &str = "noise_lden";
        const LNIGHT: &str = "noise_lnight";
        const DAY: &str = "daylight";
        const SKY: &str = "view_sky";
        const GREEN: &str = "view_greenery";
        const POI: &str = "location_poi";

        Self {
            output: var(
                "livability",
                0.0,
                100.0,
                DEFAULT_OUTPUT_STEP,
                vec![
                    ramp("poor", Falling, 15.0, 35.0),
                    tri("fair", 25.0, 40.0, 55.0),
                    tri("good", 45.0, 60.0, 75.0),
                    ramp("excellent", Rising, 65.0, 80.0),
                ],
            ),
            variables: vec![
                var(
                    LDEN,
                    30.0,
                    85.0,
                    0.5,
                    vec![
                        ramp("quiet", Falling, 48.0, 55.0),
                        tri("moderate", 50.0, 58.0, 68.0),
                        ramp("noisy", Rising, 63.0, 70.0),
                    ],
                ),
                var(
                    LNIGHT,
                    25.0,
                    75.0,
                    0.5,
                    vec![
                        ramp("quiet", Falling, 40.0, 47.0),
                        tri("moderate", 42.0, 50.0, 58.0),
                        ramp("noisy", Rising, 53.0, 60.0),
                    ],
                ),
                var(
                    DAY,
                    0.0,
                    1000.0,
                    5.0,
                    vec![
                        ramp("low", Falling, 50.0, 120.0),
                        tri("medium", 80.0, 200.0, 350.0),
                        ramp("high", Rising, 280.0, 400.0),
                    ],
                ),
                var(
                    SKY,
                    0.0,
                    4.0,
                    0.05,
                    vec![
                        ramp("poor", Falling, 0.5, 1.2),
                        tri("moderate", 0.8, 1.5, 2.3),
                        ramp("good", Rising, 2.0, 2.8),
                    ],
                ),
                var(
                    GREEN,
                    0.0,
                    2.0,
                    0.02,
                    vec![
                        ramp("poor", Falling, 0.1, 0.4),
                        tri("moderate", 0.2, 0.6, 1.0),
                        ramp("good", Rising, 0.7, 1.2),
                    ],
                ),
                var(
                    POI,
                    0.0,
                    100.0,
                    1.0,
                    vec![
                        ramp("low", Falling, 5.0, 15.0),
                        tri("medium", 10.0, 25.0, 40.0),
                        ramp("high", Rising, 35.0, 50.0),
                    ],
                ),
            ],
            rules: vec![
                rule(
                    1,
                    "Quiet environment with high daylight and good views",
                    &[(LDEN, "quiet"), (DAY, "high"), (SKY, "good")],
                    "excellent",
                    1.0,
                ),
                rule(
                    2,
                    "Quiet with good greenery view and high accessibility",
                    &[(LDEN, "quiet"), (GREEN, "good"), (POI, "high")],
                    "excellent",
                    1.0,
                ),
                rule(
                    3,
                    "Moderate noise with high daylight and good views",
                    &[(LDEN, "moderate"), (DAY, "high"), (SKY, "good")],
                    "good",
                    1.0,
                ),
                rule(
                    4,
                    "Quiet environment with medium daylight",
                    &[(LDEN, "quiet"), (DAY, "medium"), (SKY, "moderate")],
                    "good",
                    1.0,
                ),
                rule(
                    5,
                    "Moderate noise but good views and accessibility",
                    &[(LDEN, "moderate"), (SKY, "good"), (POI, "high")],
                    "good",
                    0.9,
                ),
                rule(
                    6,
                    "Moderate noise with medium daylight",
                    &[(LDEN, "moderate"), (DAY, "medium"), (SKY, "moderate")],
                    "fair",
                    1.0,
                ),
                rule(
                    7,
                    "Quiet but low daylight and poor views",
                    &[(LDEN, "quiet"), (DAY, "low"), (SKY, "poor")],
                    "fair",
                    1.0,
                ),
                rule(
                    8,
                    "Moderate noise with good accessibility",
                    &[(LDEN, "moderate"), (POI, "high"), (SKY, "moderate")],
                    "fair",
                    0.8,
                ),
                rule(
                    9,
                    "Noisy environment regardless of other factors",
                    &[(LDEN, "noisy")],
                    "poor",
                    1.0,
                ),
                rule(
                    10,
                    "Low daylight with poor views",
                    &[(DAY, "low"), (SKY, "poor"), (GREEN, "poor")],
                    "poor",
                    1.0,
                ),
                rule(
                    11,
                    "Moderate noise with low daylight and poor views",
                    &[(LDEN, "moderate"), (DAY, "low"), (SKY, "poor")],
                    "poor",
                    0.9,
                ),
                rule(
                    12,
                    "Poor accessibility with low environmental quality",
                    &[(POI, "low"), (DAY, "low"), (LDEN, "moderate")],
                    "poor",
                    0.7,
                ),
                rule(
                    13,
                    "Excellent daylight compensates for moderate noise",
                    &[(LDEN, "moderate"), (DAY, "high"), (POI, "high")],
                    "good",
                    0.85,
                ),
                rule(
                    14,
                    "Good greenery view with quiet night environment",
                    &[(LNIGHT, "quiet"), (GREEN, "good"), (DAY, "medium")],
                    "good",
                    0.9,
                ),
                rule(
                    15,
                    "Noisy night environment degrades livability",
                    &[(LNIGHT, "noisy")],
                    "poor",
                    0.95,
                ),
            ],
            advice: vec![
                advice(
                    LDEN,
                    "noisy",
                    "Consider noise reduction measures (better windows, insulation)",
                ),
                advice(
                    DAY,
                    "low",
                    "Improve natural lighting (larger windows, lighter colors)",
                ),
                advice(
                    SKY,
                    "poor",
                    "Limited sky view: consider higher floors or less obstructed locations",
                ),
                advice(
                    GREEN,
                    "poor",
                    "Add indoor plants or consider locations with more greenery",
                ),
                advice(
                    "livability",
                    "excellent",
                    "Excellent livability! This dwelling meets high standards.",
                ),
                advice(
                    "livability",
                    "poor",
                    "Significant improvements needed for better livability",
                ),
            ],
        }
    }
}

/// Register every configured variable; the output goes last.
pub fn build_registry(cfg: &EngineConfig) -> Result<Registry> {
    let mut builder = Registry::builder();
    for v in &cfg.variables {
        builder.register(&v.name, v.universe()?, v.terms())?;
    }
    builder.register_output(&cfg.output.name, cfg.output.universe()?, cfg.output.terms())?;
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FuzzyError;

    const SHIPPED: &str = include_str!("../config/livability.toml");

    #[test]
    fn shipped_file_matches_reference() {
        let parsed = EngineConfig::from_toml_str(SHIPPED).unwrap();
        assert_eq!(parsed, EngineConfig::reference());
    }

    #[test]
    fn reference_builds() {
        let engine = EngineConfig::reference().build().unwrap();
        assert_eq!(engine.registry().inputs().len(), 6);
        assert_eq!(engine.rules().len(), 15);
        assert_eq!(engine.registry().output().grid().len(), 10_001);
        assert_eq!(engine.advice().len(), 6);
    }

    #[test]
    fn step_env_parsing() {
        assert_eq!(parse_step_env(None), None);
        assert_eq!(parse_step_env(Some(" 0.1 ".into())), Some(0.1));
        assert_eq!(parse_step_env(Some("0".into())), None);
        assert_eq!(parse_step_env(Some("-1".into())), None);
        assert_eq!(parse_step_env(Some("NaN".into())), None);
        assert_eq!(parse_step_env(Some("fine".into())), None);
    }

    #[test]
    fn minimal_toml_with_all_shapes() {
        let src = r#"
[output]
name = "livability"
min = 0.0
max = 100.0
step = 1.0
terms = [
  { label = "poor", shape = "ramp", direction = "falling", start = 15.0, end = 35.0 },
  { label = "fair", shape = "trapezoid", points = [25.0, 35.0, 45.0, 55.0] },
  { label = "good", shape = "ramp", direction = "rising", start = 45.0, end = 75.0 },
]

[[variables]]
name = "noise_lden"
min = 30.0
max = 85.0
step = 0.5
terms = [
  { label = "quiet", shape = "ramp", direction = "falling", start = 48.0, end = 55.0 },
  { label = "moderate", shape = "triangle", points = [50.0, 58.0, 68.0] },
]

[[rules]]
id = 1
when = { var = "noise_lden", is = "quiet" }
then = "good"

[[rules]]
id = 2
description = "not quiet"
when = { not = { var = "noise_lden", is = "quiet" } }
then = "poor"
weight = 0.5
"#;
        let cfg = EngineConfig::from_toml_str(src).unwrap();
        assert_eq!(cfg.rules[0].weight, 1.0);
        assert!(cfg.advice.is_empty());
        assert_eq!(
            cfg.variables[0].terms[1].shape.to_function(),
            MembershipFunction::trapezoid(50.0, 58.0, 58.0, 68.0)
        );
        let engine = cfg.build().unwrap();
        assert_eq!(engine.rules().len(), 2);
    }

    #[test]
    fn bad_rule_reference_fails_build() {
        let mut cfg = EngineConfig::reference();
        cfg.rules[0].then = "superb".into();
        assert!(matches!(cfg.build(), Err(FuzzyError::Configuration(_))));

        let mut cfg = EngineConfig::reference();
        cfg.variables[0].step = 0.0;
        assert!(cfg.build().is_err());
    }

    #[test]
    fn unknown_shape_is_a_parse_error() {
        let src = r#"
variables = []
rules = []

[output]
name = "livability"
min = 0.0
max = 100.0
step = 1.0
terms = [ { label = "poor", shape = "gaussian", mean = 10.0, sigma = 3.0 } ]
"#;
        assert!(EngineConfig::from_toml_str(src).is_err());
    }
}
