//! Demo that scores a few representative dwellings with the configured model
//! and prints their explanations plus a batch summary.

use livability_fis::analysis::{sensitivity, BatchSummary};
use livability_fis::{EngineConfig, InferenceInput};

fn dwelling(lden: f64, lnight: f64, lux: f64, sky: f64, green: f64, poi: f64) -> InferenceInput {
    InferenceInput::new()
        .with("noise_lden", lden)
        .with("noise_lnight", lnight)
        .with("daylight", lux)
        .with("view_sky", sky)
        .with("view_greenery", green)
        .with("location_poi", poi)
}

fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().with_target(false).init();

    let engine = EngineConfig::from_toml()?.build()?;

    let dwellings = [
        ("quiet courtyard, green view", dwelling(45.0, 35.0, 476.0, 1.02, 0.88, 70.0)),
        ("busy street, dark ground floor", dwelling(70.0, 60.0, 80.0, 0.2, 0.1, 20.0)),
        ("moderate street, bright upper floor", dwelling(58.0, 48.0, 420.0, 2.6, 0.3, 45.0)),
        ("quiet suburb, average light", dwelling(46.0, 38.0, 210.0, 1.5, 0.5, 12.0)),
    ];

    for (name, input) in &dwellings {
        println!("=== {name} ===");
        println!("{}", engine.explain(input, 3)?);
        for tip in engine.advise(input)? {
            println!("  * {tip}");
        }
        println!();
    }

    let inputs: Vec<InferenceInput> = dwellings.iter().map(|(_, i)| i.clone()).collect();
    let scored: Vec<_> = engine
        .infer_batch(&inputs)
        .into_iter()
        .collect::<Result<_, _>>()?;
    if let Some(s) = BatchSummary::from_results(&scored) {
        println!(
            "batch: n={} mean={:.2} std={:.2} min={:.2} max={:.2} labels={:?}",
            s.count, s.mean, s.std, s.min, s.max, s.labels
        );
    }

    let sweep = sensitivity(&engine, &dwellings[0].1, "noise_lden", 40.0, 75.0, 8)?;
    println!("\nnoise_lden sweep (range {:.2}):", sweep.index_range());
    for p in &sweep.points {
        println!("  {:>5.1} dB → {:>6.2} {}", p.value, p.index, p.label);
    }

    Ok(())
}
