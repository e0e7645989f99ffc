// src/lib.rs
// Public library surface for the server binary, the demo and integration tests.

pub mod error;
pub mod membership;
pub mod registry;

// Inference pipeline (fuzzify → rules → aggregate → defuzzify)
pub mod aggregate;
pub mod defuzzify;
pub mod fuzzify;
pub mod rules;

pub mod engine;

pub mod analysis;
pub mod config;

// HTTP surface
pub mod api;
pub mod metrics;

// ---- Re-exports for stable public API ----
pub use crate::api::router;
pub use crate::config::EngineConfig;
pub use crate::engine::{infer, InferenceInput, InferenceResult, LivabilityEngine};
pub use crate::error::FuzzyError;
pub use crate::registry::Registry;
