//! Prometheus recorder and the `/metrics` route.

use anyhow::Context;
use axum::{routing::get, Router};
use metrics::{counter, describe_counter};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

use crate::engine::InferenceResult;

pub const ASSESSMENTS_TOTAL: &str = "livability_assessments_total";
pub const ASSESSMENT_ERRORS_TOTAL: &str = "livability_assessment_errors_total";
pub const NO_RULE_FIRED_TOTAL: &str = "livability_no_rule_fired_total";

static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

#[derive(Clone)]
pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder (once per process) and describe our series.
    /// Later calls return the handle of the first installation.
    pub fn init() -> anyhow::Result<Self> {
        let handle = HANDLE
            .get_or_try_init(|| {
                let handle = PrometheusBuilder::new()
                    .install_recorder()
                    .context("prometheus: install recorder")?;
                describe_counter!(ASSESSMENTS_TOTAL, "Assessments scored, by output label.");
                describe_counter!(
                    ASSESSMENT_ERRORS_TOTAL,
                    "Records rejected (unknown variable, missing input, out of domain)."
                );
                describe_counter!(
                    NO_RULE_FIRED_TOTAL,
                    "Assessments where no rule fired and the midpoint fallback was used."
                );
                anyhow::Ok(handle)
            })?
            .clone();
        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}

/// Count one scored record. No-op until a recorder is installed.
pub fn record_result(result: &InferenceResult) {
    counter!(ASSESSMENTS_TOTAL, "label" => result.label.clone()).increment(1);
    if result.no_rule_fired() {
        counter!(NO_RULE_FIRED_TOTAL).increment(1);
    }
}

pub fn record_error() {
    counter!(ASSESSMENT_ERRORS_TOTAL).increment(1);
}
