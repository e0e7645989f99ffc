//! HTTP surface over a shared, immutable `LivabilityEngine`.
//!
//! Routes:
//! - `GET  /health`
//! - `POST /assess`        one record → result + advice
//! - `POST /assess/batch`  many records → per-record result or error + summary
//! - `POST /explain?top=N` one record → text report
//! - `GET  /rules`         rule statistics + rule list

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::debug;

use crate::analysis::{BatchSummary, RuleStatistics};
use crate::config::EngineConfig;
use crate::engine::{Assessment, InferenceInput, InferenceResult, LivabilityEngine};
use crate::error::FuzzyError;
use crate::metrics;

const DEFAULT_EXPLAIN_TOP: usize = 5;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<LivabilityEngine>,
}

impl AppState {
    pub fn new(engine: LivabilityEngine) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }

    /// Load the configuration named by the environment and build the engine.
    pub fn from_env() -> anyhow::Result<Self> {
        let engine = EngineConfig::from_toml()?.build()?;
        Ok(Self::new(engine))
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/assess", post(assess))
        .route("/assess/batch", post(assess_batch))
        .route("/explain", post(explain))
        .route("/rules", get(rules))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/* ----------------------------
Errors
---------------------------- */

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// Per-record errors are the caller's fault (400); anything else is ours (500).
struct ApiError(FuzzyError);

impl From<FuzzyError> for ApiError {
    fn from(e: FuzzyError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.is_per_record() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        (
            status,
            Json(ErrorBody {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

fn tally<T>(
    r: crate::error::Result<T>,
    result: impl Fn(&T) -> &InferenceResult,
) -> Result<T, ApiError> {
    match r {
        Ok(v) => {
            metrics::record_result(result(&v));
            Ok(v)
        }
        Err(e) => {
            metrics::record_error();
            debug!(target: "livability", error = %e, "record rejected");
            Err(e.into())
        }
    }
}

/* ----------------------------
Handlers
---------------------------- */

async fn assess(
    State(state): State<AppState>,
    Json(input): Json<InferenceInput>,
) -> Result<Json<Assessment>, ApiError> {
    let a = tally(state.engine.assess(&input), |a| &a.result)?;
    Ok(Json(a))
}

#[derive(Serialize)]
#[serde(untagged)]
enum BatchEntry {
    Scored(InferenceResult),
    Failed { error: String },
}

#[derive(Serialize)]
struct BatchResp {
    results: Vec<BatchEntry>,
    /// Over the scored records only; `null` when none scored.
    summary: Option<BatchSummary>,
}

async fn assess_batch(
    State(state): State<AppState>,
    Json(inputs): Json<Vec<InferenceInput>>,
) -> Json<BatchResp> {
    let results: Vec<BatchEntry> = state
        .engine
        .infer_batch(&inputs)
        .into_iter()
        .map(|r| match tally(r, |r| r) {
            Ok(r) => BatchEntry::Scored(r),
            Err(ApiError(e)) => BatchEntry::Failed {
                error: e.to_string(),
            },
        })
        .collect();
    let summary = BatchSummary::from_results(results.iter().filter_map(|e| match e {
        BatchEntry::Scored(r) => Some(r),
        BatchEntry::Failed { .. } => None,
    }));
    Json(BatchResp { results, summary })
}

#[derive(Deserialize)]
struct ExplainParams {
    top: Option<usize>,
}

async fn explain(
    State(state): State<AppState>,
    Query(params): Query<ExplainParams>,
    Json(input): Json<InferenceInput>,
) -> Result<String, ApiError> {
    let top = params.top.unwrap_or(DEFAULT_EXPLAIN_TOP);
    Ok(state.engine.explain(&input, top)?)
}

#[derive(Serialize)]
struct RuleOut {
    id: u32,
    description: String,
    condition: String,
    then: String,
    weight: f64,
}

#[derive(Serialize)]
struct RulesResp {
    statistics: RuleStatistics,
    rules: Vec<RuleOut>,
}

async fn rules(State(state): State<AppState>) -> Json<RulesResp> {
    let rb = state.engine.rules();
    Json(RulesResp {
        statistics: RuleStatistics::of(rb),
        rules: rb
            .rules()
            .iter()
            .map(|r| RuleOut {
                id: r.id,
                description: r.description.clone(),
                condition: r.condition.to_string(),
                then: r.consequent.clone(),
                weight: r.weight,
            })
            .collect(),
    })
}
