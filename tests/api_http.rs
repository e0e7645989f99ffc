// tests/api_http.rs
//
// HTTP-level tests for the public API Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.
//
// Covered:
// - GET /health
// - POST /assess        (success, missing input, unknown variable)
// - POST /assess/batch  (per-record errors + summary)
// - POST /explain
// - GET /rules
// - GET /metrics        (counters after an assessment)

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value as Json};
use tokio::sync::OnceCell;
use tower::ServiceExt as _; // for `oneshot`

use livability_fis::api::{self, AppState};
use livability_fis::metrics::Metrics;
use livability_fis::EngineConfig;

const BODY_LIMIT: usize = 1024 * 1024;

// --- Router cache (build once per test binary) ---
static ROUTER: OnceCell<Router> = OnceCell::const_new();

/// Same Router the binary uses, including `/metrics`.
async fn test_router() -> Router {
    ROUTER
        .get_or_init(|| async {
            let engine = EngineConfig::reference()
                .build()
                .expect("reference model builds");
            let metrics = Metrics::init().expect("metrics recorder");
            api::router(AppState::new(engine)).merge(metrics.router())
        })
        .await
        .clone()
}

fn quiet_green() -> Json {
    json!({
        "noise_lden": 45,
        "noise_lnight": 35,
        "daylight": 476,
        "view_sky": 1.02,
        "view_greenery": 0.88,
        "location_poi": 70
    })
}

fn noisy_dark() -> Json {
    json!({
        "noise_lden": 70,
        "noise_lnight": 60,
        "daylight": 80,
        "view_sky": 0.2,
        "view_greenery": 0.1,
        "location_poi": 20
    })
}

async fn send(method: &str, uri: &str, payload: Option<Json>) -> (StatusCode, String) {
    let body = match payload {
        Some(p) => Body::from(serde_json::to_vec(&p).expect("serialize payload")),
        None => Body::empty(),
    };
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body)
        .expect("build request");
    let resp = test_router().await.oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    (status, String::from_utf8(bytes.to_vec()).expect("utf8"))
}

async fn send_json(method: &str, uri: &str, payload: Option<Json>) -> (StatusCode, Json) {
    let (status, text) = send(method, uri, payload).await;
    let v = serde_json::from_str(&text).unwrap_or_else(|e| panic!("json ({e}): {text}"));
    (status, v)
}

#[tokio::test]
async fn health_returns_ok() {
    let (status, body) = send("GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.trim(), "OK");
}

#[tokio::test]
async fn assess_returns_result_and_advice() {
    let (status, v) = send_json("POST", "/assess", Some(quiet_green())).await;
    assert_eq!(status, StatusCode::OK, "{v}");

    let index = v["index"].as_f64().expect("index");
    assert!((index - 83.81).abs() < 0.05, "index {index}");
    assert_eq!(v["label"], "excellent");
    assert!((v["confidence"].as_f64().unwrap() - 0.36).abs() < 1e-9);
    assert_eq!(v["activations"].as_array().unwrap().len(), 15);
    assert_eq!(
        v["advice"],
        json!(["Excellent livability! This dwelling meets high standards."])
    );
}

#[tokio::test]
async fn assess_rejects_bad_records_with_400() {
    let mut missing = quiet_green();
    missing.as_object_mut().unwrap().remove("daylight");
    let (status, v) = send_json("POST", "/assess", Some(missing)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(v["error"].as_str().unwrap().contains("daylight"), "{v}");

    let mut extra = quiet_green();
    extra["rent"] = json!(900);
    let (status, v) = send_json("POST", "/assess", Some(extra)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(v["error"].as_str().unwrap().contains("rent"), "{v}");
}

#[tokio::test]
async fn batch_keeps_going_past_bad_records() {
    let payload = json!([quiet_green(), { "noise_lden": 45 }, noisy_dark()]);
    let (status, v) = send_json("POST", "/assess/batch", Some(payload)).await;
    assert_eq!(status, StatusCode::OK, "{v}");

    let results = v["results"].as_array().expect("results");
    assert_eq!(results.len(), 3);
    assert_eq!(results[0]["label"], "excellent");
    assert!(results[1]["error"].is_string(), "{}", results[1]);
    assert_eq!(results[2]["label"], "poor");

    let summary = &v["summary"];
    assert_eq!(summary["count"], 2);
    assert_eq!(summary["labels"]["excellent"], 1);
    assert_eq!(summary["labels"]["poor"], 1);
    assert!(summary["percentiles"]["50"].is_number(), "{summary}");
}

#[tokio::test]
async fn explain_returns_text_report() {
    let (status, text) = send("POST", "/explain?top=2", Some(noisy_dark())).await;
    assert_eq!(status, StatusCode::OK);
    assert!(text.contains("(poor)"), "{text}");
    assert!(text.contains("Top 2 rules:"), "{text}");
    assert!(text.contains("Noisy environment regardless of other factors"), "{text}");
    // third-strongest rule (10, 0.571) is cut by top=2
    assert!(!text.contains("rule 10 "), "{text}");
}

#[tokio::test]
async fn rules_lists_the_rule_base() {
    let (status, v) = send_json("GET", "/rules", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["statistics"]["total"], 15);
    let rules = v["rules"].as_array().unwrap();
    assert_eq!(rules.len(), 15);
    assert_eq!(rules[8]["id"], 9);
    assert_eq!(rules[8]["condition"], "noise_lden is noisy");
    assert_eq!(rules[8]["then"], "poor");
}

#[tokio::test]
async fn metrics_count_assessments() {
    let (status, _) = send_json("POST", "/assess", Some(noisy_dark())).await;
    assert_eq!(status, StatusCode::OK);

    let (status, text) = send("GET", "/metrics", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(text.contains("livability_assessments_total"), "{text}");
    assert!(text.contains("label=\"poor\""), "{text}");
}
