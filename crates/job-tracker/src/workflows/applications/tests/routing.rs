use super::common::*;
use axum::body::Body;
use axum::extract::State;
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use crate::workflows::applications::router::{list_handler, snapshot_handler};
use crate::workflows::applications::TrackerService;

fn json_request(method: &str, uri: &str, payload: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            serde_json::to_vec(&payload).expect("payload serializes"),
        ))
        .expect("request builds")
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri)
        .body(Body::empty())
        .expect("request builds")
}

#[tokio::test]
async fn create_route_returns_a_snapshot() {
    let (service, _) = memory_service();
    let router = router_with_service(service);

    let response = router
        .oneshot(json_request(
            "POST",
            "/api/v1/applications",
            serde_json::to_value(draft(&["Screen", "Tech"])).expect("draft serializes"),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::CREATED);
    let payload = read_json_body(response).await;
    assert_eq!(payload["status"], json!("applied"));
    assert_eq!(payload["status_label"], json!("Applied"));
    assert_eq!(payload["current_round"], json!(1));
    assert_eq!(payload["company"]["name"], json!("Acme Robotics"));
    assert_eq!(payload["rounds"].as_array().map(Vec::len), Some(2));
    assert_eq!(payload["next_round"]["seq_no"], json!(1));
}

#[tokio::test]
async fn invalid_drafts_are_unprocessable() {
    let (service, _) = memory_service();
    let router = router_with_service(service);
    let mut invalid = draft(&[]);
    invalid.company.name.clear();

    let response = router
        .oneshot(json_request(
            "POST",
            "/api/v1/applications",
            serde_json::to_value(invalid).expect("draft serializes"),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let payload = read_json_body(response).await;
    assert_eq!(payload["kind"], json!("validation"));
    assert_eq!(payload["error"], json!("company name is required"));
}

#[tokio::test]
async fn completing_out_of_order_is_a_conflict() {
    let (service, _) = memory_service();
    let aggregate = seed(&service, &["Screen", "Tech"]);
    let router = router_with_service(service);

    let uri = format!(
        "/api/v1/applications/{}/rounds/{}/complete",
        aggregate.id(),
        aggregate.rounds[1].id
    );
    let response = router
        .oneshot(json_request("POST", &uri, json!({ "outcome": "advance" })))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let payload = read_json_body(response).await;
    assert_eq!(payload["kind"], json!("invalid_transition"));
}

#[tokio::test]
async fn complete_route_returns_application_and_round() {
    let (service, _) = memory_service();
    let aggregate = seed(&service, &["Screen", "Tech"]);
    let router = router_with_service(service);

    let uri = format!(
        "/api/v1/applications/{}/rounds/{}/complete",
        aggregate.id(),
        aggregate.rounds[0].id
    );
    let response = router
        .oneshot(json_request(
            "POST",
            &uri,
            json!({ "outcome": "reject", "feedback": "not a fit" }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["application"]["status"], json!("rejected"));
    assert_eq!(payload["application"]["rejected_round"], json!(1));
    assert_eq!(payload["round"]["feedback"], json!("not a fit"));
}

#[tokio::test]
async fn unknown_applications_are_not_found() {
    let (service, _) = memory_service();
    let router = router_with_service(service);

    let response = router
        .oneshot(get("/api/v1/applications/does-not-exist"))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let payload = read_json_body(response).await;
    assert_eq!(payload["kind"], json!("not_found"));
}

#[tokio::test]
async fn round_and_status_routes_mutate_the_application() {
    let (service, _) = memory_service();
    let aggregate = seed(&service, &["Screen", "Tech"]);
    let id = aggregate.id().clone();
    let router = router_with_service(service);

    let response = router
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/v1/applications/{id}/rounds"),
            json!({ "after_index": 0, "round": { "title": "Intro call", "duration_min": 30 } }),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::CREATED);
    let inserted = read_json_body(response).await;
    assert_eq!(inserted["seq_no"], json!(1));

    let response = router
        .clone()
        .oneshot(json_request(
            "POST",
            &format!(
                "/api/v1/applications/{id}/rounds/{}/move",
                aggregate.rounds[1].id
            ),
            json!({ "to_index": 0 }),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let rounds = read_json_body(response).await;
    assert_eq!(rounds[0]["title"], json!("Tech"));

    let response = router
        .clone()
        .oneshot(get(&format!("/api/v1/applications/{id}/rounds/next")))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let next = read_json_body(response).await;
    assert_eq!(next["next_round"]["title"], json!("Tech"));

    let response = router
        .clone()
        .oneshot(json_request(
            "PUT",
            &format!("/api/v1/applications/{id}/status"),
            json!({ "status": "withdrawn" }),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);

    let response = router
        .oneshot(get(&format!("/api/v1/applications/{id}/timeline")))
        .await
        .expect("route executes");
    let timeline = read_json_body(response).await;
    let kinds: Vec<&str> = timeline
        .as_array()
        .expect("timeline array")
        .iter()
        .filter_map(|event| event["kind"].as_str())
        .collect();
    assert_eq!(
        kinds,
        vec!["application", "interview", "interview", "status_change"]
    );
}

#[tokio::test]
async fn next_round_route_keeps_its_shape_when_nothing_is_open() {
    let (service, _) = memory_service();
    let id = seed(&service, &[]).id().clone();
    let router = router_with_service(service);

    let response = router
        .oneshot(get(&format!("/api/v1/applications/{id}/rounds/next")))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload, json!({ "next_round": null }));
}

#[tokio::test]
async fn intent_route_applies_notes() {
    let (service, _) = memory_service();
    let aggregate = seed(&service, &["Screen"]);
    let router = router_with_service(service);

    let response = router
        .oneshot(json_request(
            "POST",
            &format!("/api/v1/applications/{}/intents", aggregate.id()),
            json!({ "intent": "add_note", "content": "Follow up on Friday" }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["notes"][0]["content"], json!("Follow up on Friday"));
    assert_eq!(payload["timeline"].as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn dashboard_route_counts_applications() {
    let (service, _) = memory_service();
    seed(&service, &["Screen"]);
    seed(&service, &[]);
    let router = router_with_service(service);

    let response = router
        .oneshot(get("/api/v1/dashboard"))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["total_applications"], json!(2));
    assert_eq!(payload["active_pipeline"], json!(2));
    assert!(payload.get("offer_rate").is_none());
}

#[tokio::test]
async fn handlers_report_outages_as_unavailable() {
    let service = Arc::new(TrackerService::new(Arc::new(UnavailableRepository)));

    let response = list_handler::<UnavailableRepository>(State(service.clone())).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let payload = read_json_body(response).await;
    assert_eq!(payload["kind"], json!("persistence_failure"));

    let response = snapshot_handler::<UnavailableRepository>(
        State(service),
        axum::extract::Path("any".to_string()),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}
