//! End-to-end scenarios for the interview-round workflow, driven through the public service
//! facade and HTTP router against the SQLite store.

mod common {
    use std::sync::Arc;

    use job_tracker::workflows::applications::{
        ApplicationDraft, CompanyDraft, NewRound, PositionDraft, SqliteApplicationStore,
        TrackerService,
    };

    pub(super) fn draft() -> ApplicationDraft {
        ApplicationDraft {
            company: CompanyDraft {
                name: "Northwind Traders".to_string(),
                website: Some("https://northwind.example".to_string()),
                ..CompanyDraft::default()
            },
            position: PositionDraft {
                title: "Platform Engineer".to_string(),
                salary_min: Some(95_000),
                salary_max: Some(115_000),
                ..PositionDraft::default()
            },
            applied_on: None,
            source: Some("company website".to_string()),
            rounds: vec![
                NewRound::titled("Recruiter screen"),
                NewRound::titled("Hiring manager"),
                NewRound::titled("System design"),
            ],
        }
    }

    pub(super) fn service() -> TrackerService<SqliteApplicationStore> {
        let store = SqliteApplicationStore::open_in_memory().expect("sqlite opens");
        TrackerService::new(Arc::new(store))
    }
}

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use job_tracker::workflows::applications::{
    tracker_router, ApplicationStatus, ErrorKind, NewRound, RoundCompletion, TimelineEventKind,
};
use serde_json::{json, Value};
use tower::ServiceExt;

#[test]
fn candidate_clears_every_round_and_reaches_offer() {
    let service = common::service();
    let created = service
        .create_application(common::draft())
        .expect("application created");
    let id = created.id().clone();

    let inserted = service
        .insert_round(&id, 1, NewRound::titled("Take-home exercise"))
        .expect("extra round inserted");
    assert_eq!(inserted.seq_no, 2);

    while let Some(next) = service.next_incomplete_round(&id).expect("lookup works") {
        let (application, round) = service
            .complete_round(&id, &next.id, RoundCompletion::advance())
            .expect("round completes");
        assert_eq!(round.seq_no, next.seq_no);
        assert!(application.current_round <= 5);
    }

    let aggregate = service.load_application(&id).expect("application loads");
    assert_eq!(aggregate.application.status, ApplicationStatus::Offer);
    assert_eq!(aggregate.application.current_round, 5);
    assert_eq!(aggregate.finished_rounds(), 4);
    assert_eq!(
        aggregate.timeline.last().map(|event| event.kind),
        Some(TimelineEventKind::Offer)
    );

    let accepted = service
        .update_status(&id, ApplicationStatus::Accepted)
        .expect("offer accepted");
    assert_eq!(accepted.status, ApplicationStatus::Accepted);

    let error = service
        .insert_round(&id, 4, NewRound::titled("Too late"))
        .expect_err("closed applications keep their rounds");
    assert_eq!(error.kind(), ErrorKind::InvalidTransition);
}

#[test]
fn rejection_in_round_two_closes_the_pipeline() {
    let service = common::service();
    let created = service
        .create_application(common::draft())
        .expect("application created");
    let id = created.id().clone();

    service
        .complete_round(&id, &created.rounds[0].id, RoundCompletion::advance())
        .expect("round 1 completes");
    let (application, _) = service
        .complete_round(
            &id,
            &created.rounds[1].id,
            RoundCompletion::reject().with_feedback("not a fit"),
        )
        .expect("round 2 rejection recorded");

    assert_eq!(application.status, ApplicationStatus::Rejected);
    assert_eq!(application.rejected_round, Some(2));
    assert_eq!(application.current_round, 2);

    let timeline = service.timeline(&id).expect("timeline loads");
    let rejection = timeline.last().expect("rejection event");
    assert_eq!(rejection.kind, TimelineEventKind::Rejection);
    assert!(rejection.description.contains("not a fit"));

    let error = service
        .complete_round(&id, &created.rounds[2].id, RoundCompletion::advance())
        .expect_err("closed application");
    assert_eq!(error.kind(), ErrorKind::InvalidTransition);
}

#[tokio::test]
async fn http_flow_creates_and_advances_an_application() {
    let router = tracker_router(Arc::new(common::service()));

    let response = router
        .clone()
        .oneshot(
            Request::post("/api/v1/applications")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    serde_json::to_vec(&common::draft()).expect("draft serializes"),
                ))
                .expect("request builds"),
        )
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = read_json(response).await;
    let id = created["id"].as_str().expect("id present").to_string();
    let first_round = created["rounds"][0]["id"]
        .as_str()
        .expect("round id present")
        .to_string();

    let response = router
        .clone()
        .oneshot(
            Request::post(format!("/api/v1/applications/{id}/intents"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    serde_json::to_vec(&json!({
                        "intent": "complete_round",
                        "round_id": first_round,
                        "outcome": "advance",
                    }))
                    .expect("intent serializes"),
                ))
                .expect("request builds"),
        )
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let snapshot = read_json(response).await;
    assert_eq!(snapshot["current_round"], json!(2));
    assert_eq!(snapshot["status"], json!("interview"));
    assert_eq!(snapshot["progress"]["finished"], json!(1));

    let response = router
        .oneshot(
            Request::get("/api/v1/applications")
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("route executes");
    let summaries = read_json(response).await;
    assert_eq!(summaries[0]["status_label"], json!("Interview"));
    assert_eq!(summaries[0]["next_round"]["title"], json!("Hiring manager"));
}

async fn read_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("body readable");
    serde_json::from_slice(&body).expect("json body")
}
