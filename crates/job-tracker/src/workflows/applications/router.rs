use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use super::domain::{ApplicationId, ApplicationStatus, NewRound, RoundCompletion, RoundId};
use super::intake::ApplicationDraft;
use super::repository::ApplicationRepository;
use super::service::{ErrorKind, TrackerError, TrackerService, UserIntent};

#[derive(Debug, Deserialize)]
pub(crate) struct InsertRoundRequest {
    pub after_index: usize,
    pub round: NewRound,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MoveRoundRequest {
    pub to_index: usize,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StatusRequest {
    pub status: ApplicationStatus,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NoteRequest {
    pub content: String,
}

/// Router builder exposing the tracker's HTTP endpoints.
pub fn tracker_router<R>(service: Arc<TrackerService<R>>) -> Router
where
    R: ApplicationRepository + 'static,
{
    Router::new()
        .route(
            "/api/v1/applications",
            post(create_handler::<R>).get(list_handler::<R>),
        )
        .route("/api/v1/applications/:id", get(snapshot_handler::<R>))
        .route(
            "/api/v1/applications/:id/timeline",
            get(timeline_handler::<R>),
        )
        .route(
            "/api/v1/applications/:id/rounds",
            post(insert_round_handler::<R>),
        )
        .route(
            "/api/v1/applications/:id/rounds/next",
            get(next_round_handler::<R>),
        )
        .route(
            "/api/v1/applications/:id/rounds/:round_id/complete",
            post(complete_round_handler::<R>),
        )
        .route(
            "/api/v1/applications/:id/rounds/:round_id/move",
            post(move_round_handler::<R>),
        )
        .route(
            "/api/v1/applications/:id/status",
            put(status_handler::<R>),
        )
        .route("/api/v1/applications/:id/notes", post(note_handler::<R>))
        .route(
            "/api/v1/applications/:id/intents",
            post(intent_handler::<R>),
        )
        .route("/api/v1/dashboard", get(dashboard_handler::<R>))
        .with_state(service)
}

pub(crate) async fn create_handler<R>(
    State(service): State<Arc<TrackerService<R>>>,
    Json(draft): Json<ApplicationDraft>,
) -> Response
where
    R: ApplicationRepository + 'static,
{
    match service.create_application(draft) {
        Ok(aggregate) => (StatusCode::CREATED, Json(aggregate.snapshot())).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn list_handler<R>(State(service): State<Arc<TrackerService<R>>>) -> Response
where
    R: ApplicationRepository + 'static,
{
    match service.list() {
        Ok(summaries) => (StatusCode::OK, Json(summaries)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn snapshot_handler<R>(
    State(service): State<Arc<TrackerService<R>>>,
    Path(id): Path<String>,
) -> Response
where
    R: ApplicationRepository + 'static,
{
    match service.load_application(&ApplicationId(id)) {
        Ok(aggregate) => (StatusCode::OK, Json(aggregate.snapshot())).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn timeline_handler<R>(
    State(service): State<Arc<TrackerService<R>>>,
    Path(id): Path<String>,
) -> Response
where
    R: ApplicationRepository + 'static,
{
    match service.timeline(&ApplicationId(id)) {
        Ok(events) => (StatusCode::OK, Json(events)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn next_round_handler<R>(
    State(service): State<Arc<TrackerService<R>>>,
    Path(id): Path<String>,
) -> Response
where
    R: ApplicationRepository + 'static,
{
    match service.next_incomplete_round(&ApplicationId(id)) {
        Ok(round) => (StatusCode::OK, Json(json!({ "next_round": round }))).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn insert_round_handler<R>(
    State(service): State<Arc<TrackerService<R>>>,
    Path(id): Path<String>,
    Json(request): Json<InsertRoundRequest>,
) -> Response
where
    R: ApplicationRepository + 'static,
{
    match service.insert_round(&ApplicationId(id), request.after_index, request.round) {
        Ok(round) => (StatusCode::CREATED, Json(round)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn complete_round_handler<R>(
    State(service): State<Arc<TrackerService<R>>>,
    Path((id, round_id)): Path<(String, String)>,
    Json(completion): Json<RoundCompletion>,
) -> Response
where
    R: ApplicationRepository + 'static,
{
    match service.complete_round(&ApplicationId(id), &RoundId(round_id), completion) {
        Ok((application, round)) => {
            let payload = json!({
                "application": application,
                "round": round,
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn move_round_handler<R>(
    State(service): State<Arc<TrackerService<R>>>,
    Path((id, round_id)): Path<(String, String)>,
    Json(request): Json<MoveRoundRequest>,
) -> Response
where
    R: ApplicationRepository + 'static,
{
    match service.move_round(&ApplicationId(id), &RoundId(round_id), request.to_index) {
        Ok(rounds) => (StatusCode::OK, Json(rounds)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn status_handler<R>(
    State(service): State<Arc<TrackerService<R>>>,
    Path(id): Path<String>,
    Json(request): Json<StatusRequest>,
) -> Response
where
    R: ApplicationRepository + 'static,
{
    match service.update_status(&ApplicationId(id), request.status) {
        Ok(application) => (StatusCode::OK, Json(application)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn note_handler<R>(
    State(service): State<Arc<TrackerService<R>>>,
    Path(id): Path<String>,
    Json(request): Json<NoteRequest>,
) -> Response
where
    R: ApplicationRepository + 'static,
{
    match service.add_note(&ApplicationId(id), &request.content) {
        Ok(note) => (StatusCode::CREATED, Json(note)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn intent_handler<R>(
    State(service): State<Arc<TrackerService<R>>>,
    Path(id): Path<String>,
    Json(intent): Json<UserIntent>,
) -> Response
where
    R: ApplicationRepository + 'static,
{
    match service.apply_intent(&ApplicationId(id), intent) {
        Ok(aggregate) => (StatusCode::OK, Json(aggregate.snapshot())).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn dashboard_handler<R>(
    State(service): State<Arc<TrackerService<R>>>,
) -> Response
where
    R: ApplicationRepository + 'static,
{
    match service.dashboard(Utc::now()) {
        Ok(dashboard) => (StatusCode::OK, Json(dashboard)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::InvalidTransition => StatusCode::CONFLICT,
        ErrorKind::Validation => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::PersistenceFailure => StatusCode::SERVICE_UNAVAILABLE,
    }
}

fn error_response(error: TrackerError) -> Response {
    let kind = error.kind();
    let payload = json!({
        "error": error.to_string(),
        "kind": kind.as_str(),
    });
    (status_for(kind), Json(payload)).into_response()
}
