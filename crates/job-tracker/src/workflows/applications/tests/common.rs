use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::workflows::applications::domain::{
    Application, ApplicationAggregate, ApplicationId, InterviewRound, NewRound, RoundCompletion,
};
use crate::workflows::applications::intake::{self, ApplicationDraft, CompanyDraft, PositionDraft};
use crate::workflows::applications::progress;
use crate::workflows::applications::repository::{
    ApplicationRepository, ChangeSet, RepositoryError, Write,
};
use crate::workflows::applications::{
    tracker_router, InMemoryApplicationStore, SqliteApplicationStore, TrackerService,
};

pub(super) fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, day, hour, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn draft(rounds: &[&str]) -> ApplicationDraft {
    ApplicationDraft {
        company: CompanyDraft {
            name: "Acme Robotics".to_string(),
            website: Some("https://acme.example".to_string()),
            industry: Some("Robotics".to_string()),
            location: Some("Berlin".to_string()),
        },
        position: PositionDraft {
            title: "Backend Engineer".to_string(),
            location: Some("Remote".to_string()),
            employment_type: Some("full-time".to_string()),
            salary_min: Some(70_000),
            salary_max: Some(90_000),
            posting_url: Some("https://acme.example/jobs/42".to_string()),
        },
        applied_on: None,
        source: Some("referral".to_string()),
        rounds: rounds.iter().map(|title| NewRound::titled(*title)).collect(),
    }
}

/// Application plus rounds built without touching a repository.
pub(super) fn pipeline(titles: &[&str]) -> (Application, Vec<InterviewRound>) {
    let records = intake::prepare(draft(titles), at(1, 9)).expect("draft is valid");
    (records.application, records.rounds)
}

pub(super) fn three_rounds() -> (Application, Vec<InterviewRound>) {
    pipeline(&["Recruiter screen", "Technical interview", "Onsite"])
}

/// Completes the next open round in place and returns the finished round.
pub(super) fn complete_next(
    application: &mut Application,
    rounds: &mut [InterviewRound],
    completion: RoundCompletion,
    at: DateTime<Utc>,
) -> InterviewRound {
    let next = progress::next_incomplete_round(rounds)
        .map(|round| round.id.clone())
        .expect("an open round remains");
    let transition = progress::complete_round(application, rounds, &next, completion, at)
        .expect("next round completes");

    *application = transition.application;
    let slot = rounds
        .iter_mut()
        .find(|round| round.id == transition.round.id)
        .expect("round present");
    *slot = transition.round.clone();
    transition.round
}

pub(super) fn memory_service() -> (
    TrackerService<InMemoryApplicationStore>,
    InMemoryApplicationStore,
) {
    let store = InMemoryApplicationStore::new();
    let service = TrackerService::new(Arc::new(store.clone()));
    (service, store)
}

pub(super) fn sqlite_service() -> TrackerService<SqliteApplicationStore> {
    let store = SqliteApplicationStore::open_in_memory().expect("in-memory sqlite opens");
    TrackerService::new(Arc::new(store))
}

pub(super) fn seed<R>(service: &TrackerService<R>, titles: &[&str]) -> ApplicationAggregate
where
    R: ApplicationRepository + 'static,
{
    service
        .create_application(draft(titles))
        .expect("application is created")
}

/// Writes a prepared draft straight through a repository with a fixed timestamp.
pub(super) fn commit_prepared(
    repository: &dyn ApplicationRepository,
    titles: &[&str],
    created: DateTime<Utc>,
) -> ApplicationId {
    let records = intake::prepare(draft(titles), created).expect("draft is valid");
    let id = records.application.id.clone();
    let mut changes = ChangeSet::new()
        .with(Write::InsertCompany(records.company))
        .with(Write::InsertPosition(records.position))
        .with(Write::InsertApplication(records.application));
    for round in records.rounds {
        changes.push(Write::InsertRound(round));
    }
    changes.push(Write::AppendEvent(records.event));
    repository.commit(changes).expect("change set commits");
    id
}

/// Delegates to the in-memory store but slips a failing write in right after the first round
/// update, so a completion fails between the round and the application write.
pub(super) struct FailAfterRoundWrite {
    pub(super) inner: InMemoryApplicationStore,
}

impl ApplicationRepository for FailAfterRoundWrite {
    fn load(&self, id: &ApplicationId) -> Result<Option<ApplicationAggregate>, RepositoryError> {
        self.inner.load(id)
    }

    fn list(&self) -> Result<Vec<ApplicationAggregate>, RepositoryError> {
        self.inner.list()
    }

    fn commit(&self, changes: ChangeSet) -> Result<(), RepositoryError> {
        let mut sabotaged = ChangeSet::new();
        let mut injected = false;
        for write in changes.into_writes() {
            let ghost = match &write {
                Write::FinishRound(round) | Write::UpdateRound(round) if !injected => {
                    let (mut application, _) = three_rounds();
                    application.id = ApplicationId(format!("{}-ghost", round.application_id));
                    Some(application)
                }
                _ => None,
            };
            sabotaged.push(write);
            if let Some(application) = ghost {
                sabotaged.push(Write::UpdateApplication(application));
                injected = true;
            }
        }
        self.inner.commit(sabotaged)
    }
}

/// Serves the first snapshot loaded for each application forever, like a second browser tab
/// acting on a page it never refreshed.
pub(super) struct StaleReads {
    pub(super) inner: InMemoryApplicationStore,
    snapshots: Mutex<HashMap<ApplicationId, ApplicationAggregate>>,
}

impl StaleReads {
    pub(super) fn new(inner: InMemoryApplicationStore) -> Self {
        Self {
            inner,
            snapshots: Mutex::new(HashMap::new()),
        }
    }
}

impl ApplicationRepository for StaleReads {
    fn load(&self, id: &ApplicationId) -> Result<Option<ApplicationAggregate>, RepositoryError> {
        let mut snapshots = self.snapshots.lock().expect("snapshot lock");
        if let Some(snapshot) = snapshots.get(id) {
            return Ok(Some(snapshot.clone()));
        }
        let loaded = self.inner.load(id)?;
        if let Some(aggregate) = &loaded {
            snapshots.insert(id.clone(), aggregate.clone());
        }
        Ok(loaded)
    }

    fn list(&self) -> Result<Vec<ApplicationAggregate>, RepositoryError> {
        self.inner.list()
    }

    fn commit(&self, changes: ChangeSet) -> Result<(), RepositoryError> {
        self.inner.commit(changes)
    }
}

pub(super) struct UnavailableRepository;

impl ApplicationRepository for UnavailableRepository {
    fn load(&self, _id: &ApplicationId) -> Result<Option<ApplicationAggregate>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn list(&self) -> Result<Vec<ApplicationAggregate>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn commit(&self, _changes: ChangeSet) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

pub(super) fn router_with_service(
    service: TrackerService<InMemoryApplicationStore>,
) -> axum::Router {
    tracker_router(Arc::new(service))
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("body readable");
    serde_json::from_slice(&body).expect("json body")
}
