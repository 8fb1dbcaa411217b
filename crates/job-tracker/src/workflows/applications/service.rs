use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::dashboard::Dashboard;
use super::domain::{
    Application, ApplicationAggregate, ApplicationId, ApplicationStatus, InterviewRound,
    NewRound, Note, NoteId, RoundCompletion, RoundId, RoundOutcome,
};
use super::intake::{self, ApplicationDraft, DraftViolation};
use super::progress::{self, TransitionError};
use super::repository::{ApplicationRepository, ChangeSet, RepositoryError, Write};
use super::timeline::{TimelineEvent, TimelineEventKind};
use super::views::ApplicationSummary;

/// Coarse error classification surfaced to the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    InvalidTransition,
    Validation,
    PersistenceFailure,
}

impl ErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::InvalidTransition => "invalid_transition",
            Self::Validation => "validation",
            Self::PersistenceFailure => "persistence_failure",
        }
    }
}

/// Error raised by the tracker service.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("application {0} not found")]
    ApplicationNotFound(ApplicationId),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Draft(#[from] DraftViolation),
    #[error("note content is required")]
    EmptyNote,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl TrackerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TrackerError::ApplicationNotFound(_)
            | TrackerError::Transition(TransitionError::RoundNotFound(_)) => ErrorKind::NotFound,
            TrackerError::Transition(_) => ErrorKind::InvalidTransition,
            TrackerError::Draft(_) | TrackerError::EmptyNote => ErrorKind::Validation,
            TrackerError::Repository(_) => ErrorKind::PersistenceFailure,
        }
    }
}

/// User intents emitted by the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "intent", rename_all = "snake_case")]
pub enum UserIntent {
    CompleteRound {
        round_id: RoundId,
        outcome: RoundOutcome,
        #[serde(default)]
        feedback: Option<String>,
        #[serde(default)]
        note: Option<String>,
    },
    InsertRound {
        after_index: usize,
        round: NewRound,
    },
    MoveRound {
        round_id: RoundId,
        to_index: usize,
    },
    UpdateStatus {
        status: ApplicationStatus,
    },
    AddNote {
        content: String,
    },
}

/// Service translating user operations into validated, atomically persisted transitions.
pub struct TrackerService<R> {
    repository: Arc<R>,
}

impl<R> TrackerService<R>
where
    R: ApplicationRepository + 'static,
{
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repository
    }

    /// Validates the wizard draft and writes company, position, application and rounds at once.
    pub fn create_application(
        &self,
        draft: ApplicationDraft,
    ) -> Result<ApplicationAggregate, TrackerError> {
        let records = intake::prepare(draft, Utc::now()).map_err(|err| {
            warn!(error = %err, "application draft rejected");
            err
        })?;
        let id = records.application.id.clone();

        let mut changes = ChangeSet::new()
            .with(Write::InsertCompany(records.company))
            .with(Write::InsertPosition(records.position))
            .with(Write::InsertApplication(records.application));
        for round in records.rounds {
            changes.push(Write::InsertRound(round));
        }
        changes.push(Write::AppendEvent(records.event));

        self.commit(&id, changes)?;
        info!(application_id = %id, "application created");
        self.load_application(&id)
    }

    pub fn load_application(&self, id: &ApplicationId) -> Result<ApplicationAggregate, TrackerError> {
        let aggregate = self
            .repository
            .load(id)?
            .ok_or_else(|| TrackerError::ApplicationNotFound(id.clone()))?;

        if let Err(violation) = progress::check_invariants(&aggregate.application, &aggregate.rounds)
        {
            warn!(application_id = %id, %violation, "stored application is inconsistent");
        }
        Ok(aggregate)
    }

    pub fn list(&self) -> Result<Vec<ApplicationSummary>, TrackerError> {
        Ok(self
            .repository
            .list()?
            .iter()
            .map(ApplicationAggregate::summary)
            .collect())
    }

    pub fn next_incomplete_round(
        &self,
        id: &ApplicationId,
    ) -> Result<Option<InterviewRound>, TrackerError> {
        let aggregate = self.load_application(id)?;
        Ok(aggregate.next_incomplete_round().cloned())
    }

    /// Finishes a round and updates the application in one transactional unit.
    pub fn complete_round(
        &self,
        id: &ApplicationId,
        round_id: &RoundId,
        completion: RoundCompletion,
    ) -> Result<(Application, InterviewRound), TrackerError> {
        let aggregate = self.load_application(id)?;
        let outcome = completion.outcome;
        let transition = progress::complete_round(
            &aggregate.application,
            &aggregate.rounds,
            round_id,
            completion,
            Utc::now(),
        )
        .map_err(|err| rejected(id, "complete round", err))?;

        let changes = ChangeSet::new()
            .with(Write::FinishRound(transition.round.clone()))
            .with(Write::UpdateApplication(transition.application.clone()))
            .with(Write::AppendEvent(transition.event));
        self.commit(id, changes).map_err(|err| match err {
            TrackerError::Repository(RepositoryError::Conflict(_)) => {
                TrackerError::Transition(TransitionError::RoundAlreadyFinished {
                    seq_no: transition.round.seq_no,
                })
            }
            other => other,
        })?;

        info!(
            application_id = %id,
            seq_no = transition.round.seq_no,
            outcome = outcome.as_key(),
            status = transition.application.status.as_key(),
            current_round = transition.application.current_round,
            "round completed"
        );
        Ok((transition.application, transition.round))
    }

    /// Inserts a round at 0-based `index`, shifting later rounds up by one.
    pub fn insert_round(
        &self,
        id: &ApplicationId,
        index: usize,
        new_round: NewRound,
    ) -> Result<InterviewRound, TrackerError> {
        let aggregate = self.load_application(id)?;
        let insertion = progress::insert_round(
            &aggregate.application,
            &aggregate.rounds,
            index,
            new_round,
            Utc::now(),
        )
        .map_err(|err| rejected(id, "insert round", err))?;

        let mut changes = ChangeSet::new();
        for round in insertion.shifted.iter().rev() {
            changes.push(Write::UpdateRound(round.clone()));
        }
        changes.push(Write::InsertRound(insertion.round.clone()));
        changes.push(Write::UpdateApplication(insertion.application));
        changes.push(Write::AppendEvent(insertion.event));
        self.commit(id, changes)?;

        info!(
            application_id = %id,
            seq_no = insertion.round.seq_no,
            shifted = insertion.shifted.len(),
            "round inserted"
        );
        Ok(insertion.round)
    }

    /// Moves an open round to 0-based `index`; returns the renumbered sequence.
    pub fn move_round(
        &self,
        id: &ApplicationId,
        round_id: &RoundId,
        index: usize,
    ) -> Result<Vec<InterviewRound>, TrackerError> {
        let aggregate = self.load_application(id)?;
        let reorder = progress::move_round(
            &aggregate.application,
            &aggregate.rounds,
            round_id,
            index,
            Utc::now(),
        )
        .map_err(|err| rejected(id, "move round", err))?;

        let mut changes = ChangeSet::new();
        for round in &reorder.renumbered {
            changes.push(Write::UpdateRound(round.clone()));
        }
        changes.push(Write::UpdateApplication(reorder.application));
        changes.push(Write::AppendEvent(reorder.event));
        self.commit(id, changes)?;

        info!(application_id = %id, round_id = %round_id, index, "round moved");
        Ok(reorder.rounds)
    }

    pub fn update_status(
        &self,
        id: &ApplicationId,
        status: ApplicationStatus,
    ) -> Result<Application, TrackerError> {
        let aggregate = self.load_application(id)?;
        let change = progress::change_status(&aggregate.application, status, Utc::now())
            .map_err(|err| rejected(id, "update status", err))?;

        let changes = ChangeSet::new()
            .with(Write::UpdateApplication(change.application.clone()))
            .with(Write::AppendEvent(change.event));
        self.commit(id, changes)?;

        info!(
            application_id = %id,
            from = change.previous.as_key(),
            to = status.as_key(),
            "status updated"
        );
        Ok(change.application)
    }

    pub fn add_note(&self, id: &ApplicationId, content: &str) -> Result<Note, TrackerError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(TrackerError::EmptyNote);
        }
        let aggregate = self.load_application(id)?;
        let now = Utc::now();

        let note = Note {
            id: NoteId::generate(),
            application_id: aggregate.application.id.clone(),
            content: content.to_string(),
            created_at: now,
        };
        let event = TimelineEvent::new(
            id,
            TimelineEventKind::Note,
            "Note added",
            preview(content),
            now,
        );

        let changes = ChangeSet::new()
            .with(Write::InsertNote(note.clone()))
            .with(Write::AppendEvent(event));
        self.commit(id, changes)?;
        Ok(note)
    }

    pub fn timeline(&self, id: &ApplicationId) -> Result<Vec<TimelineEvent>, TrackerError> {
        Ok(self.load_application(id)?.timeline)
    }

    pub fn dashboard(&self, now: DateTime<Utc>) -> Result<Dashboard, TrackerError> {
        let aggregates = self.repository.list()?;
        Ok(Dashboard::build(&aggregates, now))
    }

    /// Runs a presentation intent and hands back a freshly loaded aggregate.
    pub fn apply_intent(
        &self,
        id: &ApplicationId,
        intent: UserIntent,
    ) -> Result<ApplicationAggregate, TrackerError> {
        match intent {
            UserIntent::CompleteRound {
                round_id,
                outcome,
                feedback,
                note,
            } => {
                let completion = RoundCompletion {
                    outcome,
                    feedback,
                    note,
                };
                self.complete_round(id, &round_id, completion)?;
            }
            UserIntent::InsertRound { after_index, round } => {
                self.insert_round(id, after_index, round)?;
            }
            UserIntent::MoveRound { round_id, to_index } => {
                self.move_round(id, &round_id, to_index)?;
            }
            UserIntent::UpdateStatus { status } => {
                self.update_status(id, status)?;
            }
            UserIntent::AddNote { content } => {
                self.add_note(id, &content)?;
            }
        }
        self.load_application(id)
    }

    fn commit(&self, id: &ApplicationId, changes: ChangeSet) -> Result<(), TrackerError> {
        let writes = changes.len();
        let events = changes.events().count();
        self.repository.commit(changes).map_err(|err| {
            warn!(application_id = %id, writes, events, error = %err, "change set not persisted");
            TrackerError::from(err)
        })
    }
}

fn rejected(id: &ApplicationId, operation: &str, err: TransitionError) -> TrackerError {
    warn!(application_id = %id, operation, error = %err, "transition rejected");
    TrackerError::from(err)
}

fn preview(content: &str) -> String {
    const LIMIT: usize = 120;
    if content.chars().count() <= LIMIT {
        return content.to_string();
    }
    let truncated: String = content.chars().take(LIMIT).collect();
    format!("{truncated}...")
}
