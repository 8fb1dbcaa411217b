use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use crate::workflows::applications::domain::{
    Application, ApplicationAggregate, ApplicationId, Company, CompanyId, InterviewRound, Note,
    Position, PositionId, RoundId,
};
use crate::workflows::applications::repository::{
    ApplicationRepository, ChangeSet, RepositoryError, Write,
};
use crate::workflows::applications::timeline::TimelineEvent;

#[derive(Debug, Default, Clone)]
struct MemoryState {
    companies: HashMap<CompanyId, Company>,
    positions: HashMap<PositionId, Position>,
    applications: HashMap<ApplicationId, Application>,
    rounds: HashMap<RoundId, InterviewRound>,
    notes: Vec<Note>,
    events: Vec<TimelineEvent>,
}

impl MemoryState {
    fn apply(&mut self, write: Write) -> Result<(), RepositoryError> {
        match write {
            Write::InsertCompany(company) => {
                if self.companies.contains_key(&company.id) {
                    return Err(RepositoryError::Conflict(format!("company {}", company.id)));
                }
                self.companies.insert(company.id.clone(), company);
            }
            Write::InsertPosition(position) => {
                self.require_company(&position.company_id)?;
                if self.positions.contains_key(&position.id) {
                    return Err(RepositoryError::Conflict(format!(
                        "position {}",
                        position.id
                    )));
                }
                self.positions.insert(position.id.clone(), position);
            }
            Write::InsertApplication(application) => {
                self.require_company(&application.company_id)?;
                if !self.positions.contains_key(&application.position_id) {
                    return Err(RepositoryError::NotFound(format!(
                        "position {}",
                        application.position_id
                    )));
                }
                if self.applications.contains_key(&application.id) {
                    return Err(RepositoryError::Conflict(format!(
                        "application {}",
                        application.id
                    )));
                }
                self.applications
                    .insert(application.id.clone(), application);
            }
            Write::UpdateApplication(application) => {
                let slot = self.applications.get_mut(&application.id).ok_or_else(|| {
                    RepositoryError::NotFound(format!("application {}", application.id))
                })?;
                *slot = application;
            }
            Write::InsertRound(round) => {
                self.require_application(&round.application_id)?;
                if self.rounds.contains_key(&round.id) {
                    return Err(RepositoryError::Conflict(format!("round {}", round.id)));
                }
                self.rounds.insert(round.id.clone(), round);
            }
            Write::UpdateRound(round) => {
                let slot = self
                    .rounds
                    .get_mut(&round.id)
                    .filter(|stored| stored.application_id == round.application_id)
                    .ok_or_else(|| RepositoryError::NotFound(format!("round {}", round.id)))?;
                *slot = round;
            }
            Write::FinishRound(round) => {
                let slot = self
                    .rounds
                    .get_mut(&round.id)
                    .filter(|stored| stored.application_id == round.application_id)
                    .ok_or_else(|| RepositoryError::NotFound(format!("round {}", round.id)))?;
                if slot.is_finished {
                    return Err(RepositoryError::Conflict(format!(
                        "round {} is already finished",
                        round.id
                    )));
                }
                *slot = round;
            }
            Write::InsertNote(note) => {
                self.require_application(&note.application_id)?;
                if self.notes.iter().any(|stored| stored.id == note.id) {
                    return Err(RepositoryError::Conflict(format!("note {}", note.id)));
                }
                self.notes.push(note);
            }
            Write::AppendEvent(event) => {
                self.require_application(&event.application_id)?;
                if self.events.iter().any(|stored| stored.id == event.id) {
                    return Err(RepositoryError::Conflict(format!("event {}", event.id)));
                }
                self.events.push(event);
            }
        }
        Ok(())
    }

    fn require_company(&self, id: &CompanyId) -> Result<(), RepositoryError> {
        if self.companies.contains_key(id) {
            Ok(())
        } else {
            Err(RepositoryError::NotFound(format!("company {id}")))
        }
    }

    fn require_application(&self, id: &ApplicationId) -> Result<(), RepositoryError> {
        if self.applications.contains_key(id) {
            Ok(())
        } else {
            Err(RepositoryError::NotFound(format!("application {id}")))
        }
    }

    fn aggregate(
        &self,
        application: &Application,
    ) -> Result<ApplicationAggregate, RepositoryError> {
        let company = self
            .companies
            .get(&application.company_id)
            .cloned()
            .ok_or_else(|| {
                RepositoryError::Unavailable(format!(
                    "application {} references missing company",
                    application.id
                ))
            })?;
        let position = self
            .positions
            .get(&application.position_id)
            .cloned()
            .ok_or_else(|| {
                RepositoryError::Unavailable(format!(
                    "application {} references missing position",
                    application.id
                ))
            })?;

        let rounds = self
            .rounds
            .values()
            .filter(|round| round.application_id == application.id)
            .cloned()
            .collect();
        let notes = self
            .notes
            .iter()
            .filter(|note| note.application_id == application.id)
            .cloned()
            .collect();
        let timeline = self
            .events
            .iter()
            .filter(|event| event.application_id == application.id)
            .cloned()
            .collect();

        Ok(ApplicationAggregate {
            application: application.clone(),
            company,
            position,
            rounds,
            notes,
            timeline,
        }
        .normalized())
    }
}

/// Process-local repository. Commits stage every write on a copy and swap it in only when the
/// whole change set applied cleanly.
#[derive(Default, Clone)]
pub struct InMemoryApplicationStore {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryApplicationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, MemoryState>, RepositoryError> {
        self.state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("repository mutex poisoned".to_string()))
    }

    /// Number of timeline events across all applications.
    pub fn event_count(&self) -> Result<usize, RepositoryError> {
        Ok(self.state()?.events.len())
    }
}

impl ApplicationRepository for InMemoryApplicationStore {
    fn load(&self, id: &ApplicationId) -> Result<Option<ApplicationAggregate>, RepositoryError> {
        let state = self.state()?;
        state
            .applications
            .get(id)
            .map(|application| state.aggregate(application))
            .transpose()
    }

    fn list(&self) -> Result<Vec<ApplicationAggregate>, RepositoryError> {
        let state = self.state()?;
        let mut aggregates = state
            .applications
            .values()
            .map(|application| state.aggregate(application))
            .collect::<Result<Vec<_>, _>>()?;
        aggregates.sort_by(|a, b| b.application.created_at.cmp(&a.application.created_at));
        Ok(aggregates)
    }

    fn commit(&self, changes: ChangeSet) -> Result<(), RepositoryError> {
        let mut state = self.state()?;
        let mut staged = state.clone();
        let count = changes.len();

        for write in changes.into_writes() {
            let label = write.label();
            staged.apply(write).map_err(|err| {
                debug!(write = label, error = %err, "change set rejected");
                err
            })?;
        }

        *state = staged;
        debug!(writes = count, "change set committed");
        Ok(())
    }
}
