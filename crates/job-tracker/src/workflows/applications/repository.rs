use super::domain::{
    Application, ApplicationAggregate, ApplicationId, Company, InterviewRound, Note, Position,
};
use super::timeline::TimelineEvent;

/// One write inside a [`ChangeSet`].
#[derive(Debug, Clone, PartialEq)]
pub enum Write {
    InsertCompany(Company),
    InsertPosition(Position),
    InsertApplication(Application),
    UpdateApplication(Application),
    InsertRound(InterviewRound),
    UpdateRound(InterviewRound),
    /// Stores a completed round; refused with a conflict when storage already has it finished.
    FinishRound(InterviewRound),
    InsertNote(Note),
    AppendEvent(TimelineEvent),
}

impl Write {
    pub fn label(&self) -> &'static str {
        match self {
            Write::InsertCompany(_) => "insert company",
            Write::InsertPosition(_) => "insert position",
            Write::InsertApplication(_) => "insert application",
            Write::UpdateApplication(_) => "update application",
            Write::InsertRound(_) => "insert round",
            Write::UpdateRound(_) => "update round",
            Write::FinishRound(_) => "finish round",
            Write::InsertNote(_) => "insert note",
            Write::AppendEvent(_) => "append event",
        }
    }
}

/// Ordered writes that a repository applies all together or not at all.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    writes: Vec<Write>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, write: Write) {
        self.writes.push(write);
    }

    pub fn with(mut self, write: Write) -> Self {
        self.push(write);
        self
    }

    pub fn writes(&self) -> &[Write] {
        &self.writes
    }

    pub fn into_writes(self) -> Vec<Write> {
        self.writes
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn events(&self) -> impl Iterator<Item = &TimelineEvent> {
        self.writes.iter().filter_map(|write| match write {
            Write::AppendEvent(event) => Some(event),
            _ => None,
        })
    }
}

/// Persistence collaborator so the service can be exercised against any storage.
pub trait ApplicationRepository: Send + Sync {
    /// Loads one application with its company, position, rounds, notes and timeline.
    fn load(&self, id: &ApplicationId) -> Result<Option<ApplicationAggregate>, RepositoryError>;

    fn list(&self) -> Result<Vec<ApplicationAggregate>, RepositoryError>;

    /// Applies every write in order inside one transactional unit. Any failure leaves storage
    /// exactly as it was before the call.
    fn commit(&self, changes: ChangeSet) -> Result<(), RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists: {0}")]
    Conflict(String),
    #[error("record not found: {0}")]
    NotFound(String),
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
