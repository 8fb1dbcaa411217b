//! Job application tracking: intake, interview round progression, and the timeline that
//! records every state change.
//!
//! The progression rules live in [`progress`] as pure functions. [`TrackerService`] loads an
//! aggregate, runs a transition and hands the resulting [`ChangeSet`] to a repository, which
//! applies it as one transactional unit.

pub mod dashboard;
pub mod domain;
pub mod intake;
pub mod progress;
pub mod repository;
pub mod router;
pub mod service;
pub mod store;
pub mod timeline;
pub mod views;

#[cfg(test)]
mod tests;

pub use dashboard::{Dashboard, StatusCount, UpcomingRound};
pub use domain::{
    Application, ApplicationAggregate, ApplicationId, ApplicationStatus, Company, CompanyId,
    InterviewRound, NewRound, Note, NoteId, Position, PositionId, RoundCompletion, RoundId,
    RoundOutcome,
};
pub use intake::{ApplicationDraft, CompanyDraft, DraftViolation, PositionDraft};
pub use progress::{derive_status, InvariantViolation, TransitionError};
pub use repository::{ApplicationRepository, ChangeSet, RepositoryError, Write};
pub use router::tracker_router;
pub use service::{ErrorKind, TrackerError, TrackerService, UserIntent};
pub use store::{InMemoryApplicationStore, SqliteApplicationStore};
pub use timeline::{TimelineEvent, TimelineEventKind};
pub use views::{ApplicationSnapshot, ApplicationSummary, NextRoundView, ProgressView};
