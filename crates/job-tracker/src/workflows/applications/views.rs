use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use super::domain::{
    Application, ApplicationAggregate, ApplicationId, ApplicationStatus, Company, InterviewRound,
    Note, Position, RoundId,
};
use super::timeline::TimelineEvent;

/// Short description of the round an applicant is heading into.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NextRoundView {
    pub id: RoundId,
    pub seq_no: u32,
    pub title: String,
    pub scheduled_at: Option<DateTime<Utc>>,
}

impl NextRoundView {
    fn from_round(round: &InterviewRound) -> Self {
        Self {
            id: round.id.clone(),
            seq_no: round.seq_no,
            title: round.title.clone(),
            scheduled_at: round.scheduled_at,
        }
    }
}

/// Progress bar numbers for list and card views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProgressView {
    pub finished: u32,
    pub total: u32,
    pub current_round: u32,
}

/// Row shown in list/grid/table views.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplicationSummary {
    pub id: ApplicationId,
    pub company: String,
    pub position: String,
    pub status: ApplicationStatus,
    pub status_label: &'static str,
    pub progress: ProgressView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejected_round: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_round: Option<NextRoundView>,
    pub applied_on: NaiveDate,
    pub updated_at: DateTime<Utc>,
}

/// Full application snapshot consumed by the detail page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplicationSnapshot {
    #[serde(flatten)]
    pub application: Application,
    pub status_label: &'static str,
    pub progress: ProgressView,
    pub company: Company,
    pub position: Position,
    pub rounds: Vec<InterviewRound>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_round: Option<NextRoundView>,
    pub notes: Vec<Note>,
    pub timeline: Vec<TimelineEvent>,
}

impl ApplicationAggregate {
    pub fn progress(&self) -> ProgressView {
        ProgressView {
            finished: self.finished_rounds(),
            total: self.total_rounds(),
            current_round: self.application.current_round,
        }
    }

    pub fn summary(&self) -> ApplicationSummary {
        ApplicationSummary {
            id: self.application.id.clone(),
            company: self.company.name.clone(),
            position: self.position.title.clone(),
            status: self.application.status,
            status_label: self.application.status.label(),
            progress: self.progress(),
            rejected_round: self.application.rejected_round,
            next_round: self.next_incomplete_round().map(NextRoundView::from_round),
            applied_on: self.application.applied_on,
            updated_at: self.application.updated_at,
        }
    }

    pub fn snapshot(&self) -> ApplicationSnapshot {
        ApplicationSnapshot {
            application: self.application.clone(),
            status_label: self.application.status.label(),
            progress: self.progress(),
            company: self.company.clone(),
            position: self.position.clone(),
            rounds: self.rounds.clone(),
            next_round: self.next_incomplete_round().map(NextRoundView::from_round),
            notes: self.notes.clone(),
            timeline: self.timeline.clone(),
        }
    }
}
