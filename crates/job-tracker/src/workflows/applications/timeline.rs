use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{ApplicationId, ApplicationStatus, EventId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineEventKind {
    Application,
    Interview,
    Note,
    StatusChange,
    Offer,
    Rejection,
}

impl TimelineEventKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Application => "Application",
            Self::Interview => "Interview",
            Self::Note => "Note",
            Self::StatusChange => "Status Change",
            Self::Offer => "Offer",
            Self::Rejection => "Rejection",
        }
    }

    pub const fn as_key(self) -> &'static str {
        match self {
            Self::Application => "application",
            Self::Interview => "interview",
            Self::Note => "note",
            Self::StatusChange => "status_change",
            Self::Offer => "offer",
            Self::Rejection => "rejection",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "application" => Some(Self::Application),
            "interview" => Some(Self::Interview),
            "note" => Some(Self::Note),
            "status_change" => Some(Self::StatusChange),
            "offer" => Some(Self::Offer),
            "rejection" => Some(Self::Rejection),
            _ => None,
        }
    }

    /// Kind recorded when an application lands on `status`.
    pub const fn for_status(status: ApplicationStatus) -> Self {
        match status {
            ApplicationStatus::Offer => Self::Offer,
            ApplicationStatus::Rejected => Self::Rejection,
            _ => Self::StatusChange,
        }
    }
}

/// Append-only record of a state change, kept for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub id: EventId,
    pub application_id: ApplicationId,
    pub kind: TimelineEventKind,
    pub title: String,
    pub description: String,
    pub occurred_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ApplicationStatus>,
}

impl TimelineEvent {
    pub(crate) fn new(
        application_id: &ApplicationId,
        kind: TimelineEventKind,
        title: impl Into<String>,
        description: impl Into<String>,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: EventId::generate(),
            application_id: application_id.clone(),
            kind,
            title: title.into(),
            description: description.into(),
            occurred_at,
            status: None,
        }
    }

    pub(crate) fn with_status(mut self, status: ApplicationStatus) -> Self {
        self.status = Some(status);
        self
    }
}
