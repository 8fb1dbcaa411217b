use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::timeline::TimelineEvent;

macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn generate() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

identifier!(
    /// Identifier wrapper for tracked applications.
    ApplicationId
);
identifier!(
    /// Identifier wrapper for interview rounds.
    RoundId
);
identifier!(CompanyId);
identifier!(PositionId);
identifier!(NoteId);
identifier!(
    /// Identifier wrapper for timeline entries.
    EventId
);

/// Where an application stands. Round transitions store the derived label; a manual status change
/// may set any label, `FinalRound` included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Applied,
    Screening,
    Interview,
    FinalRound,
    Offer,
    Accepted,
    Rejected,
    Withdrawn,
}

impl ApplicationStatus {
    pub const fn ordered() -> [Self; 8] {
        [
            Self::Applied,
            Self::Screening,
            Self::Interview,
            Self::FinalRound,
            Self::Offer,
            Self::Accepted,
            Self::Rejected,
            Self::Withdrawn,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Applied => "Applied",
            Self::Screening => "Screening",
            Self::Interview => "Interview",
            Self::FinalRound => "Final Round",
            Self::Offer => "Offer",
            Self::Accepted => "Accepted",
            Self::Rejected => "Rejected",
            Self::Withdrawn => "Withdrawn",
        }
    }

    /// Stable key used by storage backends.
    pub const fn as_key(self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::Screening => "screening",
            Self::Interview => "interview",
            Self::FinalRound => "final_round",
            Self::Offer => "offer",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Withdrawn => "withdrawn",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ordered()
            .into_iter()
            .find(|status| status.as_key() == key)
    }

    /// Explicit end states; the round pipeline no longer moves once reached.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Rejected | Self::Withdrawn | Self::Accepted)
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Caller supplied classification recorded when a round is completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundOutcome {
    Advance,
    Reject,
}

impl RoundOutcome {
    pub const fn as_key(self) -> &'static str {
        match self {
            Self::Advance => "advance",
            Self::Reject => "reject",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "advance" => Some(Self::Advance),
            "reject" => Some(Self::Reject),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    pub id: CompanyId,
    pub name: String,
    pub website: Option<String>,
    pub industry: Option<String>,
    pub location: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub id: PositionId,
    pub company_id: CompanyId,
    pub title: String,
    pub location: Option<String>,
    pub employment_type: Option<String>,
    pub salary_min: Option<u32>,
    pub salary_max: Option<u32>,
    pub posting_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One candidate's pursuit of one position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub company_id: CompanyId,
    pub position_id: PositionId,
    pub status: ApplicationStatus,
    /// 1-based; one past the last round once every round was cleared.
    pub current_round: u32,
    pub rejected_round: Option<u32>,
    pub applied_on: NaiveDate,
    pub source: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterviewRound {
    pub id: RoundId,
    pub application_id: ApplicationId,
    pub seq_no: u32,
    pub title: String,
    pub is_finished: bool,
    pub feedback: Option<String>,
    pub note: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub duration_min: Option<u32>,
    pub interviewer: Option<String>,
    pub outcome: Option<RoundOutcome>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    pub application_id: ApplicationId,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Round data supplied by the user when scheduling a new round.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRound {
    pub title: String,
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration_min: Option<u32>,
    #[serde(default)]
    pub interviewer: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

impl NewRound {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub(crate) fn into_round(
        self,
        application_id: &ApplicationId,
        seq_no: u32,
    ) -> InterviewRound {
        InterviewRound {
            id: RoundId::generate(),
            application_id: application_id.clone(),
            seq_no,
            title: self.title.trim().to_string(),
            is_finished: false,
            feedback: None,
            note: clean_text(self.note),
            scheduled_at: self.scheduled_at,
            duration_min: self.duration_min,
            interviewer: clean_text(self.interviewer),
            outcome: None,
            completed_at: None,
        }
    }
}

/// Outcome data recorded when finishing a round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundCompletion {
    pub outcome: RoundOutcome,
    #[serde(default)]
    pub feedback: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

impl RoundCompletion {
    pub fn advance() -> Self {
        Self {
            outcome: RoundOutcome::Advance,
            feedback: None,
            note: None,
        }
    }

    pub fn reject() -> Self {
        Self {
            outcome: RoundOutcome::Reject,
            feedback: None,
            note: None,
        }
    }

    pub fn with_feedback(mut self, feedback: impl Into<String>) -> Self {
        self.feedback = Some(feedback.into());
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Everything loaded for one application: the unit every transition reads from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationAggregate {
    pub application: Application,
    pub company: Company,
    pub position: Position,
    pub rounds: Vec<InterviewRound>,
    pub notes: Vec<Note>,
    pub timeline: Vec<TimelineEvent>,
}

impl ApplicationAggregate {
    /// Orders rounds by `seq_no` and the timeline chronologically.
    pub fn normalized(mut self) -> Self {
        self.rounds.sort_by_key(|round| round.seq_no);
        self.notes.sort_by_key(|note| note.created_at);
        self.timeline.sort_by_key(|event| event.occurred_at);
        self
    }

    pub fn id(&self) -> &ApplicationId {
        &self.application.id
    }

    pub fn total_rounds(&self) -> u32 {
        self.rounds.len() as u32
    }

    pub fn finished_rounds(&self) -> u32 {
        self.rounds.iter().filter(|round| round.is_finished).count() as u32
    }

    pub fn round(&self, id: &RoundId) -> Option<&InterviewRound> {
        self.rounds.iter().find(|round| &round.id == id)
    }

    pub fn next_incomplete_round(&self) -> Option<&InterviewRound> {
        super::progress::next_incomplete_round(&self.rounds)
    }
}

pub(crate) fn clean_text(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|trimmed| !trimmed.is_empty())
}
