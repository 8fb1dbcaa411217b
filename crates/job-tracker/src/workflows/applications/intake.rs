use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    clean_text, Application, ApplicationId, ApplicationStatus, Company, CompanyId,
    InterviewRound, NewRound, Position, PositionId,
};
use super::timeline::{TimelineEvent, TimelineEventKind};

/// Company step of the intake wizard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyDraft {
    pub name: String,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

/// Position step of the intake wizard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionDraft {
    pub title: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub employment_type: Option<String>,
    #[serde(default)]
    pub salary_min: Option<u32>,
    #[serde(default)]
    pub salary_max: Option<u32>,
    #[serde(default)]
    pub posting_url: Option<String>,
}

/// Everything the wizard collects before anything is written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationDraft {
    pub company: CompanyDraft,
    pub position: PositionDraft,
    #[serde(default)]
    pub applied_on: Option<NaiveDate>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub rounds: Vec<NewRound>,
}

/// Validation errors raised before a draft is persisted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DraftViolation {
    #[error("company name is required")]
    MissingCompanyName,
    #[error("position title is required")]
    MissingPositionTitle,
    #[error("round {position} is missing a title")]
    MissingRoundTitle { position: usize },
    #[error("round {position} must have a positive duration")]
    ZeroDuration { position: usize },
    #[error("salary range is inverted (min {min} > max {max})")]
    InvertedSalaryRange { min: u32, max: u32 },
    #[error("{field} must be an http(s) URL")]
    InvalidUrl { field: &'static str },
}

/// Records created from a validated draft; written as one unit.
#[derive(Debug, Clone, PartialEq)]
pub struct IntakeRecords {
    pub company: Company,
    pub position: Position,
    pub application: Application,
    pub rounds: Vec<InterviewRound>,
    pub event: TimelineEvent,
}

pub fn validate(draft: &ApplicationDraft) -> Result<(), DraftViolation> {
    if draft.company.name.trim().is_empty() {
        return Err(DraftViolation::MissingCompanyName);
    }
    if draft.position.title.trim().is_empty() {
        return Err(DraftViolation::MissingPositionTitle);
    }
    check_url("company.website", draft.company.website.as_deref())?;
    check_url("position.posting_url", draft.position.posting_url.as_deref())?;

    if let (Some(min), Some(max)) = (draft.position.salary_min, draft.position.salary_max) {
        if min > max {
            return Err(DraftViolation::InvertedSalaryRange { min, max });
        }
    }

    for (offset, round) in draft.rounds.iter().enumerate() {
        let position = offset + 1;
        if round.title.trim().is_empty() {
            return Err(DraftViolation::MissingRoundTitle { position });
        }
        if round.duration_min == Some(0) {
            return Err(DraftViolation::ZeroDuration { position });
        }
    }

    Ok(())
}

/// Validates the draft and builds the records for a new application.
pub fn prepare(
    draft: ApplicationDraft,
    at: DateTime<Utc>,
) -> Result<IntakeRecords, DraftViolation> {
    validate(&draft)?;

    let ApplicationDraft {
        company,
        position,
        applied_on,
        source,
        rounds,
    } = draft;

    let company = Company {
        id: CompanyId::generate(),
        name: company.name.trim().to_string(),
        website: clean_text(company.website),
        industry: clean_text(company.industry),
        location: clean_text(company.location),
        created_at: at,
    };

    let position = Position {
        id: PositionId::generate(),
        company_id: company.id.clone(),
        title: position.title.trim().to_string(),
        location: clean_text(position.location),
        employment_type: clean_text(position.employment_type),
        salary_min: position.salary_min,
        salary_max: position.salary_max,
        posting_url: clean_text(position.posting_url),
        created_at: at,
    };

    let application = Application {
        id: ApplicationId::generate(),
        company_id: company.id.clone(),
        position_id: position.id.clone(),
        status: ApplicationStatus::Applied,
        current_round: 1,
        rejected_round: None,
        applied_on: applied_on.unwrap_or_else(|| at.date_naive()),
        source: clean_text(source),
        created_at: at,
        updated_at: at,
    };

    let rounds: Vec<InterviewRound> = rounds
        .into_iter()
        .enumerate()
        .map(|(offset, round)| round.into_round(&application.id, offset as u32 + 1))
        .collect();

    let description = match rounds.len() {
        0 => "No interview rounds planned yet".to_string(),
        1 => "1 interview round planned".to_string(),
        count => format!("{count} interview rounds planned"),
    };
    let event = TimelineEvent::new(
        &application.id,
        TimelineEventKind::Application,
        format!("Applied to {} at {}", position.title, company.name),
        description,
        at,
    )
    .with_status(application.status);

    Ok(IntakeRecords {
        company,
        position,
        application,
        rounds,
        event,
    })
}

fn check_url(field: &'static str, value: Option<&str>) -> Result<(), DraftViolation> {
    match value.map(str::trim) {
        None | Some("") => Ok(()),
        Some(url) if url.starts_with("https://") || url.starts_with("http://") => Ok(()),
        Some(_) => Err(DraftViolation::InvalidUrl { field }),
    }
}
