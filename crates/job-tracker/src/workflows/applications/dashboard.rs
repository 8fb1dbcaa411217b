use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::domain::{ApplicationAggregate, ApplicationId, ApplicationStatus, RoundId};
use super::timeline::TimelineEvent;

const RECENT_ACTIVITY_LIMIT: usize = 10;
const UPCOMING_ROUND_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusCount {
    pub status: ApplicationStatus,
    pub status_label: &'static str,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpcomingRound {
    pub application_id: ApplicationId,
    pub round_id: RoundId,
    pub company: String,
    pub position: String,
    pub seq_no: u32,
    pub title: String,
    pub scheduled_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interviewer: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub total_applications: usize,
    /// Applications not yet in a terminal status.
    pub active_pipeline: usize,
    pub status_breakdown: Vec<StatusCount>,
    /// Share of decided applications (offer, accepted, rejected) that reached an offer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offer_rate: Option<f32>,
    pub upcoming_rounds: Vec<UpcomingRound>,
    pub recent_activity: Vec<TimelineEvent>,
}

impl Dashboard {
    pub fn build(aggregates: &[ApplicationAggregate], now: DateTime<Utc>) -> Self {
        let mut counts: HashMap<ApplicationStatus, usize> = HashMap::new();
        for aggregate in aggregates {
            *counts.entry(aggregate.application.status).or_default() += 1;
        }

        let status_breakdown = ApplicationStatus::ordered()
            .into_iter()
            .filter_map(|status| {
                counts.get(&status).map(|count| StatusCount {
                    status,
                    status_label: status.label(),
                    count: *count,
                })
            })
            .collect();

        let count_of = |status: ApplicationStatus| counts.get(&status).copied().unwrap_or(0);
        let offers = count_of(ApplicationStatus::Offer) + count_of(ApplicationStatus::Accepted);
        let decided = offers + count_of(ApplicationStatus::Rejected);
        let offer_rate = (decided > 0).then(|| offers as f32 / decided as f32);

        let active_pipeline = aggregates
            .iter()
            .filter(|aggregate| !aggregate.application.status.is_terminal())
            .count();

        let mut upcoming_rounds: Vec<UpcomingRound> = aggregates
            .iter()
            .filter(|aggregate| !aggregate.application.status.is_terminal())
            .flat_map(|aggregate| {
                aggregate.rounds.iter().filter_map(move |round| {
                    let scheduled_at = round.scheduled_at.filter(|at| *at >= now)?;
                    if round.is_finished {
                        return None;
                    }
                    Some(UpcomingRound {
                        application_id: aggregate.application.id.clone(),
                        round_id: round.id.clone(),
                        company: aggregate.company.name.clone(),
                        position: aggregate.position.title.clone(),
                        seq_no: round.seq_no,
                        title: round.title.clone(),
                        scheduled_at,
                        interviewer: round.interviewer.clone(),
                    })
                })
            })
            .collect();
        upcoming_rounds.sort_by_key(|round| round.scheduled_at);
        upcoming_rounds.truncate(UPCOMING_ROUND_LIMIT);

        let mut recent_activity: Vec<TimelineEvent> = aggregates
            .iter()
            .flat_map(|aggregate| aggregate.timeline.iter().cloned())
            .collect();
        recent_activity.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
        recent_activity.truncate(RECENT_ACTIVITY_LIMIT);

        Self {
            total_applications: aggregates.len(),
            active_pipeline,
            status_breakdown,
            offer_rate,
            upcoming_rounds,
            recent_activity,
        }
    }
}
