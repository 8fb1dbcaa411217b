use chrono::{Duration, Utc};

use super::common::*;

use crate::workflows::applications::dashboard::Dashboard;
use crate::workflows::applications::domain::{ApplicationStatus, NewRound, RoundCompletion};
use crate::workflows::applications::repository::ApplicationRepository;

#[test]
fn dashboard_summarizes_the_pipeline() {
    let (service, store) = memory_service();
    let now = Utc::now();

    let offer = seed(&service, &["Screen"]);
    service
        .complete_round(offer.id(), &offer.rounds[0].id, RoundCompletion::advance())
        .expect("offer reached");

    let rejected = seed(&service, &["Screen", "Tech"]);
    service
        .complete_round(
            rejected.id(),
            &rejected.rounds[0].id,
            RoundCompletion::reject(),
        )
        .expect("rejected");

    let mut active_draft = draft(&[]);
    active_draft.rounds = vec![
        NewRound {
            title: "Phone screen".to_string(),
            scheduled_at: Some(now - Duration::days(1)),
            ..NewRound::default()
        },
        NewRound {
            title: "Pairing session".to_string(),
            scheduled_at: Some(now + Duration::days(2)),
            interviewer: Some("Dana".to_string()),
            ..NewRound::default()
        },
    ];
    let active = service
        .create_application(active_draft)
        .expect("active application created");

    let aggregates = store.list().expect("list works");
    let dashboard = Dashboard::build(&aggregates, now);

    assert_eq!(dashboard.total_applications, 3);
    assert_eq!(dashboard.active_pipeline, 2);
    let breakdown: Vec<(ApplicationStatus, usize)> = dashboard
        .status_breakdown
        .iter()
        .map(|entry| (entry.status, entry.count))
        .collect();
    assert_eq!(
        breakdown,
        vec![
            (ApplicationStatus::Applied, 1),
            (ApplicationStatus::Offer, 1),
            (ApplicationStatus::Rejected, 1),
        ]
    );
    assert_eq!(dashboard.offer_rate, Some(0.5));

    assert_eq!(dashboard.upcoming_rounds.len(), 1);
    let upcoming = &dashboard.upcoming_rounds[0];
    assert_eq!(upcoming.application_id, active.application.id);
    assert_eq!(upcoming.title, "Pairing session");
    assert_eq!(upcoming.interviewer.as_deref(), Some("Dana"));

    assert_eq!(dashboard.recent_activity.len(), 5);
    assert!(dashboard
        .recent_activity
        .windows(2)
        .all(|pair| pair[0].occurred_at >= pair[1].occurred_at));
}

#[test]
fn recent_activity_is_capped() {
    let (service, _) = memory_service();
    let aggregate = seed(&service, &["Screen"]);
    for index in 0..12 {
        service
            .add_note(aggregate.id(), &format!("note {index}"))
            .expect("note stored");
    }

    let dashboard = service.dashboard(Utc::now()).expect("dashboard builds");
    assert_eq!(dashboard.recent_activity.len(), 10);
    assert_eq!(dashboard.offer_rate, None);
}
