use chrono::{Duration, Local, NaiveDate, Utc};
use clap::Args;
use job_tracker::error::AppError;
use job_tracker::workflows::applications::{
    ApplicationAggregate, ApplicationDraft, ApplicationRepository, CompanyDraft,
    InMemoryApplicationStore, NewRound, PositionDraft, RoundCompletion, SqliteApplicationStore,
    TrackerService,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// SQLite database file to write the demo application into (defaults to memory)
    #[arg(long)]
    pub(crate) database: Option<PathBuf>,
    /// Application date (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) applied_on: Option<NaiveDate>,
    /// Print the full JSON snapshot after every step instead of only at the end
    #[arg(long)]
    pub(crate) json: bool,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    match args.database.clone() {
        Some(path) => {
            let store = SqliteApplicationStore::open(&path)?;
            println!("Job tracker demo (sqlite: {})", path.display());
            run_flow(TrackerService::new(Arc::new(store)), &args)
        }
        None => {
            println!("Job tracker demo (in-memory store)");
            run_flow(
                TrackerService::new(Arc::new(InMemoryApplicationStore::new())),
                &args,
            )
        }
    }
}

fn run_flow<R>(service: TrackerService<R>, args: &DemoArgs) -> Result<(), AppError>
where
    R: ApplicationRepository + 'static,
{
    let applied_on = args
        .applied_on
        .unwrap_or_else(|| Local::now().date_naive());

    let created = service.create_application(demo_draft(applied_on))?;
    let id = created.id().clone();
    report("Application created", &created, args.json);

    service.insert_round(&id, 1, NewRound::titled("Take-home exercise"))?;
    report(
        "Inserted take-home exercise as round 2",
        &service.load_application(&id)?,
        args.json,
    );

    for feedback in ["Clear motivation, good salary fit", "Clean, well-tested submission"] {
        let next = match service.next_incomplete_round(&id)? {
            Some(round) => round,
            None => break,
        };
        service.complete_round(
            &id,
            &next.id,
            RoundCompletion::advance().with_feedback(feedback),
        )?;
        report(
            &format!("Passed round {}: {}", next.seq_no, next.title),
            &service.load_application(&id)?,
            args.json,
        );
    }

    if let Some(next) = service.next_incomplete_round(&id)? {
        service.complete_round(
            &id,
            &next.id,
            RoundCompletion::reject().with_feedback("not a fit for the team's current needs"),
        )?;
        report(
            &format!("Rejected in round {}: {}", next.seq_no, next.title),
            &service.load_application(&id)?,
            args.json,
        );
    }

    let aggregate = service.load_application(&id)?;
    println!("\nTimeline");
    for event in &aggregate.timeline {
        println!(
            "  {} [{}] {} ({})",
            event.occurred_at.format("%Y-%m-%d %H:%M:%S"),
            event.kind.label(),
            event.title,
            event.description
        );
    }

    if !args.json {
        print_snapshot(&aggregate);
    }

    let dashboard = service.dashboard(Utc::now())?;
    println!(
        "\nDashboard: {} application(s), {} active, offer rate {}",
        dashboard.total_applications,
        dashboard.active_pipeline,
        dashboard
            .offer_rate
            .map(|rate| format!("{:.0}%", rate * 100.0))
            .unwrap_or_else(|| "n/a".to_string())
    );

    Ok(())
}

fn demo_draft(applied_on: NaiveDate) -> ApplicationDraft {
    let first_call = Utc::now() + Duration::days(2);
    ApplicationDraft {
        company: CompanyDraft {
            name: "Acme Robotics".to_string(),
            website: Some("https://acme.example".to_string()),
            industry: Some("Robotics".to_string()),
            location: Some("Berlin".to_string()),
        },
        position: PositionDraft {
            title: "Backend Engineer".to_string(),
            location: Some("Remote (EU)".to_string()),
            employment_type: Some("full-time".to_string()),
            salary_min: Some(70_000),
            salary_max: Some(90_000),
            posting_url: Some("https://acme.example/careers/backend".to_string()),
        },
        applied_on: Some(applied_on),
        source: Some("referral".to_string()),
        rounds: vec![
            NewRound {
                title: "Recruiter screen".to_string(),
                scheduled_at: Some(first_call),
                duration_min: Some(30),
                interviewer: Some("Jordan (Talent)".to_string()),
                note: None,
            },
            NewRound {
                title: "Technical interview".to_string(),
                duration_min: Some(60),
                ..NewRound::default()
            },
            NewRound {
                title: "Onsite".to_string(),
                duration_min: Some(240),
                ..NewRound::default()
            },
        ],
    }
}

fn report(step: &str, aggregate: &ApplicationAggregate, json: bool) {
    let progress = aggregate.progress();
    println!(
        "\n{step}\n  Status: {} | round {} | {}/{} rounds finished",
        aggregate.application.status.label(),
        progress.current_round,
        progress.finished,
        progress.total
    );
    if let Some(rejected) = aggregate.application.rejected_round {
        println!("  Rejected at round {rejected}");
    }
    if json {
        print_snapshot(aggregate);
    }
}

fn print_snapshot(aggregate: &ApplicationAggregate) {
    match serde_json::to_string_pretty(&aggregate.snapshot()) {
        Ok(json) => println!("  Snapshot:\n{}", json),
        Err(err) => println!("  Snapshot unavailable: {}", err),
    }
}
