//! Application-progress state machine.
//!
//! Every function here is pure: it reads an application and its rounds, validates the requested
//! transition, and returns the records that must be written together. Persisting the result is
//! the caller's job and must happen in one transactional unit.

use chrono::{DateTime, Utc};

use super::domain::{
    Application, ApplicationStatus, InterviewRound, NewRound, RoundCompletion, RoundId,
    RoundOutcome,
};
use super::timeline::{TimelineEvent, TimelineEventKind};

/// Rejected transition, distinguishing the caller mistakes the presentation layer reports.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("round {0} not found")]
    RoundNotFound(RoundId),
    #[error("round {seq_no} is already finished")]
    RoundAlreadyFinished { seq_no: u32 },
    #[error("round {requested} is not the next incomplete round (round {expected} is still open)")]
    NotNextRound { requested: u32, expected: u32 },
    #[error("application is closed with status {0}")]
    ApplicationClosed(ApplicationStatus),
    #[error("index {index} is out of range for {len} rounds")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("index {index} would move a round across finished round {finished}")]
    BeforeFinishedRound { index: usize, finished: u32 },
    #[error("round {seq_no} is already at that position")]
    RoundAlreadyInPlace { seq_no: u32 },
    #[error("status is already {0}")]
    StatusUnchanged(ApplicationStatus),
    #[error("invalid round: {0}")]
    InvalidRound(&'static str),
}

/// Structural problems found in stored data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
    #[error("round sequence must be contiguous from 1 (expected {expected}, found {found})")]
    BrokenSequence { expected: u32, found: u32 },
    #[error("current round {current} exceeds {total} rounds + 1")]
    CurrentRoundOutOfRange { current: u32, total: u32 },
    #[error("rejected round {0} does not reference an existing round")]
    DanglingRejectedRound(u32),
    #[error("rejected round is set while status is {0}")]
    RejectedRoundWithoutRejection(ApplicationStatus),
}

/// Records produced by finishing a round.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundTransition {
    pub application: Application,
    pub round: InterviewRound,
    pub event: TimelineEvent,
}

/// Records produced by splicing a new round into the sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundInsertion {
    pub application: Application,
    pub round: InterviewRound,
    /// Existing rounds whose `seq_no` moved up by one, finished rounds included.
    pub shifted: Vec<InterviewRound>,
    pub event: TimelineEvent,
}

/// Records produced by moving an open round to a new position.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundReorder {
    pub application: Application,
    /// Full sequence after the move.
    pub rounds: Vec<InterviewRound>,
    /// Subset of `rounds` whose `seq_no` changed.
    pub renumbered: Vec<InterviewRound>,
    pub event: TimelineEvent,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusChange {
    pub application: Application,
    pub previous: ApplicationStatus,
    pub event: TimelineEvent,
}

/// Maps round progress to a status label. Explicit terminal states always win.
pub fn derive_status(
    current_round: u32,
    total_rounds: u32,
    stored: ApplicationStatus,
) -> ApplicationStatus {
    if stored.is_terminal() {
        stored
    } else if current_round > total_rounds {
        ApplicationStatus::Offer
    } else if current_round > 3 {
        ApplicationStatus::FinalRound
    } else if current_round > 1 {
        ApplicationStatus::Interview
    } else if current_round == 1 {
        ApplicationStatus::Screening
    } else {
        ApplicationStatus::Applied
    }
}

/// Lowest `seq_no` among unfinished rounds, regardless of slice order.
pub fn next_incomplete_round(rounds: &[InterviewRound]) -> Option<&InterviewRound> {
    rounds
        .iter()
        .filter(|round| !round.is_finished)
        .min_by_key(|round| round.seq_no)
}

pub fn complete_round(
    application: &Application,
    rounds: &[InterviewRound],
    round_id: &RoundId,
    completion: RoundCompletion,
    at: DateTime<Utc>,
) -> Result<RoundTransition, TransitionError> {
    let round = rounds
        .iter()
        .find(|round| &round.id == round_id && round.application_id == application.id)
        .ok_or_else(|| TransitionError::RoundNotFound(round_id.clone()))?;

    if round.is_finished {
        return Err(TransitionError::RoundAlreadyFinished {
            seq_no: round.seq_no,
        });
    }
    ensure_open(application)?;

    let next_seq = next_incomplete_round(rounds)
        .map(|next| next.seq_no)
        .unwrap_or(round.seq_no);
    if next_seq != round.seq_no {
        return Err(TransitionError::NotNextRound {
            requested: round.seq_no,
            expected: next_seq,
        });
    }

    let total = rounds.len() as u32;
    let RoundCompletion {
        outcome,
        feedback,
        note,
    } = completion;

    let mut round = round.clone();
    round.is_finished = true;
    round.feedback = super::domain::clean_text(feedback);
    if let Some(note) = super::domain::clean_text(note) {
        round.note = Some(note);
    }
    round.outcome = Some(outcome);
    round.completed_at = Some(at);

    let mut application = application.clone();
    application.updated_at = at;

    let event = match outcome {
        RoundOutcome::Advance => {
            application.current_round = application.current_round.max(round.seq_no + 1);
            application.status =
                derive_status(application.current_round, total, application.status);

            let title = format!("Round {}: {} passed", round.seq_no, round.title);
            if application.current_round > total {
                TimelineEvent::new(
                    &application.id,
                    TimelineEventKind::Offer,
                    title,
                    format!("Cleared all {total} rounds; moved to offer stage"),
                    at,
                )
            } else {
                TimelineEvent::new(
                    &application.id,
                    TimelineEventKind::Interview,
                    title,
                    format!("Advanced to round {} of {total}", application.current_round),
                    at,
                )
            }
        }
        RoundOutcome::Reject => {
            application.status = ApplicationStatus::Rejected;
            application.rejected_round = Some(round.seq_no);

            let description = match &round.feedback {
                Some(feedback) => format!("Rejected after round {}: {feedback}", round.seq_no),
                None => format!("Rejected after round {}", round.seq_no),
            };
            TimelineEvent::new(
                &application.id,
                TimelineEventKind::Rejection,
                format!("Round {}: {} rejected", round.seq_no, round.title),
                description,
                at,
            )
        }
    }
    .with_status(application.status);

    Ok(RoundTransition {
        application,
        round,
        event,
    })
}

/// Splices a round in at 0-based `index`; the new round takes `seq_no = index + 1`.
///
/// Any position is allowed, including ahead of finished rounds: those are renumbered but keep
/// their id, outcome, feedback, note and completion time. A round spliced in below
/// `current_round` bumps `current_round` so it keeps pointing at the same logical round, and the
/// new round becomes the next incomplete round.
pub fn insert_round(
    application: &Application,
    rounds: &[InterviewRound],
    index: usize,
    new_round: NewRound,
    at: DateTime<Utc>,
) -> Result<RoundInsertion, TransitionError> {
    ensure_open(application)?;
    if new_round.title.trim().is_empty() {
        return Err(TransitionError::InvalidRound("title is required"));
    }
    if new_round.duration_min == Some(0) {
        return Err(TransitionError::InvalidRound("duration must be positive"));
    }

    let len = rounds.len();
    if index > len {
        return Err(TransitionError::IndexOutOfRange { index, len });
    }

    let seq_no = index as u32 + 1;
    let mut shifted: Vec<InterviewRound> = rounds
        .iter()
        .filter(|round| round.seq_no >= seq_no)
        .cloned()
        .map(|mut round| {
            round.seq_no += 1;
            round
        })
        .collect();
    shifted.sort_by_key(|round| round.seq_no);

    let round = new_round.into_round(&application.id, seq_no);
    let total = len as u32 + 1;

    let mut application = application.clone();
    application.updated_at = at;
    if seq_no < application.current_round {
        application.current_round += 1;
    }
    if application.status == ApplicationStatus::Offer {
        application.status = derive_status(seq_no, total, application.status);
    }

    let description = if index == len {
        format!("Appended as round {seq_no} of {total}")
    } else {
        format!("Inserted as round {seq_no} of {total}")
    };
    let event = TimelineEvent::new(
        &application.id,
        TimelineEventKind::Interview,
        format!("Round {seq_no}: {} scheduled", round.title),
        description,
        at,
    )
    .with_status(application.status);

    Ok(RoundInsertion {
        application,
        round,
        shifted,
        event,
    })
}

/// Moves an open round to 0-based `index`, renumbering the sequence. Only rounds after the last
/// finished round can move, and only among themselves.
pub fn move_round(
    application: &Application,
    rounds: &[InterviewRound],
    round_id: &RoundId,
    index: usize,
    at: DateTime<Utc>,
) -> Result<RoundReorder, TransitionError> {
    let mut ordered = rounds.to_vec();
    ordered.sort_by_key(|round| round.seq_no);

    let from = ordered
        .iter()
        .position(|round| &round.id == round_id)
        .ok_or_else(|| TransitionError::RoundNotFound(round_id.clone()))?;
    let seq_no = ordered[from].seq_no;
    if ordered[from].is_finished {
        return Err(TransitionError::RoundAlreadyFinished { seq_no });
    }
    ensure_open(application)?;

    let len = ordered.len();
    if index >= len {
        return Err(TransitionError::IndexOutOfRange { index, len });
    }
    let settled = settled_len(&ordered);
    for position in [from, index] {
        if position < settled {
            return Err(TransitionError::BeforeFinishedRound {
                index: position,
                finished: settled as u32,
            });
        }
    }
    if index == from {
        return Err(TransitionError::RoundAlreadyInPlace { seq_no });
    }

    let moving = ordered.remove(from);
    let title = moving.title.clone();
    ordered.insert(index, moving);

    let mut renumbered = Vec::new();
    for (position, round) in ordered.iter_mut().enumerate() {
        let expected = position as u32 + 1;
        if round.seq_no != expected {
            round.seq_no = expected;
            renumbered.push(round.clone());
        }
    }

    let mut application = application.clone();
    application.updated_at = at;

    let event = TimelineEvent::new(
        &application.id,
        TimelineEventKind::Interview,
        format!("{title} rescheduled"),
        format!("Moved from round {} to round {}", from + 1, index + 1),
        at,
    );

    Ok(RoundReorder {
        application,
        rounds: ordered,
        renumbered,
        event,
    })
}

/// Applies an explicit status chosen by the user.
pub fn change_status(
    application: &Application,
    status: ApplicationStatus,
    at: DateTime<Utc>,
) -> Result<StatusChange, TransitionError> {
    if application.status == status {
        return Err(TransitionError::StatusUnchanged(status));
    }

    let previous = application.status;
    let mut application = application.clone();
    application.status = status;
    if status != ApplicationStatus::Rejected {
        application.rejected_round = None;
    }
    application.updated_at = at;

    let event = TimelineEvent::new(
        &application.id,
        TimelineEventKind::for_status(status),
        format!("Status changed to {}", status.label()),
        format!("Changed from {} to {}", previous.label(), status.label()),
        at,
    )
    .with_status(status);

    Ok(StatusChange {
        application,
        previous,
        event,
    })
}

/// Checks the structural rules every stored application must satisfy.
pub fn check_invariants(
    application: &Application,
    rounds: &[InterviewRound],
) -> Result<(), InvariantViolation> {
    let mut ordered: Vec<&InterviewRound> = rounds.iter().collect();
    ordered.sort_by_key(|round| round.seq_no);

    for (position, round) in ordered.iter().enumerate() {
        let expected = position as u32 + 1;
        if round.seq_no != expected {
            return Err(InvariantViolation::BrokenSequence {
                expected,
                found: round.seq_no,
            });
        }
    }

    let total = rounds.len() as u32;
    if application.current_round > total + 1 {
        return Err(InvariantViolation::CurrentRoundOutOfRange {
            current: application.current_round,
            total,
        });
    }

    if let Some(rejected) = application.rejected_round {
        if application.status != ApplicationStatus::Rejected {
            return Err(InvariantViolation::RejectedRoundWithoutRejection(
                application.status,
            ));
        }
        if rejected == 0 || rejected > total {
            return Err(InvariantViolation::DanglingRejectedRound(rejected));
        }
    }

    Ok(())
}

fn ensure_open(application: &Application) -> Result<(), TransitionError> {
    if application.status.is_terminal() {
        Err(TransitionError::ApplicationClosed(application.status))
    } else {
        Ok(())
    }
}

/// Length of the ordered prefix ending at the last finished round.
fn settled_len(ordered: &[InterviewRound]) -> usize {
    ordered
        .iter()
        .rposition(|round| round.is_finished)
        .map_or(0, |position| position + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_status_follows_rule_order() {
        use ApplicationStatus::*;

        assert_eq!(derive_status(2, 3, Rejected), Rejected);
        assert_eq!(derive_status(9, 3, Withdrawn), Withdrawn);
        assert_eq!(derive_status(1, 1, Accepted), Accepted);
        assert_eq!(derive_status(4, 3, Interview), Offer);
        assert_eq!(derive_status(4, 5, Interview), FinalRound);
        assert_eq!(derive_status(3, 3, Screening), Interview);
        assert_eq!(derive_status(2, 3, Applied), Interview);
        assert_eq!(derive_status(1, 3, Applied), Screening);
        assert_eq!(derive_status(0, 3, Applied), Applied);
    }
}
