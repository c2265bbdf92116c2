//! Sequential task scheduling: deadline back-calculation, gating, and the
//! status reducer.
//!
//! This is the one piece of the tool with real invariants. Given a final
//! deadline and an ordered assignee chain, each with an hour allocation, the
//! calculator assigns back-to-back `[start, end]` windows ending at the
//! deadline. Gating prevents an assignee from starting before every
//! predecessor has completed, and `derive_status` is the single reducer that
//! maps assignee completion state to a task status.
//!
//! Everything here is pure: no I/O, no clock reads. Callers pass "now" in.

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::fields::{Priority, Status};
use crate::roster::User;
use crate::task::{Task, TaskAssignee};

/// Errors from the scheduling and gating functions.
///
/// Bad input is signalled explicitly rather than degrading to "unblocked",
/// so a stale user id lingering in an assignee list cannot mask a bug.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScheduleError {
    #[error("Sequential task has no assignees")]
    EmptyAssignees,

    #[error("Assignee {index} has a non-positive time allocation ({hours}h)")]
    NonPositiveAllocation { index: usize, hours: f64 },

    #[error("User {user_id} is not in the assignee list")]
    UnknownAssignee { user_id: u64 },
}

/// Result of a gate query for one user on one task.
#[derive(Debug, Clone, PartialEq)]
pub enum StartGate {
    /// Every predecessor has completed (or the user is first in the chain).
    Ready,
    /// Blocked; carries the display name of the lowest-index incomplete
    /// predecessor.
    BlockedBy(String),
    /// The task has no assignee chain, so gating does not apply.
    NotSequential,
}

/// Outcome of a completion toggle on a sequential task.
#[derive(Debug, Clone, PartialEq)]
pub enum ToggleOutcome {
    /// A portion was marked complete. `next_user` is the successor whose
    /// portion is now unblocked; `finished` means the whole chain is done.
    Completed {
        index: usize,
        user_id: u64,
        next_user: Option<u64>,
        finished: bool,
    },
    /// The most recently completed portion was reopened.
    Reopened { index: usize, user_id: u64 },
    /// Nothing to flip (all portions already complete, or none were).
    NoChange,
}

/// Hours-as-f64 to a chrono duration, at millisecond resolution.
fn allocation(hours: f64) -> Duration {
    Duration::milliseconds((hours * 3_600_000.0).round() as i64)
}

/// Assign each assignee a `[start, end]` window, working backwards from
/// `final_deadline`.
///
/// The last assignee's window ends at the deadline and each preceding window
/// ends exactly where the next begins, so windows never overlap. The end of
/// every window is clamped to `final_deadline`; under normal input the
/// cursor only ever moves backwards, so the clamp is a guard, not a
/// correctness requirement. Start times in the past are accepted: an
/// over-allocated chain is the caller's problem to surface, not an error.
///
/// Returns a new list in the original order with the windows stamped;
/// completion flags and notes are preserved.
pub fn sequential_windows(
    final_deadline: DateTime<Utc>,
    assignees: &[TaskAssignee],
) -> Result<Vec<TaskAssignee>, ScheduleError> {
    if assignees.is_empty() {
        return Err(ScheduleError::EmptyAssignees);
    }
    for (index, a) in assignees.iter().enumerate() {
        if a.time_allocation <= 0.0 {
            return Err(ScheduleError::NonPositiveAllocation {
                index,
                hours: a.time_allocation,
            });
        }
    }

    let mut cursor = final_deadline;
    let mut out: Vec<TaskAssignee> = assignees
        .iter()
        .rev()
        .map(|a| {
            let end_time = cursor.min(final_deadline);
            let start_time = end_time - allocation(a.time_allocation);
            cursor = start_time;
            TaskAssignee {
                start_time: Some(start_time),
                end_time: Some(end_time),
                ..a.clone()
            }
        })
        .collect();
    out.reverse();
    Ok(out)
}

/// Whether `user_id` may start their portion of `task`, and if not, who is
/// holding them up.
///
/// The first assignee is always ready. Otherwise the lowest-index incomplete
/// predecessor wins and its display name (resolved against `users`) is
/// reported. A user id absent from the chain is an error.
pub fn start_gate(task: &Task, user_id: u64, users: &[User]) -> Result<StartGate, ScheduleError> {
    if !task.is_sequential {
        return Ok(StartGate::NotSequential);
    }
    if task.assignees.is_empty() {
        return Err(ScheduleError::EmptyAssignees);
    }
    let position = task
        .assignees
        .iter()
        .position(|a| a.user_id == user_id)
        .ok_or(ScheduleError::UnknownAssignee { user_id })?;

    for predecessor in &task.assignees[..position] {
        if !predecessor.is_completed {
            let name = users
                .iter()
                .find(|u| u.id == predecessor.user_id)
                .map(|u| u.name.clone())
                .unwrap_or_else(|| format!("user {}", predecessor.user_id));
            return Ok(StartGate::BlockedBy(name));
        }
    }
    Ok(StartGate::Ready)
}

/// True iff `user_id` is unblocked on `task` (gating does not apply to
/// non-sequential tasks).
pub fn can_start(task: &Task, user_id: u64, users: &[User]) -> Result<bool, ScheduleError> {
    Ok(!matches!(
        start_gate(task, user_id, users)?,
        StartGate::BlockedBy(_)
    ))
}

/// The lowest-index incomplete assignee, if any portion remains open.
pub fn current_assignee(task: &Task) -> Option<&TaskAssignee> {
    task.assignees.iter().find(|a| !a.is_completed)
}

/// The single reducer from assignee completion state to task status.
///
/// `Done` iff every portion is complete; `Todo` iff none is; `InProgress`
/// otherwise. Every assignee mutation re-derives through here so the
/// status/completion invariant cannot drift between call sites.
pub fn derive_status(assignees: &[TaskAssignee]) -> Status {
    let completed = assignees.iter().filter(|a| a.is_completed).count();
    if completed == assignees.len() && !assignees.is_empty() {
        Status::Done
    } else if completed == 0 {
        Status::Todo
    } else {
        Status::InProgress
    }
}

/// Completed portions out of the total, as a percentage.
pub fn progress_percent(assignees: &[TaskAssignee]) -> u8 {
    if assignees.is_empty() {
        return 0;
    }
    let completed = assignees.iter().filter(|a| a.is_completed).count();
    ((completed * 100) / assignees.len()) as u8
}

/// Flip completion state on `task`'s chain and re-derive its status.
///
/// `checked == true` completes the current (lowest-index incomplete) portion
/// and stamps its `end_time` with `now` as the actual completion instant.
/// `checked == false` reopens the most recently completed portion and clears
/// the stamp. The task status always comes back out of `derive_status`.
pub fn toggle_current(
    task: &mut Task,
    checked: bool,
    now: DateTime<Utc>,
) -> Result<ToggleOutcome, ScheduleError> {
    if task.assignees.is_empty() {
        return Err(ScheduleError::EmptyAssignees);
    }

    let outcome = if checked {
        match task.assignees.iter().position(|a| !a.is_completed) {
            Some(index) => {
                task.assignees[index].is_completed = true;
                task.assignees[index].end_time = Some(now);
                let finished = task.assignees.iter().all(|a| a.is_completed);
                let next_user = task.assignees.get(index + 1).map(|a| a.user_id);
                ToggleOutcome::Completed {
                    index,
                    user_id: task.assignees[index].user_id,
                    next_user,
                    finished,
                }
            }
            None => ToggleOutcome::NoChange,
        }
    } else {
        match task.assignees.iter().rposition(|a| a.is_completed) {
            Some(index) => {
                task.assignees[index].is_completed = false;
                task.assignees[index].end_time = None;
                ToggleOutcome::Reopened {
                    index,
                    user_id: task.assignees[index].user_id,
                }
            }
            None => ToggleOutcome::NoChange,
        }
    };

    task.status = derive_status(&task.assignees);
    Ok(outcome)
}

/// Default deadline for a priority when the caller gives none:
/// Urgent +4h, High +12h, Medium +24h, Low +72h.
pub fn deadline_for_priority(priority: Priority, now: DateTime<Utc>) -> DateTime<Utc> {
    let hours = match priority {
        Priority::Urgent => 4,
        Priority::High => 12,
        Priority::Medium => 24,
        Priority::Low => 72,
    };
    now + Duration::hours(hours)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn chain(hours: &[f64]) -> Vec<TaskAssignee> {
        hours
            .iter()
            .enumerate()
            .map(|(i, &h)| TaskAssignee::new(i as u64 + 1, h))
            .collect()
    }

    fn sequential_task(assignees: Vec<TaskAssignee>) -> Task {
        let due = Utc.with_ymd_and_hms(2024, 1, 10, 10, 0, 0).unwrap();
        Task {
            id: 1,
            title: "Weekly stock count".to_string(),
            description: None,
            responsible: assignees.first().map(|a| a.user_id).unwrap_or(0),
            accountable: 99,
            consulted: None,
            informed: None,
            dept: "BOH".to_string(),
            priority: Priority::Medium,
            status: Status::Todo,
            due,
            created_at: due - Duration::days(1),
            updated_at: due - Duration::days(1),
            is_sequential: true,
            assignees,
            checklist: Vec::new(),
            comments: Vec::new(),
            is_approved: false,
            approved_by: None,
            approved_at: None,
            feedback: None,
            reminder_sent: false,
            tags: Vec::new(),
        }
    }

    fn users() -> Vec<User> {
        ["An", "Binh", "Chi"]
            .iter()
            .enumerate()
            .map(|(i, name)| User {
                id: i as u64 + 1,
                name: name.to_string(),
                email: None,
                role: "Staff".to_string(),
                dept: "BOH".to_string(),
                permissions: vec!["view_tasks".to_string()],
                active: true,
            })
            .collect()
    }

    #[test]
    fn test_windows_worked_scenario() {
        // A:2h, B:3h, C:1h against a 10:00 deadline.
        let deadline = ts("2024-01-10T10:00:00Z");
        let windows = sequential_windows(deadline, &chain(&[2.0, 3.0, 1.0])).unwrap();

        assert_eq!(windows[2].start_time.unwrap(), ts("2024-01-10T09:00:00Z"));
        assert_eq!(windows[2].end_time.unwrap(), ts("2024-01-10T10:00:00Z"));
        assert_eq!(windows[1].start_time.unwrap(), ts("2024-01-10T06:00:00Z"));
        assert_eq!(windows[1].end_time.unwrap(), ts("2024-01-10T09:00:00Z"));
        assert_eq!(windows[0].start_time.unwrap(), ts("2024-01-10T04:00:00Z"));
        assert_eq!(windows[0].end_time.unwrap(), ts("2024-01-10T06:00:00Z"));
    }

    #[test]
    fn test_windows_chain_back_to_back() {
        let deadline = ts("2024-03-01T18:00:00Z");
        let windows = sequential_windows(deadline, &chain(&[1.5, 0.5, 4.0, 2.25])).unwrap();

        for pair in windows.windows(2) {
            assert_eq!(pair[0].end_time.unwrap(), pair[1].start_time.unwrap());
        }
        assert!(windows.last().unwrap().end_time.unwrap() <= deadline);
        assert_eq!(windows.last().unwrap().end_time.unwrap(), deadline);
    }

    #[test]
    fn test_windows_idempotent() {
        let deadline = ts("2024-03-01T18:00:00Z");
        let input = chain(&[2.0, 3.0]);
        let first = sequential_windows(deadline, &input).unwrap();
        let second = sequential_windows(deadline, &input).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_windows_past_start_accepted() {
        // 100h of work against a deadline one hour out: starts land in the
        // past, which is accepted rather than rejected.
        let deadline = ts("2024-01-10T10:00:00Z");
        let windows = sequential_windows(deadline, &chain(&[60.0, 40.0])).unwrap();
        assert!(windows[0].start_time.unwrap() < deadline - Duration::hours(99));
    }

    #[test]
    fn test_windows_fractional_hours() {
        let deadline = ts("2024-01-10T10:00:00Z");
        let windows = sequential_windows(deadline, &chain(&[0.5])).unwrap();
        assert_eq!(windows[0].start_time.unwrap(), ts("2024-01-10T09:30:00Z"));
    }

    #[test]
    fn test_windows_empty_list_rejected() {
        let deadline = ts("2024-01-10T10:00:00Z");
        assert_eq!(
            sequential_windows(deadline, &[]).unwrap_err(),
            ScheduleError::EmptyAssignees
        );
    }

    #[test]
    fn test_windows_non_positive_allocation_rejected() {
        let deadline = ts("2024-01-10T10:00:00Z");
        let err = sequential_windows(deadline, &chain(&[2.0, 0.0])).unwrap_err();
        assert_eq!(
            err,
            ScheduleError::NonPositiveAllocation {
                index: 1,
                hours: 0.0
            }
        );
    }

    #[test]
    fn test_windows_preserve_completion_state() {
        let deadline = ts("2024-01-10T10:00:00Z");
        let mut input = chain(&[1.0, 1.0]);
        input[0].is_completed = true;
        let windows = sequential_windows(deadline, &input).unwrap();
        assert!(windows[0].is_completed);
        assert!(!windows[1].is_completed);
    }

    #[test]
    fn test_gate_first_assignee_never_blocked() {
        let task = sequential_task(chain(&[2.0, 3.0, 1.0]));
        assert_eq!(start_gate(&task, 1, &users()).unwrap(), StartGate::Ready);
    }

    #[test]
    fn test_gate_blocked_by_lowest_incomplete() {
        // An (index 0) done, Binh (index 1) not: Chi is blocked by Binh.
        let mut task = sequential_task(chain(&[2.0, 3.0, 1.0]));
        task.assignees[0].is_completed = true;
        assert_eq!(
            start_gate(&task, 3, &users()).unwrap(),
            StartGate::BlockedBy("Binh".to_string())
        );
    }

    #[test]
    fn test_gate_reports_lowest_blocker_not_most_recent() {
        // Both predecessors incomplete: the first one is reported.
        let task = sequential_task(chain(&[2.0, 3.0, 1.0]));
        assert_eq!(
            start_gate(&task, 3, &users()).unwrap(),
            StartGate::BlockedBy("An".to_string())
        );
    }

    #[test]
    fn test_gate_ready_when_predecessors_done() {
        let mut task = sequential_task(chain(&[2.0, 3.0, 1.0]));
        task.assignees[0].is_completed = true;
        task.assignees[1].is_completed = true;
        assert_eq!(start_gate(&task, 3, &users()).unwrap(), StartGate::Ready);
        assert!(can_start(&task, 3, &users()).unwrap());
    }

    #[test]
    fn test_gate_unknown_user_is_error() {
        let task = sequential_task(chain(&[2.0, 3.0]));
        assert_eq!(
            start_gate(&task, 42, &users()).unwrap_err(),
            ScheduleError::UnknownAssignee { user_id: 42 }
        );
    }

    #[test]
    fn test_gate_not_sequential() {
        let mut task = sequential_task(chain(&[2.0]));
        task.is_sequential = false;
        task.assignees.clear();
        assert_eq!(
            start_gate(&task, 42, &users()).unwrap(),
            StartGate::NotSequential
        );
        assert!(can_start(&task, 42, &users()).unwrap());
    }

    #[test]
    fn test_gate_unnamed_blocker_falls_back_to_id() {
        let task = sequential_task(chain(&[2.0, 1.0]));
        // Empty roster: blocker name degrades to "user <id>".
        assert_eq!(
            start_gate(&task, 2, &[]).unwrap(),
            StartGate::BlockedBy("user 1".to_string())
        );
    }

    #[test]
    fn test_derive_status_reducer() {
        let mut a = chain(&[1.0, 1.0, 1.0]);
        assert_eq!(derive_status(&a), Status::Todo);
        a[0].is_completed = true;
        assert_eq!(derive_status(&a), Status::InProgress);
        a[1].is_completed = true;
        a[2].is_completed = true;
        assert_eq!(derive_status(&a), Status::Done);
    }

    #[test]
    fn test_status_done_iff_all_complete() {
        // Every completion pattern of a 3-chain: Done exactly when all set.
        for mask in 0u8..8 {
            let mut a = chain(&[1.0, 1.0, 1.0]);
            for (i, item) in a.iter_mut().enumerate() {
                item.is_completed = mask & (1 << i) != 0;
            }
            let all = mask == 0b111;
            assert_eq!(derive_status(&a) == Status::Done, all, "mask {mask:#b}");
        }
    }

    #[test]
    fn test_toggle_first_of_three_goes_in_progress() {
        let mut task = sequential_task(chain(&[2.0, 3.0, 1.0]));
        let now = ts("2024-01-10T05:00:00Z");
        let outcome = toggle_current(&mut task, true, now).unwrap();

        assert_eq!(task.status, Status::InProgress);
        assert_eq!(task.assignees[0].end_time, Some(now));
        match outcome {
            ToggleOutcome::Completed {
                index,
                next_user,
                finished,
                ..
            } => {
                assert_eq!(index, 0);
                assert_eq!(next_user, Some(2));
                assert!(!finished);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_toggle_last_remaining_goes_done() {
        let mut task = sequential_task(chain(&[2.0, 1.0]));
        let now = ts("2024-01-10T08:00:00Z");
        toggle_current(&mut task, true, now).unwrap();
        let outcome = toggle_current(&mut task, true, now).unwrap();

        assert_eq!(task.status, Status::Done);
        match outcome {
            ToggleOutcome::Completed { finished, next_user, .. } => {
                assert!(finished);
                assert_eq!(next_user, None);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_toggle_uncheck_reopens_latest() {
        let mut task = sequential_task(chain(&[2.0, 1.0]));
        let now = ts("2024-01-10T08:00:00Z");
        toggle_current(&mut task, true, now).unwrap();
        toggle_current(&mut task, true, now).unwrap();
        assert_eq!(task.status, Status::Done);

        let outcome = toggle_current(&mut task, false, now).unwrap();
        assert_eq!(outcome, ToggleOutcome::Reopened { index: 1, user_id: 2 });
        assert_eq!(task.status, Status::InProgress);
        assert_eq!(task.assignees[1].end_time, None);

        toggle_current(&mut task, false, now).unwrap();
        assert_eq!(task.status, Status::Todo);
    }

    #[test]
    fn test_toggle_noop_when_all_done() {
        let mut task = sequential_task(chain(&[1.0]));
        let now = ts("2024-01-10T08:00:00Z");
        toggle_current(&mut task, true, now).unwrap();
        assert_eq!(toggle_current(&mut task, true, now).unwrap(), ToggleOutcome::NoChange);
        assert_eq!(task.status, Status::Done);
    }

    #[test]
    fn test_current_assignee_walks_the_chain() {
        let mut task = sequential_task(chain(&[2.0, 3.0, 1.0]));
        assert_eq!(current_assignee(&task).unwrap().user_id, 1);
        task.assignees[0].is_completed = true;
        assert_eq!(current_assignee(&task).unwrap().user_id, 2);
        task.assignees[1].is_completed = true;
        task.assignees[2].is_completed = true;
        assert!(current_assignee(&task).is_none());
    }

    #[test]
    fn test_progress_percent() {
        let mut a = chain(&[1.0, 1.0, 1.0, 1.0]);
        assert_eq!(progress_percent(&a), 0);
        a[0].is_completed = true;
        assert_eq!(progress_percent(&a), 25);
        for item in a.iter_mut() {
            item.is_completed = true;
        }
        assert_eq!(progress_percent(&a), 100);
    }

    #[test]
    fn test_deadline_for_priority() {
        let now = ts("2024-01-10T10:00:00Z");
        assert_eq!(deadline_for_priority(Priority::Urgent, now), now + Duration::hours(4));
        assert_eq!(deadline_for_priority(Priority::High, now), now + Duration::hours(12));
        assert_eq!(deadline_for_priority(Priority::Medium, now), now + Duration::hours(24));
        assert_eq!(deadline_for_priority(Priority::Low, now), now + Duration::hours(72));
    }
}
