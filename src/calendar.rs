//! Calendar event derivation.
//!
//! Tasks project onto the calendar two ways: a deadline event at the due
//! timestamp, and one window event per assignee on sequential tasks. This
//! module only derives and lists event data; drawing an actual calendar is
//! somebody else's job.

use chrono::{DateTime, NaiveDate, Utc};

use crate::db::{format_status, Database};
use crate::fields::Status;

/// What a calendar entry represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// A task deadline.
    Due,
    /// One assignee's scheduled window on a sequential task.
    Window,
}

/// A single derived calendar entry.
#[derive(Debug, Clone, PartialEq)]
pub struct CalendarEvent {
    pub task_id: u64,
    pub title: String,
    pub kind: EventKind,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub status: Status,
}

/// Derive every event overlapping `[from, to]`, ordered by start time.
///
/// Window events only exist where the scheduler has stamped both ends;
/// assignees without windows contribute nothing.
pub fn events_for_range(
    db: &Database,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Vec<CalendarEvent> {
    let mut events = Vec::new();

    for task in &db.tasks {
        if task.due >= from && task.due <= to {
            events.push(CalendarEvent {
                task_id: task.id,
                title: task.title.clone(),
                kind: EventKind::Due,
                start: task.due,
                end: task.due,
                status: task.status,
            });
        }

        if task.is_sequential {
            for assignee in &task.assignees {
                let (Some(start), Some(end)) = (assignee.start_time, assignee.end_time) else {
                    continue;
                };
                if end < from || start > to {
                    continue;
                }
                events.push(CalendarEvent {
                    task_id: task.id,
                    title: format!("{} / {}", task.title, db.user_name(assignee.user_id)),
                    kind: EventKind::Window,
                    start,
                    end,
                    status: task.status,
                });
            }
        }
    }

    events.sort_by_key(|e| (e.start, e.task_id));
    events
}

/// Print events grouped by day.
pub fn print_events(events: &[CalendarEvent]) {
    let mut current_day: Option<NaiveDate> = None;
    for e in events {
        let day = e.start.date_naive();
        if current_day != Some(day) {
            println!("{}", day.format("%A %Y-%m-%d"));
            current_day = Some(day);
        }
        match e.kind {
            EventKind::Due => println!(
                "  {} due      #{} {} [{}]",
                e.start.format("%H:%M"),
                e.task_id,
                e.title,
                format_status(e.status)
            ),
            EventKind::Window => println!(
                "  {}-{} #{} {}",
                e.start.format("%H:%M"),
                e.end.format("%H:%M"),
                e.task_id,
                e.title
            ),
        }
    }
    if events.is_empty() {
        println!("No events in range.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::Priority;
    use crate::schedule::sequential_windows;
    use crate::task::{Task, TaskAssignee};
    use chrono::{Duration, TimeZone};

    fn ts(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 10, h, 0, 0).unwrap()
    }

    fn seq_task(id: u64, due: DateTime<Utc>, assignees: Vec<TaskAssignee>) -> Task {
        Task {
            id,
            title: format!("Task {id}"),
            description: None,
            responsible: assignees.first().map(|a| a.user_id).unwrap_or(1),
            accountable: 1,
            consulted: None,
            informed: None,
            dept: "BOH".to_string(),
            priority: Priority::Medium,
            status: Status::Todo,
            due,
            created_at: due - Duration::days(1),
            updated_at: due - Duration::days(1),
            is_sequential: !assignees.is_empty(),
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

    #[test]
    fn test_due_events_in_range() {
        let mut db = Database::default();
        db.tasks.push(seq_task(1, ts(10), Vec::new()));
        db.tasks.push(seq_task(2, ts(10) + Duration::days(3), Vec::new()));

        let events = events_for_range(&db, ts(0), ts(23));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].task_id, 1);
        assert_eq!(events[0].kind, EventKind::Due);
    }

    #[test]
    fn test_window_events_from_scheduler() {
        let assignees = sequential_windows(
            ts(10),
            &[TaskAssignee::new(1, 2.0), TaskAssignee::new(2, 3.0)],
        )
        .unwrap();
        let mut db = Database::default();
        db.tasks.push(seq_task(1, ts(10), assignees));

        let events = events_for_range(&db, ts(0), ts(23));
        // One due event plus two windows, ordered by start.
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].kind, EventKind::Window);
        assert_eq!(events[0].start, ts(5));
        assert_eq!(events[1].start, ts(7));
        assert_eq!(events[2].kind, EventKind::Due);
    }

    #[test]
    fn test_window_overlap_at_range_edge() {
        let assignees = sequential_windows(ts(10), &[TaskAssignee::new(1, 4.0)]).unwrap();
        let mut db = Database::default();
        db.tasks.push(seq_task(1, ts(10), assignees));

        // Range ends mid-window: the window still shows, the due does not.
        let events = events_for_range(&db, ts(0), ts(8));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::Window);
    }

    #[test]
    fn test_unstamped_assignees_contribute_nothing() {
        let mut db = Database::default();
        db.tasks
            .push(seq_task(1, ts(10), vec![TaskAssignee::new(1, 2.0)]));

        let events = events_for_range(&db, ts(0), ts(23));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::Due);
    }
}
