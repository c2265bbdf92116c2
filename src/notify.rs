//! Notification records and the due-soon reminder scan.
//!
//! Notifications are created and stored locally; delivery is somebody
//! else's problem. The reminder scan is what the watch loop runs every
//! minute: any unfinished task due within the next 30 minutes gets one
//! reminder to its responsible user, latched by `reminder_sent` so repeat
//! scans stay quiet.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::db::Database;
use crate::error::{Error, Result};
use crate::fields::{NotificationKind, Status};

/// How close a due date has to be before the scan raises a reminder.
pub const REMINDER_WINDOW_MINUTES: i64 = 30;

/// An ephemeral message tied to a user and optionally a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: u64,
    pub user_id: u64,
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    #[serde(default)]
    pub task_id: Option<u64>,
    #[serde(default)]
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub read_at: Option<DateTime<Utc>>,
}

/// Append a notification record and return its id.
pub fn push(
    db: &mut Database,
    user_id: u64,
    kind: NotificationKind,
    title: &str,
    message: String,
    task_id: Option<u64>,
    now: DateTime<Utc>,
) -> u64 {
    let id = db.next_notification_id();
    db.notifications.push(Notification {
        id,
        user_id,
        title: title.to_string(),
        message,
        kind,
        task_id,
        is_read: false,
        created_at: now,
        read_at: None,
    });
    id
}

/// Notify a user that a task was assigned to them.
pub fn assignment(db: &mut Database, user_id: u64, task_id: u64, title: &str, now: DateTime<Utc>) {
    let message = format!("You have been assigned \"{title}\".");
    push(db, user_id, NotificationKind::Assignment, "New assignment", message, Some(task_id), now);
}

/// Notify the next assignee in a sequential chain that their portion is
/// unblocked.
pub fn handoff(db: &mut Database, next_user: u64, task_id: u64, title: &str, now: DateTime<Utc>) {
    let message = format!("Your portion of \"{title}\" is ready to start.");
    push(db, next_user, NotificationKind::Handoff, "Hand-off", message, Some(task_id), now);
}

/// Notify the accountable user that a task finished and may need approval.
pub fn completion(db: &mut Database, accountable: u64, task_id: u64, title: &str, now: DateTime<Utc>) {
    let message = format!("\"{title}\" is done and awaiting approval.");
    push(db, accountable, NotificationKind::Completion, "Task completed", message, Some(task_id), now);
}

/// Notify the responsible user that a task was approved.
pub fn approval(db: &mut Database, responsible: u64, task_id: u64, title: &str, now: DateTime<Utc>) {
    let message = format!("\"{title}\" was approved.");
    push(db, responsible, NotificationKind::Approval, "Task approved", message, Some(task_id), now);
}

/// Scan for tasks due within the reminder window and raise one reminder
/// each. Returns the ids of tasks that were reminded.
///
/// A task qualifies when it is not done, its reminder latch is unset, and
/// its due timestamp falls in `(now, now + 30m]`. The latch is set as part
/// of the scan so the once-a-minute watch loop cannot duplicate reminders.
pub fn scan_due_soon(db: &mut Database, now: DateTime<Utc>) -> Vec<u64> {
    let window_end = now + Duration::minutes(REMINDER_WINDOW_MINUTES);

    let due_soon: Vec<(u64, u64, String, DateTime<Utc>)> = db
        .tasks
        .iter()
        .filter(|t| t.status != Status::Done && !t.reminder_sent)
        .filter(|t| t.due > now && t.due <= window_end)
        .map(|t| (t.id, t.responsible, t.title.clone(), t.due))
        .collect();

    let mut reminded = Vec::new();
    for (task_id, responsible, title, due) in due_soon {
        let minutes_left = (due - now).num_minutes();
        let message = format!("\"{title}\" is due in {minutes_left} minutes.");
        push(db, responsible, NotificationKind::Reminder, "Due soon", message, Some(task_id), now);
        if let Some(task) = db.get_task_mut(task_id) {
            task.reminder_sent = true;
        }
        reminded.push(task_id);
    }
    reminded
}

/// Mark a single notification read.
pub fn mark_read(db: &mut Database, id: u64, now: DateTime<Utc>) -> Result<()> {
    let n = db
        .notifications
        .iter_mut()
        .find(|n| n.id == id)
        .ok_or(Error::NotificationNotFound(id))?;
    n.is_read = true;
    n.read_at = Some(now);
    Ok(())
}

/// Mark every unread notification for `user_id` read in one pass. Returns
/// how many were flipped.
pub fn mark_all_read(db: &mut Database, user_id: u64, now: DateTime<Utc>) -> usize {
    let mut count = 0;
    for n in db
        .notifications
        .iter_mut()
        .filter(|n| n.user_id == user_id && !n.is_read)
    {
        n.is_read = true;
        n.read_at = Some(now);
        count += 1;
    }
    count
}

/// Unread notification count for a user.
pub fn unread_count(db: &Database, user_id: u64) -> usize {
    db.notifications
        .iter()
        .filter(|n| n.user_id == user_id && !n.is_read)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::Priority;
    use crate::task::Task;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 10, 10, 0, 0).unwrap()
    }

    fn task(id: u64, due: DateTime<Utc>, status: Status) -> Task {
        Task {
            id,
            title: format!("Task {id}"),
            description: None,
            responsible: 7,
            accountable: 8,
            consulted: None,
            informed: None,
            dept: "FOH".to_string(),
            priority: Priority::Medium,
            status,
            due,
            created_at: now() - Duration::days(1),
            updated_at: now() - Duration::days(1),
            is_sequential: false,
            assignees: Vec::new(),
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
    fn test_scan_reminds_tasks_inside_window() {
        let mut db = Database::default();
        db.tasks.push(task(1, now() + Duration::minutes(20), Status::Todo));
        db.tasks.push(task(2, now() + Duration::minutes(45), Status::Todo));
        db.tasks.push(task(3, now() - Duration::minutes(5), Status::Todo));

        let reminded = scan_due_soon(&mut db, now());
        assert_eq!(reminded, vec![1]);
        assert_eq!(db.notifications.len(), 1);
        assert_eq!(db.notifications[0].user_id, 7);
        assert_eq!(db.notifications[0].kind, NotificationKind::Reminder);
        assert!(db.get_task(1).unwrap().reminder_sent);
        assert!(!db.get_task(2).unwrap().reminder_sent);
    }

    #[test]
    fn test_scan_skips_done_and_latched() {
        let mut db = Database::default();
        db.tasks.push(task(1, now() + Duration::minutes(10), Status::Done));
        let mut latched = task(2, now() + Duration::minutes(10), Status::InProgress);
        latched.reminder_sent = true;
        db.tasks.push(latched);

        assert!(scan_due_soon(&mut db, now()).is_empty());
        assert!(db.notifications.is_empty());
    }

    #[test]
    fn test_scan_is_idempotent_across_ticks() {
        let mut db = Database::default();
        db.tasks.push(task(1, now() + Duration::minutes(25), Status::Todo));

        assert_eq!(scan_due_soon(&mut db, now()).len(), 1);
        // The next one-minute tick sees the latch and stays quiet.
        assert!(scan_due_soon(&mut db, now() + Duration::minutes(1)).is_empty());
        assert_eq!(db.notifications.len(), 1);
    }

    #[test]
    fn test_mark_all_read_batches_only_that_user() {
        let mut db = Database::default();
        push(&mut db, 7, NotificationKind::System, "a", "a".into(), None, now());
        push(&mut db, 7, NotificationKind::System, "b", "b".into(), None, now());
        push(&mut db, 9, NotificationKind::System, "c", "c".into(), None, now());

        assert_eq!(unread_count(&db, 7), 2);
        let flipped = mark_all_read(&mut db, 7, now());
        assert_eq!(flipped, 2);
        assert_eq!(unread_count(&db, 7), 0);
        assert_eq!(unread_count(&db, 9), 1);
        assert!(db.notifications[0].read_at.is_some());
    }

    #[test]
    fn test_mark_read_unknown_id() {
        let mut db = Database::default();
        assert!(mark_read(&mut db, 42, now()).is_err());
    }
}
