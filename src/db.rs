//! Database container and utility functions.
//!
//! This module provides the `Database` struct holding every collection the
//! tool manages (tasks, users, departments, notifications, templates), JSON
//! load/save, identifier resolution, and the date parsing/formatting helpers
//! shared by the command handlers.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::fields::*;
use crate::notify::Notification;
use crate::roster::{Department, User};
use crate::task::{Task, TaskTemplate};

/// In-memory database for all managed collections.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Database {
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub departments: Vec<Department>,
    #[serde(default)]
    pub notifications: Vec<Notification>,
    #[serde(default)]
    pub templates: Vec<TaskTemplate>,
}

impl Database {
    /// Load database from JSON file, creating a new empty database if the
    /// file doesn't exist or can't be parsed.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return Database::default();
        }
        let mut buf = String::new();
        match File::open(path).and_then(|mut f| f.read_to_string(&mut buf)) {
            Ok(_) => match serde_json::from_str(&buf) {
                Ok(db) => db,
                Err(e) => {
                    eprintln!("Error parsing DB, starting fresh: {e}");
                    Database::default()
                }
            },
            Err(e) => {
                eprintln!("Error reading DB, starting fresh: {e}");
                Database::default()
            }
        }
    }

    /// Save database to JSON file using atomic write (temp file + rename).
    pub fn save(&self, path: &Path) -> Result<()> {
        let tmp = path.with_extension("json.tmp");
        let data = serde_json::to_string_pretty(self)?;
        let mut f = File::create(&tmp)?;
        f.write_all(data.as_bytes())?;
        f.flush()?;
        fs::rename(tmp, path)?;
        Ok(())
    }

    pub fn next_task_id(&self) -> u64 {
        self.tasks.iter().map(|t| t.id).max().unwrap_or(0) + 1
    }

    pub fn next_user_id(&self) -> u64 {
        self.users.iter().map(|u| u.id).max().unwrap_or(0) + 1
    }

    pub fn next_department_id(&self) -> u64 {
        self.departments.iter().map(|d| d.id).max().unwrap_or(0) + 1
    }

    pub fn next_notification_id(&self) -> u64 {
        self.notifications.iter().map(|n| n.id).max().unwrap_or(0) + 1
    }

    pub fn get_task(&self, id: u64) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn get_task_mut(&mut self, id: u64) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    pub fn get_user(&self, id: u64) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    pub fn get_user_mut(&mut self, id: u64) -> Option<&mut User> {
        self.users.iter_mut().find(|u| u.id == id)
    }

    /// Display name for a user id, degrading to "user <id>" for unknowns.
    pub fn user_name(&self, id: u64) -> String {
        self.get_user(id)
            .map(|u| u.name.clone())
            .unwrap_or_else(|| format!("user {id}"))
    }

    /// Resolve a task identifier (ID or exact title, case-insensitive) to an
    /// id. Ambiguous titles are an error asking for the specific ID.
    pub fn resolve_task(&self, identifier: &str) -> Result<u64> {
        if let Ok(id) = identifier.parse::<u64>() {
            return if self.get_task(id).is_some() {
                Ok(id)
            } else {
                Err(Error::TaskNotFound(id))
            };
        }

        let matches: Vec<&Task> = self
            .tasks
            .iter()
            .filter(|t| t.title.to_lowercase() == identifier.to_lowercase())
            .collect();

        match matches.len() {
            0 => Err(Error::Validation(format!(
                "No task found with title '{identifier}'"
            ))),
            1 => Ok(matches[0].id),
            _ => {
                let ids: Vec<String> = matches.iter().map(|t| t.id.to_string()).collect();
                Err(Error::Validation(format!(
                    "Multiple tasks titled '{}' (ids: {}). Use the specific ID.",
                    identifier,
                    ids.join(", ")
                )))
            }
        }
    }

    /// Resolve a user identifier (ID or name, case-insensitive) to an id.
    pub fn resolve_user(&self, identifier: &str) -> Result<u64> {
        if let Ok(id) = identifier.parse::<u64>() {
            return if self.get_user(id).is_some() {
                Ok(id)
            } else {
                Err(Error::UserNotFound(identifier.to_string()))
            };
        }

        let matches: Vec<&User> = self
            .users
            .iter()
            .filter(|u| u.name.to_lowercase() == identifier.to_lowercase())
            .collect();

        match matches.len() {
            0 => Err(Error::UserNotFound(identifier.to_string())),
            1 => Ok(matches[0].id),
            _ => Err(Error::Validation(format!(
                "Multiple users named '{identifier}'. Use the numeric ID."
            ))),
        }
    }

    /// Resolve a department by name (case-insensitive) or id.
    pub fn resolve_department(&self, identifier: &str) -> Result<&Department> {
        if let Ok(id) = identifier.parse::<u64>() {
            if let Some(d) = self.departments.iter().find(|d| d.id == id) {
                return Ok(d);
            }
        }
        self.departments
            .iter()
            .find(|d| d.name.to_lowercase() == identifier.to_lowercase())
            .ok_or_else(|| Error::DepartmentNotFound(identifier.to_string()))
    }
}

/// Parse human-readable due input into a UTC timestamp.
///
/// Supports:
/// - RFC 3339 ("2024-01-10T10:00:00Z")
/// - "YYYY-MM-DD HH:MM" (interpreted as UTC)
/// - "YYYY-MM-DD", "today", "tomorrow" (end of day, 23:59 UTC)
/// - "in Nh", "in Nd", "in Nw" relative to `now`
pub fn parse_due_input(s: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let s = s.trim().to_lowercase();

    if let Ok(dt) = DateTime::parse_from_rfc3339(&s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M") {
        return Some(naive.and_utc());
    }

    match s.as_str() {
        "today" => return end_of_day(now.date_naive()),
        "tomorrow" => return end_of_day(now.date_naive() + Duration::days(1)),
        _ => {}
    }

    if let Some(rest) = s.strip_prefix("in ") {
        if let Some(nh) = rest.strip_suffix('h') {
            if let Ok(hours) = nh.trim().parse::<i64>() {
                return Some(now + Duration::hours(hours));
            }
        }
        if let Some(nd) = rest.strip_suffix('d') {
            if let Ok(days) = nd.trim().parse::<i64>() {
                return Some(now + Duration::days(days));
            }
        }
        if let Some(nw) = rest.strip_suffix('w') {
            if let Ok(weeks) = nw.trim().parse::<i64>() {
                return Some(now + Duration::weeks(weeks));
            }
        }
    }

    NaiveDate::parse_from_str(&s, "%Y-%m-%d")
        .ok()
        .and_then(end_of_day)
}

fn end_of_day(date: NaiveDate) -> Option<DateTime<Utc>> {
    date.and_hms_opt(23, 59, 0).map(|n| n.and_utc())
}

/// Calculate the start and end of the current ISO week (Monday to Sunday).
pub fn start_end_of_this_week(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let weekday = today.weekday().num_days_from_monday() as i64;
    let start = today - Duration::days(weekday);
    let end = start + Duration::days(6);
    (start, end)
}

/// Format a due timestamp relative to now ("in 3h", "in 2d", "5h late").
pub fn format_due_relative(due: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let delta = due - now;
    let minutes = delta.num_minutes();
    if minutes.abs() < 1 {
        return "now".into();
    }
    let (magnitude, late) = if minutes > 0 {
        (delta, false)
    } else {
        (now - due, true)
    };
    let text = if magnitude.num_hours() < 1 {
        format!("{}m", magnitude.num_minutes())
    } else if magnitude.num_hours() < 48 {
        format!("{}h", magnitude.num_hours())
    } else {
        format!("{}d", magnitude.num_days())
    };
    if late {
        format!("{text} late")
    } else {
        format!("in {text}")
    }
}

/// Format a task status for display.
pub fn format_status(s: Status) -> &'static str {
    match s {
        Status::Todo => "To Do",
        Status::InProgress => "In Progress",
        Status::Done => "Done",
        Status::Overdue => "Overdue",
    }
}

/// Format a priority for display.
pub fn format_priority(p: Priority) -> &'static str {
    match p {
        Priority::Low => "Low",
        Priority::Medium => "Medium",
        Priority::High => "High",
        Priority::Urgent => "Urgent",
    }
}

/// Format a notification kind for display.
pub fn format_notification_kind(k: NotificationKind) -> &'static str {
    match k {
        NotificationKind::Reminder => "Reminder",
        NotificationKind::Approval => "Approval",
        NotificationKind::Completion => "Completion",
        NotificationKind::Assignment => "Assignment",
        NotificationKind::Handoff => "Handoff",
        NotificationKind::System => "System",
    }
}

/// Print tasks in a formatted table.
pub fn print_task_table(tasks: &[&Task], db: &Database, now: DateTime<Utc>) {
    println!(
        "{:<5} {:<12} {:<7} {:<10} {:<10} {:<14} {:<5} {}",
        "ID", "Status", "Pri", "Due", "Dept", "Responsible", "Seq", "Title [tags]"
    );
    for t in tasks {
        let tags = if t.tags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", t.tags.join(","))
        };
        let seq = if t.is_sequential {
            format!("{}%", crate::schedule::progress_percent(&t.assignees))
        } else {
            "-".into()
        };
        println!(
            "{:<5} {:<12} {:<7} {:<10} {:<10} {:<14} {:<5} {}{}",
            t.id,
            format_status(t.status),
            format_priority(t.priority),
            format_due_relative(t.due, now),
            truncate(&t.dept, 10),
            truncate(&db.user_name(t.responsible), 14),
            seq,
            t.title,
            tags
        );
    }
}

/// Truncate a string to a maximum width, adding ellipsis if needed.
pub fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let mut out = String::new();
        for (i, ch) in s.chars().enumerate() {
            if i + 1 >= width {
                out.push('…');
                break;
            }
            out.push(ch);
        }
        out
    }
}

/// Normalize a tag string by trimming, lowercasing, and replacing spaces
/// with hyphens.
pub fn normalise_tag(s: &str) -> String {
    s.trim().to_lowercase().replace(' ', "-")
}

/// Split comma-separated tag strings and normalize each tag.
pub fn split_and_normalise_tags(inputs: &[String]) -> Vec<String> {
    let mut tags = Vec::new();
    for raw in inputs {
        for part in raw.split(',') {
            let tag = normalise_tag(part);
            if !tag.is_empty() {
                tags.push(tag);
            }
        }
    }
    tags.sort();
    tags.dedup();
    tags
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 10, 10, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_due_rfc3339() {
        let due = parse_due_input("2024-02-01T17:30:00Z", now()).unwrap();
        assert_eq!(due, Utc.with_ymd_and_hms(2024, 2, 1, 17, 30, 0).unwrap());
    }

    #[test]
    fn test_parse_due_date_time() {
        let due = parse_due_input("2024-02-01 17:30", now()).unwrap();
        assert_eq!(due, Utc.with_ymd_and_hms(2024, 2, 1, 17, 30, 0).unwrap());
    }

    #[test]
    fn test_parse_due_bare_date_is_end_of_day() {
        let due = parse_due_input("2024-02-01", now()).unwrap();
        assert_eq!(due, Utc.with_ymd_and_hms(2024, 2, 1, 23, 59, 0).unwrap());
    }

    #[test]
    fn test_parse_due_relative() {
        assert_eq!(
            parse_due_input("in 4h", now()).unwrap(),
            now() + Duration::hours(4)
        );
        assert_eq!(
            parse_due_input("in 2d", now()).unwrap(),
            now() + Duration::days(2)
        );
        assert_eq!(
            parse_due_input("in 1w", now()).unwrap(),
            now() + Duration::weeks(1)
        );
    }

    #[test]
    fn test_parse_due_today_tomorrow() {
        assert_eq!(
            parse_due_input("today", now()).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 10, 23, 59, 0).unwrap()
        );
        assert_eq!(
            parse_due_input("Tomorrow", now()).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 11, 23, 59, 0).unwrap()
        );
    }

    #[test]
    fn test_parse_due_garbage() {
        assert!(parse_due_input("whenever", now()).is_none());
    }

    #[test]
    fn test_format_due_relative() {
        assert_eq!(format_due_relative(now() + Duration::hours(3), now()), "in 3h");
        assert_eq!(format_due_relative(now() + Duration::days(5), now()), "in 5d");
        assert_eq!(format_due_relative(now() - Duration::hours(5), now()), "5h late");
        assert_eq!(
            format_due_relative(now() + Duration::minutes(20), now()),
            "in 20m"
        );
        assert_eq!(format_due_relative(now(), now()), "now");
    }

    #[test]
    fn test_next_ids_start_at_one() {
        let db = Database::default();
        assert_eq!(db.next_task_id(), 1);
        assert_eq!(db.next_user_id(), 1);
        assert_eq!(db.next_notification_id(), 1);
    }

    #[test]
    fn test_split_and_normalise_tags() {
        let tags = split_and_normalise_tags(&["Prep, Deep Clean".to_string(), "prep".to_string()]);
        assert_eq!(tags, vec!["deep-clean".to_string(), "prep".to_string()]);
    }
}
