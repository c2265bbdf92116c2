//! Performance reporting over already-loaded collections.
//!
//! Plain filter/map/reduce aggregation: per-user ("position") reports with
//! completion and on-time rates, per-department reports with overdue counts,
//! and an overall status distribution. Groups with no tasks are dropped.

use chrono::{DateTime, Utc};

use crate::db::Database;
use crate::fields::Status;

/// Per-user performance summary.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionReport {
    pub user_id: u64,
    pub name: String,
    pub role: String,
    pub dept: String,
    pub total: usize,
    pub completed: usize,
    /// Percentage, 0-100, rounded.
    pub completion_rate: u32,
    pub on_time: usize,
    pub on_time_rate: u32,
}

/// Per-department performance summary.
#[derive(Debug, Clone, PartialEq)]
pub struct DepartmentReport {
    pub dept: String,
    pub total: usize,
    pub completed: usize,
    pub completion_rate: u32,
    pub overdue: usize,
}

/// Whole-board status distribution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverallStats {
    pub total: usize,
    pub todo: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub overdue: usize,
    pub completion_rate: u32,
}

fn rate(part: usize, total: usize) -> u32 {
    if total == 0 {
        0
    } else {
        ((part as f64 / total as f64) * 100.0).round() as u32
    }
}

/// One report per user who is responsible for at least one task.
///
/// "On time" counts done tasks whose due timestamp has not yet passed at
/// `now`; a done task past its due date completed late.
pub fn position_reports(db: &Database, now: DateTime<Utc>) -> Vec<PositionReport> {
    db.users
        .iter()
        .map(|user| {
            let user_tasks: Vec<_> = db
                .tasks
                .iter()
                .filter(|t| t.responsible == user.id)
                .collect();
            let total = user_tasks.len();
            let completed = user_tasks.iter().filter(|t| t.status == Status::Done).count();
            let on_time = user_tasks
                .iter()
                .filter(|t| t.status == Status::Done && t.due >= now)
                .count();
            PositionReport {
                user_id: user.id,
                name: user.name.clone(),
                role: user.role.clone(),
                dept: user.dept.clone(),
                total,
                completed,
                completion_rate: rate(completed, total),
                on_time,
                on_time_rate: rate(on_time, total),
            }
        })
        .filter(|r| r.total > 0)
        .collect()
}

/// One report per department that has at least one task.
pub fn department_reports(db: &Database) -> Vec<DepartmentReport> {
    let mut names: Vec<String> = db.tasks.iter().map(|t| t.dept.clone()).collect();
    names.sort();
    names.dedup();

    names
        .into_iter()
        .map(|dept| {
            let dept_tasks: Vec<_> = db.tasks.iter().filter(|t| t.dept == dept).collect();
            let total = dept_tasks.len();
            let completed = dept_tasks.iter().filter(|t| t.status == Status::Done).count();
            let overdue = dept_tasks
                .iter()
                .filter(|t| t.status == Status::Overdue)
                .count();
            DepartmentReport {
                dept,
                total,
                completed,
                completion_rate: rate(completed, total),
                overdue,
            }
        })
        .filter(|r| r.total > 0)
        .collect()
}

/// Board-wide status counts.
pub fn overall_stats(db: &Database) -> OverallStats {
    let total = db.tasks.len();
    let count = |s: Status| db.tasks.iter().filter(|t| t.status == s).count();
    let completed = count(Status::Done);
    OverallStats {
        total,
        todo: count(Status::Todo),
        in_progress: count(Status::InProgress),
        completed,
        overdue: count(Status::Overdue),
        completion_rate: rate(completed, total),
    }
}

/// Print the overall stats block.
pub fn print_overall(stats: &OverallStats) {
    println!("Tasks:        {}", stats.total);
    println!("To Do:        {}", stats.todo);
    println!("In Progress:  {}", stats.in_progress);
    println!("Done:         {}", stats.completed);
    println!("Overdue:      {}", stats.overdue);
    println!("Completion:   {}%", stats.completion_rate);
}

/// Print the per-user table.
pub fn print_positions(reports: &[PositionReport]) {
    println!(
        "{:<5} {:<16} {:<16} {:<10} {:<6} {:<6} {:<6} {}",
        "ID", "Name", "Role", "Dept", "Done", "Total", "Rate", "On-time"
    );
    for r in reports {
        println!(
            "{:<5} {:<16} {:<16} {:<10} {:<6} {:<6} {:<5}% {}%",
            r.user_id,
            crate::db::truncate(&r.name, 16),
            crate::db::truncate(&r.role, 16),
            crate::db::truncate(&r.dept, 10),
            r.completed,
            r.total,
            r.completion_rate,
            r.on_time_rate
        );
    }
}

/// Print the per-department table.
pub fn print_departments(reports: &[DepartmentReport]) {
    println!(
        "{:<14} {:<6} {:<6} {:<6} {}",
        "Department", "Done", "Total", "Rate", "Overdue"
    );
    for r in reports {
        println!(
            "{:<14} {:<6} {:<6} {:<5}% {}",
            crate::db::truncate(&r.dept, 14),
            r.completed,
            r.total,
            r.completion_rate,
            r.overdue
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::Priority;
    use crate::roster::User;
    use crate::task::Task;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 10, 10, 0, 0).unwrap()
    }

    fn task(id: u64, responsible: u64, dept: &str, status: Status, due: DateTime<Utc>) -> Task {
        Task {
            id,
            title: format!("Task {id}"),
            description: None,
            responsible,
            accountable: responsible,
            consulted: None,
            informed: None,
            dept: dept.to_string(),
            priority: Priority::Medium,
            status,
            due,
            created_at: now() - Duration::days(2),
            updated_at: now() - Duration::days(2),
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

    fn user(id: u64, name: &str, dept: &str) -> User {
        User {
            id,
            name: name.to_string(),
            email: None,
            role: "Staff".to_string(),
            dept: dept.to_string(),
            permissions: Vec::new(),
            active: true,
        }
    }

    fn fixture() -> Database {
        let mut db = Database::default();
        db.users.push(user(1, "An", "BOH"));
        db.users.push(user(2, "Binh", "FOH"));
        db.users.push(user(3, "Idle", "FOH"));
        // An: 2 tasks, 1 done before due, 1 done after due.
        db.tasks.push(task(1, 1, "BOH", Status::Done, now() + Duration::hours(2)));
        db.tasks.push(task(2, 1, "BOH", Status::Done, now() - Duration::hours(2)));
        // Binh: 2 open, 1 overdue, 1 done on time.
        db.tasks.push(task(3, 2, "FOH", Status::Todo, now() + Duration::days(1)));
        db.tasks.push(task(4, 2, "FOH", Status::InProgress, now() + Duration::days(1)));
        db.tasks.push(task(5, 2, "FOH", Status::Overdue, now() - Duration::days(1)));
        db.tasks.push(task(6, 2, "FOH", Status::Done, now() + Duration::days(1)));
        db
    }

    #[test]
    fn test_position_reports_rates() {
        let reports = position_reports(&fixture(), now());
        assert_eq!(reports.len(), 2, "users without tasks are dropped");

        let an = reports.iter().find(|r| r.user_id == 1).unwrap();
        assert_eq!(an.total, 2);
        assert_eq!(an.completed, 2);
        assert_eq!(an.completion_rate, 100);
        assert_eq!(an.on_time, 1);
        assert_eq!(an.on_time_rate, 50);

        let binh = reports.iter().find(|r| r.user_id == 2).unwrap();
        assert_eq!(binh.total, 4);
        assert_eq!(binh.completion_rate, 25);
        assert_eq!(binh.on_time_rate, 25);
    }

    #[test]
    fn test_department_reports() {
        let reports = department_reports(&fixture());
        assert_eq!(reports.len(), 2);

        let foh = reports.iter().find(|r| r.dept == "FOH").unwrap();
        assert_eq!(foh.total, 4);
        assert_eq!(foh.completed, 1);
        assert_eq!(foh.completion_rate, 25);
        assert_eq!(foh.overdue, 1);
    }

    #[test]
    fn test_overall_stats() {
        let stats = overall_stats(&fixture());
        assert_eq!(stats.total, 6);
        assert_eq!(stats.completed, 3);
        assert_eq!(stats.todo, 1);
        assert_eq!(stats.in_progress, 1);
        assert_eq!(stats.overdue, 1);
        assert_eq!(stats.completion_rate, 50);
    }

    #[test]
    fn test_empty_database() {
        let db = Database::default();
        assert!(position_reports(&db, now()).is_empty());
        assert!(department_reports(&db).is_empty());
        assert_eq!(overall_stats(&db).completion_rate, 0);
    }
}
