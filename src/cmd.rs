//! Command implementations for the CLI interface.
//!
//! This module contains all the command handlers, from task CRUD through the
//! sequential completion toggle, notifications, reports, and the reminder
//! watch loop. Handlers return `Result` and let `main` turn errors into an
//! exit code; every mutation goes through the store.

use std::path::Path;

use chrono::{Duration, Utc};
use clap::{CommandFactory, Subcommand};
use clap_complete::{generate, Shell};

use crate::calendar;
use crate::db::*;
use crate::error::{Error, Result};
use crate::fields::*;
use crate::log;
use crate::notify;
use crate::report;
use crate::roster::{perms, Department, Session, User};
use crate::schedule::{self, StartGate, ToggleOutcome};
use crate::store::Store;
use crate::task::{ChecklistItem, Task, TaskAssignee, TaskComment, TaskFeedback, TaskTemplate, TemplateAssignee};

#[derive(Subcommand)]
pub enum Commands {
    /// Seed an empty board with starter departments and users.
    Init,

    /// Add a new task.
    Add {
        /// Short title for the task.
        title: String,
        /// Use a template for default values.
        #[arg(long)]
        template: Option<String>,
        /// Optional longer description.
        #[arg(long)]
        desc: Option<String>,
        /// Department name.
        #[arg(long)]
        dept: Option<String>,
        /// Priority: low | medium | high | urgent.
        #[arg(long, value_enum)]
        priority: Option<Priority>,
        /// Due: RFC3339, "YYYY-MM-DD HH:MM", "YYYY-MM-DD", "today",
        /// "tomorrow", or "in Nh/Nd/Nw". Defaults by priority.
        #[arg(long)]
        due: Option<String>,
        /// Responsible user (name or ID). Ignored for sequential tasks,
        /// where the first assignee is responsible.
        #[arg(long)]
        responsible: Option<String>,
        /// Accountable user (name or ID). Defaults to the acting user.
        #[arg(long)]
        accountable: Option<String>,
        /// Consulted user (name or ID).
        #[arg(long)]
        consulted: Option<String>,
        /// Informed user (name or ID).
        #[arg(long)]
        informed: Option<String>,
        /// Sequential assignee as "user:hours". May be repeated; order
        /// defines the hand-off chain.
        #[arg(long = "assignee", value_name = "USER:HOURS")]
        assignees: Vec<String>,
        /// Checklist item. May be repeated.
        #[arg(long = "check")]
        checklist: Vec<String>,
        /// Comma-separated tags. May be repeated.
        #[arg(long = "tag")]
        tags: Vec<String>,
    },

    /// List tasks with optional filters.
    List {
        /// Include completed tasks.
        #[arg(long)]
        all: bool,
        /// Filter by status.
        #[arg(long, value_enum)]
        status: Option<Status>,
        /// Filter by priority.
        #[arg(long, value_enum)]
        priority: Option<Priority>,
        /// Filter by department.
        #[arg(long)]
        dept: Option<String>,
        /// Filter by responsible user (name or ID).
        #[arg(long)]
        responsible: Option<String>,
        /// Only tasks where the acting user is responsible or an assignee.
        #[arg(long)]
        mine: bool,
        /// Due filter: today | this-week | overdue.
        #[arg(long, value_enum)]
        due: Option<DueFilter>,
        /// Filter by tag. May be repeated. Accepts comma-separated.
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Sort key.
        #[arg(long, value_enum, default_value_t = SortKey::Due)]
        sort: SortKey,
        /// Limit number of rows printed.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// View a single task by ID or title.
    View {
        /// Task ID or title.
        id: String,
    },

    /// Update fields on a task.
    Update {
        /// Task ID or title.
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        desc: Option<String>,
        #[arg(long)]
        dept: Option<String>,
        #[arg(long, value_enum)]
        priority: Option<Priority>,
        /// New due timestamp. Sequential windows are recomputed.
        #[arg(long)]
        due: Option<String>,
        /// New status. Rejected on sequential tasks (use `complete`).
        #[arg(long, value_enum)]
        status: Option<Status>,
        /// Add tags. May be repeated and comma-separated.
        #[arg(long = "add-tag")]
        add_tags: Vec<String>,
        /// Remove tags. May be repeated and comma-separated.
        #[arg(long = "rm-tag")]
        rm_tags: Vec<String>,
    },

    /// Complete the current portion of a task (or the task itself).
    Complete {
        /// Task ID or title.
        id: String,
        /// Reopen instead: un-complete the most recent portion.
        #[arg(long)]
        undo: bool,
    },

    /// Show whether a user may start their portion of a sequential task.
    Gate {
        /// Task ID or title.
        id: String,
        /// User to check (name or ID). Defaults to the acting user.
        #[arg(long)]
        user: Option<String>,
    },

    /// Approve a completed task.
    Approve {
        /// Task ID or title.
        id: String,
    },

    /// Add a comment to a task.
    Comment {
        /// Task ID or title.
        id: String,
        /// Comment text.
        message: String,
    },

    /// Toggle a checklist item on a task.
    Check {
        /// Task ID or title.
        id: String,
        /// 1-based checklist item number.
        item: usize,
        /// Un-check instead.
        #[arg(long)]
        undo: bool,
    },

    /// Leave a rating on a completed task.
    Feedback {
        /// Task ID or title.
        id: String,
        /// Rating from 1 to 5.
        rating: u8,
        /// Feedback text.
        comment: String,
    },

    /// Delete a task by ID or title.
    Delete {
        /// Task ID or title.
        id: String,
    },

    /// Manage users.
    User {
        #[command(subcommand)]
        action: UserAction,
    },

    /// Manage departments.
    Dept {
        #[command(subcommand)]
        action: DeptAction,
    },

    /// Show or update notifications for the acting user.
    Notify {
        #[command(subcommand)]
        action: NotifyAction,
    },

    /// Scan for tasks due within 30 minutes and raise reminders.
    Remind {
        /// Keep scanning every 60 seconds.
        #[arg(long)]
        watch: bool,
    },

    /// Performance reports.
    Report {
        /// Only the per-user table.
        #[arg(long)]
        positions: bool,
        /// Only the per-department table.
        #[arg(long)]
        departments: bool,
    },

    /// List calendar events derived from tasks.
    Calendar {
        /// Range start (same formats as --due). Defaults to today.
        #[arg(long)]
        from: Option<String>,
        /// Days to include.
        #[arg(long, default_value_t = 7)]
        days: u32,
    },

    /// Manage task templates.
    Template {
        #[command(subcommand)]
        action: TemplateAction,
    },

    /// Export tasks to CSV format.
    Export {
        /// Output file path (default: tasks.csv).
        #[arg(long, short)]
        output: Option<String>,
        /// Include completed tasks.
        #[arg(long)]
        all: bool,
    },

    /// Create a timestamped backup of the current board.
    Backup,

    /// List branches in the brigade directory.
    Branches,

    /// Create a new branch board.
    BranchNew {
        /// Branch display name.
        name: String,
    },

    /// Generate shell completion scripts.
    Completions {
        /// Shell to generate completions for.
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum UserAction {
    /// Add a user to the roster.
    Add {
        name: String,
        /// Role title, e.g. "Head Chef".
        #[arg(long)]
        role: String,
        /// Department name.
        #[arg(long)]
        dept: String,
        #[arg(long)]
        email: Option<String>,
        /// Permission name. May be repeated. Defaults to view_tasks.
        #[arg(long = "permission")]
        permissions: Vec<String>,
    },
    /// List the roster.
    List,
    /// Replace a user's permission set.
    SetPermissions {
        /// User name or ID.
        user: String,
        /// Permission name. May be repeated.
        #[arg(long = "permission", required = true)]
        permissions: Vec<String>,
    },
    /// Mark a user inactive.
    Deactivate {
        /// User name or ID.
        user: String,
    },
}

#[derive(Subcommand)]
pub enum DeptAction {
    /// Add a department.
    Add {
        name: String,
        #[arg(long)]
        description: Option<String>,
        /// Manager (user name or ID).
        #[arg(long)]
        manager: Option<String>,
    },
    /// List departments.
    List,
    /// Delete a department with no tasks.
    Delete {
        /// Department name or ID.
        dept: String,
    },
}

#[derive(Subcommand)]
pub enum NotifyAction {
    /// List notifications for the acting user.
    List {
        /// Include already-read notifications.
        #[arg(long)]
        all: bool,
    },
    /// Mark one notification read.
    Read {
        /// Notification ID.
        id: u64,
    },
    /// Mark every unread notification read.
    ReadAll,
}

#[derive(Subcommand)]
pub enum TemplateAction {
    /// Create a template.
    Create {
        /// Template name.
        name: String,
        /// Task title the template stamps out.
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        dept: Option<String>,
        #[arg(long, value_enum, default_value_t = Priority::Medium)]
        priority: Priority,
        /// Checklist item. May be repeated.
        #[arg(long = "check")]
        checklist: Vec<String>,
        /// Default assignee as "role:hours". May be repeated; order defines
        /// the hand-off chain. Roles resolve to users at instantiation.
        #[arg(long = "assignee", value_name = "ROLE:HOURS")]
        assignees: Vec<String>,
        /// Comma-separated tags. May be repeated.
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    /// List all templates.
    List,
    /// Delete a template.
    Delete {
        /// Template name.
        name: String,
    },
}

/// Parse a "user:hours" (or "role:hours") spec.
fn parse_spec(spec: &str) -> Result<(String, f64)> {
    let (who, hours) = spec
        .rsplit_once(':')
        .ok_or_else(|| Error::Validation(format!("Expected NAME:HOURS, got '{spec}'")))?;
    let hours: f64 = hours
        .trim()
        .parse()
        .map_err(|_| Error::Validation(format!("Bad hour count in '{spec}'")))?;
    Ok((who.trim().to_string(), hours))
}

/// Seed an empty board with starter departments and users.
pub fn cmd_init(store: &mut Store) -> Result<()> {
    let now = Utc::now();
    store.mutate(|db| {
        if db.departments.is_empty() {
            let depts = [
                ("BOH", "Back of house: kitchen and prep"),
                ("FOH", "Front of house: service and counter"),
                ("Management", "Branch management"),
                ("Admin", "Administration, accounting, HR"),
            ];
            for (name, description) in depts {
                let id = db.next_department_id();
                db.departments.push(Department {
                    id,
                    name: name.to_string(),
                    description: Some(description.to_string()),
                    manager: None,
                });
            }
            println!("Seeded {} departments", db.departments.len());
        }

        if db.users.is_empty() {
            let users: [(&str, &str, &str, &[&str]); 4] = [
                ("Alex", "Administrator", "Management", &[perms::ADMIN]),
                (
                    "Linh",
                    "Branch Manager",
                    "Management",
                    &[perms::MANAGE_TASKS, perms::APPROVE_TASKS, perms::VIEW_REPORTS, perms::MANAGE_DEPARTMENTS],
                ),
                (
                    "Tuan",
                    "Head Chef",
                    "BOH",
                    &[perms::MANAGE_TASKS, perms::VIEW_TASKS, perms::CREATE_TASKS],
                ),
                ("Mai", "Cashier", "FOH", &[perms::VIEW_TASKS, perms::UPDATE_TASKS]),
            ];
            for (name, role, dept, permissions) in users {
                let id = db.next_user_id();
                db.users.push(User {
                    id,
                    name: name.to_string(),
                    email: None,
                    role: role.to_string(),
                    dept: dept.to_string(),
                    permissions: permissions.iter().map(|p| p.to_string()).collect(),
                    active: true,
                });
            }
            println!("Seeded {} users", db.users.len());
        }
        log::info(&format!("board initialised at {now}"));
        Ok(())
    })
}

/// Add a new task, running the scheduler for sequential assignments.
#[allow(clippy::too_many_arguments)]
pub fn cmd_add(
    store: &mut Store,
    session: &Session,
    title: String,
    template: Option<String>,
    desc: Option<String>,
    dept: Option<String>,
    priority: Option<Priority>,
    due: Option<String>,
    responsible: Option<String>,
    accountable: Option<String>,
    consulted: Option<String>,
    informed: Option<String>,
    assignee_specs: Vec<String>,
    checklist: Vec<String>,
    tags: Vec<String>,
) -> Result<()> {
    session.require(perms::CREATE_TASKS)?;
    let now = Utc::now();
    let db = store.db();

    let template: Option<TaskTemplate> = match template {
        Some(name) => Some(
            db.templates
                .iter()
                .find(|t| t.name == name)
                .cloned()
                .ok_or(Error::TemplateNotFound(name))?,
        ),
        None => None,
    };

    let dept_input = dept
        .or_else(|| template.as_ref().and_then(|t| t.dept.clone()))
        .ok_or_else(|| Error::Validation("A department is required (--dept)".to_string()))?;
    let dept = db.resolve_department(&dept_input)?.name.clone();

    let priority = priority
        .or(template.as_ref().map(|t| t.priority))
        .unwrap_or(Priority::Medium);

    let due = match due {
        Some(s) => parse_due_input(&s, now).ok_or_else(|| {
            Error::Validation(
                "Unrecognised due input. Use RFC3339, YYYY-MM-DD, 'today', 'tomorrow', or 'in Nh'."
                    .to_string(),
            )
        })?,
        None => schedule::deadline_for_priority(priority, now),
    };

    // Explicit --assignee specs win; otherwise a sequential template's
    // default roles are resolved against the roster.
    let mut chain: Vec<TaskAssignee> = Vec::new();
    for spec in &assignee_specs {
        let (who, hours) = parse_spec(spec)?;
        chain.push(TaskAssignee::new(db.resolve_user(&who)?, hours));
    }
    if chain.is_empty() {
        if let Some(t) = &template {
            for TemplateAssignee { role, time_allocation } in &t.default_assignees {
                let user = db
                    .users
                    .iter()
                    .find(|u| u.active && u.role.to_lowercase() == role.to_lowercase())
                    .ok_or_else(|| {
                        Error::Validation(format!("No active user with role '{role}'"))
                    })?;
                chain.push(TaskAssignee::new(user.id, *time_allocation));
            }
        }
    }

    let is_sequential = !chain.is_empty();
    let assignees = if is_sequential {
        schedule::sequential_windows(due, &chain)?
    } else {
        Vec::new()
    };

    // Sequential tasks: the first assignee is responsible, by definition.
    let responsible = if is_sequential {
        assignees[0].user_id
    } else {
        match responsible {
            Some(who) => db.resolve_user(&who)?,
            None => session.user_id.ok_or_else(|| {
                Error::Validation("Pass --responsible or act as a user via --as".to_string())
            })?,
        }
    };
    let accountable = match accountable {
        Some(who) => db.resolve_user(&who)?,
        None => session.user_id.unwrap_or(responsible),
    };
    let consulted = consulted.map(|who| db.resolve_user(&who)).transpose()?;
    let informed = informed.map(|who| db.resolve_user(&who)).transpose()?;

    let checklist: Vec<ChecklistItem> = if checklist.is_empty() {
        template
            .as_ref()
            .map(|t| t.checklist.clone())
            .unwrap_or_default()
    } else {
        checklist
    }
    .into_iter()
    .map(|text| ChecklistItem { text, done: false })
    .collect();

    let description = desc.or_else(|| template.as_ref().and_then(|t| t.description.clone()));
    let tags = if tags.is_empty() {
        template.as_ref().map(|t| t.tags.clone()).unwrap_or_default()
    } else {
        split_and_normalise_tags(&tags)
    };

    let notify_ids: Vec<u64> = assignees
        .iter()
        .map(|a| a.user_id)
        .filter(|&u| u != responsible)
        .collect();

    let id = store.mutate(|db| {
        let id = db.next_task_id();
        db.tasks.push(Task {
            id,
            title: title.clone(),
            description,
            responsible,
            accountable,
            consulted,
            informed,
            dept,
            priority,
            status: Status::Todo,
            due,
            created_at: now,
            updated_at: now,
            is_sequential,
            assignees,
            checklist,
            comments: Vec::new(),
            is_approved: false,
            approved_by: None,
            approved_at: None,
            feedback: None,
            reminder_sent: false,
            tags,
        });
        notify::assignment(db, responsible, id, &title, now);
        for user_id in notify_ids {
            notify::assignment(db, user_id, id, &title, now);
        }
        Ok(id)
    })?;

    println!("Added task {id}");
    Ok(())
}

/// List tasks with optional filtering and sorting.
#[allow(clippy::too_many_arguments)]
pub fn cmd_list(
    store: &Store,
    session: &Session,
    all: bool,
    status: Option<Status>,
    priority: Option<Priority>,
    dept: Option<String>,
    responsible: Option<String>,
    mine: bool,
    due: Option<DueFilter>,
    tags: Vec<String>,
    sort: SortKey,
    limit: Option<usize>,
) -> Result<()> {
    session.require(perms::VIEW_TASKS)?;
    let db = store.db();
    let now = Utc::now();
    let today = now.date_naive();
    let (week_start, week_end) = start_end_of_this_week(today);
    let tags = split_and_normalise_tags(&tags);

    let responsible_id = responsible.map(|who| db.resolve_user(&who)).transpose()?;
    let mine_id = if mine {
        Some(session.user_id.ok_or_else(|| {
            Error::Validation("--mine requires acting as a user via --as".to_string())
        })?)
    } else {
        None
    };

    let mut filtered: Vec<&Task> = db
        .tasks
        .iter()
        .filter(|t| {
            if !all && status.is_none() && t.status == Status::Done {
                return false;
            }
            if let Some(s) = status {
                if t.status != s {
                    return false;
                }
            }
            if let Some(p) = priority {
                if t.priority != p {
                    return false;
                }
            }
            if let Some(ref d) = dept {
                if !t.dept.eq_ignore_ascii_case(d) {
                    return false;
                }
            }
            if let Some(rid) = responsible_id {
                if t.responsible != rid {
                    return false;
                }
            }
            if let Some(uid) = mine_id {
                let assigned = t.assignees.iter().any(|a| a.user_id == uid);
                if t.responsible != uid && !assigned {
                    return false;
                }
            }
            if !tags.is_empty() && !tags.iter().all(|tag| t.tags.contains(tag)) {
                return false;
            }
            if let Some(df) = due {
                match df {
                    DueFilter::Today => {
                        if t.due.date_naive() != today {
                            return false;
                        }
                    }
                    DueFilter::ThisWeek => {
                        let d = t.due.date_naive();
                        if d < week_start || d > week_end {
                            return false;
                        }
                    }
                    DueFilter::Overdue => {
                        if t.due >= now || t.status == Status::Done {
                            return false;
                        }
                    }
                }
            }
            true
        })
        .collect();

    match sort {
        SortKey::Due => filtered.sort_by_key(|t| (t.due, t.id)),
        SortKey::Priority => {
            let rank = |p: Priority| match p {
                Priority::Urgent => 0,
                Priority::High => 1,
                Priority::Medium => 2,
                Priority::Low => 3,
            };
            filtered.sort_by_key(|t| (rank(t.priority), t.due, t.id));
        }
        SortKey::Id => filtered.sort_by_key(|t| t.id),
        SortKey::Created => filtered.sort_by_key(|t| (t.created_at, t.id)),
    }

    if let Some(n) = limit {
        filtered.truncate(n);
    }

    print_task_table(&filtered, db, now);
    Ok(())
}

/// View detailed information about a specific task.
pub fn cmd_view(store: &Store, session: &Session, id: String) -> Result<()> {
    session.require(perms::VIEW_TASKS)?;
    let db = store.db();
    let now = Utc::now();
    let task_id = db.resolve_task(&id)?;
    let task = db.get_task(task_id).ok_or(Error::TaskNotFound(task_id))?;

    println!("ID:           {}", task.id);
    println!("Title:        {}", task.title);
    println!("Status:       {}", format_status(task.status));
    println!("Priority:     {}", format_priority(task.priority));
    println!("Department:   {}", task.dept);
    println!("Responsible:  {}", db.user_name(task.responsible));
    println!("Accountable:  {}", db.user_name(task.accountable));
    if let Some(c) = task.consulted {
        println!("Consulted:    {}", db.user_name(c));
    }
    if let Some(i) = task.informed {
        println!("Informed:     {}", db.user_name(i));
    }
    println!(
        "Due:          {} ({})",
        task.due.to_rfc3339(),
        format_due_relative(task.due, now)
    );
    println!("Created:      {}", task.created_at.to_rfc3339());
    if !task.tags.is_empty() {
        println!("Tags:         {}", task.tags.join(","));
    }
    if task.is_approved {
        let approver = task.approved_by.map(|u| db.user_name(u)).unwrap_or_default();
        println!("Approved by:  {approver}");
    }

    if task.is_sequential {
        println!(
            "Chain:        {}% complete",
            schedule::progress_percent(&task.assignees)
        );
        let current = schedule::current_assignee(task).map(|a| a.user_id);
        for a in &task.assignees {
            let marker = if a.is_completed {
                "[x]"
            } else if current == Some(a.user_id) {
                "[>]"
            } else {
                "[ ]"
            };
            let window = match (a.start_time, a.end_time) {
                (Some(s), Some(e)) => {
                    format!("{} .. {}", s.format("%Y-%m-%d %H:%M"), e.format("%Y-%m-%d %H:%M"))
                }
                _ => "unscheduled".to_string(),
            };
            println!(
                "  {marker} {} ({}h) {}",
                db.user_name(a.user_id),
                a.time_allocation,
                window
            );
        }
    }

    if !task.checklist.is_empty() {
        println!("Checklist:");
        for (i, item) in task.checklist.iter().enumerate() {
            let mark = if item.done { "x" } else { " " };
            println!("  {}. [{mark}] {}", i + 1, item.text);
        }
    }

    if !task.comments.is_empty() {
        println!("Comments:");
        for c in &task.comments {
            println!(
                "  {} {}: {}",
                c.created_at.format("%Y-%m-%d %H:%M"),
                db.user_name(c.user_id),
                c.content
            );
        }
    }

    if let Some(f) = &task.feedback {
        println!("Feedback:     {}/5 by {}: {}", f.rating, db.user_name(f.user_id), f.comment);
    }

    if let Some(d) = &task.description {
        println!("Description:\n{d}");
    }
    Ok(())
}

/// Update an existing task's fields.
#[allow(clippy::too_many_arguments)]
pub fn cmd_update(
    store: &mut Store,
    session: &Session,
    id: String,
    title: Option<String>,
    desc: Option<String>,
    dept: Option<String>,
    priority: Option<Priority>,
    due: Option<String>,
    status: Option<Status>,
    add_tags: Vec<String>,
    rm_tags: Vec<String>,
) -> Result<()> {
    session.require(perms::UPDATE_TASKS)?;
    let now = Utc::now();
    let task_id = store.db().resolve_task(&id)?;

    let dept = match dept {
        Some(d) => Some(store.db().resolve_department(&d)?.name.clone()),
        None => None,
    };
    let due = match due {
        Some(s) => Some(parse_due_input(&s, now).ok_or_else(|| {
            Error::Validation("Unrecognised due input.".to_string())
        })?),
        None => None,
    };

    store.mutate(|db| {
        let task = db.get_task_mut(task_id).ok_or(Error::TaskNotFound(task_id))?;

        if status.is_some() && task.is_sequential {
            return Err(Error::Validation(
                "Sequential task status is derived from assignee completion; use `complete`."
                    .to_string(),
            ));
        }

        if let Some(t) = title {
            task.title = t;
        }
        if let Some(d) = desc {
            task.description = if d.is_empty() { None } else { Some(d) };
        }
        if let Some(d) = dept {
            task.dept = d;
        }
        if let Some(p) = priority {
            task.priority = p;
        }
        if let Some(s) = status {
            task.status = s;
        }
        if let Some(new_due) = due {
            task.due = new_due;
            task.reminder_sent = false;
            // The window chain hangs off the deadline, so moving the
            // deadline reschedules everyone.
            if task.is_sequential {
                task.assignees = schedule::sequential_windows(new_due, &task.assignees)?;
            }
        }

        let add = split_and_normalise_tags(&add_tags);
        let rm = split_and_normalise_tags(&rm_tags);
        if !add.is_empty() || !rm.is_empty() {
            let mut set: std::collections::BTreeSet<String> =
                task.tags.iter().cloned().collect();
            for tag in add {
                set.insert(tag);
            }
            for tag in rm {
                set.remove(&tag);
            }
            task.tags = set.into_iter().collect();
        }

        task.updated_at = now;
        Ok(())
    })?;

    println!("Updated task {task_id}");
    Ok(())
}

/// Complete (or reopen) the current portion of a task.
pub fn cmd_complete(store: &mut Store, session: &Session, id: String, undo: bool) -> Result<()> {
    session.require(perms::UPDATE_TASKS)?;
    let now = Utc::now();
    let task_id = store.db().resolve_task(&id)?;

    let message = store.mutate(|db| {
        let task = db.get_task_mut(task_id).ok_or(Error::TaskNotFound(task_id))?;
        task.updated_at = now;

        if task.is_sequential {
            let title = task.title.clone();
            let accountable = task.accountable;
            match schedule::toggle_current(task, !undo, now)? {
                ToggleOutcome::Completed { user_id, next_user, finished, .. } => {
                    if finished {
                        notify::completion(db, accountable, task_id, &title, now);
                        Ok(format!("Task {task_id} is Done"))
                    } else {
                        if let Some(next) = next_user {
                            notify::handoff(db, next, task_id, &title, now);
                        }
                        let name = db.user_name(user_id);
                        Ok(format!("{name}'s portion of task {task_id} completed"))
                    }
                }
                ToggleOutcome::Reopened { user_id, .. } => {
                    let name = db.user_name(user_id);
                    Ok(format!("Reopened {name}'s portion of task {task_id}"))
                }
                ToggleOutcome::NoChange => Ok(format!("Nothing to change on task {task_id}")),
            }
        } else {
            let title = task.title.clone();
            let accountable = task.accountable;
            if undo {
                task.status = Status::Todo;
                Ok(format!("Reopened task {task_id}"))
            } else {
                task.status = Status::Done;
                notify::completion(db, accountable, task_id, &title, now);
                Ok(format!("Task {task_id} is Done"))
            }
        }
    })?;

    println!("{message}");
    Ok(())
}

/// Show the gate state for one user on one task.
pub fn cmd_gate(store: &Store, session: &Session, id: String, user: Option<String>) -> Result<()> {
    session.require(perms::VIEW_TASKS)?;
    let db = store.db();
    let task_id = db.resolve_task(&id)?;
    let task = db.get_task(task_id).ok_or(Error::TaskNotFound(task_id))?;

    let user_id = match user {
        Some(who) => db.resolve_user(&who)?,
        None => session.user_id.ok_or_else(|| {
            Error::Validation("Pass --user or act as a user via --as".to_string())
        })?,
    };

    match schedule::start_gate(task, user_id, &db.users)? {
        StartGate::Ready => println!("{} may start task {}", db.user_name(user_id), task.id),
        StartGate::BlockedBy(name) => {
            println!("{} is blocked: waiting on {name}", db.user_name(user_id))
        }
        StartGate::NotSequential => println!("Task {} is not sequential", task.id),
    }
    Ok(())
}

/// Approve a completed task.
pub fn cmd_approve(store: &mut Store, session: &Session, id: String) -> Result<()> {
    session.require(perms::APPROVE_TASKS)?;
    let now = Utc::now();
    let task_id = store.db().resolve_task(&id)?;
    let approver = session.user_id;

    store.mutate(|db| {
        let task = db.get_task_mut(task_id).ok_or(Error::TaskNotFound(task_id))?;
        if task.status != Status::Done {
            return Err(Error::Validation(format!(
                "Task {task_id} is not Done; only completed tasks can be approved"
            )));
        }
        if task.is_approved {
            return Err(Error::Validation(format!("Task {task_id} is already approved")));
        }
        task.is_approved = true;
        task.approved_by = approver;
        task.approved_at = Some(now);
        task.updated_at = now;
        let title = task.title.clone();
        let responsible = task.responsible;
        notify::approval(db, responsible, task_id, &title, now);
        Ok(())
    })?;

    println!("Approved task {task_id}");
    Ok(())
}

/// Add a comment to a task.
pub fn cmd_comment(store: &mut Store, session: &Session, id: String, message: String) -> Result<()> {
    session.require(perms::VIEW_TASKS)?;
    let author = session.user_id.ok_or_else(|| {
        Error::Validation("Commenting requires acting as a user via --as".to_string())
    })?;
    let now = Utc::now();
    let task_id = store.db().resolve_task(&id)?;

    store.mutate(|db| {
        let task = db.get_task_mut(task_id).ok_or(Error::TaskNotFound(task_id))?;
        let comment_id = task.comments.iter().map(|c| c.id).max().unwrap_or(0) + 1;
        task.comments.push(TaskComment {
            id: comment_id,
            user_id: author,
            content: message.clone(),
            created_at: now,
        });
        task.updated_at = now;
        Ok(())
    })?;

    println!("Commented on task {task_id}");
    Ok(())
}

/// Toggle a checklist item.
pub fn cmd_check(store: &mut Store, session: &Session, id: String, item: usize, undo: bool) -> Result<()> {
    session.require(perms::UPDATE_TASKS)?;
    let now = Utc::now();
    let task_id = store.db().resolve_task(&id)?;

    store.mutate(|db| {
        let task = db.get_task_mut(task_id).ok_or(Error::TaskNotFound(task_id))?;
        if item == 0 || item > task.checklist.len() {
            return Err(Error::Validation(format!(
                "Task {task_id} has {} checklist items",
                task.checklist.len()
            )));
        }
        task.checklist[item - 1].done = !undo;
        task.updated_at = now;
        Ok(())
    })?;

    println!("Checklist item {item} updated on task {task_id}");
    Ok(())
}

/// Leave a rating on a completed task.
pub fn cmd_feedback(store: &mut Store, session: &Session, id: String, rating: u8, comment: String) -> Result<()> {
    session.require(perms::MANAGE_TASKS)?;
    if !(1..=5).contains(&rating) {
        return Err(Error::Validation("Rating must be 1 to 5".to_string()));
    }
    let reviewer = session.user_id.unwrap_or(0);
    let now = Utc::now();
    let task_id = store.db().resolve_task(&id)?;

    store.mutate(|db| {
        let task = db.get_task_mut(task_id).ok_or(Error::TaskNotFound(task_id))?;
        if task.status != Status::Done {
            return Err(Error::Validation(format!(
                "Task {task_id} is not Done; feedback applies to completed tasks"
            )));
        }
        task.feedback = Some(TaskFeedback {
            user_id: reviewer,
            rating,
            comment: comment.clone(),
            created_at: now,
        });
        task.updated_at = now;
        Ok(())
    })?;

    println!("Feedback recorded on task {task_id}");
    Ok(())
}

/// Delete a task.
pub fn cmd_delete(store: &mut Store, session: &Session, id: String) -> Result<()> {
    session.require(perms::MANAGE_TASKS)?;
    let task_id = store.db().resolve_task(&id)?;

    store.mutate(|db| {
        db.tasks.retain(|t| t.id != task_id);
        db.notifications.retain(|n| n.task_id != Some(task_id));
        Ok(())
    })?;

    println!("Deleted task {task_id}");
    Ok(())
}

/// User management commands.
pub fn cmd_user(store: &mut Store, session: &Session, action: UserAction) -> Result<()> {
    match action {
        UserAction::Add { name, role, dept, email, permissions } => {
            session.require(perms::MANAGE_USERS)?;
            let dept = store.db().resolve_department(&dept)?.name.clone();
            let permissions = if permissions.is_empty() {
                vec![perms::VIEW_TASKS.to_string()]
            } else {
                permissions
            };
            let id = store.mutate(|db| {
                let id = db.next_user_id();
                db.users.push(User {
                    id,
                    name: name.clone(),
                    email,
                    role,
                    dept,
                    permissions,
                    active: true,
                });
                Ok(id)
            })?;
            println!("Added user {id} ({name})");
        }
        UserAction::List => {
            session.require(perms::VIEW_TASKS)?;
            println!(
                "{:<5} {:<16} {:<18} {:<12} {:<7} {}",
                "ID", "Name", "Role", "Dept", "Active", "Permissions"
            );
            for u in &store.db().users {
                println!(
                    "{:<5} {:<16} {:<18} {:<12} {:<7} {}",
                    u.id,
                    truncate(&u.name, 16),
                    truncate(&u.role, 18),
                    truncate(&u.dept, 12),
                    if u.active { "yes" } else { "no" },
                    u.permissions.join(",")
                );
            }
        }
        UserAction::SetPermissions { user, permissions } => {
            session.require(perms::MANAGE_USERS)?;
            let user_id = store.db().resolve_user(&user)?;
            store.mutate(|db| {
                let u = db
                    .get_user_mut(user_id)
                    .ok_or_else(|| Error::UserNotFound(user.clone()))?;
                u.permissions = permissions.clone();
                Ok(())
            })?;
            println!("Updated permissions for user {user_id}");
        }
        UserAction::Deactivate { user } => {
            session.require(perms::MANAGE_USERS)?;
            let user_id = store.db().resolve_user(&user)?;
            store.mutate(|db| {
                let u = db
                    .get_user_mut(user_id)
                    .ok_or_else(|| Error::UserNotFound(user.clone()))?;
                u.active = false;
                Ok(())
            })?;
            println!("Deactivated user {user_id}");
        }
    }
    Ok(())
}

/// Department management commands.
pub fn cmd_dept(store: &mut Store, session: &Session, action: DeptAction) -> Result<()> {
    match action {
        DeptAction::Add { name, description, manager } => {
            session.require(perms::MANAGE_DEPARTMENTS)?;
            let manager = manager.map(|m| store.db().resolve_user(&m)).transpose()?;
            if store.db().resolve_department(&name).is_ok() {
                return Err(Error::Validation(format!("Department '{name}' already exists")));
            }
            let id = store.mutate(|db| {
                let id = db.next_department_id();
                db.departments.push(Department {
                    id,
                    name: name.clone(),
                    description,
                    manager,
                });
                Ok(id)
            })?;
            println!("Added department {id} ({name})");
        }
        DeptAction::List => {
            session.require(perms::VIEW_TASKS)?;
            println!("{:<5} {:<14} {:<16} {}", "ID", "Name", "Manager", "Description");
            for d in &store.db().departments {
                let manager = d
                    .manager
                    .map(|m| store.db().user_name(m))
                    .unwrap_or_else(|| "-".into());
                println!(
                    "{:<5} {:<14} {:<16} {}",
                    d.id,
                    truncate(&d.name, 14),
                    truncate(&manager, 16),
                    d.description.as_deref().unwrap_or("-")
                );
            }
        }
        DeptAction::Delete { dept } => {
            session.require(perms::MANAGE_DEPARTMENTS)?;
            let (id, name) = {
                let d = store.db().resolve_department(&dept)?;
                (d.id, d.name.clone())
            };
            let in_use = store.db().tasks.iter().any(|t| t.dept == name);
            if in_use {
                return Err(Error::Validation(format!(
                    "Department '{name}' still has tasks; reassign them first"
                )));
            }
            store.mutate(|db| {
                db.departments.retain(|d| d.id != id);
                Ok(())
            })?;
            println!("Deleted department {name}");
        }
    }
    Ok(())
}

/// Notification commands for the acting user.
pub fn cmd_notify(store: &mut Store, session: &Session, action: NotifyAction) -> Result<()> {
    let user_id = session.user_id.ok_or_else(|| {
        Error::Validation("Notifications require acting as a user via --as".to_string())
    })?;
    let now = Utc::now();

    match action {
        NotifyAction::List { all } => {
            let db = store.db();
            let mut rows: Vec<_> = db
                .notifications
                .iter()
                .filter(|n| n.user_id == user_id && (all || !n.is_read))
                .collect();
            rows.sort_by_key(|n| std::cmp::Reverse(n.created_at));
            println!(
                "{} unread notification(s)",
                notify::unread_count(db, user_id)
            );
            for n in rows {
                let read = if n.is_read { " " } else { "*" };
                let task = n.task_id.map(|t| format!("#{t}")).unwrap_or_default();
                println!(
                    "{read} {:<4} {:<11} {} {:<5} {}",
                    n.id,
                    format_notification_kind(n.kind),
                    n.created_at.format("%m-%d %H:%M"),
                    task,
                    n.message
                );
            }
        }
        NotifyAction::Read { id } => {
            store.mutate(|db| notify::mark_read(db, id, now))?;
            println!("Marked notification {id} read");
        }
        NotifyAction::ReadAll => {
            let count = store.mutate(|db| Ok(notify::mark_all_read(db, user_id, now)))?;
            println!("Marked {count} notification(s) read");
        }
    }
    Ok(())
}

/// One-shot or looping due-soon reminder scan.
pub fn cmd_remind(store: &mut Store, session: &Session, watch: bool) -> Result<()> {
    session.require(perms::VIEW_TASKS)?;

    let reminded = store.mutate(|db| Ok(notify::scan_due_soon(db, Utc::now())))?;
    print_remind_result(&reminded);

    if !watch {
        return Ok(());
    }

    // Long-running mode: keep a change subscription for the log while the
    // loop re-scans once a minute.
    let _subscription = store.subscribe(|db| {
        log::debug(&format!(
            "snapshot: {} tasks, {} notifications",
            db.tasks.len(),
            db.notifications.len()
        ));
    });
    log::info("reminder watch started");

    loop {
        std::thread::sleep(std::time::Duration::from_secs(60));
        // Pick up writes made by other invocations since the last tick.
        store.reload();
        let reminded = store.mutate(|db| Ok(notify::scan_due_soon(db, Utc::now())))?;
        if !reminded.is_empty() {
            print_remind_result(&reminded);
        }
    }
}

fn print_remind_result(reminded: &[u64]) {
    if reminded.is_empty() {
        println!("No tasks due within {} minutes.", notify::REMINDER_WINDOW_MINUTES);
    } else {
        let ids: Vec<String> = reminded.iter().map(|id| format!("#{id}")).collect();
        println!("Raised {} reminder(s): {}", reminded.len(), ids.join(", "));
    }
}

/// Performance reports.
pub fn cmd_report(store: &Store, session: &Session, positions: bool, departments: bool) -> Result<()> {
    session.require(perms::VIEW_REPORTS)?;
    let db = store.db();
    let now = Utc::now();
    let everything = !positions && !departments;

    if everything {
        report::print_overall(&report::overall_stats(db));
        println!();
    }
    if everything || positions {
        report::print_positions(&report::position_reports(db, now));
        println!();
    }
    if everything || departments {
        report::print_departments(&report::department_reports(db));
    }
    Ok(())
}

/// List derived calendar events.
pub fn cmd_calendar(store: &Store, session: &Session, from: Option<String>, days: u32) -> Result<()> {
    session.require(perms::VIEW_TASKS)?;
    let now = Utc::now();
    let from = match from {
        Some(s) => parse_due_input(&s, now)
            .ok_or_else(|| Error::Validation("Unrecognised --from input.".to_string()))?,
        None => now
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .map(|n| n.and_utc())
            .unwrap_or(now),
    };
    let to = from + Duration::days(days as i64);
    let events = calendar::events_for_range(store.db(), from, to);
    calendar::print_events(&events);
    Ok(())
}

/// Template management commands.
pub fn cmd_template(store: &mut Store, session: &Session, action: TemplateAction) -> Result<()> {
    match action {
        TemplateAction::Create {
            name,
            title,
            description,
            dept,
            priority,
            checklist,
            assignees,
            tags,
        } => {
            session.require(perms::MANAGE_TASKS)?;
            if store.db().templates.iter().any(|t| t.name == name) {
                return Err(Error::Validation(format!("Template '{name}' already exists")));
            }
            let mut default_assignees = Vec::new();
            for spec in &assignees {
                let (role, time_allocation) = parse_spec(spec)?;
                if time_allocation <= 0.0 {
                    return Err(Error::Validation(format!(
                        "Allocation must be positive in '{spec}'"
                    )));
                }
                default_assignees.push(TemplateAssignee { role, time_allocation });
            }
            let is_sequential = !default_assignees.is_empty();
            let tags = split_and_normalise_tags(&tags);
            store.mutate(|db| {
                db.templates.push(TaskTemplate {
                    name: name.clone(),
                    title,
                    description,
                    dept,
                    priority,
                    checklist,
                    is_sequential,
                    default_assignees,
                    tags,
                });
                Ok(())
            })?;
            println!("Created template '{name}'");
        }
        TemplateAction::List => {
            session.require(perms::VIEW_TASKS)?;
            println!("{:<18} {:<8} {:<5} {}", "Name", "Pri", "Seq", "Title");
            for t in &store.db().templates {
                println!(
                    "{:<18} {:<8} {:<5} {}",
                    truncate(&t.name, 18),
                    format_priority(t.priority),
                    if t.is_sequential { "yes" } else { "no" },
                    t.title
                );
            }
        }
        TemplateAction::Delete { name } => {
            session.require(perms::MANAGE_TASKS)?;
            let existed = store.db().templates.iter().any(|t| t.name == name);
            if !existed {
                return Err(Error::TemplateNotFound(name));
            }
            store.mutate(|db| {
                db.templates.retain(|t| t.name != name);
                Ok(())
            })?;
            println!("Deleted template '{name}'");
        }
    }
    Ok(())
}

/// Export tasks to CSV.
pub fn cmd_export(store: &Store, session: &Session, output: Option<String>, all: bool) -> Result<()> {
    session.require(perms::VIEW_REPORTS)?;
    let db = store.db();
    let output_path = output.unwrap_or_else(|| "tasks.csv".to_string());

    let tasks: Vec<&Task> = db
        .tasks
        .iter()
        .filter(|t| all || t.status != Status::Done)
        .collect();

    let escape_csv = |s: &str| {
        if s.contains(',') || s.contains('"') || s.contains('\n') {
            format!("\"{}\"", s.replace('"', "\"\""))
        } else {
            s.to_string()
        }
    };

    let mut csv = String::new();
    csv.push_str("ID,Title,Status,Priority,Dept,Responsible,Accountable,Due,Created,Sequential,Progress,Tags,Description\n");
    for t in &tasks {
        let tags = if t.tags.is_empty() { "-".to_string() } else { t.tags.join(";") };
        let progress = if t.is_sequential {
            format!("{}%", schedule::progress_percent(&t.assignees))
        } else {
            "-".to_string()
        };
        csv.push_str(&format!(
            "{},{},{},{},{},{},{},{},{},{},{},{},{}\n",
            t.id,
            escape_csv(&t.title),
            format_status(t.status),
            format_priority(t.priority),
            escape_csv(&t.dept),
            escape_csv(&db.user_name(t.responsible)),
            escape_csv(&db.user_name(t.accountable)),
            t.due.to_rfc3339(),
            t.created_at.to_rfc3339(),
            t.is_sequential,
            progress,
            escape_csv(&tags),
            escape_csv(t.description.as_deref().unwrap_or("-"))
        ));
    }

    std::fs::write(&output_path, csv)?;
    println!("Exported {} task(s) to {}", tasks.len(), output_path);
    Ok(())
}

/// Create a timestamped backup of the board file.
pub fn cmd_backup(db_path: &Path) -> Result<()> {
    if !db_path.exists() {
        return Err(Error::Validation("Board file does not exist yet".to_string()));
    }

    let parent_dir = db_path.parent().unwrap_or_else(|| Path::new("."));
    let backup_dir = parent_dir.join("backup");
    std::fs::create_dir_all(&backup_dir)?;

    let timestamp = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S");
    let file_name = db_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("board.json");
    let backup_path = backup_dir.join(format!("{timestamp}_{file_name}"));

    std::fs::copy(db_path, &backup_path)?;
    println!("Backup created: {}", backup_path.display());
    Ok(())
}

/// List branches in the brigade directory.
pub fn cmd_branches(brigade_dir: &Path) -> Result<()> {
    let branches = crate::branch::discover_branches(brigade_dir)?;
    if branches.is_empty() {
        println!("No branches yet. Create one with `brigade branch-new <name>`.");
        return Ok(());
    }
    for b in branches {
        println!("{}  ({})", b.display_name, b.file_path.display());
    }
    Ok(())
}

/// Create a new branch board.
pub fn cmd_branch_new(brigade_dir: &Path, name: String) -> Result<()> {
    let branch = crate::branch::create_branch(&name, brigade_dir)?;
    println!("Created branch '{}' at {}", branch.display_name, branch.file_path.display());
    Ok(())
}

/// Generate shell completion scripts.
pub fn cmd_completions(shell: Shell) {
    let mut cmd = crate::cli::Cli::command();
    generate(shell, &mut cmd, "brigade", &mut std::io::stdout());
}
