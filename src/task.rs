//! Task data structures and related record types.
//!
//! This module defines the core `Task` struct representing one work item
//! with RACI role references, sequential-assignment metadata, checklist,
//! comments, and approval fields, plus the `TaskTemplate` used to stamp out
//! recurring work.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fields::*;

/// One ordered participant in a sequential task.
///
/// The scheduler stamps `start_time`/`end_time` with the planned window at
/// creation; completing a portion overwrites `end_time` with the actual
/// completion instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskAssignee {
    pub user_id: u64,
    /// Budgeted hours for this participant's portion. Must be > 0.
    pub time_allocation: f64,
    pub is_completed: bool,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl TaskAssignee {
    /// A fresh, incomplete assignee with no window stamped yet.
    pub fn new(user_id: u64, time_allocation: f64) -> Self {
        TaskAssignee {
            user_id,
            time_allocation,
            is_completed: false,
            start_time: None,
            end_time: None,
            notes: None,
        }
    }
}

/// A dated remark left on a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskComment {
    pub id: u64,
    pub user_id: u64,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Post-completion rating left by a reviewer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskFeedback {
    pub user_id: u64,
    /// 1 to 5.
    pub rating: u8,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

/// One entry in a task's checklist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub text: String,
    #[serde(default)]
    pub done: bool,
}

/// A work item with RACI role references and optional sequential assignment.
///
/// Invariant: when `is_sequential` is true, `assignees` is non-empty and
/// `responsible` equals the first assignee's user id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    /// RACI: the user doing the work (first assignee on sequential tasks).
    pub responsible: u64,
    /// RACI: the user answerable for the outcome.
    pub accountable: u64,
    #[serde(default)]
    pub consulted: Option<u64>,
    #[serde(default)]
    pub informed: Option<u64>,
    /// Department name, e.g. "BOH" or "FOH".
    pub dept: String,
    pub priority: Priority,
    pub status: Status,
    pub due: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub is_sequential: bool,
    /// Ordered assignee chain. Empty unless `is_sequential`.
    #[serde(default)]
    pub assignees: Vec<TaskAssignee>,
    #[serde(default)]
    pub checklist: Vec<ChecklistItem>,
    #[serde(default)]
    pub comments: Vec<TaskComment>,
    #[serde(default)]
    pub is_approved: bool,
    #[serde(default)]
    pub approved_by: Option<u64>,
    #[serde(default)]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub feedback: Option<TaskFeedback>,
    /// Latch preventing duplicate due-soon reminders.
    #[serde(default)]
    pub reminder_sent: bool,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Default assignee slot on a template: a role name resolved to a concrete
/// user when the template is instantiated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateAssignee {
    pub role: String,
    pub time_allocation: f64,
}

/// A template for creating tasks with predefined values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskTemplate {
    pub name: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub dept: Option<String>,
    pub priority: Priority,
    #[serde(default)]
    pub checklist: Vec<String>,
    #[serde(default)]
    pub is_sequential: bool,
    #[serde(default)]
    pub default_assignees: Vec<TemplateAssignee>,
    #[serde(default)]
    pub tags: Vec<String>,
}
