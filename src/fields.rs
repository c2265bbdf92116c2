//! Enumerations and field types for task management.
//!
//! This module defines the structured data types used to categorise tasks,
//! including priority, status, and notification kinds, plus the list
//! filtering/sorting helpers used by the CLI.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Task priority. Also drives the default deadline when none is given
/// (see `schedule::deadline_for_priority`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ValueEnum, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Priority {
    #[serde(alias = "Low")]
    Low,
    #[serde(alias = "Medium")]
    Medium,
    #[serde(alias = "High")]
    High,
    #[serde(alias = "Urgent")]
    Urgent,
}

/// Task completion status.
///
/// `Overdue` is never derived automatically from the due date; it is only
/// reachable through an explicit status change.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ValueEnum, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    #[serde(alias = "To Do", alias = "ToDo")]
    Todo,
    #[serde(alias = "In Progress", alias = "InProgress")]
    InProgress,
    #[serde(alias = "Done")]
    Done,
    #[serde(alias = "Overdue")]
    Overdue,
}

/// Category tag on a notification record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ValueEnum, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationKind {
    Reminder,
    Approval,
    Completion,
    Assignment,
    Handoff,
    System,
}

/// Available sorting options for task lists.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SortKey {
    Due,
    Priority,
    Id,
    Created,
}

/// Filtering options for tasks based on due timestamps.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DueFilter {
    Today,
    ThisWeek,
    Overdue,
}
