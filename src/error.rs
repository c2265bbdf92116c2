use thiserror::Error;

use crate::schedule::ScheduleError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    #[error("Task {0} not found")]
    TaskNotFound(u64),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Department not found: {0}")]
    DepartmentNotFound(String),

    #[error("Notification {0} not found")]
    NotificationNotFound(u64),

    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    #[error("{user} lacks the '{permission}' permission")]
    PermissionDenied { user: String, permission: String },

    #[error("Validation error: {0}")]
    Validation(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(format!("{}", Error::TaskNotFound(7)), "Task 7 not found");
        assert_eq!(
            format!(
                "{}",
                Error::PermissionDenied {
                    user: "Mai".to_string(),
                    permission: "approve_tasks".to_string()
                }
            ),
            "Mai lacks the 'approve_tasks' permission"
        );
    }
}
