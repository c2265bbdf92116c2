//! Users, departments, and permission-checked sessions.
//!
//! Authorization is a flat permission-string model: a session carries the
//! acting user's permission set and `"admin"` acts as a wildcard.

use serde::{Deserialize, Serialize};

/// Well-known permission names.
pub mod perms {
    pub const ADMIN: &str = "admin";
    pub const VIEW_TASKS: &str = "view_tasks";
    pub const CREATE_TASKS: &str = "create_tasks";
    pub const UPDATE_TASKS: &str = "update_tasks";
    pub const MANAGE_TASKS: &str = "manage_tasks";
    pub const APPROVE_TASKS: &str = "approve_tasks";
    pub const VIEW_REPORTS: &str = "view_reports";
    pub const MANAGE_USERS: &str = "manage_users";
    pub const MANAGE_DEPARTMENTS: &str = "manage_departments";
}

/// An actor with a role, department, and permission set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    /// Free-form role title, e.g. "Head Chef" or "Branch Manager".
    pub role: String,
    /// Department name.
    pub dept: String,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// Named grouping of users and tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Department {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub manager: Option<u64>,
}

/// The acting identity for a CLI invocation.
///
/// Resolved from `--as <user>`; when no user is named the session is the
/// built-in administrative one (local single-operator tool, so sign-in is
/// delegated to the surrounding environment).
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: Option<u64>,
    pub name: String,
    pub permissions: Vec<String>,
}

impl Session {
    /// The implicit local-operator session. Holds the wildcard permission.
    pub fn local_admin() -> Self {
        Session {
            user_id: None,
            name: "local-admin".to_string(),
            permissions: vec![perms::ADMIN.to_string()],
        }
    }

    /// Session acting as a concrete user from the roster.
    pub fn for_user(user: &User) -> Self {
        Session {
            user_id: Some(user.id),
            name: user.name.clone(),
            permissions: user.permissions.clone(),
        }
    }

    /// True when the session holds `permission` or the admin wildcard.
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == perms::ADMIN)
            || self.permissions.iter().any(|p| p == permission)
    }

    /// Permission check as a `Result`, for use in command handlers.
    pub fn require(&self, permission: &str) -> crate::error::Result<()> {
        if self.has_permission(permission) {
            Ok(())
        } else {
            Err(crate::error::Error::PermissionDenied {
                user: self.name.clone(),
                permission: permission.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_with(perms: &[&str]) -> User {
        User {
            id: 1,
            name: "Mai".to_string(),
            email: None,
            role: "Cashier".to_string(),
            dept: "FOH".to_string(),
            permissions: perms.iter().map(|p| p.to_string()).collect(),
            active: true,
        }
    }

    #[test]
    fn test_admin_wildcard() {
        let session = Session::for_user(&user_with(&["admin"]));
        assert!(session.has_permission(perms::MANAGE_USERS));
        assert!(session.has_permission(perms::APPROVE_TASKS));
        assert!(session.has_permission("anything_at_all"));
    }

    #[test]
    fn test_exact_permission_match() {
        let session = Session::for_user(&user_with(&["view_tasks", "update_tasks"]));
        assert!(session.has_permission(perms::VIEW_TASKS));
        assert!(!session.has_permission(perms::APPROVE_TASKS));
    }

    #[test]
    fn test_require_denied() {
        let session = Session::for_user(&user_with(&["view_tasks"]));
        let err = session.require(perms::MANAGE_USERS).unwrap_err();
        assert!(err.to_string().contains("manage_users"));
    }

    #[test]
    fn test_local_admin_session() {
        let session = Session::local_admin();
        assert!(session.user_id.is_none());
        assert!(session.has_permission(perms::CREATE_TASKS));
    }
}
