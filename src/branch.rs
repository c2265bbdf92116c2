//! Multi-branch support for restaurant groups.
//!
//! Each branch (location) keeps its own board file in the brigade
//! directory, named `<branch_name>_board.json`. Branch discovery and
//! selection lives here; the board contents are `db::Database`.

use std::fs;
use std::path::{Path, PathBuf};

use crate::db::Database;
use crate::error::{Error, Result};

/// A branch with its name and board file path.
#[derive(Debug, Clone)]
pub struct Branch {
    pub name: String,
    pub display_name: String,
    pub file_path: PathBuf,
}

impl Branch {
    /// Create a new branch handle for the given display name.
    pub fn new(display_name: &str, brigade_dir: &Path) -> Self {
        let name = sanitize_branch_name(display_name);
        let file_path = brigade_dir.join(format!("{}_board.json", name));

        Branch {
            name,
            display_name: display_name.to_string(),
            file_path,
        }
    }

    /// Load a branch from an existing board file.
    pub fn from_file(file_path: PathBuf) -> Option<Self> {
        let file_name = file_path.file_stem()?.to_str()?;
        let name = file_name.strip_suffix("_board")?;
        let display_name = name.replace('_', " ");

        Some(Branch {
            name: name.to_string(),
            display_name,
            file_path,
        })
    }

    /// Create the board file for this branch if it doesn't exist.
    pub fn create_if_not_exists(&self) -> Result<()> {
        if !self.file_path.exists() {
            let db = Database::default();
            db.save(&self.file_path)?;
        }
        Ok(())
    }
}

/// Convert a display name to a safe branch name for file naming.
/// Lowercases and collapses whitespace/punctuation runs to underscores.
pub fn sanitize_branch_name(display_name: &str) -> String {
    display_name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect::<String>()
        .split('_')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

/// Discover all branches in the brigade directory.
pub fn discover_branches(brigade_dir: &Path) -> Result<Vec<Branch>> {
    let mut branches = Vec::new();

    if !brigade_dir.exists() {
        return Ok(branches);
    }

    for entry in fs::read_dir(brigade_dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_file() {
            if let Some(branch) = Branch::from_file(path) {
                branches.push(branch);
            }
        }
    }

    branches.sort_by(|a, b| a.display_name.cmp(&b.display_name));
    Ok(branches)
}

/// Create a new branch, failing if it already exists.
pub fn create_branch(display_name: &str, brigade_dir: &Path) -> Result<Branch> {
    if display_name.trim().is_empty() {
        return Err(Error::Validation("Branch name cannot be empty".to_string()));
    }

    let branch = Branch::new(display_name, brigade_dir);
    if branch.file_path.exists() {
        return Err(Error::Validation(format!(
            "Branch '{display_name}' already exists"
        )));
    }

    branch.create_if_not_exists()?;
    Ok(branch)
}

/// Find the most recently modified branch board, if any.
pub fn most_recent_branch(brigade_dir: &Path) -> Result<Option<Branch>> {
    let branches = discover_branches(brigade_dir)?;

    let mut most_recent: Option<(Branch, std::time::SystemTime)> = None;
    for branch in branches {
        if let Ok(metadata) = fs::metadata(&branch.file_path) {
            if let Ok(modified) = metadata.modified() {
                match most_recent {
                    None => most_recent = Some((branch, modified)),
                    Some((_, current)) if modified > current => {
                        most_recent = Some((branch, modified));
                    }
                    _ => {}
                }
            }
        }
    }

    Ok(most_recent.map(|(branch, _)| branch))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_branch_name() {
        assert_eq!(sanitize_branch_name("Riverside Kitchen"), "riverside_kitchen");
        assert_eq!(sanitize_branch_name("District-3_Branch"), "district_3_branch");
        assert_eq!(sanitize_branch_name("  Extra   Spaces  "), "extra_spaces");
        assert_eq!(sanitize_branch_name(""), "");
    }

    #[test]
    fn test_branch_round_trip_through_filename() {
        let dir = Path::new("/tmp");
        let branch = Branch::new("Riverside Kitchen", dir);
        assert!(branch.file_path.ends_with("riverside_kitchen_board.json"));

        let parsed = Branch::from_file(branch.file_path.clone()).unwrap();
        assert_eq!(parsed.name, "riverside_kitchen");
        assert_eq!(parsed.display_name, "riverside kitchen");
    }

    #[test]
    fn test_from_file_ignores_other_json() {
        assert!(Branch::from_file(PathBuf::from("/tmp/notes.json")).is_none());
        assert!(Branch::from_file(PathBuf::from("/tmp/brigade.log")).is_none());
    }
}
