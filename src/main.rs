//! # Brigade - Restaurant Task Management CLI
//!
//! A command-line task manager for restaurant teams, built around RACI role
//! assignments and sequential hand-off chains.
//!
//! ## Key Features
//!
//! - **RACI Roles**: Every task names who is Responsible, Accountable,
//!   Consulted, and Informed
//! - **Sequential Hand-offs**: Multi-person tasks where each portion unlocks
//!   the next, with time windows back-scheduled from the deadline
//! - **Derived Status**: Sequential task status follows assignee completion
//! - **Due-soon Reminders**: A 30-minute reminder window with an optional
//!   watch loop
//! - **Multi-Branch Support**: Each restaurant location keeps its own
//!   (local .json) board file
//! - **Reports & Calendar**: Per-user and per-department performance tables,
//!   plus derived calendar events
//!
//! ## Quick Start
//!
//! ```bash
//! # Seed departments and users
//! brigade init
//!
//! # Add a sequential prep task: Tuan 2h, then Mai 1h, due tonight
//! brigade add "Evening prep" --dept BOH --due "2026-08-23 18:00" \
//!     --assignee tuan:2 --assignee mai:1
//!
//! # Check off the current portion, acting as Tuan
//! brigade --as tuan complete 1
//!
//! # Who may start?
//! brigade gate 1 --user mai
//!
//! # List open tasks
//! brigade list
//! ```
//!
//! Data is stored locally in `~/.brigade/` with each branch as a separate
//! JSON file. We recommend you source control this folder via `git init`
//! and back it up periodically.

use std::path::PathBuf;

use clap::Parser;

pub mod branch;
pub mod calendar;
pub mod cli;
pub mod cmd;
pub mod db;
pub mod error;
pub mod fields;
pub mod log;
pub mod notify;
pub mod report;
pub mod roster;
pub mod schedule;
pub mod store;
pub mod task;

use cli::Cli;
use cmd::*;
use error::Result;
use roster::Session;
use store::Store;

fn main() {
    let cli = Cli::parse();

    // Determine the brigade directory
    let brigade_dir = if let Some(db_path) = cli.db.as_ref() {
        db_path
            .parent()
            .unwrap_or_else(|| std::path::Path::new("."))
            .to_path_buf()
    } else {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        let brigade_dir = PathBuf::from(home).join(".brigade");
        if let Err(e) = std::fs::create_dir_all(&brigade_dir) {
            eprintln!("Failed to create brigade directory {}: {}", brigade_dir.display(), e);
            std::process::exit(1);
        }
        brigade_dir
    };

    log::init(&brigade_dir, cli.debug);

    // Handle commands that don't need a board first
    match &cli.command {
        Commands::Completions { shell } => {
            cmd_completions(*shell);
            return;
        }
        Commands::Branches => {
            exit_on_error(cmd_branches(&brigade_dir));
            return;
        }
        Commands::BranchNew { name } => {
            exit_on_error(cmd_branch_new(&brigade_dir, name.clone()));
            return;
        }
        _ => {}
    }

    // For all other commands, determine the board file to use
    let db_path = match cli.db {
        Some(path) => path,
        None => match branch::most_recent_branch(&brigade_dir) {
            Ok(Some(b)) => b.file_path,
            _ => {
                let main = branch::Branch::new("Main", &brigade_dir);
                if let Err(e) = main.create_if_not_exists() {
                    eprintln!("Failed to create default branch: {e}");
                    std::process::exit(1);
                }
                main.file_path
            }
        },
    };

    if matches!(cli.command, Commands::Backup) {
        exit_on_error(cmd_backup(&db_path));
        return;
    }

    let mut store = Store::open(db_path);

    let session = match cli.as_user {
        Some(who) => {
            let session = store
                .db()
                .resolve_user(&who)
                .and_then(|id| {
                    store
                        .db()
                        .get_user(id)
                        .map(Session::for_user)
                        .ok_or(error::Error::UserNotFound(who.clone()))
                });
            match session {
                Ok(s) => s,
                Err(e) => {
                    eprintln!("{e}");
                    std::process::exit(1);
                }
            }
        }
        None => Session::local_admin(),
    };

    let result = match cli.command {
        Commands::Completions { .. } | Commands::Branches | Commands::BranchNew { .. } => {
            unreachable!("handled above")
        }
        Commands::Backup => unreachable!("handled above"),

        Commands::Init => cmd_init(&mut store),

        Commands::Add {
            title, template, desc, dept, priority, due, responsible, accountable,
            consulted, informed, assignees, checklist, tags,
        } => cmd_add(&mut store, &session, title, template, desc, dept, priority, due,
                     responsible, accountable, consulted, informed, assignees,
                     checklist, tags),

        Commands::List { all, status, priority, dept, responsible, mine, due, tags, sort, limit } =>
            cmd_list(&store, &session, all, status, priority, dept, responsible, mine,
                     due, tags, sort, limit),

        Commands::View { id } => cmd_view(&store, &session, id),

        Commands::Update { id, title, desc, dept, priority, due, status, add_tags, rm_tags } =>
            cmd_update(&mut store, &session, id, title, desc, dept, priority, due,
                       status, add_tags, rm_tags),

        Commands::Complete { id, undo } => cmd_complete(&mut store, &session, id, undo),

        Commands::Gate { id, user } => cmd_gate(&store, &session, id, user),

        Commands::Approve { id } => cmd_approve(&mut store, &session, id),

        Commands::Comment { id, message } => cmd_comment(&mut store, &session, id, message),

        Commands::Check { id, item, undo } => cmd_check(&mut store, &session, id, item, undo),

        Commands::Feedback { id, rating, comment } =>
            cmd_feedback(&mut store, &session, id, rating, comment),

        Commands::Delete { id } => cmd_delete(&mut store, &session, id),

        Commands::User { action } => cmd_user(&mut store, &session, action),

        Commands::Dept { action } => cmd_dept(&mut store, &session, action),

        Commands::Notify { action } => cmd_notify(&mut store, &session, action),

        Commands::Remind { watch } => cmd_remind(&mut store, &session, watch),

        Commands::Report { positions, departments } =>
            cmd_report(&store, &session, positions, departments),

        Commands::Calendar { from, days } => cmd_calendar(&store, &session, from, days),

        Commands::Template { action } => cmd_template(&mut store, &session, action),

        Commands::Export { output, all } => cmd_export(&store, &session, output, all),
    };

    exit_on_error(result);
}

fn exit_on_error(result: Result<()>) {
    if let Err(e) = result {
        log::error(&format!("{e}"));
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
