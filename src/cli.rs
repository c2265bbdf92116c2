use std::path::PathBuf;

use clap::Parser;

use crate::cmd::Commands;

/// Restaurant task-management CLI with sequential hand-offs.
/// Storage defaults to the most recent branch board under ~/.brigade,
/// or a path passed via --db.
#[derive(Parser)]
#[command(name = "brigade", version, about = "Restaurant task management with RACI roles and sequential hand-offs")]
pub struct Cli {
    /// Path to the JSON board file.
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Act as this user (name or ID). Drives permission checks and
    /// "my tasks" / notification filtering. Omitted = local admin.
    #[arg(long = "as", global = true, value_name = "USER")]
    pub as_user: Option<String>,

    /// Enable debug logging to the brigade log file.
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}
