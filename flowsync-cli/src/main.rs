//! flowsync — project flow reconciliation CLI.
//!
//! # Usage
//!
//! ```text
//! flowsync project init <id> [--name <display name>]
//! flowsync project list
//! flowsync flows list <project> [--json]
//! flowsync release save <project> <name>
//! flowsync release show <project> <file_id>
//! flowsync mapping show <project> [--json]
//! flowsync mapping merge <project> <file_id>
//! flowsync apply <project> --plan <ops.json> [--select <flow_id>]... [--dry-run] [--json]
//! ```
//!
//! Data lives under `$FLOWSYNC_HOME/.flowsync` (default: the user's home).
//! Logs go to stderr; filter with `RUST_LOG`.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    apply::ApplyArgs, flows::FlowsCommand, mapping::MappingCommand, project::ProjectCommand,
    release::ReleaseCommand,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "flowsync",
    version,
    about = "Reconcile project flows against operation plans and releases",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create and list projects.
    Project {
        #[command(subcommand)]
        command: ProjectCommand,
    },

    /// Inspect the flows of a project.
    Flows {
        #[command(subcommand)]
        command: FlowsCommand,
    },

    /// Export and inspect project state releases.
    Release {
        #[command(subcommand)]
        command: ReleaseCommand,
    },

    /// Inspect or seed the source → target flow id mapping.
    Mapping {
        #[command(subcommand)]
        command: MappingCommand,
    },

    /// Apply an operation plan to a project.
    Apply(ApplyArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Commands::Project { command } => commands::project::run(command),
        Commands::Flows { command } => commands::flows::run(command),
        Commands::Release { command } => commands::release::run(command),
        Commands::Mapping { command } => commands::mapping::run(command),
        Commands::Apply(args) => args.run(),
    }
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
