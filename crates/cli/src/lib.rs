pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "desky",
    about = "Desky operator CLI",
    long_about = "Operate Desky database migrations, demo seeding, config inspection, readiness checks, and conversation upkeep.",
    after_help = "Examples:\n  desky doctor --json\n  desky config\n  desky smoke\n  desky sessions prune --idle-secs 3600\n  desky contacts list --limit 5"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the demo order dataset and write the starter policy catalog")]
    Seed,
    #[command(about = "Run end-to-end readiness checks with per-check timing details")]
    Smoke,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, classifier key readiness, DB connectivity, and policies")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(subcommand, about = "Maintain stored conversation sessions")]
    Sessions(SessionsCommand),
    #[command(subcommand, about = "Inspect contact requests filed by the handoff flow")]
    Contacts(ContactsCommand),
}

#[derive(Debug, Subcommand)]
enum SessionsCommand {
    #[command(about = "Delete sessions that have been idle for longer than the cutoff")]
    Prune {
        #[arg(
            long = "idle-secs",
            help = "Idle cutoff in seconds (defaults to conversation.idle_timeout_secs)"
        )]
        idle_secs: Option<u64>,
    },
}

#[derive(Debug, Subcommand)]
enum ContactsCommand {
    #[command(about = "List the most recently filed contact requests")]
    List {
        #[arg(long, default_value_t = 20, help = "Maximum number of requests to show")]
        limit: i64,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Smoke => commands::smoke::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Sessions(SessionsCommand::Prune { idle_secs }) => {
            commands::sessions::prune(idle_secs)
        }
        Command::Contacts(ContactsCommand::List { limit }) => commands::contacts::list(limit),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
