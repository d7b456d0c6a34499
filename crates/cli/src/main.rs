#![forbid(unsafe_code)]

mod commands;
mod config;
mod output;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use r1d3_core::StatusPolicy;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(name = "r1d3-migrate", version)]
#[command(about = "Converge R1D3 milestone tables onto the status column")]
struct Cli {
    /// SQLite database of the Django project.
    #[arg(long, global = true, env = "R1D3_DB", default_value = "db.sqlite3")]
    db: PathBuf,
    /// YAML file with extra or overriding migration plans.
    #[arg(long, global = true, env = "R1D3_PLANS")]
    plans: Option<PathBuf>,
    #[arg(long, global = true, default_value_t = false)]
    json: bool,
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run one migration through PROBING -> VERIFIED.
    Reconcile {
        /// `app.name`, e.g. `strategy.add_status`.
        migration: String,
        #[arg(long, default_value_t = false)]
        dry_run: bool,
        #[arg(long, value_enum)]
        policy: Option<PolicyArg>,
    },
    /// Run every known migration in order, stopping at the first failure.
    ReconcileAll {
        #[arg(long, default_value_t = false)]
        dry_run: bool,
        #[arg(long, value_enum)]
        policy: Option<PolicyArg>,
    },
    /// Show the live columns of a table.
    Describe { table: String },
    /// List ledger rows.
    History {
        #[arg(long)]
        app: Option<String>,
    },
    /// Record a migration whose table was converged by hand.
    MarkApplied { migration: String },
    /// Keep one in_progress row per group.
    Normalize {
        migration: String,
        #[arg(long)]
        group_by: String,
    },
    /// List known migration plans.
    Plans,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PolicyArg {
    FalseInProgress,
    FalseNotStarted,
}

impl From<PolicyArg> for StatusPolicy {
    fn from(value: PolicyArg) -> Self {
        match value {
            PolicyArg::FalseInProgress => StatusPolicy::FalseInProgress,
            PolicyArg::FalseNotStarted => StatusPolicy::FalseNotStarted,
        }
    }
}

fn init_tracing(verbose: u8) {
    let fallback = if verbose > 0 { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let json = cli.json;

    match commands::run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            output::emit_error(&err, json);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reconcile_arguments_parse() {
        let cli = Cli::try_parse_from([
            "r1d3-migrate",
            "--db",
            "/tmp/r1d3.sqlite3",
            "reconcile",
            "strategy.add_status",
            "--dry-run",
            "--policy",
            "false-not-started",
        ])
        .expect("parse");
        assert_eq!(cli.db, PathBuf::from("/tmp/r1d3.sqlite3"));
        match cli.command {
            Command::Reconcile {
                migration,
                dry_run,
                policy,
            } => {
                assert_eq!(migration, "strategy.add_status");
                assert!(dry_run);
                assert_eq!(
                    policy.map(StatusPolicy::from),
                    Some(StatusPolicy::FalseNotStarted)
                );
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn global_flags_follow_the_subcommand() {
        let cli = Cli::try_parse_from([
            "r1d3-migrate",
            "history",
            "--app",
            "strategy",
            "--json",
            "-vv",
        ])
        .expect("parse");
        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
        assert!(matches!(
            cli.command,
            Command::History { app: Some(ref app) } if app == "strategy"
        ));
    }

    #[test]
    fn usage_errors_are_reported_by_clap() {
        let err = Cli::try_parse_from(["r1d3-migrate", "normalize", "strategy.add_status"])
            .expect_err("missing --group-by");
        assert_eq!(err.exit_code(), 2);
        let err = Cli::try_parse_from(["r1d3-migrate", "reconcile", "a.b", "--policy", "maybe"])
            .expect_err("unknown policy");
        assert_eq!(err.exit_code(), 2);
    }
}
