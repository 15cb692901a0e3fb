//! # xborder CLI entry point
//!
//! Parses command-line arguments, installs the tracing subscriber, and
//! dispatches to subcommand handlers on a single-threaded Tokio runtime.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use xborder_cli::detect::{run_activity, run_detect, ActivityArgs, DetectArgs};
use xborder_cli::load_rules;
use xborder_cli::rules::{run_rules, RulesArgs};
use xborder_cli::validate::{run_audit, run_check, AuditArgs, CheckArgs};

/// Recipient hierarchy integrity and cross-border transfer risk.
#[derive(Parser, Debug)]
#[command(name = "xborder", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Alternate recipient rule table (YAML). Defaults to the GDPR table.
    #[arg(long, global = true)]
    rules: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the effective recipient rule table.
    Rules(RulesArgs),

    /// Re-validate every recipient of one organization.
    Audit(AuditArgs),

    /// Validate a proposed recipient write without persisting it.
    Check(CheckArgs),

    /// Scan one organization for risky cross-border transfers.
    Detect(DetectArgs),

    /// Analyse the transfers behind one processing activity.
    Activity(ActivityArgs),
}

async fn run(cli: Cli) -> anyhow::Result<u8> {
    let rules = load_rules(cli.rules.as_deref())?;
    match cli.command {
        Commands::Rules(args) => run_rules(&args, &rules),
        Commands::Audit(args) => run_audit(&args, &rules).await,
        Commands::Check(args) => run_check(&args, &rules).await,
        Commands::Detect(args) => run_detect(&args, &rules).await,
        Commands::Activity(args) => run_activity(&args, &rules).await,
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    // Logs go to stderr so stdout stays machine-readable JSON.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!("failed to start async runtime: {e}");
            return ExitCode::from(1);
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}
